//! Free placement with explicit per-frame geometry.

use std::collections::HashMap;

use super::LayoutStrategy;
use crate::types::{Corner, FrameId, Rect};

pub const MIN_WIDTH: i32 = 100;
pub const MIN_HEIGHT: i32 = 60;
const DEFAULT_WIDTH: u32 = 800;
const DEFAULT_HEIGHT: u32 = 500;
/// Offset between successive new frames
const CASCADE: i32 = 25;

#[derive(Debug, Clone, Copy)]
struct Placement {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

#[derive(Debug, Default, Clone)]
struct Workspace {
    order: Vec<FrameId>,
    placements: HashMap<FrameId, Placement>,
}

#[derive(Debug)]
pub struct Floating {
    width: i32,
    height: i32,
    chrome_height: u32,
    workspaces: Vec<Workspace>,
}

impl Floating {
    pub fn new(max_workspaces: usize, width: u32, height: u32, chrome_height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            chrome_height,
            workspaces: vec![Workspace::default(); max_workspaces],
        }
    }

    fn placement_mut(&mut self, workspace: usize, fid: FrameId) -> Option<&mut Placement> {
        self.workspaces.get_mut(workspace)?.placements.get_mut(&fid)
    }
}

impl LayoutStrategy for Floating {
    fn append_frame(&mut self, workspace: usize, fid: FrameId, preferred: (u32, u32)) {
        let (screen_w, screen_h) = (self.width, self.height);
        let width = if preferred.0 > 0 { preferred.0 } else { DEFAULT_WIDTH };
        let height = if preferred.1 > 0 {
            preferred.1 + self.chrome_height
        } else {
            DEFAULT_HEIGHT
        };
        let Some(ws) = self.workspaces.get_mut(workspace) else {
            log::warn!("Floating layout: workspace {} out of range", workspace);
            return;
        };
        if ws.placements.contains_key(&fid) {
            log::warn!("Floating layout: frame 0x{:x} already registered", fid);
            return;
        }

        let (width, height) = ((width as i32).max(MIN_WIDTH), (height as i32).max(MIN_HEIGHT));
        let cascade = CASCADE * ws.order.len() as i32;
        let placement = Placement {
            x: (screen_w - width) / 2 + cascade,
            y: (screen_h - height) / 2 + cascade,
            width,
            height,
        };
        ws.order.push(fid);
        ws.placements.insert(fid, placement);
    }

    fn remove_frame(&mut self, workspace: usize, fid: FrameId) {
        let Some(ws) = self.workspaces.get_mut(workspace) else {
            return;
        };
        if ws.placements.remove(&fid).is_none() {
            log::warn!("Floating layout: frame 0x{:x} not registered on workspace {}", fid, workspace);
            return;
        }
        ws.order.retain(|&f| f != fid);
    }

    fn change_workspace(&mut self, from: usize, to: usize, fid: FrameId) {
        if to >= self.workspaces.len() {
            log::warn!("Floating layout: workspace {} out of range", to);
            return;
        }
        let Some(placement) = self
            .workspaces
            .get_mut(from)
            .and_then(|ws| ws.placements.remove(&fid))
        else {
            log::warn!("Floating layout: cannot move unknown frame 0x{:x}", fid);
            return;
        };
        self.workspaces[from].order.retain(|&f| f != fid);
        let target = &mut self.workspaces[to];
        target.order.push(fid);
        target.placements.insert(fid, placement);
    }

    fn move_frame(&mut self, workspace: usize, fid: FrameId, dx: i32, dy: i32) {
        if let Some(p) = self.placement_mut(workspace, fid) {
            p.x += dx;
            p.y += dy;
        }
    }

    fn resize_frame(&mut self, workspace: usize, fid: FrameId, dx: i32, dy: i32, corner: Corner) {
        let Some(p) = self.placement_mut(workspace, fid) else {
            return;
        };
        if corner.is_north() {
            let bottom = p.y + p.height;
            p.height = (p.height - dy).max(MIN_HEIGHT);
            p.y = bottom - p.height;
        } else {
            p.height = (p.height + dy).max(MIN_HEIGHT);
        }
        if corner.is_west() {
            let right = p.x + p.width;
            p.width = (p.width - dx).max(MIN_WIDTH);
            p.x = right - p.width;
        } else {
            p.width = (p.width + dx).max(MIN_WIDTH);
        }
    }

    fn set_size(&mut self, workspace: usize, fid: FrameId, width: u32, height: u32) {
        let Some(p) = self.placement_mut(workspace, fid) else {
            return;
        };
        if width as i32 >= MIN_WIDTH {
            p.width = width as i32;
        }
        if height as i32 >= MIN_HEIGHT {
            p.height = height as i32;
        }
    }

    fn position(&self, workspace: usize, fid: FrameId) -> usize {
        self.workspaces
            .get(workspace)
            .and_then(|ws| ws.order.iter().position(|&f| f == fid))
            .unwrap_or(0)
    }

    fn nth_frame(&self, workspace: usize, n: usize) -> Option<FrameId> {
        self.workspaces.get(workspace)?.order.get(n).copied()
    }

    fn dimensions(&self, workspace: usize) -> HashMap<FrameId, Rect> {
        self.workspaces
            .get(workspace)
            .map(|ws| {
                ws.placements
                    .iter()
                    .map(|(&fid, p)| (fid, Rect::new(p.x, p.y, p.width as u32, p.height as u32)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn frames(&self, workspace: usize) -> Vec<FrameId> {
        self.workspaces
            .get(workspace)
            .map(|ws| ws.order.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floating() -> Floating {
        Floating::new(3, 1920, 1080, 34)
    }

    #[test]
    fn test_default_placement_cascades() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        layout.append_frame(0, 2, (0, 0));
        let dims = layout.dimensions(0);
        assert_eq!(dims[&1], Rect::new(560, 290, 800, 500));
        assert_eq!(dims[&2], Rect::new(585, 315, 800, 500));
    }

    #[test]
    fn test_advisory_size_adds_chrome() {
        let mut layout = floating();
        layout.append_frame(0, 1, (640, 400));
        assert_eq!(layout.dimensions(0)[&1], Rect::new(640, 323, 640, 434));
    }

    #[test]
    fn test_tiny_advisory_size_meets_minimums() {
        let mut layout = floating();
        layout.append_frame(0, 1, (50, 20));
        let dims = layout.dimensions(0)[&1];
        assert_eq!((dims.width, dims.height), (MIN_WIDTH as u32, MIN_HEIGHT as u32));
        assert_eq!((dims.x, dims.y), (910, 510));

        layout.append_frame(0, 2, (1, 0));
        let dims = layout.dimensions(0)[&2];
        assert_eq!((dims.width, dims.height), (MIN_WIDTH as u32, 500));
    }

    #[test]
    fn test_corner_resize_stops_at_minimums() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        let before = layout.dimensions(0)[&1];

        // Exactly down to the minimum from the south-east corner
        layout.resize_frame(0, 1, -(800 - MIN_WIDTH), -(500 - MIN_HEIGHT), Corner::SouthEast);
        let dims = layout.dimensions(0)[&1];
        assert_eq!((dims.width, dims.height), (MIN_WIDTH as u32, MIN_HEIGHT as u32));
        assert_eq!((dims.x, dims.y), (before.x, before.y));

        // One more pixel does not go below it
        layout.resize_frame(0, 1, -1, -1, Corner::SouthEast);
        let dims = layout.dimensions(0)[&1];
        assert_eq!((dims.width, dims.height), (MIN_WIDTH as u32, MIN_HEIGHT as u32));

        for corner in [Corner::NorthEast, Corner::SouthWest] {
            layout.resize_frame(0, 1, 1000, -1000, corner);
            layout.resize_frame(0, 1, -1000, 1000, corner);
            let dims = layout.dimensions(0)[&1];
            assert!(dims.width >= MIN_WIDTH as u32 && dims.height >= MIN_HEIGHT as u32);
        }
    }

    #[test]
    fn test_north_west_resize_keeps_south_east() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        let before = layout.dimensions(0)[&1];

        layout.resize_frame(0, 1, 50, -30, Corner::NorthWest);
        let after = layout.dimensions(0)[&1];
        assert_eq!(after.right(), before.right());
        assert_eq!(after.bottom(), before.bottom());
        assert_eq!(after.width, 750);
        assert_eq!(after.height, 530);

        // Clamped at the minimum, still anchored
        layout.resize_frame(0, 1, 5000, 5000, Corner::NorthWest);
        let clamped = layout.dimensions(0)[&1];
        assert_eq!(clamped.width, MIN_WIDTH as u32);
        assert_eq!(clamped.height, MIN_HEIGHT as u32);
        assert_eq!(clamped.right(), before.right());
        assert_eq!(clamped.bottom(), before.bottom());
    }

    #[test]
    fn test_south_east_resize_keeps_origin() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        layout.resize_frame(0, 1, 25, 25, Corner::SouthEast);
        assert_eq!(layout.dimensions(0)[&1], Rect::new(560, 290, 825, 525));
    }

    #[test]
    fn test_set_size_respects_minimums() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        layout.set_size(0, 1, 50, 300);
        let dims = layout.dimensions(0)[&1];
        assert_eq!((dims.width, dims.height), (800, 300));
    }

    #[test]
    fn test_move_and_change_workspace() {
        let mut layout = floating();
        layout.append_frame(0, 1, (0, 0));
        layout.move_frame(0, 1, -25, 50);
        layout.change_workspace(0, 1, 1);
        assert!(layout.dimensions(0).is_empty());
        assert_eq!(layout.dimensions(1)[&1], Rect::new(535, 340, 800, 500));
        assert_eq!(layout.nth_frame(1, 0), Some(1));
    }

    #[test]
    fn test_cycling_order() {
        let mut layout = floating();
        for fid in [7, 8, 9] {
            layout.append_frame(2, fid, (0, 0));
        }
        layout.remove_frame(2, 8);
        assert_eq!(layout.position(2, 9), 1);
        assert_eq!(layout.nth_frame(2, 1), Some(9));
        assert_eq!(layout.nth_frame(2, 2), None);
    }
}
