//! Every frame covers the whole screen; only the stacking order matters.

use std::collections::HashMap;

use super::LayoutStrategy;
use crate::types::{FrameId, Rect};

#[derive(Debug)]
pub struct Fullscreen {
    width: u32,
    height: u32,
    order: Vec<Vec<FrameId>>,
}

impl Fullscreen {
    pub fn new(max_workspaces: usize, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            order: vec![Vec::new(); max_workspaces],
        }
    }
}

impl LayoutStrategy for Fullscreen {
    fn append_frame(&mut self, workspace: usize, fid: FrameId, _preferred: (u32, u32)) {
        match self.order.get_mut(workspace) {
            Some(order) if !order.contains(&fid) => order.push(fid),
            Some(_) => log::warn!("Fullscreen layout: frame 0x{:x} already registered", fid),
            None => log::warn!("Fullscreen layout: workspace {} out of range", workspace),
        }
    }

    fn remove_frame(&mut self, workspace: usize, fid: FrameId) {
        let Some(order) = self.order.get_mut(workspace) else {
            return;
        };
        let before = order.len();
        order.retain(|&f| f != fid);
        if order.len() == before {
            log::warn!("Fullscreen layout: frame 0x{:x} not registered on workspace {}", fid, workspace);
        }
    }

    fn change_workspace(&mut self, from: usize, to: usize, fid: FrameId) {
        let registered = self.order.get(from).is_some_and(|o| o.contains(&fid));
        if !registered || to >= self.order.len() {
            log::warn!("Fullscreen layout: cannot move frame 0x{:x} from {} to {}", fid, from, to);
            return;
        }
        self.order[from].retain(|&f| f != fid);
        self.order[to].push(fid);
    }

    fn position(&self, workspace: usize, fid: FrameId) -> usize {
        self.order
            .get(workspace)
            .and_then(|o| o.iter().position(|&f| f == fid))
            .unwrap_or(0)
    }

    fn nth_frame(&self, workspace: usize, n: usize) -> Option<FrameId> {
        self.order.get(workspace)?.get(n).copied()
    }

    fn dimensions(&self, workspace: usize) -> HashMap<FrameId, Rect> {
        let full = Rect::new(0, 0, self.width, self.height);
        self.order
            .get(workspace)
            .map(|o| o.iter().map(|&fid| (fid, full)).collect())
            .unwrap_or_default()
    }

    fn frames(&self, workspace: usize) -> Vec<FrameId> {
        self.order.get(workspace).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_cover_screen() {
        let mut layout = Fullscreen::new(2, 1280, 720);
        layout.append_frame(1, 4, (300, 200));
        layout.append_frame(1, 5, (0, 0));
        let dims = layout.dimensions(1);
        assert_eq!(dims.len(), 2);
        assert!(dims.values().all(|&r| r == Rect::new(0, 0, 1280, 720)));
        assert_eq!(layout.nth_frame(1, 1), Some(5));
        assert_eq!(layout.position(1, 5), 1);
    }

    #[test]
    fn test_unknown_frame_ignored() {
        let mut layout = Fullscreen::new(2, 1280, 720);
        layout.append_frame(0, 4, (0, 0));
        layout.remove_frame(0, 99);
        layout.change_workspace(1, 0, 4);
        assert_eq!(layout.frames(0), vec![4]);
        assert!(layout.frames(1).is_empty());
    }
}
