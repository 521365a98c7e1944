//! Master/stack tiling.
//!
//! The first frame in order fills the left half of the screen, the rest
//! stack vertically in the right half. The split between the halves can be
//! shifted, and each stacked frame keeps its own height.

use std::collections::HashMap;

use super::LayoutStrategy;
use crate::types::{Corner, FrameId, Rect};

const GAP: f64 = 25.0;
const MIN_WIDTH: f64 = 100.0;
const MIN_HEIGHT: f64 = 100.0;

#[derive(Debug, Default, Clone)]
struct Column {
    order: Vec<FrameId>,
    /// Horizontal shift of the split, positive grows the primary frame
    split_offset: f64,
    /// One height per secondary slot (order[1..])
    heights: Vec<f64>,
}

#[derive(Debug)]
pub struct Tiled {
    width: f64,
    height: f64,
    workspaces: Vec<Column>,
}

impl Tiled {
    pub fn new(max_workspaces: usize, width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            workspaces: vec![Column::default(); max_workspaces],
        }
    }

    /// Total height available to `n` stacked frames
    fn column_target(&self, n: usize) -> f64 {
        self.height - (n as f64 + 1.0) * GAP
    }

    fn max_offset(&self) -> f64 {
        (self.width / 2.0 - 1.5 * GAP - MIN_WIDTH).max(0.0)
    }

    fn column_mut(&mut self, workspace: usize) -> Option<&mut Column> {
        let column = self.workspaces.get_mut(workspace);
        if column.is_none() {
            log::warn!("Tiled layout: workspace {} out of range", workspace);
        }
        column
    }

    /// Scale the stacked heights so they fill the column again
    fn rescale(&mut self, workspace: usize, target_sum: f64) {
        let column = &mut self.workspaces[workspace];
        let sum: f64 = column.heights.iter().sum();
        if sum > 0.0 {
            let ratio = target_sum / sum;
            column.heights.iter_mut().for_each(|h| *h *= ratio);
        }
        let n = column.heights.len();
        enforce_minimum(&mut column.heights, 0, n, MIN_HEIGHT);
    }

    /// Stacked heights of a workspace, for inspection
    pub fn heights(&self, workspace: usize) -> &[f64] {
        self.workspaces
            .get(workspace)
            .map(|c| c.heights.as_slice())
            .unwrap_or(&[])
    }

    pub fn split_offset(&self, workspace: usize) -> f64 {
        self.workspaces.get(workspace).map(|c| c.split_offset).unwrap_or(0.0)
    }
}

/// Pin every height in `heights[from..to]` that is below `min` and spread
/// the deficit evenly over the ones not pinned yet.
///
/// Stops once nothing is below the minimum or every slot is pinned.
pub(crate) fn enforce_minimum(heights: &mut [f64], from: usize, to: usize, min: f64) {
    let to = to.min(heights.len());
    let mut pinned = vec![false; heights.len()];
    loop {
        let mut deficit = 0.0;
        for i in from..to {
            if heights[i] < min {
                deficit += min - heights[i];
                heights[i] = min;
                pinned[i] = true;
            }
        }
        if deficit <= 0.0 {
            break;
        }
        let free: Vec<usize> = (from..to).filter(|&i| !pinned[i]).collect();
        if free.is_empty() {
            break;
        }
        let share = deficit / free.len() as f64;
        for i in free {
            heights[i] -= share;
        }
    }
}

impl LayoutStrategy for Tiled {
    fn append_frame(&mut self, workspace: usize, fid: FrameId, _preferred: (u32, u32)) {
        let Some(column) = self.column_mut(workspace) else {
            return;
        };
        if column.order.contains(&fid) {
            log::warn!("Tiled layout: frame 0x{:x} already registered", fid);
            return;
        }
        column.order.push(fid);
        if column.order.len() == 1 {
            return;
        }

        let n = column.order.len() - 1;
        let target = self.column_target(n);
        let share = target / n as f64;
        if share < MIN_HEIGHT {
            log::warn!("Tiled layout: column full on workspace {}", workspace);
        }
        // Existing heights give up room for the newcomer in proportion
        self.rescale(workspace, target - share);
        let column = &mut self.workspaces[workspace];
        column.heights.push(share);
        enforce_minimum(&mut column.heights, 0, n, MIN_HEIGHT);
    }

    fn remove_frame(&mut self, workspace: usize, fid: FrameId) {
        let Some(column) = self.column_mut(workspace) else {
            return;
        };
        let Some(index) = column.order.iter().position(|&f| f == fid) else {
            log::warn!("Tiled layout: frame 0x{:x} not registered on workspace {}", fid, workspace);
            return;
        };
        column.order.remove(index);
        if !column.heights.is_empty() {
            // The first stacked frame takes over the primary slot
            column.heights.remove(index.saturating_sub(1));
        }
        let n = column.heights.len();
        if n > 0 {
            let target = self.column_target(n);
            self.rescale(workspace, target);
        }
    }

    fn change_workspace(&mut self, from: usize, to: usize, fid: FrameId) {
        let registered = self
            .workspaces
            .get(from)
            .is_some_and(|c| c.order.contains(&fid));
        if !registered || to >= self.workspaces.len() {
            log::warn!("Tiled layout: cannot move frame 0x{:x} from {} to {}", fid, from, to);
            return;
        }
        self.remove_frame(from, fid);
        self.append_frame(to, fid, (0, 0));
    }

    fn resize_frame(&mut self, workspace: usize, fid: FrameId, dx: i32, dy: i32, corner: Corner) {
        let max_offset = self.max_offset();
        let Some(column) = self.column_mut(workspace) else {
            return;
        };
        if column.order.len() < 2 {
            return;
        }
        let Some(index) = column.order.iter().position(|&f| f == fid) else {
            return;
        };
        let dy = dy as f64;
        let n = column.heights.len();

        if index > 0 {
            let slot = index - 1;
            if corner.is_north() && slot > 0 {
                column.heights[slot] -= dy;
                let share = dy / slot as f64;
                for h in &mut column.heights[..slot] {
                    *h += share;
                }
                enforce_minimum(&mut column.heights, 0, slot + 1, MIN_HEIGHT);
            } else if !corner.is_north() && slot + 1 < n {
                column.heights[slot] += dy;
                let share = dy / (n - slot - 1) as f64;
                for h in &mut column.heights[slot + 1..] {
                    *h -= share;
                }
                enforce_minimum(&mut column.heights, slot, n, MIN_HEIGHT);
            }
        }

        column.split_offset = (column.split_offset + dx as f64).clamp(-max_offset, max_offset);
    }

    fn switch_frames(&mut self, workspace: usize, a: FrameId, b: FrameId) {
        let Some(column) = self.column_mut(workspace) else {
            return;
        };
        let ia = column.order.iter().position(|&f| f == a);
        let ib = column.order.iter().position(|&f| f == b);
        if let (Some(ia), Some(ib)) = (ia, ib) {
            column.order.swap(ia, ib);
        }
    }

    fn set_position(&mut self, workspace: usize, fid: FrameId, position: usize) {
        let Some(column) = self.column_mut(workspace) else {
            return;
        };
        if let Some(index) = column.order.iter().position(|&f| f == fid) {
            column.order.remove(index);
            let position = position.min(column.order.len());
            column.order.insert(position, fid);
        }
    }

    fn position(&self, workspace: usize, fid: FrameId) -> usize {
        self.workspaces
            .get(workspace)
            .and_then(|c| c.order.iter().position(|&f| f == fid))
            .unwrap_or(0)
    }

    fn nth_frame(&self, workspace: usize, n: usize) -> Option<FrameId> {
        self.workspaces.get(workspace)?.order.get(n).copied()
    }

    fn dimensions(&self, workspace: usize) -> HashMap<FrameId, Rect> {
        let mut dims = HashMap::new();
        let Some(column) = self.workspaces.get(workspace) else {
            return dims;
        };
        let (w, h) = (self.width, self.height);

        match column.order.as_slice() {
            [] => {}
            [only] => {
                dims.insert(
                    *only,
                    Rect::new(GAP as i32, GAP as i32, dim(w - 2.0 * GAP), dim(h - 2.0 * GAP)),
                );
            }
            [primary, stacked @ ..] => {
                let off = column.split_offset;
                dims.insert(
                    *primary,
                    Rect::new(
                        GAP as i32,
                        GAP as i32,
                        dim(w / 2.0 - 1.5 * GAP + off),
                        dim(h - 2.0 * GAP),
                    ),
                );

                let n = stacked.len();
                let target = self.column_target(n);
                let sum: f64 = column.heights.iter().sum();
                let fits = column.heights.len() == n
                    && column.heights.iter().all(|&v| v >= 1.0)
                    && sum <= target + 0.5;
                let heights: Vec<f64> = if fits {
                    column.heights.clone()
                } else {
                    vec![target / n as f64; n]
                };

                let x = (w / 2.0 + 0.5 * GAP + off) as i32;
                let width = dim(w / 2.0 - off - 1.5 * GAP);
                let mut used: i64 = 0;
                let mut rects = Vec::with_capacity(n);
                for &slot in &heights {
                    let y = used + GAP as i64;
                    let height = (slot as i64).max(1);
                    rects.push((y, height));
                    used += GAP as i64 + height;
                }
                // Rounding remainder goes to the bottom frame
                let remainder = h as i64 - GAP as i64 - used;
                if let Some(last) = rects.last_mut() {
                    last.1 = (last.1 + remainder).max(1);
                }
                for (fid, (y, height)) in stacked.iter().zip(rects) {
                    dims.insert(*fid, Rect::new(x, y as i32, width, height as u32));
                }
            }
        }
        dims
    }

    fn frames(&self, workspace: usize) -> Vec<FrameId> {
        self.workspaces
            .get(workspace)
            .map(|c| c.order.clone())
            .unwrap_or_default()
    }
}

fn dim(value: f64) -> u32 {
    value.max(1.0) as u32
}
