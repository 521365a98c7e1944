//! Workspace (virtual desktop) bookkeeping.
//!
//! Each workspace keeps its frame history (most recently focused last) and
//! the layout strategy it uses. Frames themselves live in the layout
//! manager's registry.

use crate::layouts::LayoutKind;
use crate::types::FrameId;

/// A workspace (virtual desktop)
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Frames on this workspace, focused frame last
    pub history: Vec<FrameId>,
    /// Active layout strategy
    pub layout: LayoutKind,
}

impl Workspace {
    /// The focused frame, if any
    pub fn top(&self) -> Option<FrameId> {
        self.history.last().copied()
    }

    pub fn contains(&self, fid: FrameId) -> bool {
        self.history.contains(&fid)
    }
}

/// Manages the fixed set of workspaces
#[derive(Debug)]
pub struct WorkspaceManager {
    workspaces: Vec<Workspace>,
    /// Index of the current workspace
    current: usize,
}

impl WorkspaceManager {
    pub fn new(count: usize, layout: LayoutKind) -> Self {
        let count = count.max(1);
        Self {
            workspaces: vec![
                Workspace {
                    history: Vec::new(),
                    layout,
                };
                count
            ],
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Workspace> {
        self.workspaces.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workspace> {
        self.workspaces.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Workspace)> {
        self.workspaces.iter().enumerate()
    }

    /// Get a reference to the current workspace
    pub fn current(&self) -> &Workspace {
        &self.workspaces[self.current]
    }

    /// Get a mutable reference to the current workspace
    pub fn current_mut(&mut self) -> &mut Workspace {
        &mut self.workspaces[self.current]
    }

    /// Get the index of the current workspace (0-based)
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Whether `target` is a valid workspace other than the current one
    pub fn is_switch_target(&self, target: usize) -> bool {
        target < self.workspaces.len() && target != self.current
    }

    /// Switch to a specific workspace (0-indexed)
    /// Returns the old workspace index if switch was successful
    pub fn switch_to(&mut self, target: usize) -> Option<usize> {
        if !self.is_switch_target(target) {
            return None;
        }
        let old = self.current;
        self.current = target;
        Some(old)
    }

    /// Index of the next workspace, wrapping around
    pub fn next_index(&self) -> usize {
        (self.current + 1) % self.workspaces.len()
    }

    /// Index of the previous workspace, wrapping around
    pub fn prev_index(&self) -> usize {
        if self.current == 0 {
            self.workspaces.len() - 1
        } else {
            self.current - 1
        }
    }

    /// Neighbor of the current workspace `delta` steps away, wrapping
    pub fn step(&self, delta: i32) -> usize {
        let len = self.workspaces.len() as i64;
        (self.current as i64 + delta as i64).rem_euclid(len) as usize
    }

    /// Workspace whose history contains the frame
    pub fn find(&self, fid: FrameId) -> Option<usize> {
        self.workspaces.iter().position(|ws| ws.contains(fid))
    }

    /// Total number of frames across all workspaces
    pub fn frame_count(&self) -> usize {
        self.workspaces.iter().map(|ws| ws.history.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_to_ignores_current_and_out_of_bounds() {
        let mut wm = WorkspaceManager::new(3, LayoutKind::Tiled);
        assert_eq!(wm.switch_to(0), None);
        assert_eq!(wm.switch_to(3), None);
        assert_eq!(wm.switch_to(2), Some(0));
        assert_eq!(wm.current_index(), 2);
    }

    #[test]
    fn test_neighbors_wrap() {
        let mut wm = WorkspaceManager::new(3, LayoutKind::Tiled);
        assert_eq!(wm.next_index(), 1);
        assert_eq!(wm.prev_index(), 2);
        assert_eq!(wm.step(-4), 2);
        wm.switch_to(2);
        assert_eq!(wm.next_index(), 0);
        assert_eq!(wm.step(1), 0);
    }

    #[test]
    fn test_find_frame() {
        let mut wm = WorkspaceManager::new(3, LayoutKind::Floating);
        wm.get_mut(1).unwrap().history.push(0x500);
        assert_eq!(wm.find(0x500), Some(1));
        assert_eq!(wm.find(0x501), None);
        assert_eq!(wm.frame_count(), 1);
        assert_eq!(wm.current().layout, LayoutKind::Floating);
    }
}
