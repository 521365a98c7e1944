//! Invariant validation for the layout manager.
//!
//! Checks that should always hold between events:
//! - every window is a tab of at most one frame
//! - the window → frame index mirrors the frame histories
//! - no frame exists without tabs
//! - each frame sits in exactly the workspace it records
//! - every strategy tracks the same frames per workspace as the histories
//!
//! The event loop runs [`LayoutManager::validate`] after each event in debug
//! builds and logs whatever it finds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutManager;
use crate::types::{FrameId, WindowId};

/// State violations that can be detected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StateViolation {
    pub kind: ViolationKind,
    pub description: String,
}

/// Types of state violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Window listed in more than one frame
    WindowInMultipleFrames,
    /// Reverse index disagrees with the frame histories
    ReverseIndexStale,
    /// Frame with no tabs left
    EmptyFrame,
    /// Frame missing from its workspace history, or listed elsewhere
    FrameWorkspaceMismatch,
    /// A layout strategy tracks a different frame set
    StrategyOutOfSync,
}

impl StateViolation {
    fn new(kind: ViolationKind, description: String) -> Self {
        Self { kind, description }
    }
}

impl LayoutManager {
    /// Collect every broken invariant
    pub fn validate(&self) -> Vec<StateViolation> {
        let mut violations = Vec::new();

        let mut seen: HashMap<WindowId, FrameId> = HashMap::new();
        for (&fid, frame) in &self.frames {
            if frame.history.is_empty() {
                violations.push(StateViolation::new(
                    ViolationKind::EmptyFrame,
                    format!("frame 0x{:x} has no tabs", fid),
                ));
            }
            for &wid in &frame.history {
                if let Some(other) = seen.insert(wid, fid) {
                    violations.push(StateViolation::new(
                        ViolationKind::WindowInMultipleFrames,
                        format!("window 0x{:x} in frames 0x{:x} and 0x{:x}", wid, other, fid),
                    ));
                }
                if self.owners.get(&wid) != Some(&fid) {
                    violations.push(StateViolation::new(
                        ViolationKind::ReverseIndexStale,
                        format!("window 0x{:x} of frame 0x{:x} indexed as {:?}", wid, fid, self.owners.get(&wid)),
                    ));
                }
            }

            let holders: Vec<usize> = self
                .workspaces
                .iter()
                .filter(|(_, ws)| ws.contains(fid))
                .map(|(i, _)| i)
                .collect();
            if holders != [frame.workspace] {
                violations.push(StateViolation::new(
                    ViolationKind::FrameWorkspaceMismatch,
                    format!(
                        "frame 0x{:x} records workspace {} but is listed in {:?}",
                        fid, frame.workspace, holders
                    ),
                ));
            }
        }

        for (&wid, &fid) in &self.owners {
            if seen.get(&wid) != Some(&fid) {
                violations.push(StateViolation::new(
                    ViolationKind::ReverseIndexStale,
                    format!("index maps window 0x{:x} to frame 0x{:x} which does not list it", wid, fid),
                ));
            }
        }

        for (index, ws) in self.workspaces.iter() {
            for &fid in &ws.history {
                if !self.frames.contains_key(&fid) {
                    violations.push(StateViolation::new(
                        ViolationKind::FrameWorkspaceMismatch,
                        format!("workspace {} lists unknown frame 0x{:x}", index, fid),
                    ));
                }
            }
            for kind in self.strategies.out_of_sync(index, &ws.history) {
                violations.push(StateViolation::new(
                    ViolationKind::StrategyOutOfSync,
                    format!("{} layout disagrees with workspace {} history", kind, index),
                ));
            }
        }

        violations
    }
}
