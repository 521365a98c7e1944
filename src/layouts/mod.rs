//! Per-workspace geometry algorithms.
//!
//! There is one instance of each strategy, shared by every workspace and
//! holding per-workspace sub-state. All of them see every frame append and
//! removal so switching the active strategy of a workspace never loses
//! frames; only the active one is asked for geometry.

mod floating;
mod fullscreen;
mod tiled;

pub use floating::Floating;
pub use fullscreen::Fullscreen;
pub use tiled::Tiled;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{Corner, FrameId, Rect};

/// Geometry algorithm contract, parameterized by workspace index.
///
/// Operations a strategy does not support keep the default no-op.
pub trait LayoutStrategy {
    /// Register a frame; `preferred` is the client's advisory size (0 = none)
    fn append_frame(&mut self, workspace: usize, fid: FrameId, preferred: (u32, u32));

    fn remove_frame(&mut self, workspace: usize, fid: FrameId);

    /// Carry a frame's state from one workspace to another
    fn change_workspace(&mut self, from: usize, to: usize, fid: FrameId);

    fn move_frame(&mut self, _workspace: usize, _fid: FrameId, _dx: i32, _dy: i32) {}

    /// Resize by a pointer delta applied at `corner`
    fn resize_frame(&mut self, _workspace: usize, _fid: FrameId, _dx: i32, _dy: i32, _corner: Corner) {}

    fn set_size(&mut self, _workspace: usize, _fid: FrameId, _width: u32, _height: u32) {}

    fn switch_frames(&mut self, _workspace: usize, _a: FrameId, _b: FrameId) {}

    fn set_position(&mut self, _workspace: usize, _fid: FrameId, _position: usize) {}

    /// Index of the frame in cycling order
    fn position(&self, _workspace: usize, _fid: FrameId) -> usize {
        0
    }

    fn nth_frame(&self, _workspace: usize, _n: usize) -> Option<FrameId> {
        None
    }

    /// Frame rectangles, recomputed from scratch
    fn dimensions(&self, workspace: usize) -> HashMap<FrameId, Rect>;

    /// Registered frames of a workspace
    fn frames(&self, workspace: usize) -> Vec<FrameId>;
}

/// Which strategy a workspace uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutKind {
    #[default]
    Tiled,
    Fullscreen,
    Floating,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 3] = [LayoutKind::Tiled, LayoutKind::Fullscreen, LayoutKind::Floating];
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutKind::Tiled => "tiled",
            LayoutKind::Fullscreen => "fullscreen",
            LayoutKind::Floating => "floating",
        };
        f.write_str(name)
    }
}

impl FromStr for LayoutKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiled" | "tiling" => Ok(LayoutKind::Tiled),
            "fullscreen" | "monocle" => Ok(LayoutKind::Fullscreen),
            "floating" | "float" => Ok(LayoutKind::Floating),
            other => Err(format!("unknown layout '{}'", other)),
        }
    }
}

/// The three strategy instances
pub struct Strategies {
    tiled: Tiled,
    fullscreen: Fullscreen,
    floating: Floating,
}

impl Strategies {
    pub fn new(max_workspaces: usize, screen: (u32, u32), chrome_height: u32) -> Self {
        let (width, height) = screen;
        Self {
            tiled: Tiled::new(max_workspaces, width, height),
            fullscreen: Fullscreen::new(max_workspaces, width, height),
            floating: Floating::new(max_workspaces, width, height, chrome_height),
        }
    }

    pub fn get(&self, kind: LayoutKind) -> &dyn LayoutStrategy {
        match kind {
            LayoutKind::Tiled => &self.tiled,
            LayoutKind::Fullscreen => &self.fullscreen,
            LayoutKind::Floating => &self.floating,
        }
    }

    pub fn get_mut(&mut self, kind: LayoutKind) -> &mut dyn LayoutStrategy {
        match kind {
            LayoutKind::Tiled => &mut self.tiled,
            LayoutKind::Fullscreen => &mut self.fullscreen,
            LayoutKind::Floating => &mut self.floating,
        }
    }

    /// Run `f` against every strategy
    pub fn for_each(&mut self, mut f: impl FnMut(&mut dyn LayoutStrategy)) {
        f(&mut self.tiled);
        f(&mut self.fullscreen);
        f(&mut self.floating);
    }

    /// Kinds whose frame set for `workspace` differs from `expected`
    pub fn out_of_sync(&self, workspace: usize, expected: &[FrameId]) -> Vec<LayoutKind> {
        let mut expected: Vec<FrameId> = expected.to_vec();
        expected.sort_unstable();
        LayoutKind::ALL
            .into_iter()
            .filter(|&kind| {
                let mut frames = self.get(kind).frames(workspace);
                frames.sort_unstable();
                frames != expected
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_kind_parse() {
        assert_eq!("tiled".parse::<LayoutKind>(), Ok(LayoutKind::Tiled));
        assert_eq!("Floating".parse::<LayoutKind>(), Ok(LayoutKind::Floating));
        assert_eq!("monocle".parse::<LayoutKind>(), Ok(LayoutKind::Fullscreen));
        assert!("spiral".parse::<LayoutKind>().is_err());
        assert_eq!(LayoutKind::Fullscreen.to_string(), "fullscreen");
    }

    #[test]
    fn test_strategies_stay_in_sync() {
        let mut strategies = Strategies::new(3, (1920, 1080), 34);
        strategies.for_each(|s| s.append_frame(0, 10, (0, 0)));
        strategies.for_each(|s| s.append_frame(0, 11, (0, 0)));
        assert!(strategies.out_of_sync(0, &[11, 10]).is_empty());

        strategies.get_mut(LayoutKind::Tiled).remove_frame(0, 10);
        assert_eq!(strategies.out_of_sync(0, &[10, 11]), vec![LayoutKind::Tiled]);
    }

    #[test]
    fn test_every_strategy_covers_registered_frames() {
        let mut strategies = Strategies::new(3, (1600, 1000), 34);
        for fid in 1..=5 {
            strategies.for_each(|s| s.append_frame(1, fid, (640, 480)));
        }
        strategies.for_each(|s| s.remove_frame(1, 3));
        for kind in LayoutKind::ALL {
            let dims = strategies.get(kind).dimensions(1);
            let mut keys: Vec<_> = dims.keys().copied().collect();
            keys.sort_unstable();
            assert_eq!(keys, vec![1, 2, 4, 5], "{kind}");
            assert!(dims.values().all(|r| r.width > 0 && r.height > 0), "{kind}");
        }
    }
}
