//! Frame registry and geometry driver.
//!
//! The layout manager owns every [`Frame`]; the rest of the manager holds
//! frame and window ids only. Each frame lives on exactly one workspace and
//! every layout strategy tracks it there. Mutations recompute geometry and
//! push it to the display before returning.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::display::{DisplayServer, WindowChanges};
use crate::error::SkipStale;
use crate::layouts::{LayoutKind, Strategies};
use crate::types::{Corner, FrameId, Rect, WindowId};
use crate::workspaces::WorkspaceManager;

/// A tabbed container of client windows
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    /// Tabs, most recently shown last
    pub history: Vec<WindowId>,
    /// Whether the tab bar band is visible
    pub decorations: bool,
    pub workspace: usize,
}

impl Frame {
    fn new(id: FrameId, workspace: usize) -> Self {
        Self {
            id,
            history: Vec::new(),
            decorations: true,
            workspace,
        }
    }

    /// The window currently shown in the frame
    pub fn active(&self) -> Option<WindowId> {
        self.history.last().copied()
    }

    pub fn contains(&self, wid: WindowId) -> bool {
        self.history.contains(&wid)
    }
}

/// Static parameters of the layout manager
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub screen: (u32, u32),
    pub max_workspaces: usize,
    pub default_layout: LayoutKind,
    /// Height of the tab bar band at the top of decorated frames
    pub chrome_height: u32,
    /// Client corner rounding radius
    pub corner_radius: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            screen: (1920, 1080),
            max_workspaces: 3,
            default_layout: LayoutKind::Tiled,
            chrome_height: 34,
            corner_radius: 10,
        }
    }
}

pub struct LayoutManager {
    pub(crate) frames: HashMap<FrameId, Frame>,
    /// Reverse index, kept in step with every frame history
    pub(crate) owners: HashMap<WindowId, FrameId>,
    pub(crate) workspaces: WorkspaceManager,
    pub(crate) strategies: Strategies,
    /// Frame cycling position within the active strategy's order
    cursor: usize,
    chrome_height: u32,
    corner_radius: u32,
}

impl LayoutManager {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            frames: HashMap::new(),
            owners: HashMap::new(),
            workspaces: WorkspaceManager::new(options.max_workspaces, options.default_layout),
            strategies: Strategies::new(options.max_workspaces.max(1), options.screen, options.chrome_height),
            cursor: 0,
            chrome_height: options.chrome_height,
            corner_radius: options.corner_radius,
        }
    }

    pub fn chrome_height(&self) -> u32 {
        self.chrome_height
    }

    pub fn frame(&self, fid: FrameId) -> Option<&Frame> {
        self.frames.get(&fid)
    }

    /// Frame on the current workspace
    pub fn visible_frame(&self, fid: FrameId) -> Option<&Frame> {
        self.frames
            .get(&fid)
            .filter(|f| f.workspace == self.workspaces.current_index())
    }

    pub fn frame_exists(&self, fid: FrameId) -> bool {
        self.frames.contains_key(&fid)
    }

    /// Frame owning a window, on any workspace
    pub fn frame_of(&self, wid: WindowId) -> Option<FrameId> {
        self.owners.get(&wid).copied()
    }

    pub fn is_managed(&self, wid: WindowId) -> bool {
        self.owners.contains_key(&wid)
    }

    /// Frames of the current workspace, focused frame last
    pub fn history(&self) -> &[FrameId] {
        &self.workspaces.current().history
    }

    /// The focused frame of the current workspace
    pub fn top_frame(&self) -> Option<FrameId> {
        self.workspaces.current().top()
    }

    pub fn frame_count(&self) -> usize {
        self.history().len()
    }

    pub fn current_workspace(&self) -> usize {
        self.workspaces.current_index()
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.workspaces.current().layout
    }

    fn active_kind(&self, workspace: usize) -> LayoutKind {
        self.workspaces
            .get(workspace)
            .map(|ws| ws.layout)
            .unwrap_or_default()
    }

    /// Register a new frame on the current workspace
    pub fn append_frame(&mut self, fid: FrameId, preferred: (u32, u32)) {
        if self.frames.contains_key(&fid) {
            log::warn!("Frame 0x{:x} is already registered", fid);
            return;
        }
        let workspace = self.workspaces.current_index();
        self.frames.insert(fid, Frame::new(fid, workspace));
        self.workspaces.current_mut().history.push(fid);
        self.strategies
            .for_each(|s| s.append_frame(workspace, fid, preferred));
        log::debug!("Registered frame 0x{:x} on workspace {}", fid, workspace);
    }

    /// Drop a frame from its workspace, every strategy and the registry
    pub fn remove_frame(&mut self, display: &impl DisplayServer, fid: FrameId) -> Result<()> {
        let Some(frame) = self.frames.remove(&fid) else {
            log::debug!("remove_frame: unknown frame 0x{:x}", fid);
            return Ok(());
        };
        for wid in &frame.history {
            self.owners.remove(wid);
        }
        if let Some(ws) = self.workspaces.get_mut(frame.workspace) {
            ws.history.retain(|&f| f != fid);
        }
        self.strategies
            .for_each(|s| s.remove_frame(frame.workspace, fid));
        self.cursor = self.cursor.min(self.frame_count().saturating_sub(1));
        log::debug!("Removed frame 0x{:x}", fid);
        self.update_layout(display)
    }

    /// Attach a window as the newest tab of a frame
    pub fn append_client(&mut self, display: &impl DisplayServer, fid: FrameId, wid: WindowId) -> Result<()> {
        if !self.frames.contains_key(&fid) {
            bail!("cannot attach window 0x{:x}: frame 0x{:x} does not exist", wid, fid);
        }
        if let Some(owner) = self.frame_of(wid) {
            if owner == fid {
                return Ok(());
            }
            log::warn!("Window 0x{:x} still attached to frame 0x{:x}, detaching", wid, owner);
            self.remove_client(display, owner, wid)?;
        }
        if let Some(frame) = self.frames.get_mut(&fid) {
            frame.history.push(wid);
        }
        self.owners.insert(wid, fid);
        self.update_layout(display)
    }

    /// Detach a window; returns true when the frame was emptied and destroyed
    pub fn remove_client(&mut self, display: &impl DisplayServer, fid: FrameId, wid: WindowId) -> Result<bool> {
        let Some(frame) = self.frames.get_mut(&fid) else {
            return Ok(false);
        };
        if !frame.contains(wid) {
            log::warn!("Window 0x{:x} is not a tab of frame 0x{:x}", wid, fid);
            return Ok(false);
        }
        frame.history.retain(|&w| w != wid);
        let emptied = frame.history.is_empty();
        self.owners.remove(&wid);

        if emptied {
            self.remove_frame(display, fid)?;
        } else {
            self.update_layout(display)?;
        }
        Ok(emptied)
    }

    /// Make a tab the most recent entry of its frame
    pub fn promote_client(&mut self, fid: FrameId, wid: WindowId) {
        if let Some(frame) = self.frames.get_mut(&fid) {
            if let Some(index) = frame.history.iter().position(|&w| w == wid) {
                let wid = frame.history.remove(index);
                frame.history.push(wid);
            }
        }
    }

    pub fn set_decorations(&mut self, fid: FrameId, decorations: bool) {
        if let Some(frame) = self.frames.get_mut(&fid) {
            frame.decorations = decorations;
        }
    }

    /// Move a frame to the top of the current workspace's history
    pub fn set_focused_frame(&mut self, fid: FrameId) {
        let history = &mut self.workspaces.current_mut().history;
        let Some(index) = history.iter().position(|&f| f == fid) else {
            return;
        };
        history.remove(index);
        history.push(fid);
        self.cursor = self.position(fid);
    }

    /// Advance the cycling cursor and return the frame it lands on
    pub fn next_frame(&mut self) -> Option<FrameId> {
        let n = self.frame_count();
        if n == 0 {
            return None;
        }
        self.cursor = if self.cursor + 1 >= n { 0 } else { self.cursor + 1 };
        self.frame_at_cursor()
    }

    pub fn prev_frame(&mut self) -> Option<FrameId> {
        let n = self.frame_count();
        if n == 0 {
            return None;
        }
        self.cursor = if self.cursor == 0 { n - 1 } else { self.cursor - 1 };
        self.frame_at_cursor()
    }

    fn frame_at_cursor(&self) -> Option<FrameId> {
        let workspace = self.current_workspace();
        self.strategies
            .get(self.layout_kind())
            .nth_frame(workspace, self.cursor)
            .filter(|fid| self.frames.contains_key(fid))
    }

    /// Index of a frame in the active strategy's order
    pub fn position(&self, fid: FrameId) -> usize {
        self.strategies
            .get(self.layout_kind())
            .position(self.current_workspace(), fid)
    }

    pub fn set_position(&mut self, display: &impl DisplayServer, fid: FrameId, position: usize) -> Result<()> {
        let (workspace, kind) = (self.current_workspace(), self.layout_kind());
        self.strategies
            .get_mut(kind)
            .set_position(workspace, fid, position);
        self.update_layout(display)
    }

    pub fn move_frame(&mut self, display: &impl DisplayServer, fid: FrameId, dx: i32, dy: i32) -> Result<()> {
        let (workspace, kind) = (self.current_workspace(), self.layout_kind());
        self.strategies.get_mut(kind).move_frame(workspace, fid, dx, dy);
        self.update_layout(display)
    }

    pub fn resize_frame(
        &mut self,
        display: &impl DisplayServer,
        fid: FrameId,
        dx: i32,
        dy: i32,
        corner: Corner,
    ) -> Result<()> {
        let (workspace, kind) = (self.current_workspace(), self.layout_kind());
        self.strategies
            .get_mut(kind)
            .resize_frame(workspace, fid, dx, dy, corner);
        self.update_layout(display)
    }

    pub fn switch_frames(&mut self, display: &impl DisplayServer, a: FrameId, b: FrameId) -> Result<()> {
        let (workspace, kind) = (self.current_workspace(), self.layout_kind());
        self.strategies.get_mut(kind).switch_frames(workspace, a, b);
        self.update_layout(display)
    }

    pub fn set_size(&mut self, display: &impl DisplayServer, fid: FrameId, width: u32, height: u32) -> Result<()> {
        let (workspace, kind) = (self.current_workspace(), self.layout_kind());
        self.strategies
            .get_mut(kind)
            .set_size(workspace, fid, width, height);
        self.update_layout(display)
    }

    /// Change the current workspace's layout strategy
    pub fn set_layout(&mut self, display: &impl DisplayServer, kind: LayoutKind) -> Result<()> {
        log::info!("Workspace {} layout: {}", self.current_workspace(), kind);
        self.workspaces.current_mut().layout = kind;
        self.cursor = self.top_frame().map(|fid| self.position(fid)).unwrap_or(0);
        self.update_layout(display)
    }

    /// Switch workspaces; returns false when the target is out of bounds or current
    pub fn set_workspace(&mut self, display: &impl DisplayServer, target: usize) -> Result<bool> {
        if !self.workspaces.is_switch_target(target) {
            log::debug!("Ignoring switch to workspace {}", target);
            return Ok(false);
        }
        for &fid in self.history() {
            display.unmap_window(fid).skip_stale()?;
        }
        let old = self.workspaces.switch_to(target);
        log::info!("Switched workspace {:?} -> {}", old, target);

        for &fid in self.history() {
            display.map_window(fid).skip_stale()?;
        }
        if let Some(wid) = self
            .top_frame()
            .and_then(|fid| self.frames.get(&fid))
            .and_then(Frame::active)
        {
            display.set_input_focus(wid).skip_stale()?;
        }
        self.cursor = self.top_frame().map(|fid| self.position(fid)).unwrap_or(0);
        self.update_layout(display)?;
        Ok(true)
    }

    /// Switch to the workspace `delta` steps away, wrapping around
    pub fn step_workspace(&mut self, display: &impl DisplayServer, delta: i32) -> Result<bool> {
        let target = self.workspaces.step(delta);
        self.set_workspace(display, target)
    }

    /// Move a frame of the current workspace to another workspace
    pub fn move_to_workspace(&mut self, display: &impl DisplayServer, fid: FrameId, target: usize) -> Result<bool> {
        if !self.workspaces.is_switch_target(target) {
            log::debug!("Ignoring move of frame 0x{:x} to workspace {}", fid, target);
            return Ok(false);
        }
        let from = self.current_workspace();
        if !self.workspaces.current().contains(fid) {
            log::warn!("Frame 0x{:x} is not on the current workspace", fid);
            return Ok(false);
        }

        self.workspaces.current_mut().history.retain(|&f| f != fid);
        if let Some(ws) = self.workspaces.get_mut(target) {
            ws.history.push(fid);
        }
        if let Some(frame) = self.frames.get_mut(&fid) {
            frame.workspace = target;
        }
        self.strategies
            .for_each(|s| s.change_workspace(from, target, fid));
        log::info!("Moved frame 0x{:x} to workspace {}", fid, target);

        display.unmap_window(fid).skip_stale()?;
        self.cursor = self.cursor.min(self.frame_count().saturating_sub(1));
        self.update_layout(display)?;
        Ok(true)
    }

    /// Frame rectangle under its workspace's active strategy
    pub fn frame_geometry(&self, fid: FrameId) -> Option<Rect> {
        let frame = self.frames.get(&fid)?;
        let kind = self.active_kind(frame.workspace);
        self.strategies
            .get(kind)
            .dimensions(frame.workspace)
            .get(&fid)
            .copied()
    }

    /// Area left for client content once the tab bar band is taken out
    pub fn content_geometry(&self, fid: FrameId) -> Option<Rect> {
        let rect = self.frame_geometry(fid)?;
        let decorated = self.frames.get(&fid).is_some_and(|f| f.decorations);
        Some(self.content_rect(rect, decorated))
    }

    fn content_rect(&self, rect: Rect, decorated: bool) -> Rect {
        if decorated {
            Rect::new(
                rect.x,
                rect.y + self.chrome_height as i32,
                rect.width,
                rect.height.saturating_sub(self.chrome_height).max(1),
            )
        } else {
            rect
        }
    }

    /// Rounding radii (top, bottom) for clients of a frame
    pub fn corner_radii(&self, fid: FrameId) -> (u32, u32) {
        let decorated = self.frames.get(&fid).map_or(true, |f| f.decorations);
        if decorated {
            (0, self.corner_radius)
        } else {
            (self.corner_radius, self.corner_radius)
        }
    }

    /// Push frame and client geometry of the current workspace
    pub fn update_layout(&self, display: &impl DisplayServer) -> Result<()> {
        let workspace = self.current_workspace();
        let dims = self
            .strategies
            .get(self.layout_kind())
            .dimensions(workspace);

        for &fid in self.history() {
            let (Some(frame), Some(&rect)) = (self.frames.get(&fid), dims.get(&fid)) else {
                log::warn!("No geometry for frame 0x{:x}", fid);
                continue;
            };
            display
                .configure(fid, &WindowChanges::geometry(rect))
                .skip_stale()?;

            let content = self.content_rect(rect, frame.decorations);
            let local = Rect::new(0, content.y - rect.y, content.width, content.height);
            let (top, bottom) = self.corner_radii(fid);
            for &wid in &frame.history {
                if display
                    .configure(wid, &WindowChanges::geometry(local))
                    .skip_stale()?
                    .is_none()
                {
                    continue;
                }
                display.apply_rounded_mask(wid, top, bottom).skip_stale()?;
            }
        }
        Ok(())
    }
}
