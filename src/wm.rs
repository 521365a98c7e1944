//! The window manager: event-driven coordination of the display server,
//! the decoration service and the layout manager.
//!
//! New top-level windows are not managed right away. The decoration
//! service is first asked for a frame; the window is buffered until the
//! service maps that frame, and only then reparented and laid out.

use std::collections::HashMap;

use anyhow::Result;

use crate::config::{parse_color, Config, WmAction};
use crate::decorations::{DecorationService, TabPosition};
use crate::display::{buttons, modifiers, ButtonGrab, DisplayServer, Subscription, WindowChanges};
use crate::drag::{Drag, DragKind};
use crate::error::SkipStale;
use crate::event::{ConfigureRequest, TrackedAtoms};
use crate::keys::KeyTable;
use crate::layout::LayoutManager;
use crate::spawn::Children;
use crate::types::{Corner, FrameId, WindowId};

/// Windows with this role are shown as-is and never framed
const UNMANAGED_ROLE: &str = "grid";

/// Pointer-drag appearance
#[derive(Debug, Clone, Copy)]
struct DragStyle {
    step: i32,
    border_width: u32,
    border_color: u32,
}

pub struct WindowManager<D: DisplayServer, S: DecorationService> {
    pub(crate) display: D,
    pub(crate) decorations: S,
    pub(crate) layout: LayoutManager,
    pub(crate) keys: KeyTable,
    pub(crate) atoms: TrackedAtoms,
    /// Frames requested from the service but not yet mapped, with their window
    unmapped: HashMap<FrameId, WindowId>,
    /// The next new window becomes a tab of the focused frame
    next_is_tab: bool,
    drag: Option<Drag>,
    overlay_visible: bool,
    /// Comma-joined WM_CLASS list -> tab color
    color_rules: HashMap<String, u32>,
    drag_style: DragStyle,
    /// Commands started by spawn actions
    children: Children,
    running: bool,
}

impl<D: DisplayServer, S: DecorationService> WindowManager<D, S> {
    /// Set up grabs and state; the display is expected to already own the root
    pub fn new(display: D, decorations: S, config: &Config) -> Result<Self> {
        let screen = display.screen_size();
        log::info!("Screen {}x{}", screen.0, screen.1);

        let keys = KeyTable::from_config(config, &display)?;
        let atoms = TrackedAtoms::intern(&display)?;

        display.grab_button(buttons::ANY, modifiers::ANY, ButtonGrab::Press)?;
        for button in [buttons::LEFT, buttons::RIGHT] {
            display.grab_button(button, modifiers::MOD1, ButtonGrab::ReleaseAndMotion)?;
        }

        let appearance = &config.appearance;
        let border_color = parse_color(&appearance.drag_border_color).unwrap_or_else(|| {
            log::warn!("Invalid drag border color '{}'", appearance.drag_border_color);
            0xffffff
        });

        Ok(Self {
            layout: LayoutManager::new(config.layout_options(screen)),
            display,
            decorations,
            keys,
            atoms,
            unmapped: HashMap::new(),
            next_is_tab: false,
            drag: None,
            overlay_visible: false,
            color_rules: config.color_rules(),
            drag_style: DragStyle {
                step: appearance.drag_step,
                border_width: appearance.drag_border_width,
                border_color,
            },
            children: Children::new(),
            running: true,
        })
    }

    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn decorations(&self) -> &S {
        &self.decorations
    }

    pub fn decorations_mut(&mut self) -> &mut S {
        &mut self.decorations
    }

    pub fn drag(&self) -> Option<&Drag> {
        self.drag.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn next_is_tab(&self) -> bool {
        self.next_is_tab
    }

    /// Windows waiting for their frame to be mapped
    pub fn pending_frames(&self) -> &HashMap<FrameId, WindowId> {
        &self.unmapped
    }

    /// Spawned commands not yet collected
    pub fn pending_children(&self) -> usize {
        self.children.pending()
    }

    /// Collect spawned commands that have exited
    pub fn reap_children(&mut self) -> usize {
        self.children.reap()
    }

    // --- Window lifecycle ---

    pub(crate) fn map_request(&mut self, wid: WindowId) -> Result<()> {
        if self.unmapped.contains_key(&wid) {
            return self.map_unmapped(wid);
        }
        if self.layout.frame_exists(wid) {
            self.display.map_window(wid).skip_stale()?;
            return Ok(());
        }
        if self.layout.is_managed(wid) {
            log::debug!("Window 0x{:x} is already a tab", wid);
            return Ok(());
        }

        let Some(role) = self.display.window_role(wid).skip_stale()? else {
            return Ok(());
        };
        if role.as_deref() == Some(UNMANAGED_ROLE) {
            log::debug!("Mapping unmanaged window 0x{:x}", wid);
            self.display.map_window(wid).skip_stale()?;
            return Ok(());
        }

        if self.next_is_tab && self.layout.top_frame().is_some() {
            self.next_is_tab = false;
            self.map_new_tab(wid)
        } else {
            self.append_unmapped(wid)
        }
    }

    /// Ask the service for a frame and park the window until it is mapped
    fn append_unmapped(&mut self, wid: WindowId) -> Result<()> {
        let fid = self.decorations.create_frame()?;
        self.add_tab(fid, wid)?;
        self.unmapped.insert(fid, wid);
        log::info!("Window 0x{:x} waiting for frame 0x{:x}", wid, fid);
        Ok(())
    }

    /// The service mapped a frame we asked for: manage its window
    fn map_unmapped(&mut self, fid: FrameId) -> Result<()> {
        let Some(wid) = self.unmapped.remove(&fid) else {
            return Ok(());
        };
        let Some(preferred) = self.display.get_size(wid).skip_stale()? else {
            self.decorations.destroy_frame(fid)?;
            return Ok(());
        };

        let previous = self.layout.top_frame();
        self.display.set_event_subscription(fid, Subscription::Frame)?;
        self.layout.append_frame(fid, preferred);
        let position = previous.map_or(0, |prev| self.layout.position(prev) + 1);
        self.layout.set_position(&self.display, fid, position)?;

        self.attach_client(fid, wid)?;
        self.display.map_window(wid)?;
        self.display.map_window(fid)?;
        log::info!("Managing window 0x{:x} in frame 0x{:x}", wid, fid);
        self.focus_client(wid)
    }

    fn map_new_tab(&mut self, wid: WindowId) -> Result<()> {
        let Some(fid) = self.layout.top_frame() else {
            return self.append_unmapped(wid);
        };
        self.attach_client(fid, wid)?;
        self.add_tab(fid, wid)?;
        log::info!("Window 0x{:x} added as tab of frame 0x{:x}", wid, fid);
        self.show_tab(wid)
    }

    /// Subscribe, reparent and register a window with the layout manager
    fn attach_client(&mut self, fid: FrameId, wid: WindowId) -> Result<()> {
        self.display.set_event_subscription(wid, Subscription::Client)?;
        self.display.reparent(wid, fid)?;
        self.layout.append_client(&self.display, fid, wid)
    }

    /// Create the service-side tab, colored by the window's class list
    fn add_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<()> {
        let title = self.display.window_title(wid)?;
        let classes = self.display.window_classes(wid)?;
        self.decorations.add_tab(fid, wid, &title, &classes)?;

        let key = classes.join(",");
        if let Some(&rgb) = self.color_rules.get(&key) {
            self.decorations.assign_color(fid, wid, &key, rgb)?;
        }
        Ok(())
    }

    /// A window was destroyed: drop its tab, and its frame if it was the last
    pub(crate) fn close_tab(&mut self, wid: WindowId) -> Result<()> {
        if let Some(fid) = self
            .unmapped
            .iter()
            .find_map(|(&fid, &w)| (w == wid).then_some(fid))
        {
            self.unmapped.remove(&fid);
            self.decorations.destroy_frame(fid)?;
            self.decorations.clear_color(wid)?;
            return Ok(());
        }

        let Some(fid) = self.layout.frame_of(wid) else {
            return Ok(());
        };
        let Some(frame) = self.layout.frame(fid) else {
            return Ok(());
        };
        let visible = self.layout.visible_frame(fid).is_some();

        if frame.history.len() <= 1 {
            self.layout.remove_frame(&self.display, fid)?;
            self.decorations.destroy_frame(fid)?;
            log::info!("Frame 0x{:x} closed with its last tab", fid);
            if visible {
                if let Some(top) = self.layout.top_frame() {
                    self.focus_frame(top)?;
                }
            }
        } else {
            self.layout.remove_client(&self.display, fid, wid)?;
            self.decorations.remove_tab(fid, wid)?;
            let last = self.layout.frame(fid).and_then(|f| f.active());
            if let (true, Some(last)) = (visible, last) {
                self.show_tab(last)?;
            }
        }
        self.decorations.clear_color(wid)?;
        Ok(())
    }

    pub(crate) fn configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        if self.layout.is_managed(request.window) {
            // Managed clients get their layout geometry back
            return self.layout.update_layout(&self.display);
        }
        if self.layout.frame_exists(request.window) {
            return Ok(());
        }
        let changes = WindowChanges {
            x: Some(request.x),
            y: Some(request.y),
            width: Some(request.width),
            height: Some(request.height),
            border_width: Some(0),
            raise: false,
        };
        self.display.configure(request.window, &changes).skip_stale()?;
        Ok(())
    }

    // --- Tabs and focus ---

    /// Bring a tab to the front of its frame and focus it
    pub(crate) fn show_tab(&mut self, wid: WindowId) -> Result<()> {
        let Some(fid) = self.layout.frame_of(wid) else {
            return Ok(());
        };
        self.layout.promote_client(fid, wid);
        self.decorations.goto_tab(fid, wid)?;
        if self.layout.visible_frame(fid).is_none() {
            return Ok(());
        }

        self.display.unmap_children(fid).skip_stale()?;
        self.display.map_window(wid).skip_stale()?;
        let (top, bottom) = self.layout.corner_radii(fid);
        self.display.apply_rounded_mask(wid, top, bottom).skip_stale()?;
        self.focus_client(wid)
    }

    fn focus_client(&mut self, wid: WindowId) -> Result<()> {
        let Some(fid) = self.layout.frame_of(wid) else {
            return Ok(());
        };
        self.layout.set_focused_frame(fid);
        self.display.set_input_focus(wid).skip_stale()?;
        self.header_colors(fid)
    }

    /// Focus, raise and highlight a frame of the current workspace
    pub(crate) fn focus_frame(&mut self, fid: FrameId) -> Result<()> {
        let Some(active) = self.layout.visible_frame(fid).and_then(|f| f.active()) else {
            return Ok(());
        };
        self.layout.set_focused_frame(fid);
        self.display.set_input_focus(active).skip_stale()?;
        self.display.configure(fid, &WindowChanges::raise()).skip_stale()?;
        self.header_colors(fid)
    }

    fn header_colors(&mut self, focused: FrameId) -> Result<()> {
        self.decorations.set_focus_style(focused, true)?;
        let others: Vec<FrameId> = self
            .layout
            .history()
            .iter()
            .copied()
            .filter(|&f| f != focused)
            .collect();
        for fid in others {
            self.decorations.set_focus_style(fid, false)?;
        }
        Ok(())
    }

    pub(crate) fn rename_tab(&mut self, wid: WindowId) -> Result<()> {
        let Some(fid) = self.layout.frame_of(wid) else {
            return Ok(());
        };
        if let Some(title) = self.display.window_title(wid).skip_stale()? {
            self.decorations.rename_tab(fid, wid, &title)?;
        }
        Ok(())
    }

    pub(crate) fn update_tab_icon(&mut self, wid: WindowId) -> Result<()> {
        let Some(fid) = self.layout.frame_of(wid) else {
            return Ok(());
        };
        let Some(title) = self.display.window_title(wid).skip_stale()? else {
            return Ok(());
        };
        let Some(classes) = self.display.window_classes(wid).skip_stale()? else {
            return Ok(());
        };
        self.decorations.set_tab_icon(fid, wid, &title, &classes)?;
        Ok(())
    }

    /// The user picked a tab in the service's tab bar
    pub(crate) fn update_tab_order(&mut self, fid: FrameId) -> Result<()> {
        let Some(frame) = self.layout.frame(fid) else {
            return Ok(());
        };
        let current = frame.active();
        let Some(active) = self.decorations.get_active_tab(fid)? else {
            return Ok(());
        };
        let known = self.layout.frame(fid).is_some_and(|f| f.contains(active));
        if known && current != Some(active) {
            self.show_tab(active)?;
        }
        Ok(())
    }

    /// Bring the layout manager in line with the service after it moved tabs.
    ///
    /// Windows the service lists under another known frame are transferred;
    /// windows it no longer lists anywhere are closed.
    pub(crate) fn reconcile_frame(&mut self, fid: FrameId) -> Result<()> {
        let Some(frame) = self.layout.frame(fid) else {
            return Ok(());
        };
        let windows = frame.history.clone();
        let tabs = self.decorations.list_all_tabs()?;
        let Some(listed) = tabs.get(&fid) else {
            return Ok(());
        };

        for wid in windows {
            // An earlier transfer may have emptied and destroyed the frame
            if !self.layout.frame_exists(fid) {
                break;
            }
            if listed.contains(&wid) {
                continue;
            }
            let claimant = tabs
                .iter()
                .filter(|(other, list)| **other != fid && list.contains(&wid))
                .map(|(&other, _)| other)
                .find(|&other| self.layout.frame_exists(other));
            match claimant {
                Some(target) => {
                    log::info!("Tab 0x{:x} moved from frame 0x{:x} to 0x{:x}", wid, fid, target);
                    self.move_tab(fid, target, wid)?;
                }
                None => {
                    log::info!("Tab 0x{:x} dropped from frame 0x{:x}, closing", wid, fid);
                    self.display.close_window(wid).skip_stale()?;
                }
            }
        }
        Ok(())
    }

    /// Close windows of a frame the service no longer lists
    pub(crate) fn check_tab_count(&mut self, fid: FrameId) -> Result<()> {
        let Some(frame) = self.layout.frame(fid) else {
            return Ok(());
        };
        let windows = frame.history.clone();
        let tabs = self.decorations.list_all_tabs()?;
        let Some(listed) = tabs.get(&fid) else {
            return Ok(());
        };
        let listed_count = listed.iter().filter(|&&w| w != 0).count();
        if listed_count >= windows.len() {
            return Ok(());
        }
        for wid in windows.into_iter().filter(|w| !listed.contains(w)) {
            log::info!("Closing window 0x{:x} dropped by the service", wid);
            self.display.close_window(wid).skip_stale()?;
        }
        Ok(())
    }

    /// Move a window between frames in the display and layout manager.
    ///
    /// The service side is expected to be updated already. An emptied
    /// source frame is destroyed.
    fn move_tab(&mut self, from: FrameId, to: FrameId, wid: WindowId) -> Result<()> {
        self.display.reparent(wid, to)?;
        let emptied = self.layout.remove_client(&self.display, from, wid)?;
        self.layout.append_client(&self.display, to, wid)?;

        if emptied {
            self.decorations.destroy_frame(from)?;
        } else if let Some(last) = self.layout.frame(from).and_then(|f| f.active()) {
            self.show_tab(last)?;
        }
        self.show_tab(wid)
    }

    // --- Pointer drags ---

    pub(crate) fn button_press(&mut self, button: u8, state: u16, x: i32, y: i32) -> Result<()> {
        if self.drag.is_some() || modifiers::clean(state) != modifiers::MOD1 {
            return Ok(());
        }
        let Some(fid) = self.layout.top_frame() else {
            return Ok(());
        };
        let Some(rect) = self.display.get_geometry(fid).skip_stale()? else {
            return Ok(());
        };
        if !rect.contains(x, y) {
            return Ok(());
        }
        let corner = Corner::from_point(&rect, x, y);
        self.drag = Drag::new(button, fid, corner, (x, y), self.drag_style.step);
        if let Some(drag) = &self.drag {
            log::debug!("Drag {:?} of frame 0x{:x} from {}", drag.kind, fid, corner);
        }
        Ok(())
    }

    pub(crate) fn button_motion(&mut self, x: i32, y: i32) -> Result<()> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(());
        };
        let first = !drag.stepped;
        let Some((dx, dy)) = drag.motion(x, y) else {
            return Ok(());
        };
        let (kind, fid, corner) = (drag.kind, drag.frame, drag.corner);

        match kind {
            DragKind::Move => self.layout.move_frame(&self.display, fid, dx, dy)?,
            DragKind::Resize => self.layout.resize_frame(&self.display, fid, dx, dy, corner)?,
        }

        if first {
            self.decorations.show_alignment_overlay()?;
            self.overlay_visible = true;
            let style = self.drag_style;
            for &frame in self.layout.history() {
                self.display
                    .configure(frame, &WindowChanges::border(style.border_width))
                    .skip_stale()?;
                self.display
                    .set_border_color(frame, style.border_color)
                    .skip_stale()?;
            }
        }
        Ok(())
    }

    pub(crate) fn button_release(&mut self, button: u8) -> Result<()> {
        if self.drag.as_ref().map(|d| d.button) != Some(button) {
            return Ok(());
        }
        self.drag = None;
        for &frame in self.layout.history() {
            self.display.configure(frame, &WindowChanges::border(0)).skip_stale()?;
        }
        if self.overlay_visible {
            self.overlay_visible = false;
            self.decorations.hide_alignment_overlay()?;
        }
        Ok(())
    }

    /// While a frame is dragged with the left button, entering another
    /// frame swaps the two.
    pub(crate) fn enter_window(&mut self, window: WindowId, child: WindowId) -> Result<()> {
        let Some(dragged) = self
            .drag
            .as_ref()
            .filter(|d| d.kind == DragKind::Move)
            .map(|d| d.frame)
        else {
            return Ok(());
        };

        let target = if self.layout.frame_exists(child) {
            Some(child)
        } else if let Some(owner) = self.layout.frame_of(child) {
            Some(owner)
        } else if child == 0 && self.layout.frame_exists(window) {
            Some(window)
        } else {
            None
        };

        match target {
            Some(target) if target != dragged => {
                self.layout.switch_frames(&self.display, dragged, target)?;
            }
            Some(_) => {}
            None => {
                let (x, y) = self.display.query_pointer()?;
                let others: Vec<FrameId> = self
                    .layout
                    .history()
                    .iter()
                    .copied()
                    .filter(|&f| f != dragged)
                    .collect();
                for fid in others {
                    let Some(rect) = self.display.get_geometry(fid).skip_stale()? else {
                        continue;
                    };
                    if rect.contains(x, y) {
                        self.layout.switch_frames(&self.display, dragged, fid)?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // --- Keyboard actions ---

    pub fn execute_action(&mut self, action: WmAction) -> Result<()> {
        match action {
            WmAction::Spawn(command) => {
                self.children.spawn(&command);
            }
            WmAction::CloseWindow => {
                if let Some(wid) = self.focused_window() {
                    self.display.close_window(wid).skip_stale()?;
                }
            }
            WmAction::CloseFrame => {
                let windows = self
                    .focused_frame()
                    .and_then(|fid| self.layout.frame(fid))
                    .map(|f| f.history.clone())
                    .unwrap_or_default();
                for wid in windows {
                    self.display.close_window(wid).skip_stale()?;
                }
            }
            WmAction::NextFrame => {
                if let Some(fid) = self.layout.next_frame() {
                    self.focus_frame(fid)?;
                }
            }
            WmAction::PrevFrame => {
                if let Some(fid) = self.layout.prev_frame() {
                    self.focus_frame(fid)?;
                }
            }
            WmAction::NextTab => {
                if let Some(fid) = self.focused_frame() {
                    if let Some(wid) = self.decorations.next_tab(fid)? {
                        self.show_tab(wid)?;
                    }
                }
            }
            WmAction::PrevTab => {
                if let Some(fid) = self.focused_frame() {
                    if let Some(wid) = self.decorations.prev_tab(fid)? {
                        self.show_tab(wid)?;
                    }
                }
            }
            WmAction::GotoTab(index) => {
                if let Some(fid) = self.focused_frame() {
                    if let Some(wid) = self.decorations.goto_tab_index(fid, index)? {
                        self.show_tab(wid)?;
                    }
                }
            }
            WmAction::MoveFrameNext => self.shift_frame(1)?,
            WmAction::MoveFramePrev => self.shift_frame(-1)?,
            WmAction::MoveTabNext => self.reorder_focused_tab(TabPosition::Next)?,
            WmAction::MoveTabPrev => self.reorder_focused_tab(TabPosition::Prev)?,
            WmAction::MoveTabNextFrame => self.move_tab_to_adjacent_frame(true)?,
            WmAction::MoveTabPrevFrame => self.move_tab_to_adjacent_frame(false)?,
            WmAction::DetachTab => self.detach_tab()?,
            WmAction::ToggleDecorations => self.toggle_decorations()?,
            WmAction::ToggleNextIsTab => {
                self.next_is_tab = !self.next_is_tab;
                log::info!("Next window opens as tab: {}", self.next_is_tab);
            }
            WmAction::Workspace(index) => {
                if self.layout.set_workspace(&self.display, index)? {
                    self.refocus_top()?;
                }
            }
            WmAction::WorkspaceNext => {
                if self.layout.step_workspace(&self.display, 1)? {
                    self.refocus_top()?;
                }
            }
            WmAction::WorkspacePrev => {
                if self.layout.step_workspace(&self.display, -1)? {
                    self.refocus_top()?;
                }
            }
            WmAction::MoveToWorkspace(index) => self.move_focused_to_workspace(index)?,
            WmAction::MoveToWorkspaceNext => {
                let target = self.layout.workspaces().next_index();
                self.move_focused_to_workspace(target)?;
            }
            WmAction::MoveToWorkspacePrev => {
                let target = self.layout.workspaces().prev_index();
                self.move_focused_to_workspace(target)?;
            }
            WmAction::SetLayout(kind) => self.layout.set_layout(&self.display, kind)?,
            WmAction::ResizeFrame(dx, dy) => {
                if let Some(fid) = self.focused_frame() {
                    self.layout
                        .resize_frame(&self.display, fid, dx, -dy, Corner::SouthEast)?;
                }
            }
            WmAction::MoveFrame(dx, dy) => {
                if let Some(fid) = self.focused_frame() {
                    self.layout.move_frame(&self.display, fid, dx, -dy)?;
                }
            }
            WmAction::Quit => {
                log::info!("Quit requested");
                self.running = false;
            }
        }
        Ok(())
    }

    fn focused_frame(&self) -> Option<FrameId> {
        self.layout.top_frame()
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused_frame()
            .and_then(|fid| self.layout.frame(fid))
            .and_then(|f| f.active())
    }

    fn refocus_top(&mut self) -> Result<()> {
        match self.layout.top_frame() {
            Some(top) => self.focus_frame(top),
            None => Ok(()),
        }
    }

    /// Move the focused frame one slot along the layout order, wrapping
    fn shift_frame(&mut self, delta: i32) -> Result<()> {
        let Some(fid) = self.focused_frame() else {
            return Ok(());
        };
        let count = self.layout.frame_count() as i32;
        if count < 2 {
            return Ok(());
        }
        let position = (self.layout.position(fid) as i32 + delta).rem_euclid(count) as usize;
        self.layout.set_position(&self.display, fid, position)
    }

    fn reorder_focused_tab(&mut self, position: TabPosition) -> Result<()> {
        let (Some(fid), Some(wid)) = (self.focused_frame(), self.focused_window()) else {
            return Ok(());
        };
        self.decorations.reorder_tab(fid, wid, position)?;
        Ok(())
    }

    fn move_tab_to_adjacent_frame(&mut self, forward: bool) -> Result<()> {
        if self.layout.frame_count() < 2 {
            return Ok(());
        }
        let (Some(fid), Some(wid)) = (self.focused_frame(), self.focused_window()) else {
            return Ok(());
        };
        let target = if forward {
            self.layout.next_frame()
        } else {
            self.layout.prev_frame()
        };
        let Some(target) = target.filter(|&t| t != fid) else {
            return Ok(());
        };

        self.decorations.remove_tab(fid, wid)?;
        self.add_tab(target, wid)?;
        self.move_tab(fid, target, wid)
    }

    /// Pull the focused tab out of its frame into a new frame of its own
    fn detach_tab(&mut self) -> Result<()> {
        let Some(fid) = self.focused_frame() else {
            return Ok(());
        };
        let Some(frame) = self.layout.frame(fid) else {
            return Ok(());
        };
        if frame.history.len() < 2 {
            return Ok(());
        }
        let Some(wid) = frame.active() else {
            return Ok(());
        };

        self.layout.remove_client(&self.display, fid, wid)?;
        self.decorations.remove_tab(fid, wid)?;
        if let Some(last) = self.layout.frame(fid).and_then(|f| f.active()) {
            self.show_tab(last)?;
        }
        log::info!("Detaching window 0x{:x} from frame 0x{:x}", wid, fid);
        self.append_unmapped(wid)
    }

    /// Hide or show the tab bar band, keeping the content where it is
    fn toggle_decorations(&mut self) -> Result<()> {
        let Some(fid) = self.focused_frame() else {
            return Ok(());
        };
        let (Some(frame), Some(content)) = (self.layout.frame(fid), self.layout.content_geometry(fid)) else {
            return Ok(());
        };
        let decorated = frame.decorations;
        let chrome = self.layout.chrome_height();

        if decorated {
            self.layout.set_decorations(fid, false);
            self.layout.move_frame(&self.display, fid, 0, chrome as i32)?;
            self.layout.set_size(&self.display, fid, content.width, content.height)?;
        } else {
            self.layout.set_decorations(fid, true);
            self.layout.move_frame(&self.display, fid, 0, -(chrome as i32))?;
            self.layout
                .set_size(&self.display, fid, content.width, content.height + chrome)?;
        }
        self.layout.update_layout(&self.display)?;
        self.decorations.toggle_fullscreen_chrome(fid)?;
        Ok(())
    }

    fn move_focused_to_workspace(&mut self, target: usize) -> Result<()> {
        let Some(fid) = self.focused_frame() else {
            return Ok(());
        };
        if self.layout.move_to_workspace(&self.display, fid, target)? {
            self.refocus_top()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WmEvent;
    use crate::testing::{FakeDecorations, FakeDisplay};

    fn floating_wm() -> WindowManager<FakeDisplay, FakeDecorations> {
        let mut config = Config::default();
        config.general.default_layout = "floating".to_string();
        WindowManager::new(FakeDisplay::new(1920, 1080), FakeDecorations::new(), &config).unwrap()
    }

    /// Map a window and let the service map its frame; returns the frame
    fn open(wm: &mut WindowManager<FakeDisplay, FakeDecorations>, wid: WindowId) -> FrameId {
        wm.display().add_window(wid, "term", &["Termite"], (800, 466));
        wm.handle_event(WmEvent::MapRequest { window: wid }).unwrap();
        let fid = wm
            .pending_frames()
            .iter()
            .find_map(|(&f, &w)| (w == wid).then_some(f))
            .unwrap();
        wm.handle_event(WmEvent::MapRequest { window: fid }).unwrap();
        fid
    }

    #[test]
    fn test_new_window_waits_for_frame() {
        let mut wm = floating_wm();
        wm.display().add_window(0x1, "term", &["Termite"], (800, 466));
        wm.handle_event(WmEvent::MapRequest { window: 0x1 }).unwrap();

        assert_eq!(wm.pending_frames().len(), 1);
        assert!(!wm.layout().is_managed(0x1));
        let fid = *wm.pending_frames().keys().next().unwrap();
        assert_eq!(wm.decorations().tabs(fid), vec![0x1]);

        wm.handle_event(WmEvent::MapRequest { window: fid }).unwrap();
        assert!(wm.pending_frames().is_empty());
        assert_eq!(wm.layout().frame_of(0x1), Some(fid));
        assert_eq!(wm.display().parent(0x1), Some(fid));
        assert!(wm.display().is_mapped(fid));
        assert_eq!(wm.display().focused(), Some(0x1));
        assert!(wm.decorations().is_focused(fid));
    }

    #[test]
    fn test_grid_role_is_not_managed() {
        let mut wm = floating_wm();
        wm.display().add_window(0x9, "grid", &[], (100, 100));
        wm.display().set_role(0x9, "grid");
        wm.handle_event(WmEvent::MapRequest { window: 0x9 }).unwrap();
        assert!(wm.display().is_mapped(0x9));
        assert!(wm.pending_frames().is_empty());
    }

    #[test]
    fn test_next_window_as_tab() {
        let mut wm = floating_wm();
        let fid = open(&mut wm, 0x1);
        wm.execute_action(WmAction::ToggleNextIsTab).unwrap();
        wm.display().add_window(0x2, "editor", &["Code"], (640, 480));
        wm.handle_event(WmEvent::MapRequest { window: 0x2 }).unwrap();

        assert!(!wm.next_is_tab());
        assert_eq!(wm.layout().frame(fid).unwrap().history, vec![0x1, 0x2]);
        assert_eq!(wm.decorations().tabs(fid), vec![0x1, 0x2]);
        assert_eq!(wm.decorations().active(fid), Some(0x2));
        assert!(!wm.display().is_mapped(0x1));
        assert!(wm.display().is_mapped(0x2));
    }

    #[test]
    fn test_class_colors_assigned() {
        let mut config = Config::default();
        config
            .colors
            .classes
            .insert("Termite".to_string(), "#ff8800".to_string());
        let mut wm =
            WindowManager::new(FakeDisplay::new(1920, 1080), FakeDecorations::new(), &config).unwrap();
        open(&mut wm, 0x1);
        assert_eq!(wm.decorations().color(0x1), Some(0xff8800));

        wm.handle_event(WmEvent::DestroyNotify { window: 0x1 }).unwrap();
        assert_eq!(wm.decorations().color(0x1), None);
    }

    #[test]
    fn test_configure_request_passthrough_and_reassert() {
        let mut wm = floating_wm();
        let request = ConfigureRequest { window: 0x7, x: 5, y: 6, width: 70, height: 80 };
        wm.handle_event(WmEvent::ConfigureRequest(request)).unwrap();
        assert_eq!(wm.display().geometry(0x7), Some(crate::types::Rect::new(5, 6, 70, 80)));
        assert_eq!(wm.display().border(0x7), Some(0));

        open(&mut wm, 0x1);
        let request = ConfigureRequest { window: 0x1, x: 0, y: 0, width: 10, height: 10 };
        wm.handle_event(WmEvent::ConfigureRequest(request)).unwrap();
        assert_eq!(wm.display().geometry(0x1), Some(crate::types::Rect::new(0, 34, 800, 466)));
    }

    #[test]
    fn test_toggle_decorations_keeps_content_in_place() {
        let mut wm = floating_wm();
        let fid = open(&mut wm, 0x1);
        let before = wm.layout().content_geometry(fid).unwrap();

        wm.execute_action(WmAction::ToggleDecorations).unwrap();
        assert!(!wm.layout().frame(fid).unwrap().decorations);
        assert_eq!(wm.layout().content_geometry(fid), Some(before));
        assert!(wm.decorations().chrome_hidden(fid));
        assert_eq!(wm.display().mask(0x1), Some((10, 10)));

        wm.execute_action(WmAction::ToggleDecorations).unwrap();
        assert_eq!(wm.layout().content_geometry(fid), Some(before));
        assert!(!wm.decorations().chrome_hidden(fid));
    }

    #[test]
    fn test_quit() {
        let mut wm = floating_wm();
        assert!(wm.is_running());
        wm.execute_action(WmAction::Quit).unwrap();
        assert!(!wm.is_running());
    }

    #[test]
    fn test_spawned_commands_are_collected() {
        let mut wm = floating_wm();
        wm.execute_action(WmAction::Spawn("exit 0".to_string())).unwrap();
        assert_eq!(wm.pending_children(), 1);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while wm.pending_children() > 0 && std::time::Instant::now() < deadline {
            wm.reap_children();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(wm.pending_children(), 0);
    }
}
