//! In-memory collaborators for tests.
//!
//! `FakeDisplay` records every request it receives and answers queries
//! from that record; `FakeDecorations` keeps tab lists the way the real
//! service does. Both let tests inject failures.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::decorations::{DecorationService, TabPosition};
use crate::display::{ButtonGrab, DisplayServer, Subscription, WindowChanges};
use crate::error::WmError;
use crate::event::WmEvent;
use crate::types::{FrameId, Rect, WindowId};

#[derive(Debug, Default)]
struct DisplayState {
    geometries: HashMap<WindowId, Rect>,
    sizes: HashMap<WindowId, (u32, u32)>,
    borders: HashMap<WindowId, u32>,
    border_colors: HashMap<WindowId, u32>,
    masks: HashMap<WindowId, (u32, u32)>,
    parents: HashMap<WindowId, WindowId>,
    mapped: HashSet<WindowId>,
    vanished: HashSet<WindowId>,
    subscriptions: HashMap<WindowId, Subscription>,
    titles: HashMap<WindowId, String>,
    classes: HashMap<WindowId, Vec<String>>,
    roles: HashMap<WindowId, String>,
    atoms: HashMap<String, u32>,
    focused: Option<WindowId>,
    raised: Vec<WindowId>,
    closed: Vec<WindowId>,
    grabbed_keys: Vec<(u8, u16)>,
    grabbed_buttons: Vec<(u8, u16, ButtonGrab)>,
    pointer: (i32, i32),
    replays: usize,
}

/// Display server stand-in
pub struct FakeDisplay {
    screen: (u32, u32),
    state: RefCell<DisplayState>,
    events: VecDeque<WmEvent>,
}

impl FakeDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: (width, height),
            state: RefCell::new(DisplayState::default()),
            events: VecDeque::new(),
        }
    }

    /// Keycode the fake assigns to a keysym
    pub fn keycode_of(keysym: u32) -> u8 {
        (keysym % 200 + 8) as u8
    }

    /// Register a client window with its properties and requested size
    pub fn add_window(&self, window: WindowId, title: &str, classes: &[&str], size: (u32, u32)) {
        let mut state = self.state.borrow_mut();
        state.titles.insert(window, title.to_string());
        state
            .classes
            .insert(window, classes.iter().map(|c| c.to_string()).collect());
        state.sizes.insert(window, size);
    }

    pub fn set_role(&self, window: WindowId, role: &str) {
        self.state.borrow_mut().roles.insert(window, role.to_string());
    }

    pub fn set_title(&self, window: WindowId, title: &str) {
        self.state.borrow_mut().titles.insert(window, title.to_string());
    }

    /// Make the window disappear: every later request on it is stale
    pub fn vanish(&self, window: WindowId) {
        let mut state = self.state.borrow_mut();
        state.vanished.insert(window);
        state.mapped.remove(&window);
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.state.borrow_mut().pointer = (x, y);
    }

    pub fn push_event(&mut self, event: WmEvent) {
        self.events.push_back(event);
    }

    pub fn geometry(&self, window: WindowId) -> Option<Rect> {
        self.state.borrow().geometries.get(&window).copied()
    }

    pub fn mask(&self, window: WindowId) -> Option<(u32, u32)> {
        self.state.borrow().masks.get(&window).copied()
    }

    pub fn border(&self, window: WindowId) -> Option<u32> {
        self.state.borrow().borders.get(&window).copied()
    }

    pub fn border_color(&self, window: WindowId) -> Option<u32> {
        self.state.borrow().border_colors.get(&window).copied()
    }

    pub fn parent(&self, window: WindowId) -> Option<WindowId> {
        self.state.borrow().parents.get(&window).copied()
    }

    pub fn is_mapped(&self, window: WindowId) -> bool {
        self.state.borrow().mapped.contains(&window)
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.state.borrow().focused
    }

    pub fn raised(&self) -> Vec<WindowId> {
        self.state.borrow().raised.clone()
    }

    pub fn closed(&self) -> Vec<WindowId> {
        self.state.borrow().closed.clone()
    }

    pub fn subscription(&self, window: WindowId) -> Option<Subscription> {
        self.state.borrow().subscriptions.get(&window).copied()
    }

    pub fn grabbed_keys(&self) -> Vec<(u8, u16)> {
        self.state.borrow().grabbed_keys.clone()
    }

    pub fn grabbed_buttons(&self) -> Vec<(u8, u16, ButtonGrab)> {
        self.state.borrow().grabbed_buttons.clone()
    }

    pub fn replays(&self) -> usize {
        self.state.borrow().replays
    }

    fn check(&self, window: WindowId) -> Result<(), WmError> {
        if self.state.borrow().vanished.contains(&window) {
            Err(WmError::StaleReference(window))
        } else {
            Ok(())
        }
    }
}

impl DisplayServer for FakeDisplay {
    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn next_event(&mut self) -> Result<WmEvent, WmError> {
        self.events
            .pop_front()
            .ok_or_else(|| WmError::ConnectionLost("no more events".to_string()))
    }

    fn intern_atom(&self, name: &str) -> Result<u32, WmError> {
        let mut state = self.state.borrow_mut();
        let next = 100 + state.atoms.len() as u32;
        Ok(*state.atoms.entry(name.to_string()).or_insert(next))
    }

    fn map_window(&self, window: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().mapped.insert(window);
        Ok(())
    }

    fn unmap_window(&self, window: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().mapped.remove(&window);
        Ok(())
    }

    fn unmap_children(&self, window: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        let mut state = self.state.borrow_mut();
        let children: Vec<WindowId> = state
            .parents
            .iter()
            .filter(|(_, parent)| **parent == window)
            .map(|(&child, _)| child)
            .collect();
        for child in children {
            state.mapped.remove(&child);
        }
        Ok(())
    }

    fn reparent(&self, window: WindowId, parent: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().parents.insert(window, parent);
        Ok(())
    }

    fn configure(&self, window: WindowId, changes: &WindowChanges) -> Result<(), WmError> {
        self.check(window)?;
        let mut state = self.state.borrow_mut();
        let rect = state.geometries.entry(window).or_default();
        if let Some(x) = changes.x {
            rect.x = x;
        }
        if let Some(y) = changes.y {
            rect.y = y;
        }
        if let Some(width) = changes.width {
            rect.width = width;
        }
        if let Some(height) = changes.height {
            rect.height = height;
        }
        if let Some(border) = changes.border_width {
            state.borders.insert(window, border);
        }
        if changes.raise {
            state.raised.push(window);
        }
        Ok(())
    }

    fn get_size(&self, window: WindowId) -> Result<(u32, u32), WmError> {
        self.check(window)?;
        let state = self.state.borrow();
        Ok(match state.geometries.get(&window) {
            Some(rect) => (rect.width, rect.height),
            None => state.sizes.get(&window).copied().unwrap_or((0, 0)),
        })
    }

    fn get_geometry(&self, window: WindowId) -> Result<Rect, WmError> {
        self.check(window)?;
        Ok(self.geometry(window).unwrap_or_default())
    }

    fn close_window(&self, window: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().closed.push(window);
        Ok(())
    }

    fn set_event_subscription(&self, window: WindowId, subscription: Subscription) -> Result<(), WmError> {
        self.check(window)?;
        self.state
            .borrow_mut()
            .subscriptions
            .insert(window, subscription);
        Ok(())
    }

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<(), WmError> {
        self.state.borrow_mut().grabbed_keys.push((keycode, modifiers));
        Ok(())
    }

    fn grab_button(&self, button: u8, modifiers: u16, grab: ButtonGrab) -> Result<(), WmError> {
        self.state
            .borrow_mut()
            .grabbed_buttons
            .push((button, modifiers, grab));
        Ok(())
    }

    fn keycode_for_keysym(&self, keysym: u32) -> Option<u8> {
        Some(Self::keycode_of(keysym))
    }

    fn window_title(&self, window: WindowId) -> Result<String, WmError> {
        self.check(window)?;
        Ok(self
            .state
            .borrow()
            .titles
            .get(&window)
            .cloned()
            .unwrap_or_default())
    }

    fn window_classes(&self, window: WindowId) -> Result<Vec<String>, WmError> {
        self.check(window)?;
        Ok(self
            .state
            .borrow()
            .classes
            .get(&window)
            .cloned()
            .unwrap_or_default())
    }

    fn window_role(&self, window: WindowId) -> Result<Option<String>, WmError> {
        self.check(window)?;
        Ok(self.state.borrow().roles.get(&window).cloned())
    }

    fn set_input_focus(&self, window: WindowId) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().focused = Some(window);
        Ok(())
    }

    fn set_border_color(&self, window: WindowId, rgb: u32) -> Result<(), WmError> {
        self.check(window)?;
        self.state.borrow_mut().border_colors.insert(window, rgb);
        Ok(())
    }

    fn apply_rounded_mask(&self, window: WindowId, top_radius: u32, bottom_radius: u32) -> Result<(), WmError> {
        self.check(window)?;
        self.state
            .borrow_mut()
            .masks
            .insert(window, (top_radius, bottom_radius));
        Ok(())
    }

    fn query_pointer(&self) -> Result<(i32, i32), WmError> {
        Ok(self.state.borrow().pointer)
    }

    fn replay_pointer(&self, _time: u32) -> Result<(), WmError> {
        self.state.borrow_mut().replays += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct FakeFrame {
    tabs: Vec<WindowId>,
    active: Option<WindowId>,
    focused: bool,
    chrome_hidden: bool,
}

/// Decoration service stand-in
#[derive(Debug)]
pub struct FakeDecorations {
    frames: BTreeMap<FrameId, FakeFrame>,
    next_fid: FrameId,
    titles: HashMap<WindowId, String>,
    colors: HashMap<WindowId, u32>,
    overlay_visible: bool,
    overlay_shown: usize,
    /// Error returned by the next call, whatever it is
    fail_next: Option<WmError>,
}

impl Default for FakeDecorations {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDecorations {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
            next_fid: 0x1000,
            titles: HashMap::new(),
            colors: HashMap::new(),
            overlay_visible: false,
            overlay_shown: 0,
            fail_next: None,
        }
    }

    pub fn tabs(&self, fid: FrameId) -> Vec<WindowId> {
        self.frames
            .get(&fid)
            .map(|f| f.tabs.clone())
            .unwrap_or_default()
    }

    pub fn active(&self, fid: FrameId) -> Option<WindowId> {
        self.frames.get(&fid).and_then(|f| f.active)
    }

    pub fn has_frame(&self, fid: FrameId) -> bool {
        self.frames.contains_key(&fid)
    }

    pub fn frame_ids(&self) -> Vec<FrameId> {
        self.frames.keys().copied().collect()
    }

    pub fn is_focused(&self, fid: FrameId) -> bool {
        self.frames.get(&fid).is_some_and(|f| f.focused)
    }

    pub fn chrome_hidden(&self, fid: FrameId) -> bool {
        self.frames.get(&fid).is_some_and(|f| f.chrome_hidden)
    }

    pub fn title(&self, wid: WindowId) -> Option<&str> {
        self.titles.get(&wid).map(String::as_str)
    }

    pub fn color(&self, wid: WindowId) -> Option<u32> {
        self.colors.get(&wid).copied()
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn overlay_shown(&self) -> usize {
        self.overlay_shown
    }

    /// Move a tab between frames the way a tab-bar drag does
    pub fn drag_tab(&mut self, from: FrameId, to: FrameId, wid: WindowId) {
        self.detach(from, wid);
        if let Some(frame) = self.frames.get_mut(&to) {
            frame.tabs.push(wid);
            frame.active = Some(wid);
        }
    }

    /// Forget a tab without telling anyone
    pub fn drop_tab(&mut self, fid: FrameId, wid: WindowId) {
        self.detach(fid, wid);
    }

    /// Pick a tab as if the user clicked it
    pub fn click_tab(&mut self, fid: FrameId, wid: WindowId) {
        if let Some(frame) = self.frames.get_mut(&fid) {
            frame.active = Some(wid);
        }
    }

    pub fn fail_next(&mut self, error: WmError) {
        self.fail_next = Some(error);
    }

    fn detach(&mut self, fid: FrameId, wid: WindowId) {
        if let Some(frame) = self.frames.get_mut(&fid) {
            frame.tabs.retain(|&w| w != wid);
            if frame.active == Some(wid) {
                frame.active = frame.tabs.last().copied();
            }
        }
    }

    fn injected(&mut self) -> Result<(), WmError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn frame_mut(&mut self, fid: FrameId) -> Result<&mut FakeFrame, WmError> {
        self.frames
            .get_mut(&fid)
            .ok_or_else(|| WmError::ServiceRejected(format!("unknown frame 0x{:x}", fid)))
    }

    /// Step the active tab by `delta`, wrapping
    fn cycle(&mut self, fid: FrameId, delta: isize) -> Result<Option<WindowId>, WmError> {
        let frame = self.frame_mut(fid)?;
        if frame.tabs.is_empty() {
            return Ok(None);
        }
        let n = frame.tabs.len() as isize;
        let current = frame
            .active
            .and_then(|a| frame.tabs.iter().position(|&w| w == a))
            .unwrap_or(0) as isize;
        let wid = frame.tabs[(current + delta).rem_euclid(n) as usize];
        frame.active = Some(wid);
        Ok(Some(wid))
    }
}

impl DecorationService for FakeDecorations {
    fn create_frame(&mut self) -> Result<FrameId, WmError> {
        self.injected()?;
        let fid = self.next_fid;
        self.next_fid += 1;
        self.frames.insert(fid, FakeFrame::default());
        Ok(fid)
    }

    fn destroy_frame(&mut self, fid: FrameId) -> Result<(), WmError> {
        self.injected()?;
        self.frames.remove(&fid);
        Ok(())
    }

    fn add_tab(&mut self, fid: FrameId, wid: WindowId, title: &str, _classes: &[String]) -> Result<(), WmError> {
        self.injected()?;
        let frame = self.frame_mut(fid)?;
        if !frame.tabs.contains(&wid) {
            frame.tabs.push(wid);
        }
        frame.active = Some(wid);
        self.titles.insert(wid, title.to_string());
        Ok(())
    }

    fn remove_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError> {
        self.injected()?;
        self.frame_mut(fid)?;
        self.detach(fid, wid);
        Ok(())
    }

    fn rename_tab(&mut self, fid: FrameId, wid: WindowId, title: &str) -> Result<(), WmError> {
        self.injected()?;
        self.frame_mut(fid)?;
        self.titles.insert(wid, title.to_string());
        Ok(())
    }

    fn set_tab_icon(&mut self, fid: FrameId, _wid: WindowId, _title: &str, _classes: &[String]) -> Result<(), WmError> {
        self.injected()?;
        self.frame_mut(fid)?;
        Ok(())
    }

    fn reorder_tab(&mut self, fid: FrameId, wid: WindowId, position: TabPosition) -> Result<(), WmError> {
        self.injected()?;
        let frame = self.frame_mut(fid)?;
        let Some(index) = frame.tabs.iter().position(|&w| w == wid) else {
            return Ok(());
        };
        let n = frame.tabs.len();
        let target = match position {
            TabPosition::Index(i) => i.min(n - 1),
            TabPosition::Next => (index + 1) % n,
            TabPosition::Prev => (index + n - 1) % n,
        };
        let wid = frame.tabs.remove(index);
        frame.tabs.insert(target, wid);
        Ok(())
    }

    fn get_active_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.injected()?;
        Ok(self.frame_mut(fid)?.active)
    }

    fn goto_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError> {
        self.injected()?;
        let frame = self.frame_mut(fid)?;
        if frame.tabs.contains(&wid) {
            frame.active = Some(wid);
        }
        Ok(())
    }

    fn next_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.injected()?;
        self.cycle(fid, 1)
    }

    fn prev_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.injected()?;
        self.cycle(fid, -1)
    }

    fn goto_tab_index(&mut self, fid: FrameId, index: usize) -> Result<Option<WindowId>, WmError> {
        self.injected()?;
        let frame = self.frame_mut(fid)?;
        let wid = frame.tabs.get(index).copied();
        if wid.is_some() {
            frame.active = wid;
        }
        Ok(wid)
    }

    fn list_all_tabs(&mut self) -> Result<HashMap<FrameId, Vec<WindowId>>, WmError> {
        self.injected()?;
        Ok(self
            .frames
            .iter()
            .map(|(&fid, frame)| {
                let tabs = if frame.tabs.is_empty() { vec![0] } else { frame.tabs.clone() };
                (fid, tabs)
            })
            .collect())
    }

    fn assign_color(&mut self, fid: FrameId, wid: WindowId, _class_key: &str, rgb: u32) -> Result<(), WmError> {
        self.injected()?;
        self.frame_mut(fid)?;
        self.colors.insert(wid, rgb);
        Ok(())
    }

    fn clear_color(&mut self, wid: WindowId) -> Result<(), WmError> {
        self.injected()?;
        self.colors.remove(&wid);
        Ok(())
    }

    fn set_focus_style(&mut self, fid: FrameId, focused: bool) -> Result<(), WmError> {
        self.injected()?;
        self.frame_mut(fid)?.focused = focused;
        Ok(())
    }

    fn toggle_fullscreen_chrome(&mut self, fid: FrameId) -> Result<(), WmError> {
        self.injected()?;
        let frame = self.frame_mut(fid)?;
        frame.chrome_hidden = !frame.chrome_hidden;
        Ok(())
    }

    fn show_alignment_overlay(&mut self) -> Result<(), WmError> {
        self.injected()?;
        self.overlay_visible = true;
        self.overlay_shown += 1;
        Ok(())
    }

    fn hide_alignment_overlay(&mut self) -> Result<(), WmError> {
        self.injected()?;
        self.overlay_visible = false;
        Ok(())
    }
}
