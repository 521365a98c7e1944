//! Display server client interface.
//!
//! The manager never talks to the protocol directly; every request goes
//! through [`DisplayServer`]. `X11Display` in `x11.rs` is the real
//! implementation, `testing::FakeDisplay` records calls for tests.

use crate::error::WmError;
use crate::event::WmEvent;
use crate::types::{Rect, WindowId};

/// X11 modifier masks as they appear in key and button events
pub mod modifiers {
    pub const SHIFT: u16 = 1;
    pub const LOCK: u16 = 2;
    pub const CONTROL: u16 = 4;
    pub const MOD1: u16 = 8;
    pub const MOD2: u16 = 16;
    pub const MOD3: u16 = 32;
    pub const MOD4: u16 = 64;
    pub const MOD5: u16 = 128;
    pub const ANY: u16 = 0x8000;

    /// CapsLock and NumLock never take part in binding lookup
    pub fn clean(state: u16) -> u16 {
        state & !(LOCK | MOD2) & 0xff
    }
}

/// Pointer buttons the manager cares about
pub mod buttons {
    pub const ANY: u8 = 0;
    pub const LEFT: u8 = 1;
    pub const RIGHT: u8 = 3;
}

/// Partial configure request; `None` fields are left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub raise: bool,
}

impl WindowChanges {
    pub fn geometry(rect: Rect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..Default::default()
        }
    }

    pub fn border(width: u32) -> Self {
        Self {
            border_width: Some(width),
            ..Default::default()
        }
    }

    pub fn raise() -> Self {
        Self {
            raise: true,
            ..Default::default()
        }
    }
}

/// Event masks selected on the windows the manager owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// Substructure redirect on the root window
    Root,
    /// Decoration frame windows: children, property changes, pointer entry
    Frame,
    /// Client windows: property and structure changes
    Client,
}

/// Pointer grabs installed on the root window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGrab {
    /// Synchronous press grab; the event is replayed to the client afterwards
    Press,
    /// Release and motion while the button is held
    ReleaseAndMotion,
}

/// Everything the manager asks of the display server.
///
/// Calls that target a window which no longer exists fail with
/// [`WmError::StaleReference`].
pub trait DisplayServer {
    /// Root window size in pixels
    fn screen_size(&self) -> (u32, u32);

    /// Block until the next protocol event arrives
    fn next_event(&mut self) -> Result<WmEvent, WmError>;

    fn intern_atom(&self, name: &str) -> Result<u32, WmError>;

    fn map_window(&self, window: WindowId) -> Result<(), WmError>;

    fn unmap_window(&self, window: WindowId) -> Result<(), WmError>;

    /// Unmap every child of `window`
    fn unmap_children(&self, window: WindowId) -> Result<(), WmError>;

    fn reparent(&self, window: WindowId, parent: WindowId) -> Result<(), WmError>;

    fn configure(&self, window: WindowId, changes: &WindowChanges) -> Result<(), WmError>;

    fn get_size(&self, window: WindowId) -> Result<(u32, u32), WmError>;

    /// Geometry relative to the parent, used for hit-testing frames
    fn get_geometry(&self, window: WindowId) -> Result<Rect, WmError>;

    /// Ask the client to close, or terminate it if it does not speak the protocol
    fn close_window(&self, window: WindowId) -> Result<(), WmError>;

    fn set_event_subscription(&self, window: WindowId, subscription: Subscription) -> Result<(), WmError>;

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<(), WmError>;

    fn grab_button(&self, button: u8, modifiers: u16, grab: ButtonGrab) -> Result<(), WmError>;

    fn keycode_for_keysym(&self, keysym: u32) -> Option<u8>;

    fn window_title(&self, window: WindowId) -> Result<String, WmError>;

    fn window_classes(&self, window: WindowId) -> Result<Vec<String>, WmError>;

    fn window_role(&self, window: WindowId) -> Result<Option<String>, WmError>;

    fn set_input_focus(&self, window: WindowId) -> Result<(), WmError>;

    fn set_border_color(&self, window: WindowId, rgb: u32) -> Result<(), WmError>;

    /// Shape the window with rounded corners; a radius of 0 keeps corners square
    fn apply_rounded_mask(&self, window: WindowId, top_radius: u32, bottom_radius: u32) -> Result<(), WmError>;

    /// Pointer position in root coordinates
    fn query_pointer(&self) -> Result<(i32, i32), WmError>;

    /// Release a synchronously grabbed pointer event to the client
    fn replay_pointer(&self, time: u32) -> Result<(), WmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_modifiers() {
        use modifiers::*;
        assert_eq!(clean(MOD1 | LOCK), MOD1);
        assert_eq!(clean(MOD1 | MOD2 | SHIFT), MOD1 | SHIFT);
        // Button state bits above the modifier byte are dropped
        assert_eq!(clean(MOD1 | 0x100), MOD1);
    }

    #[test]
    fn test_window_changes_geometry() {
        let changes = WindowChanges::geometry(Rect::new(1, 2, 3, 4));
        assert_eq!(changes.x, Some(1));
        assert_eq!(changes.height, Some(4));
        assert_eq!(changes.border_width, None);
        assert!(!changes.raise);
    }
}
