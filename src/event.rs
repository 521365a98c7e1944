//! Event model and dispatch.
//!
//! `X11Display` translates protocol events into [`WmEvent`]; the handlers
//! here route them to the manager operations in `wm.rs`.

use anyhow::Result;

use crate::display::DisplayServer;
use crate::decorations::DecorationService;
use crate::error::WmError;
use crate::types::WindowId;
use crate::wm::WindowManager;

/// A client's configure request, passed through for unmanaged windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: WindowId,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Protocol events the manager reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmEvent {
    MapRequest {
        window: WindowId,
    },
    DestroyNotify {
        window: WindowId,
    },
    ConfigureRequest(ConfigureRequest),
    KeyPress {
        keycode: u8,
        state: u16,
        time: u32,
    },
    ButtonPress {
        button: u8,
        state: u16,
        root_x: i32,
        root_y: i32,
        /// Top-level window under the pointer, 0 for the background
        child: WindowId,
        time: u32,
    },
    Motion {
        root_x: i32,
        root_y: i32,
        time: u32,
    },
    ButtonRelease {
        button: u8,
        time: u32,
    },
    PropertyNotify {
        window: WindowId,
        atom: u32,
    },
    ClientMessage {
        window: WindowId,
        data: [u32; 5],
    },
    EnterNotify {
        window: WindowId,
        child: WindowId,
    },
    /// Anything else; ignored
    Other,
}

/// Property changes that trigger manager work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedProperty {
    /// Client title changed: rename the tab
    Title,
    /// Client icon name changed: refresh the tab icon
    IconTitle,
    /// Frame size hints changed: the service moved tabs around
    NormalHints,
    /// Frame user time changed: the user picked a tab
    UserTime,
}

/// Atoms interned once at startup
#[derive(Debug, Clone, Default)]
pub struct TrackedAtoms {
    titles: Vec<u32>,
    icon_titles: Vec<u32>,
    normal_hints: u32,
    user_time: u32,
}

/// Client message payload the service sends after it drops tabs
pub const TAB_CHECK_MESSAGE: [u32; 5] = [3, 0, 0, 0, 0];

impl TrackedAtoms {
    pub fn intern(display: &impl DisplayServer) -> Result<Self, WmError> {
        let titles = ["WM_NAME", "_NET_WM_NAME", "_NET_WM_VISIBLE_NAME"];
        let icon_titles = ["WM_ICON_NAME", "_NET_WM_ICON_NAME", "_NET_WM_VISIBLE_ICON_NAME"];
        Ok(Self {
            titles: titles
                .iter()
                .map(|name| display.intern_atom(name))
                .collect::<Result<_, _>>()?,
            icon_titles: icon_titles
                .iter()
                .map(|name| display.intern_atom(name))
                .collect::<Result<_, _>>()?,
            normal_hints: display.intern_atom("WM_NORMAL_HINTS")?,
            user_time: display.intern_atom("_NET_WM_USER_TIME")?,
        })
    }

    pub fn classify(&self, atom: u32) -> Option<TrackedProperty> {
        if self.titles.contains(&atom) {
            Some(TrackedProperty::Title)
        } else if self.icon_titles.contains(&atom) {
            Some(TrackedProperty::IconTitle)
        } else if atom == self.normal_hints {
            Some(TrackedProperty::NormalHints)
        } else if atom == self.user_time {
            Some(TrackedProperty::UserTime)
        } else {
            None
        }
    }
}

impl<D: DisplayServer, S: DecorationService> WindowManager<D, S> {
    /// Handle one event
    pub fn handle_event(&mut self, event: WmEvent) -> Result<()> {
        match event {
            WmEvent::MapRequest { window } => {
                log::debug!("MapRequest for window 0x{:x}", window);
                self.map_request(window)?;
            }

            WmEvent::DestroyNotify { window } => {
                log::debug!("DestroyNotify for window 0x{:x}", window);
                self.close_tab(window)?;
            }

            WmEvent::ConfigureRequest(request) => {
                log::trace!("ConfigureRequest for window 0x{:x}", request.window);
                self.configure_request(&request)?;
            }

            WmEvent::KeyPress { keycode, state, time } => {
                if let Some(action) = self.keys.lookup(keycode, state, time) {
                    log::debug!("Key {} (state 0x{:x}) -> {}", keycode, state, action);
                    self.execute_action(action)?;
                }
            }

            // Pointer events arrive through a synchronous grab and must be
            // replayed even when the handler fails, or the pointer stays frozen
            WmEvent::ButtonPress { button, state, root_x, root_y, child, time } => {
                let result = self.pointer_pressed(button, state, root_x, root_y, child);
                self.display.replay_pointer(time)?;
                result?;
            }

            WmEvent::Motion { root_x, root_y, time } => {
                let result = self.button_motion(root_x, root_y);
                self.display.replay_pointer(time)?;
                result?;
            }

            WmEvent::ButtonRelease { button, time } => {
                let result = self.button_release(button);
                self.display.replay_pointer(time)?;
                result?;
            }

            WmEvent::PropertyNotify { window, atom } => match self.atoms.classify(atom) {
                Some(TrackedProperty::Title) => self.rename_tab(window)?,
                Some(TrackedProperty::IconTitle) => self.update_tab_icon(window)?,
                Some(TrackedProperty::NormalHints) => self.reconcile_frame(window)?,
                Some(TrackedProperty::UserTime) => self.update_tab_order(window)?,
                None => {}
            },

            WmEvent::ClientMessage { window, data } => {
                if data == TAB_CHECK_MESSAGE {
                    self.check_tab_count(window)?;
                }
            }

            WmEvent::EnterNotify { window, child } => {
                self.enter_window(window, child)?;
            }

            WmEvent::Other => {}
        }
        Ok(())
    }

    fn pointer_pressed(&mut self, button: u8, state: u16, x: i32, y: i32, child: WindowId) -> Result<()> {
        if self.layout.visible_frame(child).is_some() {
            self.focus_frame(child)?;
        }
        self.button_press(button, state, x, y)
    }

    /// Main event loop; returns when quit is requested or on a fatal error
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering event loop");

        while self.is_running() {
            let event = match self.display.next_event() {
                Ok(event) => event,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::warn!("Error reading event: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.handle_event(event) {
                match e.downcast_ref::<WmError>() {
                    Some(wm_error) if wm_error.is_fatal() => {
                        log::error!("Fatal error: {:#}", e);
                        return Err(e);
                    }
                    Some(wm_error) if wm_error.is_stale() => {
                        log::debug!("Dropped event: {:#}", e);
                    }
                    _ => log::error!("Error handling event: {:#}", e),
                }
            }

            self.reap_children();

            if cfg!(debug_assertions) {
                for violation in self.layout.validate() {
                    log::warn!("State violation: {}", violation.description);
                }
            }
        }

        log::info!("Event loop finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDisplay;

    #[test]
    fn test_classify_tracked_atoms() {
        let display = FakeDisplay::new(800, 600);
        let atoms = TrackedAtoms::intern(&display).unwrap();

        let net_wm_name = display.intern_atom("_NET_WM_NAME").unwrap();
        let icon_name = display.intern_atom("WM_ICON_NAME").unwrap();
        let hints = display.intern_atom("WM_NORMAL_HINTS").unwrap();
        let user_time = display.intern_atom("_NET_WM_USER_TIME").unwrap();
        let other = display.intern_atom("_NET_WM_PID").unwrap();

        assert_eq!(atoms.classify(net_wm_name), Some(TrackedProperty::Title));
        assert_eq!(atoms.classify(icon_name), Some(TrackedProperty::IconTitle));
        assert_eq!(atoms.classify(hints), Some(TrackedProperty::NormalHints));
        assert_eq!(atoms.classify(user_time), Some(TrackedProperty::UserTime));
        assert_eq!(atoms.classify(other), None);
    }
}
