//! Keybind table: grabbed key combinations mapped to actions.

use std::collections::HashMap;

use crate::config::{Config, Key, WmAction};
use crate::display::{modifiers, DisplayServer};
use crate::error::WmError;

pub struct KeyTable {
    bindings: HashMap<(u8, u16), WmAction>,
    debounce_ms: u32,
    /// Timestamp of the last accepted key press
    last_press: Option<u32>,
}

impl KeyTable {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            bindings: HashMap::new(),
            debounce_ms,
            last_press: None,
        }
    }

    /// Resolve the configured keybinds to keycodes and grab them
    pub fn from_config(config: &Config, display: &impl DisplayServer) -> Result<Self, WmError> {
        let mut table = Self::new(config.appearance.key_debounce_ms);
        for (binding, action) in config.parse_keybindings()? {
            let keycode = match binding.key {
                Key::Keycode(code) => code,
                Key::Keysym(sym) => match display.keycode_for_keysym(sym) {
                    Some(code) => code,
                    None => {
                        log::warn!("No keycode for keysym 0x{:x} ({}), skipping", sym, action);
                        continue;
                    }
                },
            };
            display.grab_key(keycode, binding.modifiers)?;
            table.bind(keycode, binding.modifiers, action);
        }
        log::info!("Grabbed {} keybindings", table.len());
        Ok(table)
    }

    pub fn bind(&mut self, keycode: u8, mods: u16, action: WmAction) {
        if let Some(previous) = self.bindings.insert((keycode, modifiers::clean(mods)), action) {
            log::warn!("Keycode {} with mask 0x{:x} rebound (was {})", keycode, mods, previous);
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Look up a key press.
    ///
    /// Presses within the debounce window of the last accepted press are
    /// dropped and do not move the window. Unbound presses still count as
    /// accepted.
    pub fn lookup(&mut self, keycode: u8, state: u16, time: u32) -> Option<WmAction> {
        if let Some(last) = self.last_press {
            if time.wrapping_sub(last) <= self.debounce_ms {
                log::debug!("Debounced key press (keycode {})", keycode);
                return None;
            }
        }
        self.last_press = Some(time);
        self.bindings
            .get(&(keycode, modifiers::clean(state)))
            .cloned()
    }
}
