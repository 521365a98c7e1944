//! Configuration file support for framewm.
//!
//! Loads settings from ~/.config/framewm/config.toml if it exists,
//! otherwise uses the built-in defaults (including the default keybind
//! table).

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::display::modifiers;
use crate::error::WmError;
use crate::layout::LayoutOptions;
use crate::layouts::LayoutKind;

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub appearance: AppearanceConfig,
    pub keybindings: KeybindingConfig,
    pub exec: ExecConfig,
    pub colors: ColorConfig,
}

/// General settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub max_workspaces: usize,
    /// Layout every workspace starts with ("tiled", "fullscreen", "floating")
    pub default_layout: String,
    /// Decoration service socket; derived from $DISPLAY when unset
    pub decorations_socket: Option<String>,
    /// Command that starts the decoration service
    pub decorations_command: Option<String>,
}

/// Appearance and interaction settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Height of the tab bar band drawn by the decoration service
    pub chrome_height: u32,
    pub corner_radius: u32,
    /// Pointer travel needed for one drag step
    pub drag_step: i32,
    pub drag_border_width: u32,
    pub drag_border_color: String,
    /// Key presses closer than this to the previous one are dropped
    pub key_debounce_ms: u32,
}

/// Keybindings (key combo -> action, e.g. "Mod1+w" = "close_window")
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KeybindingConfig {
    #[serde(flatten)]
    pub bindings: HashMap<String, String>,
}

/// Exec keybindings (key combo -> command to run)
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecConfig {
    #[serde(flatten)]
    pub bindings: HashMap<String, String>,
}

/// Tab colors by window class list (comma-joined, e.g. "firefox,Firefox")
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct ColorConfig {
    #[serde(flatten)]
    pub classes: HashMap<String, String>,
}

/// Key part of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Keysym(u32),
    /// Raw keycode, written as `!49`
    Keycode(u8),
}

/// Parsed keybinding (ready for X11 grab)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBinding {
    pub key: Key,
    pub modifiers: u16,
}

/// Window manager action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WmAction {
    Spawn(String),
    CloseWindow,
    CloseFrame,
    NextFrame,
    PrevFrame,
    NextTab,
    PrevTab,
    /// Zero-based tab index
    GotoTab(usize),
    MoveFrameNext,
    MoveFramePrev,
    MoveTabNext,
    MoveTabPrev,
    MoveTabNextFrame,
    MoveTabPrevFrame,
    DetachTab,
    ToggleDecorations,
    ToggleNextIsTab,
    /// Zero-based workspace index
    Workspace(usize),
    WorkspaceNext,
    WorkspacePrev,
    MoveToWorkspace(usize),
    MoveToWorkspaceNext,
    MoveToWorkspacePrev,
    SetLayout(LayoutKind),
    /// Keyboard resize of the focused frame from its SE corner (dx, dy; +dy grows upward)
    ResizeFrame(i32, i32),
    /// Keyboard move of the focused frame (dx, dy; +dy moves upward)
    MoveFrame(i32, i32),
    Quit,
}

impl FromStr for WmAction {
    type Err = String;

    /// Parse an action string; indices are written 1-based
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        let args = args.trim();

        let index = |what: &str| -> Result<usize, String> {
            match args.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n - 1),
                _ => Err(format!("{} expects a number starting at 1, got '{}'", what, args)),
            }
        };
        let delta = || -> Result<(i32, i32), String> {
            let parts: Vec<&str> = args.split_whitespace().collect();
            match parts.as_slice() {
                [x, y] => match (x.parse(), y.parse()) {
                    (Ok(x), Ok(y)) => Ok((x, y)),
                    _ => Err(format!("invalid delta '{}'", args)),
                },
                _ => Err(format!("{} expects two numbers, got '{}'", name, args)),
            }
        };

        let action = match name {
            "spawn" | "exec" if !args.is_empty() => WmAction::Spawn(args.to_string()),
            "close_window" => WmAction::CloseWindow,
            "close_frame" => WmAction::CloseFrame,
            "next_frame" => WmAction::NextFrame,
            "prev_frame" => WmAction::PrevFrame,
            "next_tab" => WmAction::NextTab,
            "prev_tab" => WmAction::PrevTab,
            "goto_tab" => WmAction::GotoTab(index("goto_tab")?),
            "move_frame_next" => WmAction::MoveFrameNext,
            "move_frame_prev" => WmAction::MoveFramePrev,
            "move_tab_next" => WmAction::MoveTabNext,
            "move_tab_prev" => WmAction::MoveTabPrev,
            "move_tab_next_frame" => WmAction::MoveTabNextFrame,
            "move_tab_prev_frame" => WmAction::MoveTabPrevFrame,
            "detach_tab" => WmAction::DetachTab,
            "toggle_decorations" => WmAction::ToggleDecorations,
            "toggle_next_tab" => WmAction::ToggleNextIsTab,
            "workspace" => WmAction::Workspace(index("workspace")?),
            "workspace_next" => WmAction::WorkspaceNext,
            "workspace_prev" => WmAction::WorkspacePrev,
            "move_to_workspace" => WmAction::MoveToWorkspace(index("move_to_workspace")?),
            "move_to_workspace_next" => WmAction::MoveToWorkspaceNext,
            "move_to_workspace_prev" => WmAction::MoveToWorkspacePrev,
            "layout" => WmAction::SetLayout(args.parse()?),
            "resize_frame" => {
                let (x, y) = delta()?;
                WmAction::ResizeFrame(x, y)
            }
            "move_frame" => {
                let (x, y) = delta()?;
                WmAction::MoveFrame(x, y)
            }
            "quit" => WmAction::Quit,
            _ => return Err(format!("unknown action '{}'", s)),
        };
        Ok(action)
    }
}

impl fmt::Display for WmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WmAction::Spawn(cmd) => write!(f, "spawn {}", cmd),
            WmAction::GotoTab(n) => write!(f, "goto_tab {}", n + 1),
            WmAction::Workspace(n) => write!(f, "workspace {}", n + 1),
            WmAction::MoveToWorkspace(n) => write!(f, "move_to_workspace {}", n + 1),
            WmAction::SetLayout(kind) => write!(f, "layout {}", kind),
            WmAction::ResizeFrame(x, y) => write!(f, "resize_frame {} {}", x, y),
            WmAction::MoveFrame(x, y) => write!(f, "move_frame {} {}", x, y),
            other => write!(f, "{:?}", other),
        }
    }
}

impl Config {
    /// Load config from default path (~/.config/framewm/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("framewm")
            .join("config.toml")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Parse the keybind and exec tables into (binding, action) pairs.
    ///
    /// Any unparsable combo or action is an error; the manager refuses to
    /// start with a broken keybind table.
    pub fn parse_keybindings(&self) -> Result<Vec<(ParsedBinding, WmAction)>, WmError> {
        let mut bindings = Vec::new();

        for (combo, action) in &self.keybindings.bindings {
            let parsed = parse_key_binding(combo)?;
            let action = action.parse::<WmAction>().map_err(|e| {
                log::error!("Keybinding {}: {}", combo, e);
                WmError::InvalidKeybind(combo.clone())
            })?;
            bindings.push((parsed, action));
        }

        // Parse exec bindings (key combo -> command)
        for (combo, command) in &self.exec.bindings {
            let parsed = parse_key_binding(combo)?;
            bindings.push((parsed, WmAction::Spawn(command.clone())));
        }

        Ok(bindings)
    }

    pub fn layout_options(&self, screen: (u32, u32)) -> LayoutOptions {
        let default_layout = self.general.default_layout.parse().unwrap_or_else(|e| {
            log::warn!("{}, falling back to tiled", e);
            LayoutKind::Tiled
        });
        LayoutOptions {
            screen,
            max_workspaces: self.general.max_workspaces.max(1),
            default_layout,
            chrome_height: self.appearance.chrome_height,
            corner_radius: self.appearance.corner_radius,
        }
    }

    /// Resolved class-list → color rules; unparsable colors are skipped
    pub fn color_rules(&self) -> HashMap<String, u32> {
        self.colors
            .classes
            .iter()
            .filter_map(|(classes, color)| match parse_color(color) {
                Some(rgb) => Some((classes.clone(), rgb)),
                None => {
                    log::warn!("Ignoring invalid color '{}' for {}", color, classes);
                    None
                }
            })
            .collect()
    }
}

/// Parse a key binding string like "Shift + Mod1 + Tab" or "Mod1+!49"
pub fn parse_key_binding(s: &str) -> Result<ParsedBinding, WmError> {
    let invalid = || WmError::InvalidKeybind(s.to_string());
    let parts: Vec<&str> = s.split('+').map(str::trim).collect();
    let (key_part, modifier_parts) = parts.split_last().ok_or_else(invalid)?;
    if key_part.is_empty() {
        return Err(invalid());
    }

    let mut mask: u16 = 0;
    for part in modifier_parts {
        mask |= match part.to_lowercase().as_str() {
            "shift" => modifiers::SHIFT,
            "lock" => modifiers::LOCK,
            "control" | "ctrl" => modifiers::CONTROL,
            "mod1" | "alt" => modifiers::MOD1,
            "mod2" => modifiers::MOD2,
            "mod3" => modifiers::MOD3,
            "mod4" | "super" | "win" => modifiers::MOD4,
            "mod5" => modifiers::MOD5,
            _ => {
                log::warn!("Unknown modifier: {}", part);
                return Err(invalid());
            }
        };
    }

    let key = match key_part.strip_prefix('!') {
        Some(code) => Key::Keycode(code.parse().map_err(|_| invalid())?),
        None => Key::Keysym(key_to_keysym(key_part).ok_or_else(invalid)?),
    };
    Ok(ParsedBinding { key, modifiers: mask })
}

/// Convert key name to X11 keysym
fn key_to_keysym(key: &str) -> Option<u32> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        // Latin-1 keysyms equal their code points; letters use the lowercase sym
        if c.is_ascii_graphic() {
            return Some(c.to_ascii_lowercase() as u32);
        }
    }

    let lower = key.to_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=12).contains(&n) {
            return Some(0xffbe + n - 1);
        }
    }

    match lower.as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        "insert" => Some(0xff63),
        "print" => Some(0xff61),
        "page_up" | "pageup" | "prior" => Some(0xff55),
        "page_down" | "pagedown" | "next" => Some(0xff56),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        "home" => Some(0xff50),
        "end" => Some(0xff57),
        "grave" => Some(0x60),
        "minus" => Some(0x2d),
        "equal" => Some(0x3d),
        "comma" => Some(0x2c),
        "period" => Some(0x2e),
        "slash" => Some(0x2f),
        "bracketleft" => Some(0x5b),
        "bracketright" => Some(0x5d),
        _ => {
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}

/// Parse hex color string (e.g., "#5294e2" or "5294e2") to u32
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim_start_matches('#');
    if s.len() != 6 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_workspaces: 3,
            default_layout: "tiled".to_string(),
            decorations_socket: None,
            decorations_command: None,
        }
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            chrome_height: 34,
            corner_radius: 10,
            drag_step: 25,
            drag_border_width: 3,
            drag_border_color: "#ffffff".to_string(),
            key_debounce_ms: 100,
        }
    }
}

impl Default for KeybindingConfig {
    fn default() -> Self {
        let table = [
            ("Mod1+w", "close_window"),
            ("Shift+Mod1+w", "close_frame"),
            ("Mod1+Tab", "next_frame"),
            ("Shift+Mod1+Tab", "prev_frame"),
            ("Mod1+!49", "next_tab"),
            ("Shift+Mod1+!49", "prev_tab"),
            ("Ctrl+Mod1+Right", "move_frame_next"),
            ("Ctrl+Mod1+Left", "move_frame_prev"),
            ("Mod1+Right", "move_tab_next"),
            ("Mod1+Left", "move_tab_prev"),
            ("Shift+Mod1+Right", "move_tab_next_frame"),
            ("Shift+Mod1+Left", "move_tab_prev_frame"),
            ("Mod1+Down", "detach_tab"),
            ("Mod1+g", "toggle_decorations"),
            ("Mod1+t", "toggle_next_tab"),
            ("Mod1+1", "workspace 1"),
            ("Mod1+2", "workspace 2"),
            ("Mod1+3", "workspace 3"),
            ("Mod1+9", "workspace_prev"),
            ("Mod1+0", "workspace_next"),
            ("Shift+Mod1+1", "move_to_workspace 1"),
            ("Shift+Mod1+2", "move_to_workspace 2"),
            ("Shift+Mod1+3", "move_to_workspace 3"),
            ("Shift+Mod1+9", "move_to_workspace_prev"),
            ("Shift+Mod1+0", "move_to_workspace_next"),
            ("Mod1+i", "layout tiled"),
            ("Mod1+o", "layout fullscreen"),
            ("Mod1+p", "layout floating"),
            ("Ctrl+Shift+Mod1+Right", "resize_frame 25 0"),
            ("Ctrl+Shift+Mod1+Left", "resize_frame -25 0"),
            ("Ctrl+Shift+Mod1+Up", "resize_frame 0 25"),
            ("Ctrl+Shift+Mod1+Down", "resize_frame 0 -25"),
            ("Ctrl+Shift+Mod1+q", "quit"),
        ];
        Self {
            bindings: table
                .into_iter()
                .map(|(combo, action)| (combo.to_string(), action.to_string()))
                .collect(),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert("Mod1+Return".to_string(), "termite".to_string());
        bindings.insert("Mod1+e".to_string(), "thunar".to_string());
        bindings.insert("Mod1+d".to_string(), "dmenu_run".to_string());
        Self { bindings }
    }
}
