//! framewm - a tabbed tiling/floating window manager for X11.
//!
//! Frames and their tab bars are drawn by an external decoration service;
//! framewm decides where frames go, which tab is shown and where keyboard
//! focus lands.

pub mod config;
pub mod decorations;
pub mod display;
pub mod drag;
pub mod error;
pub mod event;
pub mod keys;
pub mod layout;
pub mod layouts;
pub mod spawn;
pub mod state;
pub mod testing;
pub mod types;
pub mod wm;
pub mod workspaces;
pub mod x11;

pub use error::WmError;
pub use wm::WindowManager;
