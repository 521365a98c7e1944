//! Shared types used across multiple modules.
//!
//! Ids are plain protocol handles: a frame is identified by the window the
//! decoration service created for it, a client by its own window.

use std::fmt;
use std::str::FromStr;

/// A managed top-level client window
pub type WindowId = u32;

/// A frame, identified by its decoration window
pub type FrameId = u32;

/// A rectangle representing geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Center X coordinate
    pub fn center_x(&self) -> i32 {
        self.x + (self.width as i32) / 2
    }

    /// Center Y coordinate
    pub fn center_y(&self) -> i32 {
        self.y + (self.height as i32) / 2
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Point-in-rectangle test, edges inclusive
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Corner of a frame grabbed for a resize.
///
/// The opposite corner stays fixed while the grabbed one follows the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Corner {
    /// Pick the quadrant of `rect` that contains the point
    pub fn from_point(rect: &Rect, x: i32, y: i32) -> Self {
        let north = y < rect.center_y();
        let west = x < rect.center_x();
        match (north, west) {
            (true, true) => Corner::NorthWest,
            (true, false) => Corner::NorthEast,
            (false, true) => Corner::SouthWest,
            (false, false) => Corner::SouthEast,
        }
    }

    pub fn is_north(self) -> bool {
        matches!(self, Corner::NorthWest | Corner::NorthEast)
    }

    pub fn is_west(self) -> bool {
        matches!(self, Corner::NorthWest | Corner::SouthWest)
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Corner::NorthWest => "NW",
            Corner::NorthEast => "NE",
            Corner::SouthWest => "SW",
            Corner::SouthEast => "SE",
        };
        f.write_str(tag)
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NW" => Ok(Corner::NorthWest),
            "NE" => Ok(Corner::NorthEast),
            "SW" => Ok(Corner::SouthWest),
            "SE" => Ok(Corner::SouthEast),
            other => Err(format!("unknown corner tag '{}'", other)),
        }
    }
}
