//! Pointer drag state for moving and resizing frames.
//!
//! Motion is quantized: deltas accumulate into a carry and are released in
//! whole steps, at most one step per axis per motion event. The remainder
//! stays in the carry for the next event.

use crate::display::buttons;
use crate::types::{Corner, FrameId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// Left button: move the frame
    Move,
    /// Right button: resize from the grabbed corner
    Resize,
}

impl DragKind {
    pub fn from_button(button: u8) -> Option<Self> {
        match button {
            buttons::LEFT => Some(DragKind::Move),
            buttons::RIGHT => Some(DragKind::Resize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Drag {
    pub button: u8,
    pub kind: DragKind,
    pub frame: FrameId,
    pub corner: Corner,
    /// Last pointer position seen, root coordinates
    last: (i32, i32),
    /// Accumulated motion not yet applied
    carry: (i32, i32),
    step: i32,
    /// Whether any step has been applied yet
    pub stepped: bool,
}

impl Drag {
    pub fn new(button: u8, frame: FrameId, corner: Corner, start: (i32, i32), step: i32) -> Option<Self> {
        let kind = DragKind::from_button(button)?;
        Some(Self {
            button,
            kind,
            frame,
            corner,
            last: start,
            carry: (0, 0),
            step: step.max(1),
            stepped: false,
        })
    }

    pub fn carry(&self) -> (i32, i32) {
        self.carry
    }

    /// Feed a pointer position; returns the step to apply, if any
    pub fn motion(&mut self, x: i32, y: i32) -> Option<(i32, i32)> {
        self.carry.0 += x - self.last.0;
        self.carry.1 += y - self.last.1;
        self.last = (x, y);

        let dx = quantize(&mut self.carry.0, self.step);
        let dy = quantize(&mut self.carry.1, self.step);
        if dx == 0 && dy == 0 {
            return None;
        }
        self.stepped = true;
        Some((dx, dy))
    }
}

/// Take at most one step out of `carry`
fn quantize(carry: &mut i32, step: i32) -> i32 {
    if *carry >= step {
        *carry -= step;
        step
    } else if *carry <= -step {
        *carry += step;
        -step
    } else {
        0
    }
}
