//! Rectangular trackpad widget.
//!
//! Finger movement inside the pad accumulates into a pending pointer delta
//! that is flushed as one `MOUSE_MOVE` per tick. Sub-unit remainders carry
//! over to the next tick so slow drags are not lost to rounding.

use super::{Point, TouchId};
use crate::protocol::Command;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Clone, Debug)]
pub struct Touchpad {
    bounds: Rect,
    grab: Option<(TouchId, Point)>,
    pending: (f32, f32),
}

impl Touchpad {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            grab: None,
            pending: (0.0, 0.0),
        }
    }

    pub fn bounds(&self) -> &Rect {
        &self.bounds
    }

    pub fn is_tracking(&self) -> bool {
        self.grab.is_some()
    }

    pub fn touch_begin(&mut self, touch: TouchId, position: Point) -> bool {
        if self.grab.is_some() || !self.bounds.contains(position) {
            return false;
        }
        debug!("Touchpad tracking touch {}", touch);
        self.grab = Some((touch, position));
        true
    }

    /// Only movement that ends inside the pad counts.
    pub fn touch_move(&mut self, touch: TouchId, position: Point) -> bool {
        let bounds = self.bounds;
        match self.grab.as_mut() {
            Some((owner, last)) if *owner == touch => {
                if bounds.contains(position) {
                    let (dx, dy) = position.offset_from(*last);
                    self.pending.0 += dx;
                    self.pending.1 += dy;
                }
                *last = position;
                true
            }
            _ => false,
        }
    }

    pub fn touch_end(&mut self, touch: TouchId) -> bool {
        match self.grab {
            Some((owner, _)) if owner == touch => {
                self.grab = None;
                true
            }
            _ => false,
        }
    }

    /// Drops the gesture and any movement not yet sent.
    pub fn reset(&mut self) {
        self.grab = None;
        self.pending = (0.0, 0.0);
    }

    pub fn tick(&mut self) -> Option<Command> {
        let dx = self.pending.0.round();
        let dy = self.pending.1.round();
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        self.pending.0 -= dx;
        self.pending.1 -= dy;
        Some(Command::MouseDelta(dx as i32, dy as i32))
    }
}
