//! Input-to-protocol translation core
//!
//! Turns touch, button and tilt input into [`Command`](crate::protocol::Command)s:
//!
//! 1. [`tracker`] - per-control press state, emits edges only
//! 2. [`joystick`] - on-screen stick, digital directions or pointer deltas
//! 3. [`touchpad`] - rectangular trackpad, rate-limited pointer deltas
//! 4. [`tilt`] - accelerometer axis to steering angle
//! 5. [`clock`] - fixed-rate sample clock
//! 6. [`surface`] - owns all of the above plus the sink
//! 7. [`event_processor`] - single dispatch loop driving the surface
//! 8. [`event_collector`] - gamepad-backed input source
//! 9. [`controller_handle`] - wiring and lifecycle
//!
//! # Architecture
//!
//! ```text
//! Platform/Gamepad ──► SurfaceEvent ──► Processor ──► ControlSurface ──► CommandSink
//!                                        ▲    (edges now, analog on tick)
//!                                   SampleClock
//! ```

pub mod clock;
pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;
pub mod joystick;
pub mod surface;
pub mod tilt;
pub mod touchpad;
pub mod tracker;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use surface::{ControlSurface, SurfaceEvent};

use serde::{Deserialize, Serialize};

/// Identifies one finger for the duration of a gesture.
pub type TouchId = u64;

/// Position in surface coordinates, y pointing up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset_from(&self, origin: Point) -> (f32, f32) {
        (self.x - origin.x, self.y - origin.y)
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let (dx, dy) = self.offset_from(other);
        dx.hypot(dy)
    }
}
