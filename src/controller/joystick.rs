//! On-screen analog joystick.
//!
//! A touch that begins inside the outer circle grabs the stick. The stick
//! follows the finger but never travels further than
//! `outer_radius - stick_radius` from the centre; beyond that the displacement
//! is rescaled onto the rim. Releasing the touch recentres the stick.
//!
//! The behaviour is fixed at construction:
//!
//! - **Digital**: each tick the deflection is thresholded into four direction
//!   controls fed through a [`DigitalInputTracker`].
//! - **Analog**: each tick the deflection is scaled into a `MOUSE_MOVE` delta,
//!   suppressed when both components round to zero.

use super::tracker::DigitalInputTracker;
use super::{Point, TouchId};
use crate::protocol::{Command, InputId};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_THRESHOLD: f32 = 0.3;
pub const DEFAULT_SENSITIVITY: f32 = 25.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoystickMode {
    #[default]
    Digital,
    Analog,
}

/// Controls pressed by the four digital directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionIds {
    pub up: InputId,
    pub down: InputId,
    pub left: InputId,
    pub right: InputId,
}

impl Default for DirectionIds {
    fn default() -> Self {
        Self {
            up: InputId::Up,
            down: InputId::Down,
            left: InputId::Left,
            right: InputId::Right,
        }
    }
}

impl DirectionIds {
    fn all(&self) -> [InputId; 4] {
        [self.up, self.down, self.left, self.right]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub center: Point,
    pub outer_radius: f32,
    pub stick_radius: f32,
}

impl Geometry {
    pub fn max_travel(&self) -> f32 {
        self.outer_radius - self.stick_radius
    }

    pub fn contains(&self, point: Point) -> bool {
        point.distance_to(self.center) <= self.outer_radius
    }

    /// Normalised deflection of `point`, clamped onto the unit circle.
    pub fn deflection_of(&self, point: Point) -> (f32, f32) {
        let (dx, dy) = point.offset_from(self.center);
        let travel = self.max_travel();
        let magnitude = dx.hypot(dy);
        let (nx, ny) = if magnitude > travel {
            (dx / magnitude, dy / magnitude)
        } else {
            (dx / travel, dy / travel)
        };
        (nx.clamp(-1.0, 1.0), ny.clamp(-1.0, 1.0))
    }
}

#[derive(Clone, Debug)]
pub enum JoystickBehavior {
    Digital {
        threshold: f32,
        directions: DirectionIds,
        tracker: DigitalInputTracker,
    },
    Analog {
        sensitivity: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Grab {
    touch: TouchId,
    deflection: (f32, f32),
}

#[derive(Clone, Debug)]
pub struct Joystick {
    geometry: Geometry,
    behavior: JoystickBehavior,
    grab: Option<Grab>,
}

impl Joystick {
    pub fn digital(geometry: Geometry, threshold: f32, directions: DirectionIds) -> Self {
        Self {
            geometry,
            behavior: JoystickBehavior::Digital {
                threshold,
                directions,
                tracker: DigitalInputTracker::with_inputs(&directions.all()),
            },
            grab: None,
        }
    }

    pub fn analog(geometry: Geometry, sensitivity: f32) -> Self {
        Self {
            geometry,
            behavior: JoystickBehavior::Analog { sensitivity },
            grab: None,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn mode(&self) -> JoystickMode {
        match self.behavior {
            JoystickBehavior::Digital { .. } => JoystickMode::Digital,
            JoystickBehavior::Analog { .. } => JoystickMode::Analog,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.grab.is_some()
    }

    pub fn deflection(&self) -> (f32, f32) {
        self.grab.map(|grab| grab.deflection).unwrap_or((0.0, 0.0))
    }

    /// Where the knob should be drawn.
    pub fn knob_position(&self) -> Point {
        let (nx, ny) = self.deflection();
        let travel = self.geometry.max_travel();
        Point::new(
            self.geometry.center.x + nx * travel,
            self.geometry.center.y + ny * travel,
        )
    }

    /// Grabs the stick if the touch lands inside it and no other finger holds it.
    pub fn touch_begin(&mut self, touch: TouchId, position: Point) -> bool {
        if self.grab.is_some() || !self.geometry.contains(position) {
            return false;
        }
        let deflection = self.geometry.deflection_of(position);
        debug!("Joystick grabbed by touch {} at {:?}", touch, deflection);
        self.grab = Some(Grab { touch, deflection });
        true
    }

    pub fn touch_move(&mut self, touch: TouchId, position: Point) -> bool {
        match self.grab.as_mut() {
            Some(grab) if grab.touch == touch => {
                grab.deflection = self.geometry.deflection_of(position);
                true
            }
            _ => false,
        }
    }

    /// Ends or cancels the gesture of `touch`, releasing derived directions.
    pub fn touch_end(&mut self, touch: TouchId) -> Vec<Command> {
        match self.grab {
            Some(grab) if grab.touch == touch => self.release(),
            _ => Vec::new(),
        }
    }

    /// Recentres and releases whatever the stick still holds.
    pub fn release(&mut self) -> Vec<Command> {
        if self.grab.take().is_some() {
            debug!("Joystick released");
        }
        match &mut self.behavior {
            JoystickBehavior::Digital { tracker, .. } => tracker.release_all(),
            JoystickBehavior::Analog { .. } => Vec::new(),
        }
    }

    /// One sample clock tick. Idle sticks produce nothing.
    pub fn tick(&mut self) -> Vec<Command> {
        let Some(grab) = self.grab else {
            return Vec::new();
        };
        let (x, y) = grab.deflection;
        match &mut self.behavior {
            JoystickBehavior::Digital {
                threshold,
                directions,
                tracker,
            } => {
                let t = *threshold;
                [
                    (directions.up, y > t),
                    (directions.down, y < -t),
                    (directions.left, x < -t),
                    (directions.right, x > t),
                ]
                .into_iter()
                .filter_map(|(id, pressed)| tracker.report(id, pressed))
                .collect()
            }
            JoystickBehavior::Analog { sensitivity } => {
                let dx = (x * *sensitivity).round() as i32;
                let dy = (y * *sensitivity).round() as i32;
                if dx == 0 && dy == 0 {
                    Vec::new()
                } else {
                    vec![Command::MouseDelta(dx, dy)]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry {
            center: Point::new(200.0, 200.0),
            outer_radius: 150.0,
            stick_radius: 60.0,
        }
    }

    fn digital() -> Joystick {
        Joystick::digital(geometry(), DEFAULT_THRESHOLD, DirectionIds::default())
    }

    fn analog() -> Joystick {
        Joystick::analog(geometry(), DEFAULT_SENSITIVITY)
    }

    #[test]
    fn displacement_beyond_travel_is_clamped_to_unit() {
        let mut stick = analog();
        assert!(stick.touch_begin(1, Point::new(210.0, 200.0)));
        stick.touch_move(1, Point::new(400.0, 200.0));
        assert_eq!(stick.deflection(), (1.0, 0.0));
        assert_eq!(stick.knob_position(), Point::new(290.0, 200.0));
    }

    #[test]
    fn diagonal_clamp_preserves_direction() {
        let mut stick = analog();
        stick.touch_begin(1, Point::new(200.0, 200.0));
        stick.touch_move(1, Point::new(400.0, 400.0));
        let (x, y) = stick.deflection();
        assert!((x - y).abs() < 1e-6);
        assert!((x.hypot(y) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn touch_outside_outer_circle_is_ignored() {
        let mut stick = digital();
        assert!(!stick.touch_begin(1, Point::new(200.0, 351.0)));
        assert!(!stick.is_dragging());
        assert!(stick.tick().is_empty());
    }

    #[test]
    fn second_finger_cannot_steal_the_stick() {
        let mut stick = digital();
        assert!(stick.touch_begin(1, Point::new(200.0, 200.0)));
        assert!(!stick.touch_begin(2, Point::new(210.0, 200.0)));
        assert!(!stick.touch_move(2, Point::new(300.0, 200.0)));
        assert!(stick.touch_end(2).is_empty());
        assert!(stick.is_dragging());
    }

    #[test]
    fn digital_directions_follow_threshold() {
        let mut stick = digital();
        stick.touch_begin(1, Point::new(200.0, 290.0));
        assert_eq!(stick.tick(), vec![Command::down(InputId::Up)]);
        assert!(stick.tick().is_empty());

        stick.touch_move(1, Point::new(110.0, 200.0));
        assert_eq!(
            stick.tick(),
            vec![Command::up(InputId::Up), Command::down(InputId::Left)]
        );
    }

    #[test]
    fn threshold_boundary_is_not_pressed() {
        let mut stick = digital();
        // 27 / 90 == 0.3
        stick.touch_begin(1, Point::new(227.0, 200.0));
        let (x, _) = stick.deflection();
        assert!(x <= DEFAULT_THRESHOLD);
        assert!(stick.tick().is_empty());
    }

    #[test]
    fn cancel_releases_held_directions_immediately() {
        let mut stick = digital();
        stick.touch_begin(7, Point::new(290.0, 290.0));
        assert_eq!(
            stick.tick(),
            vec![Command::down(InputId::Up), Command::down(InputId::Right)]
        );

        assert_eq!(
            stick.touch_end(7),
            vec![Command::up(InputId::Up), Command::up(InputId::Right)]
        );
        assert!(!stick.is_dragging());
        assert!(stick.tick().is_empty());
        assert!(stick.release().is_empty());
    }

    #[test]
    fn analog_centered_touch_is_silent() {
        let mut stick = analog();
        stick.touch_begin(1, Point::new(200.0, 200.0));
        for _ in 0..10 {
            assert!(stick.tick().is_empty());
        }
    }

    #[test]
    fn analog_emits_scaled_delta_every_tick() {
        let mut stick = analog();
        stick.touch_begin(1, Point::new(245.0, 155.0));
        let expected = Command::MouseDelta(13, -13);
        assert_eq!(stick.tick(), vec![expected.clone()]);
        assert_eq!(stick.tick(), vec![expected]);
        assert!(stick.touch_end(1).is_empty());
        assert!(stick.tick().is_empty());
    }

    #[test]
    fn mode_is_fixed_by_constructor() {
        assert_eq!(digital().mode(), JoystickMode::Digital);
        assert_eq!(analog().mode(), JoystickMode::Analog);
    }
}
