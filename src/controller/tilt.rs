//! Accelerometer tilt to steering.
//!
//! One accelerometer axis, chosen once per screen orientation, is converted to
//! an angle with `angle = (axis / 9.81) * 90` and clamped to ±90°. While
//! enabled, every tick with a reading emits the angle; there is no delta
//! suppression because steering must track small movements. Switching off
//! sends a single centred value (or releases the derived keys).

use super::tracker::DigitalInputTracker;
use crate::protocol::{Command, InputId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.81;
pub const MAX_TILT_DEGREES: f64 = 90.0;

/// Raw accelerometer reading in m/s².
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn axis(&self, axis: AccelAxis) -> f64 {
        match axis {
            AccelAxis::X => self.x,
            AccelAxis::Y => self.y,
            AccelAxis::Z => self.z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelAxis {
    X,
    Y,
    Z,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// Which axis feeds the steering angle and whether its sign is flipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSelection {
    pub axis: AccelAxis,
    #[serde(default)]
    pub invert: bool,
}

impl AxisSelection {
    pub fn read(&self, reading: &Acceleration) -> f64 {
        let value = reading.axis(self.axis);
        if self.invert {
            -value
        } else {
            value
        }
    }
}

/// Angle in degrees for an acceleration along the steering axis.
pub fn tilt_angle(axis_value: f64) -> f64 {
    ((axis_value / STANDARD_GRAVITY) * MAX_TILT_DEGREES).clamp(-MAX_TILT_DEGREES, MAX_TILT_DEGREES)
}

#[derive(Clone, Debug)]
pub enum TiltOutput {
    /// `STEER:<angle>` every tick.
    Angle,
    /// Tilt beyond the threshold holds a left or right control.
    Keys {
        threshold_deg: f64,
        left: InputId,
        right: InputId,
        tracker: DigitalInputTracker,
    },
}

impl TiltOutput {
    pub fn keys(threshold_deg: f64, left: InputId, right: InputId) -> Self {
        TiltOutput::Keys {
            threshold_deg,
            left,
            right,
            tracker: DigitalInputTracker::with_inputs(&[left, right]),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TiltSteering {
    axis: AxisSelection,
    output: TiltOutput,
    enabled: bool,
    last_angle: Option<f64>,
}

impl TiltSteering {
    pub fn new(axis: AxisSelection, output: TiltOutput, enabled: bool) -> Self {
        info!(
            "Tilt steering on axis {:?} (inverted: {}), enabled: {}",
            axis.axis, axis.invert, enabled
        );
        Self {
            axis,
            output,
            enabled,
            last_angle: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Most recent angle computed while enabled.
    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }

    /// Applies the steering toggle. Disabling flushes held output at once.
    pub fn set_enabled(&mut self, enabled: bool) -> Vec<Command> {
        if self.enabled == enabled {
            return Vec::new();
        }
        self.enabled = enabled;
        info!("Tilt steering {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            return Vec::new();
        }
        self.last_angle = None;
        self.flush()
    }

    /// One sample clock tick with the latest accelerometer reading, if any.
    pub fn tick(&mut self, reading: Option<&Acceleration>) -> Vec<Command> {
        if !self.enabled {
            return Vec::new();
        }
        let Some(reading) = reading else {
            trace!("No accelerometer reading yet, skipping tick");
            return Vec::new();
        };
        let value = self.axis.read(reading);
        if !value.is_finite() {
            debug!("Ignoring non-finite accelerometer value {}", value);
            return Vec::new();
        }
        let angle = tilt_angle(value);
        self.last_angle = Some(angle);

        match &mut self.output {
            TiltOutput::Angle => vec![Command::SteerAngle(angle)],
            TiltOutput::Keys {
                threshold_deg,
                left,
                right,
                tracker,
            } => [(*left, angle < -*threshold_deg), (*right, angle > *threshold_deg)]
                .into_iter()
                .filter_map(|(id, pressed)| tracker.report(id, pressed))
                .collect(),
        }
    }

    /// Centres the receiver if steering is live, used on teardown.
    pub fn teardown(&mut self) -> Vec<Command> {
        if !self.enabled || self.last_angle.take().is_none() {
            return match &mut self.output {
                TiltOutput::Keys { tracker, .. } => tracker.release_all(),
                TiltOutput::Angle => Vec::new(),
            };
        }
        self.flush()
    }

    fn flush(&mut self) -> Vec<Command> {
        match &mut self.output {
            TiltOutput::Angle => vec![Command::steer_center()],
            TiltOutput::Keys { tracker, .. } => tracker.release_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    fn landscape() -> AxisSelection {
        AxisSelection {
            axis: AccelAxis::Y,
            invert: false,
        }
    }

    fn wire(commands: Vec<Command>) -> Vec<String> {
        commands.iter().map(encode).collect()
    }

    #[test]
    fn half_gravity_is_forty_five_degrees() {
        let mut tilt = TiltSteering::new(landscape(), TiltOutput::Angle, true);
        let reading = Acceleration::new(0.0, 4.905, 8.5);
        assert_eq!(wire(tilt.tick(Some(&reading))), vec!["STEER:45.00"]);
    }

    #[test]
    fn angle_is_clamped() {
        assert_eq!(tilt_angle(19.62), 90.0);
        assert_eq!(tilt_angle(-30.0), -90.0);
    }

    #[test]
    fn every_tick_emits_even_when_unchanged() {
        let mut tilt = TiltSteering::new(landscape(), TiltOutput::Angle, true);
        let reading = Acceleration::new(0.0, 1.0, 9.0);
        for _ in 0..3 {
            assert_eq!(tilt.tick(Some(&reading)).len(), 1);
        }
    }

    #[test]
    fn missing_reading_skips_tick() {
        let mut tilt = TiltSteering::new(landscape(), TiltOutput::Angle, true);
        assert!(tilt.tick(None).is_empty());
        assert_eq!(tilt.last_angle(), None);
    }

    #[test]
    fn disabling_centres_exactly_once() {
        let mut tilt = TiltSteering::new(landscape(), TiltOutput::Angle, true);
        let reading = Acceleration::new(0.0, 4.0875, 0.0);
        assert_eq!(wire(tilt.tick(Some(&reading))), vec!["STEER:37.50"]);

        assert_eq!(wire(tilt.set_enabled(false)), vec!["STEER:0.00"]);
        assert!(tilt.set_enabled(false).is_empty());
        for _ in 0..5 {
            assert!(tilt.tick(Some(&reading)).is_empty());
        }

        assert!(tilt.set_enabled(true).is_empty());
        assert_eq!(wire(tilt.tick(Some(&reading))), vec!["STEER:37.50"]);
    }

    #[test]
    fn portrait_axis_with_inverted_sign() {
        let axis = AxisSelection {
            axis: AccelAxis::X,
            invert: true,
        };
        let mut tilt = TiltSteering::new(axis, TiltOutput::Angle, true);
        let reading = Acceleration::new(4.905, -9.0, 0.0);
        assert_eq!(wire(tilt.tick(Some(&reading))), vec!["STEER:-45.00"]);
    }

    #[test]
    fn keys_output_presses_and_releases_on_disable() {
        let output = TiltOutput::keys(20.0, InputId::Left, InputId::Right);
        let mut tilt = TiltSteering::new(landscape(), output, true);

        let right = Acceleration::new(0.0, 4.905, 0.0);
        assert_eq!(tilt.tick(Some(&right)), vec![Command::down(InputId::Right)]);
        assert!(tilt.tick(Some(&right)).is_empty());

        assert_eq!(tilt.set_enabled(false), vec![Command::up(InputId::Right)]);
        assert!(tilt.tick(Some(&right)).is_empty());
    }

    #[test]
    fn teardown_centres_only_live_steering() {
        let mut tilt = TiltSteering::new(landscape(), TiltOutput::Angle, true);
        assert!(tilt.teardown().is_empty());

        tilt.tick(Some(&Acceleration::new(0.0, 2.0, 0.0)));
        assert_eq!(tilt.teardown(), vec![Command::steer_center()]);
        assert!(tilt.teardown().is_empty());
    }
}
