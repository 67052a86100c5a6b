//! The control surface: one owner for all input state and the sink.
//!
//! Discrete events are translated and sent immediately from
//! [`ControlSurface::handle_event`]; analog state is sampled and sent from
//! [`ControlSurface::tick`]. Both run on the same dispatch context, so no
//! locking is involved.

use super::joystick::{Geometry, Joystick};
use super::tilt::{Acceleration, TiltOutput, TiltSteering};
use super::touchpad::Touchpad;
use super::tracker::DigitalInputTracker;
use super::{Point, TouchId};
use crate::config::{Config, TiltOutputConfig};
use crate::controller::joystick::JoystickMode;
use crate::protocol::{Command, InputId};
use crate::transport::CommandSink;
use std::net::SocketAddr;
use tracing::{debug, info};

/// Input delivered by the platform (touch screen, buttons, sensors).
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    Button { id: InputId, pressed: bool },
    TouchBegin { touch: TouchId, position: Point },
    TouchMove { touch: TouchId, position: Point },
    TouchEnd { touch: TouchId },
    TouchCancel { touch: TouchId },
    /// Latest accelerometer reading, `None` while the sensor is not ready.
    Acceleration(Option<Acceleration>),
    SteeringToggle(bool),
}

pub struct ControlSurface {
    buttons: DigitalInputTracker,
    joystick: Option<Joystick>,
    touchpad: Option<Touchpad>,
    tilt: TiltSteering,
    reading: Option<Acceleration>,
    sink: Box<dyn CommandSink>,
    emitted: u64,
}

impl ControlSurface {
    pub fn new(
        joystick: Option<Joystick>,
        touchpad: Option<Touchpad>,
        tilt: TiltSteering,
        sink: Box<dyn CommandSink>,
    ) -> Self {
        Self {
            buttons: DigitalInputTracker::with_inputs(&InputId::ALL),
            joystick,
            touchpad,
            tilt,
            reading: None,
            sink,
            emitted: 0,
        }
    }

    pub fn from_config(config: &Config, sink: Box<dyn CommandSink>) -> Self {
        let stick = &config.joystick;
        let joystick = stick.enabled.then(|| {
            let geometry = Geometry {
                center: stick.center,
                outer_radius: stick.outer_radius,
                stick_radius: stick.stick_radius,
            };
            match stick.mode {
                JoystickMode::Digital => {
                    Joystick::digital(geometry, stick.threshold, stick.directions)
                }
                JoystickMode::Analog => Joystick::analog(geometry, stick.sensitivity),
            }
        });
        let touchpad = config
            .touchpad
            .enabled
            .then(|| Touchpad::new(config.touchpad.bounds));
        let output = match config.tilt.output {
            TiltOutputConfig::Angle => TiltOutput::Angle,
            TiltOutputConfig::Keys {
                threshold_deg,
                left,
                right,
            } => TiltOutput::keys(threshold_deg, left, right),
        };
        let tilt = TiltSteering::new(config.tilt.axis(), output, config.tilt.enabled);
        info!(
            "Control surface: joystick {:?}, touchpad {}, tilt {:?}",
            joystick.as_ref().map(Joystick::mode),
            touchpad.is_some(),
            config.tilt.orientation
        );
        Self::new(joystick, touchpad, tilt, sink)
    }

    pub fn joystick(&self) -> Option<&Joystick> {
        self.joystick.as_ref()
    }

    pub fn touchpad(&self) -> Option<&Touchpad> {
        self.touchpad.as_ref()
    }

    pub fn tilt(&self) -> &TiltSteering {
        &self.tilt
    }

    pub fn buttons(&self) -> &DigitalInputTracker {
        &self.buttons
    }

    /// Commands handed to the sink so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn set_destination(&mut self, destination: Option<SocketAddr>) {
        self.sink.set_destination(destination);
    }

    pub fn handle_event(&mut self, event: SurfaceEvent) {
        debug!("Surface event: {:?}", event);
        match event {
            SurfaceEvent::Button { id, pressed } => {
                let edge = self.buttons.report(id, pressed);
                self.emit(edge);
            }
            SurfaceEvent::TouchBegin { touch, position } => {
                let grabbed = self
                    .joystick
                    .as_mut()
                    .is_some_and(|stick| stick.touch_begin(touch, position));
                if !grabbed {
                    if let Some(pad) = self.touchpad.as_mut() {
                        pad.touch_begin(touch, position);
                    }
                }
            }
            SurfaceEvent::TouchMove { touch, position } => {
                if let Some(stick) = self.joystick.as_mut() {
                    stick.touch_move(touch, position);
                }
                if let Some(pad) = self.touchpad.as_mut() {
                    pad.touch_move(touch, position);
                }
            }
            SurfaceEvent::TouchEnd { touch } | SurfaceEvent::TouchCancel { touch } => {
                let released = self
                    .joystick
                    .as_mut()
                    .map(|stick| stick.touch_end(touch))
                    .unwrap_or_default();
                self.emit(released);
                if let Some(pad) = self.touchpad.as_mut() {
                    pad.touch_end(touch);
                }
            }
            SurfaceEvent::Acceleration(reading) => {
                self.reading = reading;
            }
            SurfaceEvent::SteeringToggle(enabled) => {
                let flushed = self.tilt.set_enabled(enabled);
                self.emit(flushed);
            }
        }
    }

    /// One sample clock tick: joystick, touchpad, then tilt.
    pub fn tick(&mut self) {
        if let Some(stick) = self.joystick.as_mut() {
            let commands = stick.tick();
            self.emit(commands);
        }
        if let Some(pad) = self.touchpad.as_mut() {
            let delta = pad.tick();
            self.emit(delta);
        }
        let steer = self.tilt.tick(self.reading.as_ref());
        self.emit(steer);
    }

    /// Leaves the receiver with nothing held and steering centred.
    pub fn teardown(&mut self) {
        info!("Tearing down control surface");
        let released = self.buttons.release_all();
        self.emit(released);
        if let Some(stick) = self.joystick.as_mut() {
            let released = stick.release();
            self.emit(released);
        }
        if let Some(pad) = self.touchpad.as_mut() {
            pad.reset();
        }
        let centred = self.tilt.teardown();
        self.emit(centred);
    }

    fn emit(&mut self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            self.sink.send(&command);
            self.emitted += 1;
        }
    }
}
