use super::surface::SurfaceEvent;
use super::tilt::{Acceleration, STANDARD_GRAVITY};
use super::{Point, TouchId};
use crate::protocol::InputId;
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Touch id used for the left stick; platform touch ids never reach it.
pub const GAMEPAD_TOUCH: TouchId = TouchId::MAX;

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub joystick_deadzone: f32,
    pub poll_interval_us: u64,
    /// Where the left stick "touches" the on-screen joystick.
    pub stick_center: Point,
    /// Distance from the centre reached at full stick deflection.
    pub stick_travel: f32,
    pub steering_enabled: bool,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
            poll_interval_us: 100,
            stick_center: Point::new(200.0, 200.0),
            stick_travel: 90.0,
            steering_enabled: true,
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),
}

/// Turns gamepad buttons and axes into the same events the touch screen
/// produces. Kept free of gilrs state so it can be driven directly.
#[derive(Clone, Debug)]
pub struct GamepadTranslator {
    settings: CollectorSettings,
    left_stick: (f32, f32),
    stick_touching: bool,
    steering_enabled: bool,
}

impl GamepadTranslator {
    pub fn new(settings: CollectorSettings) -> Self {
        let steering_enabled = settings.steering_enabled;
        Self {
            settings,
            left_stick: (0.0, 0.0),
            stick_touching: false,
            steering_enabled,
        }
    }

    pub fn button(&mut self, button: Button, pressed: bool) -> Vec<SurfaceEvent> {
        if button == Button::Mode {
            if !pressed {
                return Vec::new();
            }
            self.steering_enabled = !self.steering_enabled;
            info!(
                "Steering toggled {} from gamepad",
                if self.steering_enabled { "on" } else { "off" }
            );
            return vec![SurfaceEvent::SteeringToggle(self.steering_enabled)];
        }
        match map_button(button) {
            Some(id) => vec![SurfaceEvent::Button { id, pressed }],
            None => {
                debug!("Ignoring unmapped button: {:?}", button);
                Vec::new()
            }
        }
    }

    pub fn axis(&mut self, axis: Axis, value: f32) -> Vec<SurfaceEvent> {
        let value = apply_deadzone(value, self.settings.joystick_deadzone);
        match axis {
            Axis::LeftStickX => {
                self.left_stick.0 = value;
                self.stick_events()
            }
            Axis::LeftStickY => {
                self.left_stick.1 = value;
                self.stick_events()
            }
            Axis::RightStickX => {
                // Fed to both horizontal axes so either orientation steers.
                let lateral = f64::from(value) * STANDARD_GRAVITY;
                vec![SurfaceEvent::Acceleration(Some(Acceleration::new(
                    lateral,
                    lateral,
                    STANDARD_GRAVITY,
                )))]
            }
            _ => {
                debug!("Ignoring unsupported axis: {:?}", axis);
                Vec::new()
            }
        }
    }

    /// Releases everything this pad may be holding.
    pub fn disconnected(&mut self) -> Vec<SurfaceEvent> {
        let mut events: Vec<SurfaceEvent> = MAPPED_BUTTONS
            .iter()
            .filter_map(|button| map_button(*button))
            .map(|id| SurfaceEvent::Button { id, pressed: false })
            .collect();
        self.left_stick = (0.0, 0.0);
        if self.stick_touching {
            self.stick_touching = false;
            events.push(SurfaceEvent::TouchEnd {
                touch: GAMEPAD_TOUCH,
            });
        }
        events.push(SurfaceEvent::Acceleration(None));
        events
    }

    fn stick_events(&mut self) -> Vec<SurfaceEvent> {
        let (x, y) = self.left_stick;
        if x == 0.0 && y == 0.0 {
            if !self.stick_touching {
                return Vec::new();
            }
            self.stick_touching = false;
            return vec![SurfaceEvent::TouchEnd {
                touch: GAMEPAD_TOUCH,
            }];
        }

        let center = self.settings.stick_center;
        let travel = self.settings.stick_travel;
        let position = Point::new(center.x + x * travel, center.y + y * travel);
        let mut events = Vec::with_capacity(2);
        if !self.stick_touching {
            self.stick_touching = true;
            events.push(SurfaceEvent::TouchBegin {
                touch: GAMEPAD_TOUCH,
                position: center,
            });
        }
        events.push(SurfaceEvent::TouchMove {
            touch: GAMEPAD_TOUCH,
            position,
        });
        events
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    translator: GamepadTranslator,
    poll_interval: Duration,
    event_sender: mpsc::Sender<SurfaceEvent>,
    cancel: CancellationToken,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: CollectorSettings,
        event_sender: mpsc::Sender<SurfaceEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        let poll_interval = Duration::from_micros(settings.poll_interval_us);
        Ok(Self::new(
            gilrs,
            None,
            GamepadTranslator::new(settings),
            poll_interval,
            event_sender,
            cancel,
        ))
    }

    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Handles at most one pending gilrs event. Returns how many surface
    /// events were forwarded.
    pub fn collect_next_event(&mut self) -> Result<usize, CollectorError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event() else {
            return Ok(0);
        };

        match self.active_gamepad {
            Some(active_id) if id != active_id => {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                return Ok(0);
            }
            None => {
                info!("Adopting gamepad {} as active", id);
                self.active_gamepad = Some(id);
            }
            _ => {}
        }

        let events = self.convert_gilrs_event(event);
        let count = events.len();
        for surface_event in events {
            self.event_sender
                .try_send(surface_event)
                .map_err(|e| CollectorError::EventSendError(e.to_string()))?;
        }
        Ok(count)
    }

    pub fn run_collection_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        let mut event_count = 0usize;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        while !self.cancel.is_cancelled() {
            match self.collect_next_event() {
                Ok(count) => event_count += count,
                Err(e) if self.event_sender.is_closed() => {
                    info!("Processor gone, stopping collector: {}", e);
                    return Ok(());
                }
                Err(e) => error!("Error collecting event: {}", e),
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!(
                    "Event Collector stats: forwarded {} events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }

            std::thread::sleep(self.poll_interval);
        }

        info!("Event Collector cancelled");
        Ok(())
    }

    fn convert_gilrs_event(&mut self, event: EventType) -> Vec<SurfaceEvent> {
        match event {
            EventType::AxisChanged(axis, value, _) => self.translator.axis(axis, value),
            EventType::ButtonPressed(button, _) => {
                debug!("Button pressed: {:?}", button);
                self.translator.button(button, true)
            }
            EventType::ButtonReleased(button, _) => {
                debug!("Button released: {:?}", button);
                self.translator.button(button, false)
            }
            EventType::Connected => {
                info!("Controller connected");
                Vec::new()
            }
            EventType::Disconnected => {
                warn!("Controller disconnected, releasing its inputs");
                self.active_gamepad = None;
                self.translator.disconnected()
            }
            _ => Vec::new(),
        }
    }
}

pub struct CollectorHandle {
    thread: JoinHandle<()>,
}

impl CollectorHandle {
    /// Runs the collector on its own OS thread; gilrs polling blocks.
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<SurfaceEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        info!("Spawning Event Collector with settings: {:?}", settings);

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || {
                let collector = match EventCollector::create(settings, event_sender, cancel) {
                    Ok(collector) => collector,
                    Err(e) => {
                        error!("Gamepad input unavailable: {}", e);
                        return;
                    }
                };
                let mut collecting = collector.initialize();
                if let Err(e) = collecting.run_collection_loop() {
                    error!("Collector terminated with error: {}", e);
                }
            })
            .map_err(|e| CollectorError::InitializationError(e.to_string()))?;

        Ok(Self { thread })
    }

    /// Blocks until the collector thread exits. Cancel it first.
    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("Event Collector thread panicked");
        }
    }
}

const MAPPED_BUTTONS: [Button; 16] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
];

// Helper function to map gilrs Button to a wire control
fn map_button(button: Button) -> Option<InputId> {
    match button {
        Button::South => Some(InputId::BtnA),
        Button::East => Some(InputId::BtnB),
        Button::West => Some(InputId::BtnX),
        Button::North => Some(InputId::BtnY),
        Button::LeftTrigger => Some(InputId::BtnLb),
        Button::RightTrigger => Some(InputId::BtnRb),
        Button::LeftTrigger2 => Some(InputId::BtnL1),
        Button::RightTrigger2 => Some(InputId::BtnR1),
        Button::DPadUp => Some(InputId::BtnUp),
        Button::DPadDown => Some(InputId::BtnDown),
        Button::DPadLeft => Some(InputId::BtnLeft),
        Button::DPadRight => Some(InputId::BtnRight),
        Button::Select => Some(InputId::BtnSelect),
        Button::Start => Some(InputId::BtnStart),
        Button::LeftThumb => Some(InputId::Lmb),
        Button::RightThumb => Some(InputId::Rmb),
        _ => None,
    }
}

// Helper function to apply deadzone to analog stick values
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
