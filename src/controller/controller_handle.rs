//! Controller Handle - wiring and lifecycle of the input pipeline
//!
//! Owns the channels between input sources and the dispatch loop:
//!
//! ```text
//! Platform ─┐
//!           ├─[SurfaceEvent]→ ProcessorHandle ─[Command]→ CommandSink
//! Gamepad ──┘ (mpsc::channel)      ▲
//!                                  └─[Destination]─ connect() (watch)
//! ```
//!
//! Shutdown cancels both stages, waits for the processor to tear the surface
//! down and then joins the collector thread.

use crate::config::Config;
use crate::transport::{CommandSink, Destination};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use super::event_collector::{CollectorError, CollectorHandle, CollectorSettings};
pub use super::event_processor::{ProcessorError, ProcessorHandle, ProcessorSettings};
use super::surface::{ControlSurface, SurfaceEvent};

/// Settings for the whole pipeline, derived from [`Config`].
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Capacity of the event queue between input sources and the processor.
    pub event_buffer: usize,
    pub processor: ProcessorSettings,
    /// `None` leaves gamepad input off.
    pub collector: Option<CollectorSettings>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            event_buffer: 1000,
            processor: ProcessorSettings::default(),
            collector: None,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        let joystick = &config.joystick;
        let collector = config.gamepad.enabled.then(|| CollectorSettings {
            joystick_deadzone: config.gamepad.deadzone,
            poll_interval_us: config.gamepad.poll_interval_us,
            stick_center: joystick.center,
            stick_travel: joystick.outer_radius - joystick.stick_radius,
            steering_enabled: config.tilt.enabled,
        });
        Self {
            processor: ProcessorSettings {
                tick_rate_hz: config.clock.tick_rate_hz,
                ..ProcessorSettings::default()
            },
            collector,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

pub struct ControllerHandle {
    event_sender: mpsc::Sender<SurfaceEvent>,
    destination: watch::Sender<Destination>,
    cancel: CancellationToken,
    processor: ProcessorHandle,
    collector: Option<CollectorHandle>,
}

impl ControllerHandle {
    /// Builds the surface from `config` and starts the pipeline. Must be
    /// called inside a tokio runtime.
    pub fn spawn(config: &Config, sink: Box<dyn CommandSink>) -> Result<Self, ControllerError> {
        let settings = ControllerSettings::from_config(config);
        let surface = ControlSurface::from_config(config, sink);
        Self::spawn_with(surface, config.destination.clone(), settings)
    }

    pub fn spawn_with(
        surface: ControlSurface,
        destination: Destination,
        settings: ControllerSettings,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Controller system with settings: {:?}", settings);

        let (event_sender, event_receiver) = mpsc::channel(settings.event_buffer);
        let (destination_sender, destination_receiver) = watch::channel(destination);
        let cancel = CancellationToken::new();
        debug!(
            "Created event channel with buffer capacity {}",
            settings.event_buffer
        );

        let processor = ProcessorHandle::spawn(
            surface,
            event_receiver,
            destination_receiver,
            Some(settings.processor),
            cancel.child_token(),
        )?;
        info!("Event Processor spawned successfully");

        let collector = match settings.collector {
            Some(collector_settings) => {
                let handle = CollectorHandle::spawn(
                    Some(collector_settings),
                    event_sender.clone(),
                    cancel.child_token(),
                )?;
                info!("Event Collector spawned successfully");
                Some(handle)
            }
            None => {
                debug!("Gamepad input disabled");
                None
            }
        };

        info!("Controller system initialized successfully");
        Ok(Self {
            event_sender,
            destination: destination_sender,
            cancel,
            processor,
            collector,
        })
    }

    /// Sender for platform input events.
    pub fn event_sender(&self) -> mpsc::Sender<SurfaceEvent> {
        self.event_sender.clone()
    }

    pub async fn send(&self, event: SurfaceEvent) -> Result<(), ControllerError> {
        self.event_sender
            .send(event)
            .await
            .map_err(|e| ControllerError::ChannelError(e.to_string()))
    }

    /// Re-points the transport. Takes effect before the next command.
    pub fn connect(&self, destination: Destination) -> Result<(), ControllerError> {
        info!("Connecting to {}", destination);
        self.destination
            .send(destination)
            .map_err(|e| ControllerError::ChannelError(e.to_string()))
    }

    pub fn destination(&self) -> Destination {
        self.destination.borrow().clone()
    }

    /// Stops input collection, releases everything held and centres steering.
    pub async fn shutdown(self) -> Result<ControlSurface, ControllerError> {
        info!("Shutting down controller");
        self.cancel.cancel();
        let surface = self.processor.join().await?;
        if let Some(collector) = self.collector {
            if tokio::task::spawn_blocking(move || collector.join())
                .await
                .is_err()
            {
                warn!("Failed to join Event Collector thread");
            }
        }
        info!("Controller stopped after {} commands", surface.emitted());
        Ok(surface)
    }
}
