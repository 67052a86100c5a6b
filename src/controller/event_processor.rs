//! Single dispatch loop for one control surface.
//!
//! Events, destination changes and sample clock ticks are serialised through
//! one `tokio::select!`. The processor itself is a statum state machine:
//!
//! ```text
//! Waiting ──(events)──► Dispatching ──► Waiting
//!    └─────(tick)────► Sampling ────► Waiting
//! ```

use super::clock::{ClockError, SampleClock};
use super::surface::{ControlSurface, SurfaceEvent};
use crate::transport::{Destination, TransportError};
use chrono::Local;
use std::net::SocketAddr;
use statum::{machine, state};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Events queued behind the first one are dispatched in the same wakeup.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<SurfaceEvent>,
}

/// Outcome of resolving one destination change. Only the latest change may
/// re-point the sink.
#[derive(Debug)]
pub struct Resolution {
    pub generation: u64,
    pub destination: Destination,
    pub result: Result<SocketAddr, TransportError>,
}

#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    pub tick_rate_hz: f64,
    pub stats_interval_secs: i64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: super::clock::DEFAULT_TICK_RATE_HZ,
            stats_interval_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to start sample clock: {0}")]
    Clock(#[from] ClockError),

    #[error("Processor task failed: {0}")]
    Join(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ProcessingState {
    Waiting,
    Dispatching(EventBatch),
    Sampling,
}

#[machine]
pub struct EventProcessor<S: ProcessingState> {
    surface: ControlSurface,
    settings: ProcessorSettings,
    events_handled: u64,
    ticks_sampled: u64,
}

impl<S: ProcessingState> EventProcessor<S> {
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }
}

impl EventProcessor<Waiting> {
    pub fn create(surface: ControlSurface, settings: Option<ProcessorSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating Event Processor with settings: {:?}", settings);
        Self::new(surface, settings, 0, 0)
    }

    /// Collects `first` and whatever is already queued behind it.
    pub fn collect(
        self,
        first: SurfaceEvent,
        receiver: &mut mpsc::Receiver<SurfaceEvent>,
    ) -> EventProcessor<Dispatching> {
        let mut events = vec![first];
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        debug!("Collected batch of {} events", events.len());
        self.transition_with(EventBatch { events })
    }

    pub fn begin_sample(self) -> EventProcessor<Sampling> {
        self.transition()
    }

    /// Applies a resolution unless a newer destination change superseded it.
    pub fn apply_resolution(&mut self, resolution: Resolution, latest: u64) {
        if resolution.generation != latest {
            debug!(
                "Ignoring stale resolution of {} (generation {}, latest {})",
                resolution.destination, resolution.generation, latest
            );
            return;
        }
        match resolution.result {
            Ok(addr) => {
                info!("Sending to {} ({})", resolution.destination, addr);
                self.surface.set_destination(Some(addr));
            }
            Err(e) => {
                warn!("Cannot use destination {}: {}", resolution.destination, e);
                self.surface.set_destination(None);
            }
        }
    }

    /// Points the sink at `destination`. Literal addresses apply at once;
    /// hostnames are looked up on a separate task and the sink stays
    /// unconfigured until the result comes back on `resolved`.
    pub fn request_destination(
        &mut self,
        destination: Destination,
        generation: u64,
        resolved: &mpsc::UnboundedSender<Resolution>,
    ) {
        if let Some(result) = destination.resolve_now() {
            let resolution = Resolution {
                generation,
                destination,
                result,
            };
            self.apply_resolution(resolution, generation);
            return;
        }

        debug!("Resolving {} in the background", destination);
        self.surface.set_destination(None);
        let resolved = resolved.clone();
        tokio::spawn(async move {
            let result = destination.resolve().await;
            let resolution = Resolution {
                generation,
                destination,
                result,
            };
            if resolved.send(resolution).is_err() {
                debug!("Processor gone before resolution finished");
            }
        });
    }

    pub fn shutdown(mut self) -> ControlSurface {
        self.surface.teardown();
        info!(
            "Event Processor stopped after {} events, {} ticks, {} commands",
            self.events_handled,
            self.ticks_sampled,
            self.surface.emitted()
        );
        self.surface
    }
}

impl EventProcessor<Dispatching> {
    pub fn dispatch(mut self) -> EventProcessor<Waiting> {
        let events = match self.get_state_data() {
            Some(batch) => batch.events.clone(),
            None => {
                warn!("No event batch found in state data, this should not happen");
                Vec::new()
            }
        };
        self.events_handled += events.len() as u64;
        for event in events {
            self.surface.handle_event(event);
        }
        self.transition()
    }
}

impl EventProcessor<Sampling> {
    pub fn sample(mut self) -> EventProcessor<Waiting> {
        self.surface.tick();
        self.ticks_sampled += 1;
        self.transition()
    }
}

pub struct ProcessorHandle {
    task: JoinHandle<ControlSurface>,
}

impl ProcessorHandle {
    /// Spawns the dispatch loop. The clock is created before spawning so a bad
    /// tick rate is reported here.
    pub fn spawn(
        surface: ControlSurface,
        event_receiver: mpsc::Receiver<SurfaceEvent>,
        destination_receiver: watch::Receiver<Destination>,
        settings: Option<ProcessorSettings>,
        cancel: CancellationToken,
    ) -> Result<Self, ProcessorError> {
        let processor = EventProcessor::create(surface, settings);
        let clock = SampleClock::new(processor.settings().tick_rate_hz)?;

        info!("Spawning Event Processor task");
        let task = tokio::spawn(run_processor_loop(
            processor,
            clock,
            event_receiver,
            destination_receiver,
            cancel,
        ));
        Ok(Self { task })
    }

    /// Waits for the loop to finish and returns the torn-down surface.
    pub async fn join(self) -> Result<ControlSurface, ProcessorError> {
        self.task.await.map_err(|e| {
            error!("Event Processor task failed: {}", e);
            ProcessorError::Join(e.to_string())
        })
    }
}

async fn run_processor_loop(
    mut processor: EventProcessor<Waiting>,
    mut clock: SampleClock,
    mut events: mpsc::Receiver<SurfaceEvent>,
    mut destination: watch::Receiver<Destination>,
    cancel: CancellationToken,
) -> ControlSurface {
    let (resolved_sender, mut resolved) = mpsc::unbounded_channel();
    let mut generation = 0u64;
    let initial = destination.borrow_and_update().clone();
    processor.request_destination(initial, generation, &resolved_sender);

    let stats_interval = chrono::Duration::seconds(processor.settings().stats_interval_secs);
    let mut last_stats_time = Local::now();
    let mut ticks_since_stats = 0u64;
    let mut emitted_at_stats = processor.surface().emitted();
    let mut destination_open = true;

    info!("Entering processor loop ({:?} per tick)", clock.period());
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Shutdown requested");
                break;
            }

            changed = destination.changed(), if destination_open => {
                if changed.is_err() {
                    debug!("Destination sender dropped, keeping current destination");
                    destination_open = false;
                    continue;
                }
                let next = destination.borrow_and_update().clone();
                generation += 1;
                processor.request_destination(next, generation, &resolved_sender);
            }

            Some(resolution) = resolved.recv() => {
                processor.apply_resolution(resolution, generation);
            }

            event = events.recv() => {
                match event {
                    Some(event) => {
                        processor = processor.collect(event, &mut events).dispatch();
                    }
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }

            _ = clock.tick() => {
                processor = processor.begin_sample().sample();
                ticks_since_stats += 1;

                let now = Local::now();
                if now - last_stats_time > stats_interval {
                    let emitted = processor.surface().emitted();
                    info!(
                        "Processor stats: {} ticks, {} commands in {} seconds",
                        ticks_since_stats,
                        emitted - emitted_at_stats,
                        (now - last_stats_time).num_seconds()
                    );
                    ticks_since_stats = 0;
                    emitted_at_stats = emitted;
                    last_stats_time = now;
                }
            }
        }
    }

    processor.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::tilt::Acceleration;
    use crate::controller::Point;
    use crate::protocol::InputId;
    use crate::transport::channel::drain;
    use crate::protocol::Command;
    use crate::transport::{ChannelSink, CommandSink};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingSink {
        destinations: Arc<Mutex<Vec<Option<SocketAddr>>>>,
    }

    impl CommandSink for RecordingSink {
        fn send(&mut self, _command: &Command) {}

        fn set_destination(&mut self, destination: Option<SocketAddr>) {
            self.destinations.lock().unwrap().push(destination);
        }
    }

    struct Harness {
        events: mpsc::Sender<SurfaceEvent>,
        destination: watch::Sender<Destination>,
        wire: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
        handle: ProcessorHandle,
    }

    fn start(config: &Config) -> Harness {
        let (sink, wire) = ChannelSink::new();
        let surface = ControlSurface::from_config(config, Box::new(sink));
        let (events, event_rx) = mpsc::channel(100);
        let (destination, destination_rx) =
            watch::channel(Destination::new("127.0.0.1", 5000));
        let cancel = CancellationToken::new();
        let handle = ProcessorHandle::spawn(
            surface,
            event_rx,
            destination_rx,
            None,
            cancel.clone(),
        )
        .unwrap();
        Harness {
            events,
            destination,
            wire,
            cancel,
            handle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn edges_go_out_without_waiting_for_a_tick() {
        let mut h = start(&Config::default());
        h.events
            .send(SurfaceEvent::Button {
                id: InputId::BtnA,
                pressed: true,
            })
            .await
            .unwrap();
        h.events
            .send(SurfaceEvent::Button {
                id: InputId::BtnA,
                pressed: true,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut h.wire), vec!["BTN_A:DOWN"]);

        h.cancel.cancel();
        let surface = h.handle.join().await.unwrap();
        assert!(!surface.buttons().any_held());
        assert_eq!(drain(&mut h.wire), vec!["BTN_A:UP"]);
    }

    #[tokio::test(start_paused = true)]
    async fn steering_is_sampled_at_sixty_hz() {
        let mut h = start(&Config::default());
        h.events
            .send(SurfaceEvent::Acceleration(Some(Acceleration::new(
                0.0, 4.905, 8.5,
            ))))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        drain(&mut h.wire);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let sent = drain(&mut h.wire);
        assert!((59..=61).contains(&sent.len()), "got {} ticks", sent.len());
        assert!(sent.iter().all(|payload| payload == "STEER:45.00"));

        h.events.send(SurfaceEvent::SteeringToggle(false)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(drain(&mut h.wire), vec!["STEER:0.00"]);

        h.cancel.cancel();
        h.handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_event_channel_tears_down() {
        let mut h = start(&Config::default());
        h.events
            .send(SurfaceEvent::TouchBegin {
                touch: 1,
                position: Point::new(200.0, 50.0),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(drain(&mut h.wire), vec!["DOWN:DOWN"]);

        drop(h.events);
        h.handle.join().await.unwrap();
        assert_eq!(drain(&mut h.wire), vec!["DOWN:UP"]);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_destination_does_not_stop_the_loop() {
        let mut h = start(&Config::default());
        h.destination
            .send(Destination::new("", 5000))
            .unwrap();
        h.events
            .send(SurfaceEvent::Button {
                id: InputId::BtnStart,
                pressed: true,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(drain(&mut h.wire), vec!["BTN_START:DOWN"]);

        h.cancel.cancel();
        h.handle.join().await.unwrap();
    }

    #[test]
    fn superseded_resolution_is_ignored() {
        let sink = RecordingSink::default();
        let surface = ControlSurface::from_config(&Config::default(), Box::new(sink.clone()));
        let mut processor = EventProcessor::create(surface, None);
        let addr: SocketAddr = "10.0.0.9:5000".parse().unwrap();

        processor.apply_resolution(
            Resolution {
                generation: 1,
                destination: Destination::new("old.example", 5000),
                result: Ok(addr),
            },
            2,
        );
        assert!(sink.destinations.lock().unwrap().is_empty());

        processor.apply_resolution(
            Resolution {
                generation: 2,
                destination: Destination::new("new.example", 5000),
                result: Ok(addr),
            },
            2,
        );
        assert_eq!(*sink.destinations.lock().unwrap(), vec![Some(addr)]);
    }

    #[tokio::test]
    async fn hostname_lookup_does_not_stall_dispatch() {
        let mut h = start(&Config::default());
        h.destination
            .send(Destination::new("tiltpad-receiver.invalid", 5000))
            .unwrap();
        h.events
            .send(SurfaceEvent::Button {
                id: InputId::BtnA,
                pressed: true,
            })
            .await
            .unwrap();

        let sent = tokio::time::timeout(Duration::from_millis(500), h.wire.recv())
            .await
            .expect("event not dispatched while lookup pending");
        assert_eq!(sent.as_deref(), Some("BTN_A:DOWN"));

        h.cancel.cancel();
        h.handle.join().await.unwrap();
    }
}
