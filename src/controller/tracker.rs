//! Edge detection for discrete controls.
//!
//! The tracker remembers the last reported state of every control and turns
//! repeated level reports into single press/release edges.

use crate::protocol::{Command, Edge, InputId};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeState {
    pub pressed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DigitalInputTracker {
    states: BTreeMap<InputId, EdgeState>,
}

impl DigitalInputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with every listed control registered as released.
    pub fn with_inputs(ids: &[InputId]) -> Self {
        let states = ids.iter().map(|id| (*id, EdgeState::default())).collect();
        Self { states }
    }

    /// Records the physical state of `id`.
    ///
    /// Returns the edge to emit when the state changed, `None` for a repeat.
    pub fn report(&mut self, id: InputId, physical_pressed: bool) -> Option<Command> {
        let state = self.states.entry(id).or_default();
        if state.pressed == physical_pressed {
            return None;
        }
        state.pressed = physical_pressed;
        let edge = Edge::from_pressed(physical_pressed);
        debug!("{} -> {:?}", id, edge);
        Some(Command::ButtonEdge(id, edge))
    }

    /// Releases every held control, in vocabulary order.
    pub fn release_all(&mut self) -> Vec<Command> {
        let mut released = Vec::new();
        for (id, state) in self.states.iter_mut() {
            if state.pressed {
                state.pressed = false;
                released.push(Command::up(*id));
            }
        }
        if !released.is_empty() {
            debug!("Force-released {} held controls", released.len());
        }
        released
    }

    pub fn is_pressed(&self, id: InputId) -> bool {
        self.states.get(&id).is_some_and(|state| state.pressed)
    }

    pub fn held(&self) -> impl Iterator<Item = InputId> + '_ {
        self.states
            .iter()
            .filter(|(_, state)| state.pressed)
            .map(|(id, _)| *id)
    }

    pub fn any_held(&self) -> bool {
        self.held().next().is_some()
    }
}
