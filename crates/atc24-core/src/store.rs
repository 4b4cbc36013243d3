//! Hub snapshot store.
//!
//! The store owns the single aggregate of latest-known state and is the
//! only thing allowed to mutate it. Every write replaces one whole field
//! (or pushes into one bounded log), so a reader never observes a field
//! half-written.

use crate::model::{ErrorRecord, RestResult, Snapshot, StreamEvent};

/// Trait for hub state storage implementations.
pub trait HubStore: Send + Sync {
    /// Consistent point-in-time copy of the aggregate.
    fn get(&self) -> Snapshot;

    /// Replace all four REST-sourced fields and `lastRestUpdate` together.
    fn apply_rest_result(&mut self, result: RestResult, at: &str);

    /// Apply one typed stream event, stamping `lastEventAt` with `at`.
    ///
    /// Unknown event types only update the timestamp.
    fn apply_stream_event(&mut self, event: StreamEvent, at: &str);

    /// Record the relay connection state. Connecting also stamps `lastEventAt`.
    fn set_stream_connected(&mut self, connected: bool, at: &str);

    /// Push a failure into the rolling error log.
    fn record_error(&mut self, scope: &str, message: &str, at: &str);
}

/// In-memory hub store.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the current aggregate without copying it.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl HubStore for SnapshotStore {
    fn get(&self) -> Snapshot {
        self.snapshot.clone()
    }

    fn apply_rest_result(&mut self, result: RestResult, at: &str) {
        let rest = &mut self.snapshot.rest;
        rest.aircraft_main = Some(result.aircraft_main);
        rest.aircraft_event = Some(result.aircraft_event);
        rest.controllers = Some(result.controllers);
        rest.atis = Some(result.atis);
        rest.last_rest_update = Some(at.to_string());
    }

    fn apply_stream_event(&mut self, event: StreamEvent, at: &str) {
        let stream = &mut self.snapshot.stream;
        stream.last_event_at = Some(at.to_string());

        match event {
            StreamEvent::AircraftData(data) => stream.aircraft_main = Some(data),
            StreamEvent::EventAircraftData(data) => stream.aircraft_event = Some(data),
            StreamEvent::Controllers(controllers) => stream.controllers = Some(controllers),
            StreamEvent::Atis(atis) => stream.atis = Some(atis),
            StreamEvent::FlightPlan(plan) => stream.flight_plans_main.push(plan),
            StreamEvent::EventFlightPlan(plan) => stream.flight_plans_event.push(plan),
            StreamEvent::Unknown(_) => {}
        }
    }

    fn set_stream_connected(&mut self, connected: bool, at: &str) {
        let stream = &mut self.snapshot.stream;
        stream.connected = connected;
        if connected {
            stream.last_event_at = Some(at.to_string());
        }
    }

    fn record_error(&mut self, scope: &str, message: &str, at: &str) {
        self.snapshot.errors.push(ErrorRecord {
            scope: scope.to_string(),
            at: at.to_string(),
            message: message.to_string(),
        });
    }
}
