//! In-memory upstream for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use atc24_core::{AircraftMap, AtisRecord, Controller};
use reqwest::StatusCode;

use crate::upstream::{UpstreamApi, UpstreamError};

pub fn controller(airport: &str, position: &str, holder: Option<&str>) -> Controller {
    Controller {
        airport: airport.to_string(),
        position: position.to_string(),
        holder: holder.map(str::to_string),
        queue: Vec::new(),
    }
}

fn unavailable(path: &str) -> UpstreamError {
    UpstreamError::Status {
        path: path.to_string(),
        status: StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Default)]
pub struct MockUpstream {
    controllers: Mutex<Vec<Controller>>,
    fail_aircraft_main: AtomicBool,
    fail_atis: AtomicBool,
    fail_lookup: AtomicBool,
    lookup_answer: AtomicBool,
    rest_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    fetch_delay: Mutex<Duration>,
}

impl MockUpstream {
    pub fn set_controllers(&self, controllers: Vec<Controller>) {
        *self.controllers.lock().unwrap() = controllers;
    }

    pub fn fail_aircraft_main(&self, fail: bool) {
        self.fail_aircraft_main.store(fail, Ordering::SeqCst);
    }

    pub fn fail_atis(&self, fail: bool) {
        self.fail_atis.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn set_lookup_answer(&self, answer: bool) {
        self.lookup_answer.store(answer, Ordering::SeqCst);
    }

    /// Make every aircraft fetch take `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    /// Number of poll ticks that reached the upstream.
    pub fn rest_calls(&self) -> usize {
        self.rest_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamApi for MockUpstream {
    async fn aircraft_main(&self) -> Result<AircraftMap, UpstreamError> {
        self.rest_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_aircraft_main.load(Ordering::SeqCst) {
            return Err(unavailable("/acft-data"));
        }
        let mut map = AircraftMap::new();
        map.insert("UAL123".to_string(), serde_json::json!({ "altitude": 3000 }));
        Ok(map)
    }

    async fn aircraft_event(&self) -> Result<AircraftMap, UpstreamError> {
        Ok(AircraftMap::new())
    }

    async fn controllers(&self) -> Result<Vec<Controller>, UpstreamError> {
        Ok(self.controllers.lock().unwrap().clone())
    }

    async fn atis(&self) -> Result<Vec<AtisRecord>, UpstreamError> {
        if self.fail_atis.load(Ordering::SeqCst) {
            return Err(unavailable("/atis"));
        }
        Ok(Vec::new())
    }

    async fn is_controller(&self, identity: &str) -> Result<bool, UpstreamError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(unavailable(&format!("/is-controller/{identity}")));
        }
        Ok(self.lookup_answer.load(Ordering::SeqCst))
    }
}
