//! Fixed-interval REST poller.
//!
//! Every tick fetches the four REST resources concurrently. A tick is
//! all-or-nothing: either all four results land in the store together (and
//! a `REST_SNAPSHOT` goes out), or nothing is applied and the failure is
//! recorded under `rest-poll`. The interval itself is the retry policy.
//!
//! Each tick runs on its own task so a slow upstream never delays the next
//! tick. Overlapping ticks are harmless because applies are whole-field
//! replacements.

use std::sync::Arc;
use std::time::Duration;

use atc24_core::{scope, HubStore, RestResult};
use atc24_protocol::{timestamp_now, Envelope};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::broadcaster::EventBroadcaster;
use crate::hub::SharedStore;
use crate::upstream::{UpstreamApi, UpstreamError};

pub struct UpstreamPoller {
    upstream: Arc<dyn UpstreamApi>,
    store: SharedStore,
    broadcaster: Arc<EventBroadcaster>,
    interval: Duration,
}

impl UpstreamPoller {
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        store: SharedStore,
        broadcaster: Arc<EventBroadcaster>,
        interval: Duration,
    ) -> Self {
        Self {
            upstream,
            store,
            broadcaster,
            interval,
        }
    }

    /// Poll forever. The first tick fires immediately.
    pub async fn run(self: Arc<Self>) {
        info!("REST poller started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let poller = Arc::clone(&self);
            tokio::spawn(async move {
                let _ = poller.poll_once().await;
            });
        }
    }

    /// Run a single tick.
    pub async fn poll_once(&self) -> Result<(), UpstreamError> {
        match self.fetch_all().await {
            Ok(result) => {
                let at = timestamp_now();
                let mut store = self.store.write().await;
                store.apply_rest_result(result, &at);
                let delivered = self
                    .broadcaster
                    .broadcast(&Envelope::rest_snapshot(store.snapshot(), &at));
                debug!(delivered, "REST snapshot applied");
                Ok(())
            }
            Err(e) => {
                warn!("REST poll failed: {}", e);
                self.store
                    .write()
                    .await
                    .record_error(scope::REST_POLL, &e.to_string(), &timestamp_now());
                Err(e)
            }
        }
    }

    async fn fetch_all(&self) -> Result<RestResult, UpstreamError> {
        let (aircraft_main, aircraft_event, controllers, atis) = tokio::try_join!(
            self.upstream.aircraft_main(),
            self.upstream.aircraft_event(),
            self.upstream.controllers(),
            self.upstream.atis(),
        )?;

        Ok(RestResult {
            aircraft_main,
            aircraft_event,
            controllers,
            atis,
        })
    }
}
