//! Hub context.
//!
//! `Hub` owns the shared store, the broadcaster and the lookup service, and
//! builds the background tasks (poller, relay, heartbeat) that feed them.
//! Request handlers only ever see a `Hub`.

use std::sync::Arc;
use std::time::Duration;

use atc24_core::{HubStore, Snapshot, SnapshotStore};
use atc24_protocol::{timestamp_now, CodecError, Envelope};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use crate::broadcaster::{EventBroadcaster, Subscription};
use crate::lookup::{ControllerLookupService, LookupError, LookupOutcome};
use crate::poller::UpstreamPoller;
use crate::relay::StreamRelay;
use crate::upstream::{HttpUpstream, UpstreamApi, UpstreamError};

/// The store as shared between tasks.
pub type SharedStore = Arc<RwLock<SnapshotStore>>;

/// Hub runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Base URL of the upstream REST API.
    pub upstream_url: String,
    /// URL of the upstream event stream.
    pub stream_url: String,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    /// How long a controller lookup answer stays cached.
    pub lookup_ttl: Duration,
    /// Per-subscriber queue capacity.
    pub subscriber_buffer: usize,
    /// Timeout for each upstream HTTP request.
    pub request_timeout: Duration,
    /// Limit on the stream handshake.
    pub connect_timeout: Duration,
    /// A connected stream silent for this long is treated as dead.
    pub stream_idle_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://24data.ptfs.app".to_string(),
            stream_url: "wss://24data.ptfs.app/wss".to_string(),
            poll_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(6),
            lookup_ttl: Duration::from_secs(30),
            subscriber_buffer: 256,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

pub struct Hub {
    config: HubConfig,
    store: SharedStore,
    broadcaster: Arc<EventBroadcaster>,
    upstream: Arc<dyn UpstreamApi>,
    lookup: ControllerLookupService,
}

impl Hub {
    pub fn new(config: HubConfig, upstream: Arc<dyn UpstreamApi>) -> Self {
        let store: SharedStore = Arc::new(RwLock::new(SnapshotStore::new()));
        let broadcaster = Arc::new(EventBroadcaster::new(config.subscriber_buffer));
        let lookup = ControllerLookupService::new(upstream.clone(), store.clone(), config.lookup_ttl);

        Self {
            config,
            store,
            broadcaster,
            upstream,
            lookup,
        }
    }

    /// Build a hub talking to the configured upstream over HTTP.
    pub fn with_http_upstream(config: HubConfig) -> Result<Self, UpstreamError> {
        let upstream = HttpUpstream::new(&config.upstream_url, config.request_timeout)?;
        Ok(Self::new(config, Arc::new(upstream)))
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Copy of the current aggregate.
    pub async fn snapshot(&self) -> Snapshot {
        self.store.read().await.get()
    }

    /// Register a subscriber. Its first frame is a `HELLO` carrying the
    /// snapshot as of now.
    pub async fn subscribe(&self) -> Result<Subscription, CodecError> {
        // Holding the read lock keeps writers (and their broadcasts) out
        // until the subscriber is registered.
        let store = self.store.read().await;
        let hello = Envelope::hello(store.snapshot(), &timestamp_now());
        let subscription = self.broadcaster.subscribe(&hello)?;
        info!(
            subscribers = self.broadcaster.subscriber_count(),
            "subscriber connected"
        );
        Ok(subscription)
    }

    pub async fn is_controller(&self, identity: &str) -> Result<LookupOutcome, LookupError> {
        self.lookup.is_controller(identity).await
    }

    pub fn poller(&self) -> UpstreamPoller {
        UpstreamPoller::new(
            self.upstream.clone(),
            self.store.clone(),
            self.broadcaster.clone(),
            self.config.poll_interval,
        )
    }

    pub fn relay(&self) -> StreamRelay {
        StreamRelay::new(
            self.config.stream_url.clone(),
            self.config.reconnect_delay,
            self.store.clone(),
            self.broadcaster.clone(),
        )
        .with_connect_timeout(self.config.connect_timeout)
        .with_idle_timeout(self.config.stream_idle_timeout)
    }

    /// Spawn the poller, relay and heartbeat onto the current runtime.
    pub fn spawn_background(&self) -> HubTasks {
        HubTasks {
            poller: tokio::spawn(Arc::new(self.poller()).run()),
            relay: tokio::spawn(self.relay().run()),
            heartbeat: tokio::spawn(
                self.broadcaster
                    .clone()
                    .run_heartbeat(self.config.heartbeat_interval),
            ),
        }
    }
}

/// Handles to the hub's background tasks. None of them return normally.
pub struct HubTasks {
    pub poller: JoinHandle<()>,
    pub relay: JoinHandle<()>,
    pub heartbeat: JoinHandle<()>,
}

impl HubTasks {
    pub fn abort_all(&self) {
        self.poller.abort();
        self.relay.abort();
        self.heartbeat.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{controller, MockUpstream};

    fn hub(upstream: Arc<MockUpstream>) -> Hub {
        Hub::new(HubConfig::default(), upstream)
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(6));
        assert_eq!(config.lookup_ttl, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_hello_carries_current_snapshot() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.set_controllers(vec![controller("KJFK", "TWR", Some("alice"))]);
        let hub = hub(upstream);
        hub.poller().poll_once().await.unwrap();

        let mut sub = hub.subscribe().await.unwrap();
        let hello: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();

        assert_eq!(hello["t"], "HELLO");
        assert_eq!(hello["d"]["rest"]["controllers"][0]["holder"], "alice");
        assert_eq!(hello["d"], serde_json::to_value(hub.snapshot().await).unwrap());
    }

    #[tokio::test]
    async fn test_subscribers_see_poll_results() {
        let hub = hub(Arc::new(MockUpstream::default()));
        let mut sub = hub.subscribe().await.unwrap();
        sub.recv().await;

        hub.poller().poll_once().await.unwrap();
        let frame: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();
        assert_eq!(frame["t"], "REST_SNAPSHOT");
        assert_eq!(frame["d"]["rest"]["acftMain"]["UAL123"]["altitude"], 3000);
    }

    #[tokio::test]
    async fn test_lookup_goes_through_hub() {
        let upstream = Arc::new(MockUpstream::default());
        upstream.set_lookup_answer(true);
        let hub = hub(upstream);

        let outcome = hub.is_controller("12345").await.unwrap();
        assert!(outcome.is_controller);
        assert!(!outcome.from_cache);
        assert!(hub.is_controller("12345").await.unwrap().from_cache);
    }
}
