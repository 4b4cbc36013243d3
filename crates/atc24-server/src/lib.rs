//! # atc24-server
//!
//! The ATC24 hub runtime on tokio:
//! - `poller` - fixed-interval REST polling of the upstream API
//! - `relay` - persistent upstream stream connection with reconnect
//! - `broadcaster` - fan-out to live subscribers, plus the heartbeat
//! - `lookup` - cached controller lookups
//! - `hub` - the context object wiring all of the above together

pub mod broadcaster;
pub mod hub;
pub mod lookup;
pub mod poller;
pub mod relay;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use atc24_core::{HubStore, Snapshot, SnapshotStore};
pub use broadcaster::{EventBroadcaster, Frame, SubscriberId, Subscription};
pub use hub::{Hub, HubConfig, HubTasks, SharedStore};
pub use lookup::{ControllerLookupService, LookupError, LookupOutcome};
pub use poller::UpstreamPoller;
pub use relay::{ConnectionSignal, RelayAction, RelayState, StreamRelay, Transition};
pub use upstream::{HttpUpstream, UpstreamApi, UpstreamError};
