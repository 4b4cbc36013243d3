//! Cached controller lookups.
//!
//! Answers "is this identity a controller?" from a TTL cache, falling
//! through to the upstream on a miss. Only successful answers are cached.
//! Concurrent misses for the same identity may both reach the upstream;
//! last write wins.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use atc24_core::{scope, HubStore, TtlCache};
use atc24_protocol::timestamp_now;
use thiserror::Error;
use tracing::{debug, warn};

use crate::hub::SharedStore;
use crate::upstream::{UpstreamApi, UpstreamError};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Missing identity")]
    MissingIdentity,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// A lookup answer and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOutcome {
    pub is_controller: bool,
    pub from_cache: bool,
}

pub struct ControllerLookupService {
    upstream: Arc<dyn UpstreamApi>,
    store: SharedStore,
    cache: Mutex<TtlCache<String, bool>>,
}

impl ControllerLookupService {
    pub fn new(upstream: Arc<dyn UpstreamApi>, store: SharedStore, ttl: Duration) -> Self {
        Self {
            upstream,
            store,
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub async fn is_controller(&self, identity: &str) -> Result<LookupOutcome, LookupError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(LookupError::MissingIdentity);
        }

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity, now())
            .copied();
        if let Some(is_controller) = cached {
            debug!(identity, is_controller, "controller lookup served from cache");
            return Ok(LookupOutcome {
                is_controller,
                from_cache: true,
            });
        }

        match self.upstream.is_controller(identity).await {
            Ok(is_controller) => {
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(identity.to_string(), is_controller, now());
                Ok(LookupOutcome {
                    is_controller,
                    from_cache: false,
                })
            }
            Err(e) => {
                warn!("Controller lookup for {} failed: {}", identity, e);
                self.store.write().await.record_error(
                    scope::CONTROLLER_LOOKUP,
                    &e.to_string(),
                    &timestamp_now(),
                );
                Err(e.into())
            }
        }
    }
}

// Tokio's clock, so paused-time tests can expire entries.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
