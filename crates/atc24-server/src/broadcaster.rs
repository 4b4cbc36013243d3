//! Subscriber fan-out.
//!
//! Each subscriber owns the receiving half of a bounded queue; the
//! broadcaster keeps the sending halves in a set keyed by subscriber id.
//! Broadcasting serializes an envelope once and offers the same frame to
//! every sink:
//! - a closed sink (subscriber went away) is removed, and only that sink
//! - a full sink (subscriber too slow) misses this frame but stays registered
//!
//! Nothing a single subscriber does can fail a broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, trace};
use uuid::Uuid;

use atc24_protocol::{encode_envelope, timestamp_now, CodecError, Envelope};

/// One serialized envelope, shared between all subscriber queues.
pub type Frame = Arc<str>;

/// Opaque subscriber handle id.
pub type SubscriberId = Uuid;

/// Live subscriber set.
pub struct EventBroadcaster {
    sinks: Mutex<HashMap<SubscriberId, mpsc::Sender<Frame>>>,
    /// Per-subscriber queue capacity.
    buffer: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster whose subscribers each queue up to `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            sinks: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    fn sinks(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Frame>>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber whose first frame is `hello`.
    ///
    /// The hello frame is queued before the sink joins the set, so no
    /// broadcast can overtake it.
    pub fn subscribe<D: Serialize>(
        self: &Arc<Self>,
        hello: &Envelope<D>,
    ) -> Result<Subscription, CodecError> {
        let frame: Frame = encode_envelope(hello)?.into();
        let (tx, rx) = mpsc::channel(self.buffer);
        // Fresh queue with capacity >= 1 always accepts the first frame
        let _ = tx.try_send(frame);

        let id = Uuid::new_v4();
        let total = {
            let mut sinks = self.sinks();
            sinks.insert(id, tx);
            sinks.len()
        };
        debug!(subscriber = %id, total, "subscriber registered");

        Ok(Subscription {
            id,
            rx,
            broadcaster: Arc::clone(self),
        })
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.sinks().remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    /// Serialize `envelope` once and push it to every subscriber.
    ///
    /// Returns the number of subscribers the frame was queued for.
    pub fn broadcast<D: Serialize>(&self, envelope: &Envelope<D>) -> usize {
        match encode_envelope(envelope) {
            Ok(text) => self.broadcast_frame(text.into()),
            Err(e) => {
                error!("Failed to encode {} envelope: {}", envelope.t, e);
                0
            }
        }
    }

    /// Push an already-serialized frame to every subscriber.
    pub fn broadcast_frame(&self, frame: Frame) -> usize {
        let mut delivered = 0;
        self.sinks().retain(|id, sink| match sink.try_send(Arc::clone(&frame)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                trace!(subscriber = %id, "subscriber lagging, frame dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "subscriber gone, removing");
                false
            }
        });
        delivered
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sinks().len()
    }

    /// Broadcast a `HEARTBEAT` every `interval`, forever.
    pub async fn run_heartbeat(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let delivered = self.broadcast(&Envelope::heartbeat(&timestamp_now()));
            trace!(delivered, "heartbeat");
        }
    }
}

/// A registered subscriber's receiving end.
///
/// Dropping it unsubscribes, so a subscriber task that ends for any reason
/// cleans up after itself.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Frame>,
    broadcaster: Arc<EventBroadcaster>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next frame, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Adapt into a stream of frames. The subscription lives as long as the stream.
    pub fn into_stream(self) -> impl Stream<Item = Frame> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .rx
                .recv()
                .await
                .map(|frame| (frame, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
