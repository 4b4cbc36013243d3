//! Upstream event-stream relay.
//!
//! Keeps one WebSocket connection to the upstream stream open forever.
//! The reconnect policy lives entirely in [`step`], a pure function from
//! `(state, signal)` to the next state plus the side effects to perform.
//! [`StreamRelay::run`] is the driver: it owns the signal channel, feeds
//! signals through `step` and performs the resulting actions.
//!
//! A handshake that outlasts the connect timeout, or a connected stream
//! that stays silent past the idle timeout, is reported as `Failed` and so
//! takes the same retry path as any other transport error.
//!
//! ```text
//!  Disconnected --Start/RetryDue--> Connecting --Opened--> Connected
//!       ^                               |                      |
//!       +----------- Failed ------------+                      |
//!       +---------------------- Closed/Failed -----------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use atc24_core::{scope, HubStore};
use atc24_protocol::{decode_envelope, decode_stream_event, frame_text, timestamp_now, Envelope};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::broadcaster::{EventBroadcaster, Frame};
use crate::hub::SharedStore;

/// Capacity of the driver's signal channel.
const SIGNAL_BUFFER: usize = 256;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection lifecycle input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Driver start-up.
    Start,
    /// Handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// A frame arrived that cannot be read as text.
    Undecodable(String),
    /// The peer closed the connection.
    Closed,
    /// Connecting or reading failed.
    Failed(String),
    /// The reconnect delay elapsed.
    RetryDue,
}

/// Side effects requested by a transition, performed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Open a new upstream connection.
    Connect,
    /// Set the store's connected flag and broadcast `WS_STATUS`.
    Announce(bool),
    /// Decode, apply and relay a frame.
    Ingest(String),
    RecordError {
        scope: &'static str,
        message: String,
    },
    /// Deliver `RetryDue` after the delay.
    ScheduleRetry(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: RelayState,
    pub actions: Vec<RelayAction>,
}

impl Transition {
    fn to(next: RelayState, actions: Vec<RelayAction>) -> Self {
        Self { next, actions }
    }

    fn stay(state: RelayState) -> Self {
        Self::to(state, Vec::new())
    }
}

/// The relay's reconnect policy.
///
/// Pairs not listed below leave the state unchanged with no actions.
pub fn step(state: RelayState, signal: ConnectionSignal, retry_delay: Duration) -> Transition {
    use ConnectionSignal as S;
    use RelayAction as A;
    use RelayState::*;

    match (state, signal) {
        (Disconnected, S::Start | S::RetryDue) => Transition::to(Connecting, vec![A::Connect]),

        (Connecting, S::Opened) => Transition::to(Connected, vec![A::Announce(true)]),

        (Connecting, S::Failed(message)) => Transition::to(
            Disconnected,
            vec![
                A::RecordError {
                    scope: scope::RELAY_CONNECT,
                    message,
                },
                A::Announce(false),
                A::ScheduleRetry(retry_delay),
            ],
        ),

        (Connected, S::Message(text)) => Transition::to(Connected, vec![A::Ingest(text)]),

        (Connected, S::Undecodable(message)) => Transition::to(
            Connected,
            vec![A::RecordError {
                scope: scope::RELAY_PARSE,
                message,
            }],
        ),

        (Connected, S::Closed) => Transition::to(
            Disconnected,
            vec![A::Announce(false), A::ScheduleRetry(retry_delay)],
        ),

        (Connected, S::Failed(message)) => Transition::to(
            Disconnected,
            vec![
                A::Announce(false),
                A::RecordError {
                    scope: scope::RELAY_TRANSPORT,
                    message,
                },
                A::ScheduleRetry(retry_delay),
            ],
        ),

        (state, _) => Transition::stay(state),
    }
}

/// Relay driver.
pub struct StreamRelay {
    url: String,
    retry_delay: Duration,
    connect_timeout: Duration,
    idle_timeout: Duration,
    store: SharedStore,
    broadcaster: Arc<EventBroadcaster>,
}

impl StreamRelay {
    pub fn new(
        url: impl Into<String>,
        retry_delay: Duration,
        store: SharedStore,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            url: url.into(),
            retry_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            store,
            broadcaster,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Any frame, pings included, resets the idle timer.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Drive the relay forever.
    pub async fn run(self) {
        let (tx, mut rx) = mpsc::channel(SIGNAL_BUFFER);
        let mut state = RelayState::Disconnected;
        let _ = tx.send(ConnectionSignal::Start).await;

        while let Some(signal) = rx.recv().await {
            let Transition { next, actions } = step(state, signal, self.retry_delay);
            if next != state {
                debug!("Relay {:?} -> {:?}", state, next);
            }
            state = next;

            for action in actions {
                self.perform(action, &tx).await;
            }
        }
    }

    async fn perform(&self, action: RelayAction, signals: &mpsc::Sender<ConnectionSignal>) {
        match action {
            RelayAction::Connect => {
                info!("Connecting to upstream stream: {}", self.url);
                tokio::spawn(run_connection(
                    self.url.clone(),
                    self.connect_timeout,
                    self.idle_timeout,
                    signals.clone(),
                ));
            }
            RelayAction::Announce(connected) => {
                let at = timestamp_now();
                self.store.write().await.set_stream_connected(connected, &at);
                self.broadcaster.broadcast(&Envelope::ws_status(connected, &at));
                if connected {
                    info!("Upstream stream connected");
                } else {
                    warn!("Upstream stream disconnected");
                }
            }
            RelayAction::Ingest(text) => self.ingest(text).await,
            RelayAction::RecordError { scope, message } => {
                warn!("{}: {}", scope, message);
                self.store
                    .write()
                    .await
                    .record_error(scope, &message, &timestamp_now());
            }
            RelayAction::ScheduleRetry(delay) => {
                debug!("Reconnecting in {:?}", delay);
                let signals = signals.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = signals.send(ConnectionSignal::RetryDue).await;
                });
            }
        }
    }

    /// Apply one upstream frame and relay it unchanged.
    async fn ingest(&self, text: String) {
        let decoded = decode_envelope(&text).and_then(|envelope| {
            let at = envelope.sent_at();
            decode_stream_event(envelope).map(|event| (event, at))
        });

        match decoded {
            Ok((event, at)) => {
                let at = at.unwrap_or_else(timestamp_now);
                let mut store = self.store.write().await;
                store.apply_stream_event(event, &at);
                let delivered = self.broadcaster.broadcast_frame(Frame::from(text));
                trace!(delivered, "stream event relayed");
            }
            Err(e) => {
                warn!("Dropping upstream frame: {}", e);
                self.store
                    .write()
                    .await
                    .record_error(scope::RELAY_PARSE, &e.to_string(), &timestamp_now());
            }
        }
    }
}

/// One connection attempt and its read loop, reported as signals.
///
/// Ends with exactly one `Failed` or `Closed`, or early if the driver is gone.
async fn run_connection(
    url: String,
    connect_timeout: Duration,
    idle_timeout: Duration,
    signals: mpsc::Sender<ConnectionSignal>,
) {
    let mut stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            let _ = signals.send(ConnectionSignal::Failed(e.to_string())).await;
            return;
        }
        Err(_) => {
            let message = format!("connect timed out after {:?}", connect_timeout);
            let _ = signals.send(ConnectionSignal::Failed(message)).await;
            return;
        }
    };

    if signals.send(ConnectionSignal::Opened).await.is_err() {
        return;
    }

    loop {
        let next = match timeout(idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                let message = format!("no frames for {:?}", idle_timeout);
                let _ = signals.send(ConnectionSignal::Failed(message)).await;
                return;
            }
        };

        let signal = match next {
            Some(Ok(Message::Text(text))) => ConnectionSignal::Message(text),
            Some(Ok(Message::Binary(bytes))) => match frame_text(bytes) {
                Ok(text) => ConnectionSignal::Message(text),
                Err(e) => ConnectionSignal::Undecodable(e.to_string()),
            },
            Some(Ok(Message::Close(frame))) => {
                debug!("Upstream sent close: {:?}", frame);
                ConnectionSignal::Closed
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => ConnectionSignal::Failed(e.to_string()),
            None => ConnectionSignal::Closed,
        };

        let terminal = matches!(signal, ConnectionSignal::Closed | ConnectionSignal::Failed(_));
        if signals.send(signal).await.is_err() || terminal {
            return;
        }
    }
}
