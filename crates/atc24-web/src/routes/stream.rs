//! Server-Sent Events stream.
//!
//! ### `GET /api/stream`
//! One `data: <envelope>` message per frame, `HELLO` first. The
//! subscription is dropped, and so unsubscribed, when the client goes away.

use std::convert::Infallible;

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};

use atc24_server::Frame;

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/stream", get(stream_handler))
}

async fn stream_handler(State(hub): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let subscription = hub.subscribe().await?;
    let events = subscription
        .into_stream()
        .map(|frame| Ok::<_, Infallible>(frame_event(&frame)));

    Ok((
        [(header::CACHE_CONTROL, "no-cache, no-transform")],
        Sse::new(events),
    ))
}

/// SSE cannot carry carriage returns; JSON never needs them.
fn frame_event(frame: &Frame) -> Event {
    if frame.contains('\r') {
        Event::default().data(frame.replace('\r', ""))
    } else {
        Event::default().data(&**frame)
    }
}
