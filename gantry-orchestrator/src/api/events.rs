//! Event stream
//!
//! `GET /events` streams lifecycle events as server-sent events. A client
//! that falls behind the bus skips the events it missed.

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

/// GET /events
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    tracing::debug!("Event stream subscriber connected");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|item| async move {
        match item {
            Ok(event) => SseEvent::default()
                .event(event.name())
                .json_data(&event)
                .ok()
                .map(Ok),
            Err(lagged) => {
                tracing::warn!("Event stream subscriber lagged: {}", lagged);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
