//! Stream API: long-lived SSE relay of a run's events.
//!
//! The handler subscribes to the run's event-bus channel *before* checking
//! the run's persisted status, so a terminal event landing between the two
//! cannot be missed. Each bus event is relayed as one SSE `data:` frame in
//! publish order; the connection closes exactly once the terminal event has
//! been relayed. A listener attaching after the run is already terminal
//! gets one synthetic terminal event — the snapshot endpoint is the full
//! recovery path. Disconnecting never cancels the underlying pipeline.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use metrics::gauge;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument, warn};

use sift_core::events::RunEvent;
use sift_core::status::RunStatus;
use sift_runtime::bus::EventBus;

use crate::error::ApiError;
use crate::state::AppState;

/// Releases the run's channel (if idle) when the connection ends, however
/// it ends — graceful close or client disconnect.
struct StreamGuard {
    bus: Arc<EventBus>,
    run_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        gauge!("stream_connections_active").decrement(1.0);
        let _ = self.bus.release_if_idle(&self.run_id);
    }
}

fn sse_frame(event: &RunEvent) -> Result<Event, Infallible> {
    let frame = Event::default()
        .json_data(event)
        .unwrap_or_else(|_| Event::default().data("{}"));
    Ok(frame)
}

/// `GET /api/runs/{run_id}/events`
#[instrument(skip(state))]
pub async fn stream_run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe first: an event published between the status read and the
    // stream starting is then simply buffered in the receiver.
    let rx = state.bus.subscribe(&run_id);

    let run = match state.store.run(&run_id) {
        Ok(Some(run)) => run,
        Ok(None) => {
            drop(rx);
            let _ = state.bus.release_if_idle(&run_id);
            return Err(ApiError::NotFound("run"));
        }
        Err(error) => {
            drop(rx);
            let _ = state.bus.release_if_idle(&run_id);
            return Err(error.into());
        }
    };

    let already_terminal = run.status.is_terminal();
    let failed = run.status == RunStatus::Failed;
    gauge!("stream_connections_active").increment(1.0);
    let guard = StreamGuard {
        bus: Arc::clone(&state.bus),
        run_id: run_id.clone(),
    };
    debug!(already_terminal, "event stream attached");

    let stream = stream! {
        // Declared before the receiver so the receiver drops first and the
        // guard's idle check sees an accurate listener count.
        let _guard = guard;
        let mut rx = rx;

        if already_terminal {
            // Late attach: the terminal event was consumed before we
            // arrived. Emit one synthetic terminal frame and close.
            yield sse_frame(&RunEvent::finished(&run_id, failed));
        } else {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield sse_frame(&event);
                        if terminal {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // This listener fell behind; later events still
                        // arrive in order.
                        warn!(run_id = %run_id, skipped, "event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
