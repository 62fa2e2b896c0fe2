//! Professor monitoring feed (Server-Sent Events)
//!
//! One firehose stream of ledger and grading events across all
//! sessions. Delivery is lossy by design: a slow consumer that falls
//! behind the broadcast buffer misses events rather than backpressuring
//! the proctoring write path.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use proctor_common::models::role;

use crate::api::auth::Identity;
use crate::state::AppContext;
use crate::Result;

/// GET /api/v1/proctoring/events
pub async fn event_stream(
    State(ctx): State<AppContext>,
    identity: Identity,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    identity.require_role(role::PROFESSOR)?;

    info!(
        user_id = %identity.user_id,
        subscribers = ctx.bus.subscriber_count() + 1,
        "monitor stream connected"
    );

    let rx = ctx.bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default().event("proctor").json_data(&event).ok().map(Ok),
            Err(e) => {
                // Lagged consumer: skipped events are acceptable here
                warn!("monitor stream lagged: {e:?}");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}
