//! The stream pump: relays actor flushes onto a `text/event-stream` body.
//!
//! The pump owns the [`Attachment`]. When the browser goes away, hyper drops
//! the body, the pump is dropped with it, and the attachment's drop guard
//! tells the actor the stream is gone.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use streamview_core::{Attachment, PumpMessage};
use streamview_wire::{keepalive_frame, render_events};
use tracing::debug;

/// Content type of every live response body.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Frames for one attachment, ending when the actor says so or goes away.
///
/// After `keepalive` without a flush a comment frame is emitted so proxies
/// keep the connection open.
pub fn event_stream(
    mut attachment: Attachment,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        debug!(session_id = %attachment.session_id(), attachment = attachment.id(), "stream pump started");
        loop {
            match tokio::time::timeout(keepalive, attachment.recv()).await {
                Ok(Some(PumpMessage::Flush(events))) => {
                    yield Ok::<_, Infallible>(Bytes::from(render_events(&events)));
                }
                Ok(Some(PumpMessage::End)) => {
                    debug!(session_id = %attachment.session_id(), attachment = attachment.id(), "stream ended by session");
                    break;
                }
                Ok(None) => {
                    debug!(session_id = %attachment.session_id(), attachment = attachment.id(), "session gone, closing stream");
                    break;
                }
                Err(_elapsed) => {
                    yield Ok::<_, Infallible>(Bytes::from_static(keepalive_frame().as_bytes()));
                }
            }
        }
    }
}

/// Wrap a frame stream in a response with event-stream headers.
pub fn stream_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    (event_stream_headers(), Body::from_stream(stream)).into_response()
}

/// A complete event-stream body, as returned by transient events.
pub fn events_response(body: String) -> Response {
    (event_stream_headers(), body).into_response()
}

const fn event_stream_headers() -> [(header::HeaderName, &'static str); 3] {
    [
        (header::CONTENT_TYPE, EVENT_STREAM),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
    ]
}
