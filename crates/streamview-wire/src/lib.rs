//! Wire codec for Streamview live sessions.
//!
//! Everything the server says to a browser travels as a sequence of framed
//! events on a `text/event-stream` body:
//!
//! ```text
//! event: datastar-patch-signals
//! data: signals {"count":6}
//!
//! event: datastar-patch-elements
//! data: selector #count
//! data: mode outer
//! data: elements <span id="count">6</span>
//!
//! ```
//!
//! - [`encode_flush`] turns one flush (signals + queued [`Effect`]s) into
//!   [`WireEvent`]s, preserving effect order.
//! - [`WireEvent::encode`] / [`WireEvent::decode`] handle single frames.
//! - [`decode_signals`] reads the client-submitted signal snapshot from a
//!   query parameter or request body, leniently.

pub mod decode;
pub mod effect;
pub mod error;
pub mod event;
pub mod flush;

/// Client-visible state as mirrored to and from the browser.
pub type Signals = serde_json::Map<String, serde_json::Value>;

pub use decode::{decode_body, decode_query, decode_signals, SignalSource, DEFAULT_SIGNALS_KEY};
pub use effect::{escape_attr, Effect, ScriptOptions};
pub use error::WireError;
pub use event::{decode_stream, keepalive_frame, signals_of, EventType, WireEvent};
pub use flush::{encode_flush, render_events};
