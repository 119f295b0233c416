//! Decoding client-submitted signals.
//!
//! Browsers send their current signals with every event: as a JSON-encoded
//! query parameter on reads (`GET`), or as the request body otherwise. The
//! payload is untrusted and decoding is lenient: anything that is not a JSON
//! object becomes an empty map instead of failing the request.

use serde_json::Value;
use tracing::debug;

use crate::Signals;

/// Query parameter (and body key) carrying the signal snapshot.
pub const DEFAULT_SIGNALS_KEY: &str = "datastar";

/// Where a request carries its signals.
#[derive(Debug, Clone, Copy)]
pub enum SignalSource<'a> {
    /// The raw (already percent-decoded) value of the signals query
    /// parameter, if present.
    Query(Option<&'a str>),
    /// The raw request body.
    Body(&'a [u8]),
}

/// Decode a signal snapshot.
///
/// Bodies may wrap the object under `key` or carry the fields at top level;
/// the wrapped form wins when `key` holds an object.
pub fn decode_signals(source: SignalSource<'_>, key: &str) -> Signals {
    match source {
        SignalSource::Query(None) => Signals::new(),
        SignalSource::Query(Some(raw)) => parse_object(raw.as_bytes()),
        SignalSource::Body(bytes) => {
            let mut map = parse_object(bytes);
            match map.remove(key) {
                Some(Value::Object(inner)) => inner,
                Some(other) => {
                    map.insert(key.to_owned(), other);
                    map
                }
                None => map,
            }
        }
    }
}

/// Decode the signals query parameter of a `GET` submission.
pub fn decode_query(query: Option<&str>, key: &str) -> Signals {
    decode_signals(SignalSource::Query(query), key)
}

/// Decode the body of a non-`GET` submission.
pub fn decode_body(body: &[u8], key: &str) -> Signals {
    decode_signals(SignalSource::Body(body), key)
}

fn parse_object(bytes: &[u8]) -> Signals {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Signals::new();
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!(kind = json_kind(&other), "signals payload is not an object, ignoring");
            Signals::new()
        }
        Err(e) => {
            debug!(error = %e, "malformed signals payload, ignoring");
            Signals::new()
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
