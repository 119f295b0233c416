//! Error types for the wire codec.

/// Errors raised while decoding framed event text.
///
/// Encoding never fails; only text coming back from a peer (or a test)
/// can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A frame carried data lines but no `event:` field.
    #[error("frame has no event type")]
    MissingEventType,

    /// The `event:` field named a type this codec does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A line did not follow the `field: value` shape.
    #[error("malformed frame line: {0}")]
    MalformedLine(String),

    /// The `retry:` field was not a whole number of milliseconds.
    #[error("invalid retry value: {0}")]
    InvalidRetry(String),
}
