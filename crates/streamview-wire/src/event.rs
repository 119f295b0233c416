//! Framed wire events.
//!
//! A frame is `event: <type>`, optional `id:` and `retry:` fields, one
//! `data:` line per payload line, and a terminating blank line. Lines that
//! start with `:` are comments (used for keepalives) and carry no event.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WireError;
use crate::Signals;

/// Prefix of the data line carrying a JSON signal patch.
pub(crate) const SIGNALS_PREFIX: &str = "signals ";

/// The kind of a framed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Morph or append markup into the document.
    PatchElements,
    /// Merge a JSON object into the client's signals.
    PatchSignals,
    /// Run a script in the page.
    ///
    /// [`encode_flush`](crate::encode_flush) never emits this type: scripts
    /// travel as appended `<script>` elements. It is accepted on decode for
    /// clients that send it natively.
    ExecuteScript,
}

impl EventType {
    /// The `event:` field value written on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PatchElements => "datastar-patch-elements",
            Self::PatchSignals => "datastar-patch-signals",
            Self::ExecuteScript => "datastar-execute-script",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix("datastar-").unwrap_or(s);
        match bare {
            "patch-elements" => Ok(Self::PatchElements),
            "patch-signals" => Ok(Self::PatchSignals),
            "execute-script" => Ok(Self::ExecuteScript),
            _ => Err(WireError::UnknownEventType(s.to_owned())),
        }
    }
}

/// One framed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    /// Event kind.
    pub event_type: EventType,
    /// Data lines in order. None of them may contain a newline.
    pub lines: Vec<String>,
    /// Optional event id (`id:` field).
    pub id: Option<String>,
    /// Optional reconnect delay hint (`retry:` field).
    pub retry: Option<Duration>,
}

impl WireEvent {
    /// Create an event with the given data lines and no id or retry.
    pub const fn new(event_type: EventType, lines: Vec<String>) -> Self {
        Self {
            event_type,
            lines,
            id: None,
            retry: None,
        }
    }

    /// Set the event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the reconnect delay hint.
    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Serialize this event as one `text/event-stream` frame.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push_str("event: ");
        out.push_str(self.event_type.as_str());
        out.push('\n');
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(retry) = self.retry {
            out.push_str("retry: ");
            out.push_str(&retry.as_millis().to_string());
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    /// Parse a single frame.
    ///
    /// Comment lines and blank lines are skipped, so a frame preceded by a
    /// keepalive still parses.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if a line is malformed, the event type is
    /// missing or unknown, or `retry` is not a number.
    pub fn decode(frame: &str) -> Result<Self, WireError> {
        let mut event_type = None;
        let mut lines = Vec::new();
        let mut id = None;
        let mut retry = None;

        for raw in frame.lines() {
            if raw.is_empty() || raw.starts_with(':') {
                continue;
            }
            let (field, value) = raw
                .split_once(':')
                .ok_or_else(|| WireError::MalformedLine(raw.to_owned()))?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event_type = Some(value.parse::<EventType>()?),
                "data" => lines.push(value.to_owned()),
                "id" => id = Some(value.to_owned()),
                "retry" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|e| WireError::InvalidRetry(format!("{value}: {e}")))?;
                    retry = Some(Duration::from_millis(millis));
                }
                _ => return Err(WireError::MalformedLine(raw.to_owned())),
            }
        }

        Ok(Self {
            event_type: event_type.ok_or(WireError::MissingEventType)?,
            lines,
            id,
            retry,
        })
    }
}

/// Parse a whole stream body into events, skipping comment-only frames.
///
/// # Errors
///
/// Returns the first [`WireError`] hit by any frame.
pub fn decode_stream(text: &str) -> Result<Vec<WireEvent>, WireError> {
    text.split("\n\n")
        .filter(|block| {
            block
                .lines()
                .any(|line| !line.is_empty() && !line.starts_with(':'))
        })
        .map(WireEvent::decode)
        .collect()
}

/// Extract the signal object carried by a `patch-signals` event.
///
/// Returns `None` for other event types or when the payload is not a JSON
/// object.
pub fn signals_of(event: &WireEvent) -> Option<Signals> {
    if event.event_type != EventType::PatchSignals {
        return None;
    }
    let json = event
        .lines
        .iter()
        .filter_map(|line| line.strip_prefix(SIGNALS_PREFIX))
        .collect::<Vec<_>>()
        .join("\n");
    match serde_json::from_str(&json) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The comment frame written when a stream has been idle.
pub const fn keepalive_frame() -> &'static str {
    ": keepalive\n\n"
}
