//! The reactive state container threaded through every handler.
//!
//! A [`Socket`] holds two disjoint maps:
//!
//! - **assigns**: owner fields, visible to rendering, never sent to the
//!   browser;
//! - **signals**: client fields, mirrored to the browser as JSON.
//!
//! plus the queue of pending [`Effect`]s. Handlers receive the socket by
//! value and hand it back inside an [`Outcome`](crate::view::Outcome), so a
//! handling cycle is a replacement, never a shared mutation.
//!
//! Session id, paths, and flash are reserved owner fields kept as typed
//! members; their names can be neither assigned nor published.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use streamview_wire::{Effect, ScriptOptions, Signals};

use crate::session::SessionId;

/// Owner-field names maintained by the engine itself.
pub const RESERVED_FIELDS: [&str; 5] = [
    "session_id",
    "base_path",
    "stream_path",
    "event_path",
    "flash",
];

/// Path segment for event submission.
pub const EVENT_SEGMENT: &str = "_event";

/// Path segment for the live stream.
pub const STREAM_SEGMENT: &str = "stream";

/// Whether `name` is reserved for engine-maintained fields.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Errors raised by socket mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    /// The field name belongs to engine-maintained state.
    #[error("field name `{0}` is reserved")]
    ReservedName(String),
}

/// The URL paths of one mounted view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Where the view is mounted (initial load).
    pub base: String,
    /// Prefix for event submission; the event name is appended.
    pub event: String,
    /// Stream endpoint, present only for persistent views.
    pub stream: Option<String>,
}

impl Paths {
    /// Derive the sub-paths of a view mounted at `base`.
    pub fn new(base: &str, live: bool) -> Self {
        Self {
            base: base.to_owned(),
            event: join_path(base, EVENT_SEGMENT),
            stream: live.then(|| join_path(base, STREAM_SEGMENT)),
        }
    }

    /// Path for submitting `event`.
    pub fn event_url(&self, event: &str) -> String {
        join_path(&self.event, event)
    }

    /// The concrete paths for one request to a templated base.
    ///
    /// Each `{name}` (or `{*name}`) segment of the base is replaced by
    /// `lookup(name)`. Segments without a value are kept as written.
    pub fn resolve<'a, F>(&self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let base = self
            .base
            .split('/')
            .map(|segment| {
                segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .and_then(|name| lookup(name.trim_start_matches('*')))
                    .map_or_else(|| segment.to_owned(), str::to_owned)
            })
            .collect::<Vec<_>>()
            .join("/");
        Self::new(&base, self.stream.is_some())
    }
}

/// Append `segment` to `base` without doubling the separator.
///
/// `join_path("/", "_event")` is `/_event`, not `//_event`.
pub fn join_path(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    format!("{base}/{segment}")
}

/// Per-session reactive state.
#[derive(Debug, Clone)]
pub struct Socket {
    session_id: SessionId,
    paths: Paths,
    flash: BTreeMap<String, String>,
    assigns: BTreeMap<String, Value>,
    signals: Signals,
    published: BTreeSet<String>,
    effects: Vec<Effect>,
}

impl Socket {
    /// Create an empty socket for a session.
    pub fn new(session_id: SessionId, paths: Paths) -> Self {
        Self {
            session_id,
            paths,
            flash: BTreeMap::new(),
            assigns: BTreeMap::new(),
            signals: Signals::new(),
            published: BTreeSet::new(),
            effects: Vec::new(),
        }
    }

    /// The session this socket belongs to.
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The view's paths.
    pub const fn paths(&self) -> &Paths {
        &self.paths
    }

    // -- owner fields -------------------------------------------------------

    /// Set an owner field.
    pub fn assign(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SocketError> {
        reject_reserved(key)?;
        self.assigns.insert(key.to_owned(), value.into());
        Ok(())
    }

    /// Read an owner field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// All owner fields.
    pub const fn assigns(&self) -> &BTreeMap<String, Value> {
        &self.assigns
    }

    /// Record a flash notice of the given kind (e.g. `info`, `error`).
    pub fn put_flash(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.flash.insert(kind.into(), message.into());
    }

    /// Drop all flash notices.
    pub fn clear_flash(&mut self) {
        self.flash.clear();
    }

    /// Current flash notices.
    pub const fn flash(&self) -> &BTreeMap<String, String> {
        &self.flash
    }

    // -- client fields ------------------------------------------------------

    /// Publish a client field.
    ///
    /// Publishing always marks the field as changed for transient replies,
    /// even if the value is unchanged: the browser may hold a different one.
    pub fn put_signal(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SocketError> {
        reject_reserved(key)?;
        self.signals.insert(key.to_owned(), value.into());
        self.published.insert(key.to_owned());
        Ok(())
    }

    /// Withdraw a client field. The browser is told to drop it.
    pub fn remove_signal(&mut self, key: &str) -> Option<Value> {
        let removed = self.signals.remove(key);
        if removed.is_some() {
            self.published.insert(key.to_owned());
        }
        removed
    }

    /// Read a client field.
    pub fn signal(&self, key: &str) -> Option<&Value> {
        self.signals.get(key)
    }

    /// All client fields.
    pub const fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Fields published since the last [`mark_clean`](Self::mark_clean),
    /// with withdrawn fields as `null`.
    pub fn published_signals(&self) -> Signals {
        self.published
            .iter()
            .map(|key| {
                let value = self.signals.get(key).cloned().unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect()
    }

    /// Fields whose value differs from `baseline`; fields missing now but
    /// present in `baseline` are `null`.
    pub fn signal_delta(&self, baseline: &Signals) -> Signals {
        let mut delta: Signals = self
            .signals
            .iter()
            .filter(|&(key, value)| baseline.get(key) != Some(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for key in baseline.keys() {
            if !self.signals.contains_key(key) {
                delta.insert(key.clone(), Value::Null);
            }
        }
        delta
    }

    // -- effects ------------------------------------------------------------

    /// Queue an outer-HTML patch of the element matching `selector`.
    pub fn patch(&mut self, selector: impl Into<String>, markup: impl Into<String>) {
        self.effects.push(Effect::patch(selector, markup));
    }

    /// Queue a self-removing script.
    pub fn script(&mut self, source: impl Into<String>) {
        self.effects.push(Effect::script(source));
    }

    /// Queue a script with explicit options.
    pub fn script_with(&mut self, source: impl Into<String>, options: ScriptOptions) {
        self.effects.push(Effect::Script {
            source: source.into(),
            options,
        });
    }

    /// Pending effects in queue order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Drain the effect queue.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Forget which fields were published.
    pub fn clear_published(&mut self) {
        self.published.clear();
    }

    /// Start a fresh handling cycle: no published fields, no effects.
    pub fn mark_clean(&mut self) {
        self.published.clear();
        self.effects.clear();
    }
}

fn reject_reserved(key: &str) -> Result<(), SocketError> {
    if is_reserved(key) {
        Err(SocketError::ReservedName(key.to_owned()))
    } else {
        Ok(())
    }
}
