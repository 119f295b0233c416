//! The view capability: what an application plugs into the engine.
//!
//! A view is a value implementing [`View`], registered at a base path. The
//! engine calls it to mount a session, handle browser events and external
//! messages, render markup, and clean up. Handlers take the [`Socket`] by
//! value and return it inside an [`Outcome`].

use std::collections::BTreeMap;

use serde_json::Value;
use streamview_wire::Signals;

use crate::socket::{Socket, SocketError};

/// Route parameters (path and query) of the request that mounted a view.
pub type Params = BTreeMap<String, String>;

/// External session data (e.g. decoded from a cookie) supplied at mount.
pub type SessionData = serde_json::Map<String, Value>;

/// Untrusted event payload: client signals merged with request parameters.
pub type Payload = Signals;

/// How a view's sessions are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// A session actor holds the state and effects arrive over a stream.
    Persistent,
    /// State is rebuilt on every request and effects return in the response.
    Transient,
}

/// Result of one handler call.
#[derive(Debug)]
pub enum Outcome {
    /// Keep the session going with the new state.
    Continue(Socket),
    /// End the session after flushing the final state.
    Stop(Socket),
}

impl Outcome {
    /// The socket carried by either variant.
    pub fn into_socket(self) -> Socket {
        match self {
            Self::Continue(socket) | Self::Stop(socket) => socket,
        }
    }

    /// Whether the handler asked to stop.
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }
}

/// Errors returned by view callbacks.
///
/// In transient mode these become a 500 response. In persistent mode they
/// end the session.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// A socket mutation was rejected.
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    /// The event payload could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A JSON conversion failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other application failure.
    #[error("{0}")]
    Failed(String),
}

/// An application view.
///
/// Implementations must be cheap to share: the engine holds them as
/// `Arc<dyn View>` and calls them from many sessions concurrently. Each
/// session's calls are serialized by its actor (persistent) or confined to
/// one request (transient).
pub trait View: Send + Sync + 'static {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// How sessions of this view are driven.
    fn mode(&self) -> RenderMode {
        RenderMode::Persistent
    }

    /// Build the initial state.
    ///
    /// Persistent views mount exactly once per session, when the actor
    /// starts. Transient views mount on every request.
    fn mount(
        &self,
        params: &Params,
        session: &SessionData,
        socket: Socket,
    ) -> Result<Socket, ViewError>;

    /// Handle a browser event.
    fn handle_event(
        &self,
        event: &str,
        payload: &Payload,
        socket: Socket,
    ) -> Result<Outcome, ViewError>;

    /// Handle an out-of-band message (broadcasts, timers, other sessions).
    fn handle_info(&self, message: &Value, socket: Socket) -> Result<Outcome, ViewError> {
        let _ = message;
        Ok(Outcome::Continue(socket))
    }

    /// Render markup from the current owner fields.
    fn render(&self, socket: &Socket) -> String;

    /// Called once when a persistent session ends in an orderly way.
    fn teardown(&self, socket: &Socket) {
        let _ = socket;
    }
}
