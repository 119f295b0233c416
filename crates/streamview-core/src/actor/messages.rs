//! Actor message definitions.
//!
//! ```text
//! SessionHandle --Command--> SessionActor --PumpMessage--> Attachment (stream pump)
//!       ^                                                      |
//!       +------------------- Detach (on drop) -----------------+
//! ```

use serde_json::Value;
use streamview_wire::WireEvent;
use tokio::sync::{mpsc, oneshot};

use super::handle::{ActorError, SessionPhase, Snapshot};
use crate::view::Payload;

/// Messages to a session actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Render the current state (synchronous call).
    Snapshot {
        reply: oneshot::Sender<Result<Snapshot, ActorError>>,
    },
    /// Make `sender` the sole subscriber (synchronous call).
    Attach {
        attachment: u64,
        sender: mpsc::UnboundedSender<PumpMessage>,
        reply: oneshot::Sender<()>,
    },
    /// The attachment with this id is gone.
    Detach { attachment: u64 },
    /// Browser event.
    Event { name: String, payload: Payload },
    /// Out-of-band message.
    Info { message: Value },
    /// Report the lifecycle phase (synchronous call).
    Status { reply: oneshot::Sender<SessionPhase> },
    /// Orderly stop.
    Shutdown,
}

/// Messages from a session actor to its attached stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpMessage {
    /// One flush, already encoded as wire events in delivery order.
    Flush(Vec<WireEvent>),
    /// The stream should close.
    End,
}
