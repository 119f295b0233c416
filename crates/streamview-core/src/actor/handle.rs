//! Cloneable handles onto a session actor.
//!
//! Every method enqueues a [`Command`]; the ones returning data await a
//! `oneshot` reply. A handle whose actor has terminated reports
//! [`ActorError::Terminated`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use streamview_wire::Signals;
use tokio::sync::{mpsc, oneshot};

use super::messages::{Command, PumpMessage};
use crate::session::SessionId;
use crate::socket::Paths;
use crate::view::Payload;

static NEXT_ATTACHMENT: AtomicU64 = AtomicU64::new(1);

/// Errors from talking to a session actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    /// The actor has stopped (explicitly, by disconnect, or by crash).
    #[error("session actor has terminated")]
    Terminated,
}

impl<T> From<mpsc::error::SendError<T>> for ActorError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self::Terminated
    }
}

impl From<oneshot::error::RecvError> for ActorError {
    fn from(_: oneshot::error::RecvError) -> Self {
        Self::Terminated
    }
}

/// Lifecycle phase of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Mounted, no stream attached.
    Mounted,
    /// A stream is attached.
    Streaming,
}

/// Rendered state of a session at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The session.
    pub session_id: SessionId,
    /// Markup rendered from the owner fields.
    pub markup: String,
    /// Current client fields.
    pub signals: Signals,
    /// The view's paths.
    pub paths: Paths,
}

/// Handle onto a running session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    instance: u64,
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub(crate) const fn new(
        id: SessionId,
        instance: u64,
        tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { id, instance, tx }
    }

    /// The session id.
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Distinguishes successive actors started under the same id.
    pub const fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether the actor is still running.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Wait until the actor has terminated.
    pub async fn terminated(&self) {
        self.tx.closed().await;
    }

    /// Render the current state. The returned signals count as delivered.
    pub async fn snapshot(&self) -> Result<Snapshot, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await?
    }

    /// Attach a new stream, superseding any previous one.
    pub async fn attach(&self) -> Result<Attachment, ActorError> {
        let attachment = NEXT_ATTACHMENT.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reply, ack) = oneshot::channel();
        self.send(Command::Attach {
            attachment,
            sender,
            reply,
        })?;
        let handle = Attachment {
            id: attachment,
            session_id: self.id.clone(),
            receiver,
            control: self.tx.clone(),
        };
        ack.await?;
        Ok(handle)
    }

    /// Tell the actor an attachment is gone.
    ///
    /// Dropping an [`Attachment`] does this automatically.
    pub fn detach(&self, attachment: u64) -> Result<(), ActorError> {
        self.send(Command::Detach { attachment })
    }

    /// Queue a browser event. Effects arrive on the attached stream.
    pub fn dispatch_event(
        &self,
        name: impl Into<String>,
        payload: Payload,
    ) -> Result<(), ActorError> {
        self.send(Command::Event {
            name: name.into(),
            payload,
        })
    }

    /// Queue an out-of-band message for the view's info handler.
    pub fn send_info(&self, message: Value) -> Result<(), ActorError> {
        self.send(Command::Info { message })
    }

    /// Current lifecycle phase.
    pub async fn status(&self) -> Result<SessionPhase, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        Ok(rx.await?)
    }

    /// Ask the actor to stop. Teardown runs.
    pub fn shutdown(&self) -> Result<(), ActorError> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), ActorError> {
        Ok(self.tx.send(command)?)
    }
}

/// A stream's subscription to a session actor.
///
/// Dropping it tells the actor the stream is gone, which is how the
/// actor notices a peer disconnect.
#[derive(Debug)]
pub struct Attachment {
    id: u64,
    session_id: SessionId,
    receiver: mpsc::UnboundedReceiver<PumpMessage>,
    control: mpsc::UnboundedSender<Command>,
}

impl Attachment {
    /// Attachment id, unique per process.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The session this attachment belongs to.
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Next message from the actor; `None` once the actor is gone.
    pub async fn recv(&mut self) -> Option<PumpMessage> {
        self.receiver.recv().await
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        // Fails only when the actor is already gone.
        let _ = self.control.send(Command::Detach {
            attachment: self.id,
        });
    }
}
