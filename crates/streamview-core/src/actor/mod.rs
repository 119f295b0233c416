//! Session actors.
//!
//! One Tokio task per persistent session owns that session's [`Socket`].
//! Everything else talks to it through a [`SessionHandle`]; commands are
//! processed one at a time in receipt order, so the socket has exactly one
//! writer and a linear history.
//!
//! ```text
//! absent --spawn/mount--> mounted --attach--> streaming
//!                            |                  |   ^
//!                            |        detach    |   | attach within grace
//!                            |                  v   |
//!                            |               (grace window)
//!                            |                  |
//!                            +-stop/no attach-> terminated <--stop/loss/crash
//! ```
//!
//! A mounted session that never sees a stream (a crawler, a prefetch, an
//! aborted page load) is torn down once [`ActorConfig::attach_timeout`]
//! passes.

mod handle;
mod messages;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use streamview_wire::{encode_flush, Signals};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub use handle::{ActorError, Attachment, SessionHandle, SessionPhase, Snapshot};
pub use messages::PumpMessage;

use self::messages::Command;
use crate::directory::{Registration, SessionDirectory};
use crate::session::SessionId;
use crate::socket::{Paths, Socket};
use crate::view::{Outcome, Params, SessionData, View, ViewError};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Tunables for session actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorConfig {
    /// How long a session survives without a stream before teardown.
    ///
    /// Zero tears down as soon as the attached stream is lost. A browser
    /// reload that re-attaches inside the window keeps the session.
    pub reconnect_grace: Duration,
    /// How long a freshly mounted session waits for its first stream.
    ///
    /// Zero waits forever.
    pub attach_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::ZERO,
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
        }
    }
}

/// Default [`ActorConfig::attach_timeout`].
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to start one session.
pub struct SessionSpec {
    /// Session id.
    pub id: SessionId,
    /// The view driving the session.
    pub view: Arc<dyn View>,
    /// Paths derived from the view's base path.
    pub paths: Paths,
    /// Route parameters for mount.
    pub params: Params,
    /// External session data for mount.
    pub session: SessionData,
}

impl SessionSpec {
    /// A spec with no params or session data.
    pub fn new(id: SessionId, view: Arc<dyn View>, base_path: &str) -> Self {
        Self {
            id,
            view,
            paths: Paths::new(base_path, true),
            params: Params::new(),
            session: SessionData::new(),
        }
    }

    /// Set the route parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set the external session data.
    #[must_use]
    pub fn with_session(mut self, session: SessionData) -> Self {
        self.session = session;
        self
    }
}

/// Spawn an actor for `spec`. Mount runs first inside the task.
///
/// The handle is not registered; see [`start_or_locate`].
pub fn spawn_session(
    spec: SessionSpec,
    config: ActorConfig,
    directory: Arc<SessionDirectory>,
) -> SessionHandle {
    let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle::new(spec.id.clone(), instance, tx);

    let actor = SessionActor {
        id: spec.id.clone(),
        instance,
        view: Arc::clone(&spec.view),
        config,
        directory,
        stream: None,
        attached_once: false,
        pushed: Signals::new(),
        deadline: None,
    };
    tokio::spawn(actor.run(spec, rx));

    handle
}

/// Locate the live actor for `spec.id`, or spawn and register one.
///
/// Mount runs only when a new actor is started.
pub fn start_or_locate(
    directory: &Arc<SessionDirectory>,
    spec: SessionSpec,
    config: ActorConfig,
) -> Registration {
    let id = spec.id.clone();
    directory.start_or_locate(id, || spawn_session(spec, config, Arc::clone(directory)))
}

struct AttachedStream {
    id: u64,
    sender: mpsc::UnboundedSender<PumpMessage>,
}

enum Termination {
    Stopped,
    Disconnected,
    Shutdown,
}

impl Termination {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Disconnected => "disconnected",
            Self::Shutdown => "shutdown",
        }
    }
}

enum Step {
    Continue(Socket),
    Stop(Socket),
    Crash,
}

enum Next {
    Command(Command),
    DeadlineExpired,
    Closed,
}

struct SessionActor {
    id: SessionId,
    instance: u64,
    view: Arc<dyn View>,
    config: ActorConfig,
    directory: Arc<SessionDirectory>,
    stream: Option<AttachedStream>,
    attached_once: bool,
    /// Client fields as the browser last received them.
    pushed: Signals,
    /// Teardown time while no stream is attached.
    deadline: Option<Instant>,
}

impl SessionActor {
    async fn run(mut self, spec: SessionSpec, mut rx: mpsc::UnboundedReceiver<Command>) {
        let SessionSpec {
            id,
            view,
            paths,
            params,
            session,
        } = spec;

        let mounted = catch_unwind(AssertUnwindSafe(|| {
            view.mount(&params, &session, Socket::new(id, paths))
        }));
        let mut socket = match mounted {
            Ok(Ok(mut socket)) => {
                socket.mark_clean();
                socket
            }
            Ok(Err(e)) => {
                error!(session_id = %self.id, view = self.view.name(), error = %e, "mount failed");
                self.deregister();
                return;
            }
            Err(_) => {
                error!(session_id = %self.id, view = self.view.name(), "mount panicked");
                self.deregister();
                return;
            }
        };
        debug!(session_id = %self.id, view = self.view.name(), "session mounted");
        if !self.config.attach_timeout.is_zero() {
            self.deadline = Instant::now().checked_add(self.config.attach_timeout);
        }

        loop {
            let command = match self.next(&mut rx).await {
                Next::Command(command) => command,
                Next::DeadlineExpired => {
                    if !self.attached_once {
                        debug!(session_id = %self.id, view = self.view.name(), "no stream attached in time");
                    }
                    self.terminate(&socket, &Termination::Disconnected);
                    return;
                }
                Next::Closed => {
                    self.terminate(&socket, &Termination::Shutdown);
                    return;
                }
            };

            match command {
                Command::Snapshot { reply } => {
                    let snapshot = Snapshot {
                        session_id: self.id.clone(),
                        markup: self.view.render(&socket),
                        signals: socket.signals().clone(),
                        paths: socket.paths().clone(),
                    };
                    // The page embeds these signals.
                    self.pushed = snapshot.signals.clone();
                    let _ = reply.send(Ok(snapshot));
                }
                Command::Attach {
                    attachment,
                    sender,
                    reply,
                } => {
                    self.attach(attachment, sender);
                    let _ = reply.send(());
                    self.flush(&mut socket);
                }
                Command::Detach { attachment } => {
                    if self.detach(attachment) {
                        self.terminate(&socket, &Termination::Disconnected);
                        return;
                    }
                }
                Command::Event { name, payload } => {
                    let view = Arc::clone(&self.view);
                    debug!(session_id = %self.id, event = %name, "dispatching event");
                    match self.invoke(socket, |s| view.handle_event(&name, &payload, s)) {
                        Step::Continue(next) => socket = next,
                        Step::Stop(last) => {
                            self.terminate(&last, &Termination::Stopped);
                            return;
                        }
                        Step::Crash => return,
                    }
                }
                Command::Info { message } => {
                    let view = Arc::clone(&self.view);
                    match self.invoke(socket, |s| view.handle_info(&message, s)) {
                        Step::Continue(next) => socket = next,
                        Step::Stop(last) => {
                            self.terminate(&last, &Termination::Stopped);
                            return;
                        }
                        Step::Crash => return,
                    }
                }
                Command::Status { reply } => {
                    let phase = if self.stream.is_some() {
                        SessionPhase::Streaming
                    } else {
                        SessionPhase::Mounted
                    };
                    let _ = reply.send(phase);
                }
                Command::Shutdown => {
                    self.terminate(&socket, &Termination::Shutdown);
                    return;
                }
            }
        }
    }

    async fn next(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) -> Next {
        let received = match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    command = rx.recv() => command,
                    () = tokio::time::sleep_until(deadline) => return Next::DeadlineExpired,
                }
            }
            None => rx.recv().await,
        };
        received.map_or(Next::Closed, Next::Command)
    }

    /// Run one handler and flush its effects.
    fn invoke<F>(&mut self, socket: Socket, handler: F) -> Step
    where
        F: FnOnce(Socket) -> Result<Outcome, ViewError>,
    {
        match catch_unwind(AssertUnwindSafe(|| handler(socket))) {
            Ok(Ok(Outcome::Continue(mut next))) => {
                self.flush(&mut next);
                Step::Continue(next)
            }
            Ok(Ok(Outcome::Stop(mut last))) => {
                self.flush(&mut last);
                Step::Stop(last)
            }
            Ok(Err(e)) => {
                error!(session_id = %self.id, view = self.view.name(), error = %e, "handler failed, session crashed");
                self.crash();
                Step::Crash
            }
            Err(_) => {
                error!(session_id = %self.id, view = self.view.name(), "handler panicked, session crashed");
                self.crash();
                Step::Crash
            }
        }
    }

    /// Push the signal delta and queued effects to the stream, if any.
    ///
    /// The effect queue is always cleared. The pushed baseline advances only
    /// when a stream accepted the flush.
    fn flush(&mut self, socket: &mut Socket) {
        let effects = socket.take_effects();
        socket.clear_published();

        let Some(stream) = &self.stream else {
            if !effects.is_empty() {
                debug!(session_id = %self.id, dropped = effects.len(), "no stream attached, effects dropped");
            }
            return;
        };

        let delta = socket.signal_delta(&self.pushed);
        if delta.is_empty() && effects.is_empty() {
            return;
        }

        let events = encode_flush(&delta, &effects);
        if stream.sender.send(PumpMessage::Flush(events)).is_ok() {
            self.pushed = socket.signals().clone();
        } else {
            debug!(session_id = %self.id, attachment = stream.id, "stream receiver gone, awaiting detach");
        }
    }

    fn attach(&mut self, attachment: u64, sender: mpsc::UnboundedSender<PumpMessage>) {
        let previous = self.stream.replace(AttachedStream {
            id: attachment,
            sender,
        });
        if let Some(previous) = previous {
            debug!(session_id = %self.id, superseded = previous.id, attachment, "stream superseded");
            let _ = previous.sender.send(PumpMessage::End);
        } else {
            debug!(session_id = %self.id, attachment, "stream attached");
        }
        if self.deadline.take().is_some() && self.attached_once {
            info!(session_id = %self.id, attachment, "stream re-attached within grace window");
        }
        self.attached_once = true;
    }

    /// Returns `true` when the session should terminate now.
    fn detach(&mut self, attachment: u64) -> bool {
        match &self.stream {
            Some(current) if current.id == attachment => {}
            _ => {
                debug!(session_id = %self.id, attachment, "stale detach ignored");
                return false;
            }
        }
        self.stream = None;
        debug!(session_id = %self.id, attachment, "stream detached");

        if self.config.reconnect_grace.is_zero() {
            return true;
        }
        match Instant::now().checked_add(self.config.reconnect_grace) {
            Some(deadline) => {
                self.deadline = Some(deadline);
                false
            }
            None => true,
        }
    }

    fn terminate(&mut self, socket: &Socket, reason: &Termination) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.sender.send(PumpMessage::End);
        }
        if catch_unwind(AssertUnwindSafe(|| self.view.teardown(socket))).is_err() {
            warn!(session_id = %self.id, view = self.view.name(), "teardown panicked");
        }
        self.deregister();
        info!(session_id = %self.id, view = self.view.name(), reason = reason.as_str(), "session terminated");
    }

    fn crash(&mut self) {
        // Dropping the sender ends the stream without an explicit End.
        self.stream = None;
        self.deregister();
    }

    fn deregister(&self) {
        self.directory.remove(&self.id, self.instance);
    }
}
