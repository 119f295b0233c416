//! Session engine for Streamview.
//!
//! This crate owns the per-session state and its lifecycle, independent of
//! HTTP:
//!
//! - [`socket::Socket`]: the reactive state container (owner fields,
//!   client signals, effect queue)
//! - [`view::View`]: the capability an application implements
//! - [`actor`]: one task per persistent session, the sole writer of its
//!   socket, pushing flushes to at most one attached stream
//! - [`directory::SessionDirectory`]: concurrent, idempotent session lookup
//! - [`session::SessionId`]: opaque session tokens
//!
//! # Architecture
//!
//! ```text
//! request handlers --SessionHandle--> SessionActor --PumpMessage--> stream pump
//!        |                                ^
//!        +------ SessionDirectory --------+
//! ```

pub mod actor;
pub mod directory;
pub mod session;
pub mod socket;
pub mod view;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use actor::{
    spawn_session, start_or_locate, ActorConfig, ActorError, Attachment, PumpMessage,
    SessionHandle, SessionPhase, SessionSpec, Snapshot, DEFAULT_ATTACH_TIMEOUT,
};
pub use directory::{Registration, SessionDirectory};
pub use session::{SessionId, SessionIdError};
pub use socket::{join_path, Paths, Socket, SocketError};
pub use view::{Outcome, Params, Payload, RenderMode, SessionData, View, ViewError};
