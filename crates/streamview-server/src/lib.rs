//! HTTP surface for Streamview live sessions.
//!
//! This crate mounts [`View`](streamview_core::View)s on an Axum router and
//! speaks the wire protocol to browsers:
//!
//! - **Initial load** (`GET <path>`) renders the page shell with the session
//!   id, paths, and initial signals
//! - **Stream attach** (`GET <path>/stream`) relays a persistent session's
//!   flushes as a `text/event-stream`
//! - **Event submission** (`POST <path>/_event/{event}`) forwards browser
//!   events to the session actor, or runs transient views in-request
//!
//! # Usage
//!
//! ```rust,ignore
//! use streamview_server::{LiveRouter, LiveState, StreamviewConfig};
//!
//! let config = StreamviewConfig::default();
//! let live = LiveRouter::new(LiveState::new(config.live.clone(), "Demo"))
//!     .live("/rooms/{room}", RoomView);
//! let directory = live.directory();
//! streamview_server::start_server(&config.server, live.build(), directory).await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod page;
pub mod pump;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use config::{ConfigError, LiveConfig, LoggingConfig, ServerConfig, StreamviewConfig};
pub use error::{DispatchError, ServerError, StartupError};
pub use logging::init_logging;
pub use router::LiveRouter;
pub use server::{serve_until, start_server};
pub use state::{LiveRoute, LiveState, SessionLoader};
