//! Axum router construction for live views.
//!
//! Each view registered with [`LiveRouter::live`] gets three routes under its
//! base path:
//!
//! - `GET <path>`: initial load
//! - `GET <path>/stream`: stream attach (404 for transient views)
//! - `GET|POST <path>/_event/{event}`: event submission
//!
//! A bare `<path>/_event` is routed too, so a missing event name is a 400
//! rather than a 404.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use streamview_core::socket::STREAM_SEGMENT;
use streamview_core::{join_path, SessionDirectory, View};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::dispatch::{self, EVENT_PARAM};
use crate::state::{LiveRoute, LiveState};

/// Builder collecting live views into one [`Router`].
#[derive(Debug)]
pub struct LiveRouter {
    state: Arc<LiveState>,
    routes: Vec<LiveRoute>,
}

impl LiveRouter {
    /// A router sharing `state` among its views.
    pub fn new(state: LiveState) -> Self {
        Self {
            state: Arc::new(state),
            routes: Vec::new(),
        }
    }

    /// The directory of running sessions, for broadcasting.
    pub fn directory(&self) -> Arc<SessionDirectory> {
        Arc::clone(&self.state.directory)
    }

    /// Mount `view` at `path`.
    ///
    /// `path` may contain `{param}` segments; they reach `mount` as params
    /// and are filled into the paths each request hands to the view.
    #[must_use]
    pub fn live<V: View>(mut self, path: &str, view: V) -> Self {
        self.routes.push(LiveRoute::new(
            Arc::new(view),
            &normalize(path),
            Arc::clone(&self.state),
        ));
        self
    }

    /// Mount an already shared view at `path`.
    #[must_use]
    pub fn live_shared(mut self, path: &str, view: Arc<dyn View>) -> Self {
        self.routes.push(LiveRoute::new(
            view,
            &normalize(path),
            Arc::clone(&self.state),
        ));
        self
    }

    /// Assemble the router with request tracing.
    pub fn build(self) -> Router {
        let mut router = Router::new();
        for route in self.routes {
            router = router.merge(view_router(route));
        }
        router.layer(TraceLayer::new_for_http())
    }
}

fn view_router(route: LiveRoute) -> Router {
    let base = route.paths.base.clone();
    let event_prefix = route.paths.event.clone();
    let event = join_path(&event_prefix, &format!("{{{EVENT_PARAM}}}"));
    let stream = join_path(&base, STREAM_SEGMENT);
    debug!(view = route.view.name(), %base, %event, %stream, "mounting live view");

    Router::new()
        .route(&base, get(dispatch::initial_load))
        .route(&stream, get(dispatch::attach_stream))
        .route(
            &event_prefix,
            get(dispatch::submit_event).post(dispatch::submit_event),
        )
        .route(
            &event,
            get(dispatch::submit_event).post(dispatch::submit_event),
        )
        .with_state(route)
}

/// Leading slash, no trailing slash except for the root.
fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}
