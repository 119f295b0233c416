//! Shared state for live routes.
//!
//! [`LiveState`] is built once per router and shared by every registered
//! view. Each view's handlers receive a [`LiveRoute`], which pairs the view
//! with its derived paths and a pointer to the shared state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;
use streamview_core::{Paths, RenderMode, SessionData, SessionDirectory, View};

use crate::config::LiveConfig;

/// Produces external session data (e.g. a decoded cookie) for mount.
pub type SessionLoader = Arc<dyn Fn(&HeaderMap) -> SessionData + Send + Sync>;

/// State shared by every live route.
pub struct LiveState {
    /// Running persistent sessions.
    pub directory: Arc<SessionDirectory>,
    /// Live session tunables.
    pub live: LiveConfig,
    /// `<title>` of the page shell.
    pub title: String,
    /// URL of the browser runtime, embedded as a module script.
    pub client_script: Option<String>,
    session_loader: SessionLoader,
}

impl LiveState {
    /// State with an empty directory and no session loader.
    pub fn new(live: LiveConfig, title: impl Into<String>) -> Self {
        Self {
            directory: Arc::new(SessionDirectory::new()),
            live,
            title: title.into(),
            client_script: None,
            session_loader: Arc::new(|_: &HeaderMap| SessionData::new()),
        }
    }

    /// Use an existing directory, e.g. one shared with a broadcaster.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<SessionDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Embed the browser runtime from `src`.
    #[must_use]
    pub fn with_client_script(mut self, src: impl Into<String>) -> Self {
        self.client_script = Some(src.into());
        self
    }

    /// Install the session data loader.
    #[must_use]
    pub fn with_session_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&HeaderMap) -> SessionData + Send + Sync + 'static,
    {
        self.session_loader = Arc::new(loader);
        self
    }

    /// Session data for a request.
    pub fn load_session(&self, headers: &HeaderMap) -> SessionData {
        (self.session_loader)(headers)
    }
}

impl fmt::Debug for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveState")
            .field("sessions", &self.directory.len())
            .field("live", &self.live)
            .field("title", &self.title)
            .field("client_script", &self.client_script)
            .finish_non_exhaustive()
    }
}

/// One view mounted at one base path.
#[derive(Clone)]
pub struct LiveRoute {
    /// The view.
    pub view: Arc<dyn View>,
    /// Paths derived from the base path, possibly templated.
    pub paths: Paths,
    /// Shared state.
    pub state: Arc<LiveState>,
}

impl LiveRoute {
    /// Mount `view` at `base`.
    pub fn new(view: Arc<dyn View>, base: &str, state: Arc<LiveState>) -> Self {
        let live = view.mode() == RenderMode::Persistent;
        Self {
            paths: Paths::new(base, live),
            view,
            state,
        }
    }

    /// Paths for one request, with the matched path parameters filled in.
    pub fn paths_for(&self, params: &HashMap<String, String>) -> Paths {
        self.paths.resolve(|name| params.get(name).map(String::as_str))
    }

    /// Whether sessions of this view are held by an actor.
    pub fn is_persistent(&self) -> bool {
        self.view.mode() == RenderMode::Persistent
    }
}

impl fmt::Debug for LiveRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveRoute")
            .field("view", &self.view.name())
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}
