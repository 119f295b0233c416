//! Request handlers for live views.
//!
//! Three entry points per mounted view:
//!
//! - `GET <path>` renders the page shell ([`initial_load`]);
//! - `GET <path>/stream` attaches a stream to a persistent session
//!   ([`attach_stream`]);
//! - `POST|GET <path>/_event/{event}` submits a browser event
//!   ([`submit_event`]).
//!
//! Persistent views hand all state changes to the session actor; transient
//! views rebuild their socket inside the request and answer with the
//! encoded flush.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde_json::Value;
use streamview_core::{
    start_or_locate, Params, Payload, SessionId, SessionSpec, Socket, View, ViewError,
};
use streamview_wire::{decode_body, decode_query, encode_flush, render_events, Signals};
use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::page::{render_page, PageShell, SESSION_SIGNAL};
use crate::pump::{event_stream, events_response, stream_response};
use crate::state::LiveRoute;

/// Path parameter holding the event name.
pub const EVENT_PARAM: &str = "event";

type PathParams = Option<Path<HashMap<String, String>>>;
type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

/// Render the page shell for a fresh session.
///
/// # Route
///
/// `GET <path>`
///
/// # Errors
///
/// Returns [`DispatchError::Handler`] if mount or render fails, and
/// [`DispatchError::InvalidQuery`] for an undecodable query string.
pub async fn initial_load(
    State(route): State<LiveRoute>,
    path: PathParams,
    query: QueryParams,
    headers: HeaderMap,
) -> Result<Html<String>, DispatchError> {
    let Query(query) = query?;
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let paths = route.paths_for(&path);
    let state = Arc::clone(&route.state);
    let params = route_params(&path, &query, &state.live.signals_param);
    let session = state.load_session(&headers);
    let id = SessionId::generate();
    let view = route.view.as_ref();

    let (markup, signals) = if route.is_persistent() {
        let spec = SessionSpec {
            id: id.clone(),
            view: Arc::clone(&route.view),
            paths: paths.clone(),
            params,
            session,
        };
        let handle =
            start_or_locate(&state.directory, spec, state.live.actor_config()).into_handle();
        let snapshot = handle.snapshot().await.map_err(|e| {
            warn!(session_id = %id, view = view.name(), error = %e, "session did not mount");
            DispatchError::Handler(format!("session {id} failed to mount"))
        })?;
        (snapshot.markup, snapshot.signals)
    } else {
        let socket = guarded(view, || {
            view.mount(&params, &session, Socket::new(id.clone(), paths.clone()))
        })?;
        let markup = guarded(view, || Ok(view.render(&socket)))?;
        (markup, socket.signals().clone())
    };
    debug!(session_id = %id, view = view.name(), "initial load rendered");

    Ok(Html(render_page(&PageShell {
        title: &state.title,
        session_id: &id,
        paths: &paths,
        signals: &signals,
        markup: &markup,
        client_script: state.client_script.as_deref(),
    })))
}

/// Attach a live stream to a persistent session.
///
/// Starts the session with this request's parameters if it is not running
/// (e.g. after a server restart). A second attach supersedes the first.
///
/// # Route
///
/// `GET <path>/stream`
///
/// # Errors
///
/// Returns [`DispatchError::NotLive`] for transient views,
/// [`DispatchError::MissingSessionId`] without a session id, and
/// [`DispatchError::Session`] if the session ended before the attach.
pub async fn attach_stream(
    State(route): State<LiveRoute>,
    path: PathParams,
    query: QueryParams,
    headers: HeaderMap,
) -> Result<Response, DispatchError> {
    if !route.is_persistent() {
        warn!(view = route.view.name(), "stream requested for a transient view");
        return Err(DispatchError::NotLive(route.view.name().to_owned()));
    }

    let Query(query) = query?;
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let state = Arc::clone(&route.state);
    let key = state.live.signals_param.as_str();
    let signals = decode_query(query.get(key).map(String::as_str), key);
    let id = resolve_session_id(&path, &signals, &query)
        .inspect_err(|e| warn!(view = route.view.name(), error = %e, "stream attach rejected"))?;

    let spec = SessionSpec {
        id: id.clone(),
        view: Arc::clone(&route.view),
        paths: route.paths_for(&path),
        params: route_params(&path, &query, key),
        session: state.load_session(&headers),
    };
    let registration = start_or_locate(&state.directory, spec, state.live.actor_config());
    if registration.is_new() {
        debug!(session_id = %id, view = route.view.name(), "stream attach started a new session");
    }
    let attachment = registration.into_handle().attach().await?;

    Ok(stream_response(event_stream(
        attachment,
        state.live.keepalive(),
    )))
}

/// Submit a browser event.
///
/// Persistent views queue the event on the session actor and answer with an
/// empty 200; the effects arrive on the stream. Transient views mount a
/// fresh socket, run the handler once, and answer with the encoded flush.
///
/// # Route
///
/// `POST <path>/_event/{event}` (`GET` also accepted)
///
/// # Errors
///
/// Returns 400 for a missing event name, session id, or an undecodable
/// query string, 404 for an unknown persistent session, and 500 if a
/// transient handler fails.
pub async fn submit_event(
    State(route): State<LiveRoute>,
    method: Method,
    path: PathParams,
    query: QueryParams,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DispatchError> {
    let Query(query) = query?;
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let state = Arc::clone(&route.state);
    let key = state.live.signals_param.as_str();
    let view = route.view.as_ref();

    let event = path
        .get(EVENT_PARAM)
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty())
        .ok_or(DispatchError::MissingEvent)
        .inspect_err(|e| warn!(view = view.name(), error = %e, "event rejected"))?;

    let signals = if method == Method::GET || body.is_empty() {
        decode_query(query.get(key).map(String::as_str), key)
    } else {
        decode_body(&body, key)
    };
    let id = resolve_session_id(&path, &signals, &query)
        .inspect_err(|e| warn!(view = view.name(), %event, error = %e, "event rejected"))?;
    let payload = build_payload(signals, &query, key);

    if route.is_persistent() {
        let Some(handle) = state.directory.lookup(&id) else {
            warn!(session_id = %id, view = view.name(), %event, "event for unknown session");
            return Err(DispatchError::UnknownSession(id.to_string()));
        };
        handle.dispatch_event(event, payload)?;
        return Ok(StatusCode::OK.into_response());
    }

    let params = route_params(&path, &query, key);
    let session = state.load_session(&headers);
    let paths = route.paths_for(&path);
    let mut socket = guarded(view, || {
        view.mount(&params, &session, Socket::new(id.clone(), paths))
    })?;
    socket.mark_clean();

    debug!(session_id = %id, view = view.name(), %event, "dispatching transient event");
    let outcome = guarded(view, || view.handle_event(&event, &payload, socket))?;
    let mut socket = outcome.into_socket();
    let effects = socket.take_effects();
    let events = encode_flush(&socket.published_signals(), &effects);

    Ok(events_response(render_events(&events)))
}

/// Run a view callback, turning errors and panics into a 500.
fn guarded<T, F>(view: &dyn View, callback: F) -> Result<T, DispatchError>
where
    F: FnOnce() -> Result<T, ViewError>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!(view = view.name(), error = %e, "view callback failed");
            Err(e.into())
        }
        Err(_) => {
            error!(view = view.name(), "view callback panicked");
            Err(DispatchError::Handler(String::from("view callback panicked")))
        }
    }
}

/// Session id from the path, then the client signals, then the query.
fn resolve_session_id(
    path: &HashMap<String, String>,
    signals: &Signals,
    query: &HashMap<String, String>,
) -> Result<SessionId, DispatchError> {
    let raw = path
        .get(SESSION_SIGNAL)
        .map(String::as_str)
        .or_else(|| signals.get(SESSION_SIGNAL).and_then(Value::as_str))
        .or_else(|| query.get(SESSION_SIGNAL).map(String::as_str))
        .ok_or(DispatchError::MissingSessionId)?;
    Ok(SessionId::parse(raw)?)
}

/// Client signals overlaid with the query parameters.
///
/// Query values win. The signals parameter itself and the session id are
/// not part of the payload.
fn build_payload(mut signals: Signals, query: &HashMap<String, String>, key: &str) -> Payload {
    for (name, value) in query {
        if name != key {
            signals.insert(name.clone(), Value::String(value.clone()));
        }
    }
    signals.remove(SESSION_SIGNAL);
    signals
}

/// Mount parameters: query parameters overlaid with path parameters.
fn route_params(
    path: &HashMap<String, String>,
    query: &HashMap<String, String>,
    key: &str,
) -> Params {
    let mut params: Params = query
        .iter()
        .filter(|(name, _)| name.as_str() != key && name.as_str() != SESSION_SIGNAL)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    for (name, value) in path {
        if name != EVENT_PARAM {
            params.insert(name.clone(), value.clone());
        }
    }
    params
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn session_id_prefers_path_then_signals_then_query() {
        let mut signals = Signals::new();
        signals.insert(SESSION_SIGNAL.into(), json!("from-signals"));
        let query = map(&[("session_id", "from-query")]);

        let id = resolve_session_id(&map(&[("session_id", "from-path")]), &signals, &query);
        assert_eq!(id.unwrap().as_str(), "from-path");

        let id = resolve_session_id(&HashMap::new(), &signals, &query);
        assert_eq!(id.unwrap().as_str(), "from-signals");

        let id = resolve_session_id(&HashMap::new(), &Signals::new(), &query);
        assert_eq!(id.unwrap().as_str(), "from-query");
    }

    #[test]
    fn missing_session_id_is_rejected() {
        let err = resolve_session_id(&HashMap::new(), &Signals::new(), &HashMap::new());
        assert!(matches!(err, Err(DispatchError::MissingSessionId)));
    }

    #[test]
    fn malformed_session_id_is_rejected() {
        let query = map(&[("session_id", "../etc")]);
        let err = resolve_session_id(&HashMap::new(), &Signals::new(), &query);
        assert!(matches!(err, Err(DispatchError::InvalidSessionId(_))));
    }

    #[test]
    fn payload_overlays_query_and_drops_reserved_keys() {
        let mut signals = Signals::new();
        signals.insert("count".into(), json!(5));
        signals.insert("step".into(), json!(1));
        signals.insert(SESSION_SIGNAL.into(), json!("abc"));
        let query = map(&[("step", "2"), ("datastar", "{}")]);

        let payload = build_payload(signals, &query, "datastar");
        assert_eq!(payload.get("count"), Some(&json!(5)));
        assert_eq!(payload.get("step"), Some(&json!("2")));
        assert!(!payload.contains_key("datastar"));
        assert!(!payload.contains_key(SESSION_SIGNAL));
    }

    #[test]
    fn route_params_skip_signals_and_event() {
        let path = map(&[("room", "lobby"), ("event", "increment")]);
        let query = map(&[("room", "other"), ("datastar", "{}"), ("page", "2")]);

        let params = route_params(&path, &query, "datastar");
        assert_eq!(params.get("room").map(String::as_str), Some("lobby"));
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
        assert!(!params.contains_key("datastar"));
        assert!(!params.contains_key("event"));
    }
}
