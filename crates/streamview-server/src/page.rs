//! The HTML shell returned on initial load.
//!
//! The shell carries everything the browser runtime needs to continue the
//! session: the session id, the event path prefix, the stream path for
//! persistent views, and the initial signals as JSON. The rendered view
//! markup sits inside the `<main>` element.

use serde_json::Value;
use streamview_core::{Paths, SessionId};
use streamview_wire::effect::escape_attr;
use streamview_wire::Signals;

/// Client signal carrying the session id back on every event.
pub const SESSION_SIGNAL: &str = "session_id";

/// Inputs for [`render_page`].
#[derive(Debug)]
pub struct PageShell<'a> {
    /// Document title.
    pub title: &'a str,
    /// The session the page belongs to.
    pub session_id: &'a SessionId,
    /// The view's paths.
    pub paths: &'a Paths,
    /// Initial client signals.
    pub signals: &'a Signals,
    /// Rendered view markup.
    pub markup: &'a str,
    /// Browser runtime URL, if any.
    pub client_script: Option<&'a str>,
}

/// Render the full document.
///
/// The embedded signals always include the session id, so the browser
/// echoes it back with every event.
pub fn render_page(shell: &PageShell<'_>) -> String {
    let mut signals = shell.signals.clone();
    signals.insert(
        SESSION_SIGNAL.to_owned(),
        Value::String(shell.session_id.to_string()),
    );
    let signals = Value::Object(signals).to_string();

    let script = shell
        .client_script
        .map(|src| {
            format!(
                "\n    <script type=\"module\" src=\"{}\"></script>",
                escape_attr(src)
            )
        })
        .unwrap_or_default();

    let stream_attrs = shell
        .paths
        .stream
        .as_deref()
        .map(|stream| {
            let stream = escape_attr(stream);
            format!(" data-stream-path=\"{stream}\" data-on-load=\"@get('{stream}')\"")
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>{script}
</head>
<body data-session-id="{session_id}" data-event-path="{event_path}"{stream_attrs} data-signals="{signals}">
<main id="streamview-root">
{markup}
</main>
</body>
</html>
"#,
        title = escape_attr(shell.title),
        session_id = escape_attr(shell.session_id.as_str()),
        event_path = escape_attr(&shell.paths.event),
        signals = escape_attr(&signals),
        markup = shell.markup,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn shell_for(paths: &Paths, id: &SessionId, signals: &Signals) -> String {
        render_page(&PageShell {
            title: "Counter",
            session_id: id,
            paths,
            signals,
            markup: "<span id=\"count\">0</span>",
            client_script: Some("/assets/runtime.js"),
        })
    }

    #[test]
    fn persistent_page_embeds_stream_path() {
        let id = SessionId::parse("abc123").unwrap();
        let paths = Paths::new("/counter", true);
        let mut signals = Signals::new();
        signals.insert("count".into(), json!(0));

        let html = shell_for(&paths, &id, &signals);
        assert!(html.contains("data-session-id=\"abc123\""));
        assert!(html.contains("data-event-path=\"/counter/_event\""));
        assert!(html.contains("data-stream-path=\"/counter/stream\""));
        assert!(html.contains("<span id=\"count\">0</span>"));
        assert!(html.contains("src=\"/assets/runtime.js\""));
    }

    #[test]
    fn transient_page_has_no_stream_path() {
        let id = SessionId::parse("abc123").unwrap();
        let paths = Paths::new("/", false);
        let html = shell_for(&paths, &id, &Signals::new());
        assert!(html.contains("data-event-path=\"/_event\""));
        assert!(!html.contains("data-stream-path"));
    }

    #[test]
    fn signals_are_attribute_escaped_and_carry_session_id() {
        let id = SessionId::parse("abc123").unwrap();
        let paths = Paths::new("/counter", true);
        let mut signals = Signals::new();
        signals.insert("label".into(), json!("a\"b"));

        let html = shell_for(&paths, &id, &signals);
        assert!(html.contains("&quot;session_id&quot;:&quot;abc123&quot;"));
        assert!(html.contains("&quot;label&quot;:&quot;a\\&quot;b&quot;"));
    }
}
