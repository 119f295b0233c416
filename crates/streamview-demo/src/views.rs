//! Demo views.
//!
//! - [`Counter`]: persistent; the count lives in the session actor
//! - [`QuickCounter`]: transient; the count lives in the browser's signals
//! - [`Clock`]: persistent; updated by broadcast info messages

use serde_json::Value;
use streamview_core::{
    Outcome, Params, Payload, RenderMode, SessionData, Socket, View, ViewError,
};
use streamview_wire::escape_attr;

fn as_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn button(socket: &Socket, event: &str, label: &str) -> String {
    format!(
        "<button data-on-click=\"@post('{}')\">{label}</button>",
        socket.paths().event_url(event)
    )
}

/// Counter held by a session actor.
#[derive(Debug, Default)]
pub struct Counter;

impl View for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn mount(
        &self,
        params: &Params,
        _session: &SessionData,
        mut socket: Socket,
    ) -> Result<Socket, ViewError> {
        let start = params
            .get("start")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        socket.assign("count", start)?;
        socket.put_signal("count", start)?;
        Ok(socket)
    }

    fn handle_event(
        &self,
        event: &str,
        _payload: &Payload,
        mut socket: Socket,
    ) -> Result<Outcome, ViewError> {
        let current = as_count(socket.get("count"));
        let next = match event {
            "increment" => current.saturating_add(1),
            "decrement" => current.saturating_sub(1),
            "reset" => {
                socket.put_flash("info", "Counter reset");
                socket.script("console.log('counter reset')");
                0
            }
            "close" => {
                socket.patch("#counter", "<section id=\"counter\">Session closed.</section>");
                return Ok(Outcome::Stop(socket));
            }
            _ => return Ok(Outcome::Continue(socket)),
        };
        if event != "reset" {
            socket.clear_flash();
        }

        socket.assign("count", next)?;
        socket.put_signal("count", next)?;
        socket.patch("#counter", self.render(&socket));
        Ok(Outcome::Continue(socket))
    }

    fn render(&self, socket: &Socket) -> String {
        let flash = socket
            .flash()
            .get("info")
            .map(|msg| format!("<p class=\"flash\">{}</p>", escape_attr(msg)))
            .unwrap_or_default();
        format!(
            "<section id=\"counter\">{flash}<span id=\"count\">{}</span> {} {} {} {}</section>",
            as_count(socket.get("count")),
            button(socket, "decrement", "-"),
            button(socket, "increment", "+"),
            button(socket, "reset", "reset"),
            button(socket, "close", "close"),
        )
    }
}

/// Counter rebuilt on every request from the browser's signals.
#[derive(Debug, Default)]
pub struct QuickCounter;

impl View for QuickCounter {
    fn name(&self) -> &str {
        "quick-counter"
    }

    fn mode(&self) -> RenderMode {
        RenderMode::Transient
    }

    fn mount(
        &self,
        _params: &Params,
        _session: &SessionData,
        mut socket: Socket,
    ) -> Result<Socket, ViewError> {
        socket.put_signal("count", 0)?;
        Ok(socket)
    }

    fn handle_event(
        &self,
        event: &str,
        payload: &Payload,
        mut socket: Socket,
    ) -> Result<Outcome, ViewError> {
        let current = as_count(payload.get("count"));
        let next = match event {
            "increment" => current.saturating_add(1),
            "decrement" => current.saturating_sub(1),
            _ => return Ok(Outcome::Continue(socket)),
        };
        socket.put_signal("count", next)?;
        socket.patch("#count", format!("<span id=\"count\">{next}</span>"));
        Ok(Outcome::Continue(socket))
    }

    fn render(&self, socket: &Socket) -> String {
        format!(
            "<section><span id=\"count\">{}</span> {} {}</section>",
            as_count(socket.signal("count")),
            button(socket, "decrement", "-"),
            button(socket, "increment", "+"),
        )
    }
}

/// Wall clock pushed to every open page.
#[derive(Debug, Default)]
pub struct Clock;

impl View for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn mount(
        &self,
        _params: &Params,
        _session: &SessionData,
        mut socket: Socket,
    ) -> Result<Socket, ViewError> {
        socket.assign("now", "--:--:--")?;
        Ok(socket)
    }

    fn handle_event(
        &self,
        _event: &str,
        _payload: &Payload,
        socket: Socket,
    ) -> Result<Outcome, ViewError> {
        Ok(Outcome::Continue(socket))
    }

    fn handle_info(&self, message: &Value, mut socket: Socket) -> Result<Outcome, ViewError> {
        if let Some(now) = message.get("clock").and_then(Value::as_str) {
            socket.assign("now", now)?;
            socket.patch("#clock", self.render(&socket));
        }
        Ok(Outcome::Continue(socket))
    }

    fn render(&self, socket: &Socket) -> String {
        let now = socket.get("now").and_then(Value::as_str).unwrap_or_default();
        format!("<time id=\"clock\">{}</time>", escape_attr(now))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use streamview_core::{Paths, SessionId};

    use super::*;

    fn socket(base: &str) -> Socket {
        Socket::new(SessionId::generate(), Paths::new(base, true))
    }

    #[test]
    fn counter_mounts_from_start_param() {
        let mut params = Params::new();
        params.insert("start".into(), "7".into());
        let socket = Counter
            .mount(&params, &SessionData::new(), socket("/counter"))
            .unwrap();
        assert_eq!(socket.signal("count"), Some(&json!(7)));
        assert!(Counter.render(&socket).contains("<span id=\"count\">7</span>"));
    }

    #[test]
    fn counter_reset_flashes_and_runs_script() {
        let socket = Counter
            .mount(&Params::new(), &SessionData::new(), socket("/counter"))
            .unwrap();
        let socket = Counter
            .handle_event("increment", &Payload::new(), socket)
            .unwrap()
            .into_socket();
        let mut socket = Counter
            .handle_event("reset", &Payload::new(), socket)
            .unwrap()
            .into_socket();

        assert_eq!(socket.get("count"), Some(&json!(0)));
        assert_eq!(socket.flash().get("info").map(String::as_str), Some("Counter reset"));
        let effects = socket.take_effects();
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn counter_flash_is_escaped() {
        let mut socket = Counter
            .mount(&Params::new(), &SessionData::new(), socket("/counter"))
            .unwrap();
        socket.put_flash("info", "<b>hi</b> & bye");

        let markup = Counter.render(&socket);
        assert!(markup.contains("<p class=\"flash\">&lt;b&gt;hi&lt;/b&gt; &amp; bye</p>"));
        assert!(!markup.contains("<b>hi</b>"));
    }

    #[test]
    fn counter_close_stops_the_session() {
        let socket = Counter
            .mount(&Params::new(), &SessionData::new(), socket("/counter"))
            .unwrap();
        let outcome = Counter.handle_event("close", &Payload::new(), socket).unwrap();
        assert!(outcome.is_stop());
    }

    #[test]
    fn quick_counter_reads_count_from_payload() {
        let mut socket = QuickCounter
            .mount(&Params::new(), &SessionData::new(), socket("/"))
            .unwrap();
        socket.mark_clean();
        let mut payload = Payload::new();
        payload.insert("count".into(), json!(5));

        let socket = QuickCounter
            .handle_event("increment", &payload, socket)
            .unwrap()
            .into_socket();
        assert_eq!(socket.published_signals().get("count"), Some(&json!(6)));
    }

    #[test]
    fn clock_patches_on_broadcast() {
        let socket = Clock
            .mount(&Params::new(), &SessionData::new(), socket("/clock"))
            .unwrap();
        let socket = Clock
            .handle_info(&json!({"clock": "12:00:00"}), socket)
            .unwrap()
            .into_socket();
        assert_eq!(Clock.render(&socket), "<time id=\"clock\">12:00:00</time>");
        assert_eq!(socket.effects().len(), 1);
    }
}
