//! A counter view shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::socket::Socket;
use crate::view::{Outcome, Params, Payload, SessionData, View, ViewError};

#[derive(Default)]
pub(crate) struct CounterView {
    pub(crate) mounts: AtomicUsize,
    pub(crate) teardowns: AtomicUsize,
}

fn count(socket: &Socket) -> i64 {
    socket.get("count").and_then(Value::as_i64).unwrap_or(0)
}

impl View for CounterView {
    fn name(&self) -> &str {
        "counter"
    }

    fn mount(
        &self,
        params: &Params,
        _session: &SessionData,
        mut socket: Socket,
    ) -> Result<Socket, ViewError> {
        self.mounts.fetch_add(1, Ordering::SeqCst);
        if params.get("fail").map(String::as_str) == Some("mount") {
            return Err(ViewError::Failed("refusing to mount".into()));
        }
        socket.assign("count", 0)?;
        socket.put_signal("count", 0)?;
        Ok(socket)
    }

    fn handle_event(
        &self,
        event: &str,
        _payload: &Payload,
        mut socket: Socket,
    ) -> Result<Outcome, ViewError> {
        match event {
            "increment" => {
                let next = count(&socket).saturating_add(1);
                socket.assign("count", next)?;
                socket.put_signal("count", next)?;
                socket.patch("#count", self.render(&socket));
                Ok(Outcome::Continue(socket))
            }
            "touch" => {
                let current = count(&socket);
                socket.put_signal("count", current)?;
                Ok(Outcome::Continue(socket))
            }
            "stop" => {
                socket.patch("#count", "<span id=\"count\">bye</span>");
                Ok(Outcome::Stop(socket))
            }
            "fail" => Err(ViewError::Failed("boom".into())),
            _ => Ok(Outcome::Continue(socket)),
        }
    }

    fn handle_info(&self, message: &Value, mut socket: Socket) -> Result<Outcome, ViewError> {
        if let Some(tick) = message.get("tick") {
            socket.put_signal("tick", tick.clone())?;
        }
        Ok(Outcome::Continue(socket))
    }

    fn render(&self, socket: &Socket) -> String {
        format!("<span id=\"count\">{}</span>", count(socket))
    }

    fn teardown(&self, _socket: &Socket) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}
