//! Server lifecycle tests over a real TCP listener.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use streamview_core::{
    Outcome, Params, Payload, SessionData, SessionId, Socket, View, ViewError,
};
use streamview_server::{serve_until, LiveConfig, LiveRouter, LiveState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct Ticker;

impl View for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    fn mount(
        &self,
        _params: &Params,
        _session: &SessionData,
        mut socket: Socket,
    ) -> Result<Socket, ViewError> {
        socket.put_signal("ticks", 0)?;
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

    fn render(&self, _socket: &Socket) -> String {
        String::from("<p>ticker</p>")
    }
}

/// Read until the response headers are complete.
async fn read_headers(conn: &mut TcpStream) -> String {
    let mut received = Vec::new();
    let mut buf = [0_u8; 1024];
    while !String::from_utf8_lossy(&received).contains("\r\n\r\n") {
        let n = conn.read(&mut buf).await.unwrap();
        if n == 0 {
            panic!("connection closed before headers");
        }
        received.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn shutdown_closes_open_streams_and_returns() {
    let live = LiveRouter::new(LiveState::new(LiveConfig::default(), "Test"))
        .live("/ticker", Ticker);
    let directory = live.directory();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, signal) = oneshot::channel::<()>();
    let shutdown = async move {
        let _ = signal.await;
    };
    let server = tokio::spawn(serve_until(
        listener,
        live.build(),
        Arc::clone(&directory),
        shutdown,
    ));

    let mut conn = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ticker/stream?session_id={} HTTP/1.1\r\nHost: localhost\r\n\r\n",
        SessionId::generate()
    );
    conn.write_all(request.as_bytes()).await.unwrap();
    let head = read_headers(&mut conn).await;
    assert!(head.starts_with("HTTP/1.1 200"));
    assert!(head.contains("text/event-stream"));
    assert_eq!(directory.len(), 1);

    stop.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(directory.is_empty());
}
