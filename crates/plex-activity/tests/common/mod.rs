//! Common test utilities for activity source integration tests

#![allow(dead_code)]

use anyhow::Result;
use async_net::{TcpListener, TcpStream};
use async_tungstenite::accept_async;
use futures::{AsyncReadExt, AsyncWriteExt, StreamExt};
use plex_activity::{Activity, ActivityConfig, Event, ServerConfig};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tungstenite::Message;
use tungstenite::protocol::frame::Frame;
use tungstenite::protocol::frame::coding::{Data, OpCode};

/// Test timeout for async operations
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Frames sent to one accepted connection
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Messages sent right after the handshake
    pub messages: Vec<Message>,
    /// Close the connection once the messages are sent
    pub close: bool,
}

impl Script {
    /// Send text frames, then keep the connection open
    pub fn hold(messages: &[&str]) -> Self {
        Self {
            messages: messages.iter().map(|m| Message::text(*m)).collect(),
            close: false,
        }
    }

    /// Send text frames, then close the connection
    pub fn close(messages: &[&str]) -> Self {
        Self {
            messages: messages.iter().map(|m| Message::text(*m)).collect(),
            close: true,
        }
    }

    /// Send a ping, then text frames, then keep the connection open
    pub fn ping_then(messages: &[&str]) -> Self {
        let mut script = Self::hold(messages);
        script.messages.insert(0, Message::Ping(b"alive".to_vec().into()));
        script
    }
}

/// A text frame whose payload is not valid UTF-8
pub fn invalid_utf8_text() -> Message {
    Message::Frame(Frame::message(
        vec![b'{', 0xff, 0xfe, b'}'],
        OpCode::Data(Data::Text),
        true,
    ))
}

#[derive(Default)]
struct ServerStats {
    connections: AtomicUsize,
    finished: AtomicUsize,
    pongs: AtomicUsize,
}

/// In-process notification channel
///
/// The n-th accepted connection plays the n-th script; connections past the
/// last script are held open silently.
pub struct NotificationServer {
    /// Listening address
    pub addr: SocketAddr,
    stats: Arc<ServerStats>,
    _task: smol::Task<()>,
}

impl NotificationServer {
    /// Bind to an ephemeral port and start accepting
    pub async fn start(scripts: Vec<Script>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let stats = Arc::new(ServerStats::default());
        let shared = stats.clone();

        let task = smol::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let n = shared.connections.fetch_add(1, Ordering::SeqCst);
                let script = scripts.get(n).cloned().unwrap_or_default();
                smol::spawn(serve(stream, script, shared.clone())).detach();
            }
        });

        Ok(Self {
            addr,
            stats,
            _task: task,
        })
    }

    /// Number of accepted connections
    pub fn connections(&self) -> usize {
        self.stats.connections.load(Ordering::SeqCst)
    }

    /// Number of connections the client has gone away from
    pub fn finished(&self) -> usize {
        self.stats.finished.load(Ordering::SeqCst)
    }

    /// Number of pong frames received from clients
    pub fn pongs(&self) -> usize {
        self.stats.pongs.load(Ordering::SeqCst)
    }

    /// Server settings pointing at this server
    pub fn server_config(&self) -> ServerConfig {
        server_config(self.addr)
    }
}

async fn serve(stream: TcpStream, script: Script, stats: Arc<ServerStats>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    for message in script.messages {
        if ws.send(message).await.is_err() {
            stats.finished.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    if script.close {
        let _ = ws.close(None).await;
    }

    // Drain until the client goes away
    while let Some(Ok(message)) = ws.next().await {
        if message.is_pong() {
            stats.pongs.fetch_add(1, Ordering::SeqCst);
        }
    }
    stats.finished.fetch_add(1, Ordering::SeqCst);
}

/// Answers every handshake with a fixed HTTP status
pub struct RejectingServer {
    /// Listening address
    pub addr: SocketAddr,
    attempts: Arc<AtomicUsize>,
    _task: smol::Task<()>,
}

impl RejectingServer {
    /// Bind to an ephemeral port and reject every upgrade with `status`
    pub async fn start(status: u16) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let task = smol::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                smol::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {} Rejected\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.close().await;
                })
                .detach();
            }
        });

        Ok(Self {
            addr,
            attempts,
            _task: task,
        })
    }

    /// Number of handshakes received
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Server settings pointing at this server
    pub fn server_config(&self) -> ServerConfig {
        server_config(self.addr)
    }
}

/// Server settings for a local address
pub fn server_config(addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        token: None,
    }
}

/// Configuration with both sources disabled and fast log polling
pub fn quiet_config() -> ActivityConfig {
    let mut config = ActivityConfig::default();
    config.websocket.enabled = false;
    config.websocket.reconnect.unit_ms = 1;
    config.logging.enabled = false;
    config.logging.timeout_secs = 5;
    config.logging.stale_sleep_ms = 10;
    config.logging.priming_stale_sleep_ms = 10;
    config.logging.line_pause_ms = 0;
    config
}

/// Collect every event matching `pattern`
pub fn record(activity: &Activity, pattern: &str) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    activity
        .on(pattern, move |event| sink.lock().unwrap().push(event.clone()))
        .expect("pattern is declared");
    seen
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        smol::Timer::after(Duration::from_millis(10)).await;
    }
    condition()
}

/// Fail the test if `future` does not finish within [`TEST_TIMEOUT`]
pub async fn within_timeout<T>(future: impl Future<Output = T>) -> T {
    let timeout = async {
        smol::Timer::after(TEST_TIMEOUT).await;
        None
    };

    futures_lite::future::or(async { Some(future.await) }, timeout)
        .await
        .unwrap_or_else(|| panic!("timed out after {:?}", TEST_TIMEOUT))
}

/// Append one line to a log file
pub fn append_line(path: &Path, line: &str) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .expect("open log for append");
    writeln!(file, "{}", line).expect("append log line");
}

/// A scrobble log line for `rating_key`
pub fn scrobble_line(rating_key: u32) -> String {
    format!(
        "Oct 18, 2026 10:15:32.123 [0x7f3a2c1fe700] DEBUG - Library item {} 'Movie {}' got played by account 1!",
        rating_key, rating_key
    )
}

/// Keep appending scrobble lines until `count` scrobble events were seen
///
/// The tail opens at end of file, so lines written before it opened are
/// never read. Returns the next unused rating key.
pub async fn append_until_seen(
    path: &Path,
    seen: &Arc<Mutex<Vec<Event>>>,
    first_key: u32,
    count: usize,
) -> u32 {
    let mut key = first_key;
    let start = Instant::now();

    while seen.lock().unwrap().len() < count {
        assert!(start.elapsed() < TEST_TIMEOUT, "no events after {:?}", TEST_TIMEOUT);
        append_line(path, &scrobble_line(key));
        key += 1;
        smol::Timer::after(Duration::from_millis(100)).await;
    }

    key
}

/// Rating keys of recorded scrobble events
pub fn rating_keys(seen: &Arc<Mutex<Vec<Event>>>) -> Vec<u32> {
    seen.lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.payload_str("rating_key")?.parse().ok())
        .collect()
}
