//! Notification socket source
//!
//! Keeps a WebSocket subscription to the server's notification channel open,
//! reconnecting with bounded retry, and turns every decoded notification into
//! events.

pub mod notification;
mod reconnect;

pub use notification::{NotificationRouter, TimelineState, find_children};
pub use reconnect::ReconnectPolicy;

use super::{Source, SourceExit};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::events::WEBSOCKET_EVENTS;
use crate::stop::StopToken;
use async_net::TcpStream;
use async_trait::async_trait;
use async_tungstenite::{WebSocketStream, client_async};
use event_pipe::EventPipe;
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use tungstenite::Message;

/// Connection phase of the socket source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Subscribed to the notification channel
    Connected,
}

/// Data frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// UTF-8 text frame
    Text,
    /// Binary frame
    Binary,
}

/// Outcome of one receive step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A data frame
    Data {
        /// Frame kind
        opcode: Opcode,
        /// Raw frame payload
        payload: Vec<u8>,
    },
    /// The connection is gone
    Closed,
    /// Control frame, already answered
    Ignored,
}

/// Subscribes to the server's push notifications
pub struct WebSocketSource {
    server: ServerConfig,
    policy: ReconnectPolicy,
    state: ConnectionState,
    ws: Option<WebSocketStream<TcpStream>>,
    router: NotificationRouter,
    pipe: EventPipe,
}

impl WebSocketSource {
    /// Source name
    pub const NAME: &'static str = "websocket";

    /// Create a disconnected source piping its events into `activity`
    pub fn new(server: ServerConfig, policy: ReconnectPolicy, activity: &EventPipe) -> Result<Self> {
        let pipe = EventPipe::new(Self::NAME, WEBSOCKET_EVENTS.iter().copied());
        pipe.pipe(WEBSOCKET_EVENTS.iter().copied(), activity)?;

        Ok(Self {
            server,
            policy,
            state: ConnectionState::Disconnected,
            ws: None,
            router: NotificationRouter::new(),
            pipe,
        })
    }

    /// Current connection phase
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open a new subscription, replacing any previous connection
    pub async fn connect(&mut self) -> Result<()> {
        let uri = self.server.notification_uri();

        if let Some(mut ws) = self.ws.take() {
            if let Err(err) = ws.close(None).await {
                info!("Unable to close existing websocket: {}", err);
            }
        }

        self.state = ConnectionState::Connecting;

        match self.handshake(&uri).await {
            Ok(ws) => {
                self.ws = Some(ws);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    async fn handshake(&self, uri: &str) -> Result<WebSocketStream<TcpStream>> {
        let stream = TcpStream::connect((self.server.host.as_str(), self.server.port)).await?;
        let (ws, _) = client_async(uri, stream).await?;
        Ok(ws)
    }

    /// Connect unless already connected, retrying per the reconnect policy
    ///
    /// Returns `false` when attempts are exhausted, a non-retryable
    /// rejection is received, or stop is requested.
    pub async fn connect_retry(&mut self, stop: &StopToken) -> bool {
        if self.state == ConnectionState::Connected {
            return true;
        }

        debug!(
            "Connecting to {}:{}...",
            self.server.host, self.server.port
        );

        let policy = self.policy.clone();
        let mut delays = policy.delays();
        let mut attempts = 0;
        let mut last_error: Option<Error> = None;

        while attempts < policy.max_attempts {
            attempts += 1;

            let err = match stop.run_until(self.connect()).await {
                None => return false,
                Some(Ok(())) => {
                    debug!("Connected");
                    return true;
                }
                Some(Err(err)) => err,
            };

            if !err.is_retryable() {
                last_error = Some(err);
                break;
            }

            if let Some(delay) = delays.next() {
                debug!("Connection failed: {} (retrying in {:?})", err, delay);
                if stop.sleep(delay).await {
                    return false;
                }
            }

            last_error = Some(err);
        }

        match last_error {
            Some(err) => error!(
                "Unable to connect to the notification channel: {} (after {} attempts)",
                err, attempts
            ),
            None => error!("Unable to connect to the notification channel"),
        }
        false
    }

    /// Read one frame
    ///
    /// Close frames are acknowledged and pings answered. Any transport
    /// error ends the connection and is reported as [`Received::Closed`].
    pub async fn receive(&mut self) -> Received {
        let Some(ws) = self.ws.as_mut() else {
            return Received::Closed;
        };

        let message = match ws.next().await {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                if connection_lost(&err) {
                    debug!("Connection lost: {}", err);
                } else {
                    warn!("Dropping connection after transport error: {}", err);
                }
                self.disconnected();
                return Received::Closed;
            }
            None => {
                self.disconnected();
                return Received::Closed;
            }
        };

        match message {
            Message::Text(text) => Received::Data {
                opcode: Opcode::Text,
                payload: text.as_str().as_bytes().to_vec(),
            },
            Message::Binary(data) => Received::Data {
                opcode: Opcode::Binary,
                payload: data.to_vec(),
            },
            Message::Close(frame) => {
                debug!("Server closed the notification channel: {:?}", frame);
                if let Err(err) = ws.close(None).await {
                    debug!("Close acknowledgment not sent: {}", err);
                }
                self.disconnected();
                Received::Closed
            }
            Message::Ping(data) => {
                if let Err(err) = ws.send(Message::Pong(data)).await {
                    debug!("Unable to answer ping: {}", err);
                }
                Received::Ignored
            }
            Message::Pong(_) | Message::Frame(_) => Received::Ignored,
        }
    }

    /// Decode a data frame and emit the resulting events
    ///
    /// Returns whether anything was emitted.
    pub fn process(&self, received: &Received) -> bool {
        let Received::Data { opcode, payload } = received else {
            return false;
        };

        if *opcode == Opcode::Binary {
            debug!("Binary notification frame ({} bytes)", payload.len());
        }

        let message: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!("Error decoding message from websocket: {}", err);
                debug!("{}", String::from_utf8_lossy(payload));
                return false;
            }
        };

        let Some(emissions) = self.router.route(message) else {
            return false;
        };

        for emission in emissions {
            self.pipe.emit(&emission.into_event());
        }
        true
    }

    /// Close the connection, best-effort
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(err) = ws.close(None).await {
                debug!("Unable to close websocket: {}", err);
            }
        }
        self.state = ConnectionState::Disconnected;
    }

    fn disconnected(&mut self) {
        self.ws = None;
        self.state = ConnectionState::Disconnected;
    }

    fn exit_after_failed_connect(&self, stop: &StopToken) -> SourceExit {
        if stop.is_stopped() {
            SourceExit::Stopped
        } else {
            SourceExit::ReconnectExhausted
        }
    }
}

/// Transport errors that mean the peer went away
fn connection_lost(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
            | tungstenite::Error::Protocol(_)
    )
}

#[async_trait]
impl Source for WebSocketSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pipe(&self) -> &EventPipe {
        &self.pipe
    }

    async fn run(&mut self, stop: StopToken) -> SourceExit {
        if !self.connect_retry(&stop).await {
            return self.exit_after_failed_connect(&stop);
        }

        info!("Listening for notifications");

        loop {
            let Some(received) = stop.run_until(self.receive()).await else {
                self.close().await;
                return SourceExit::Stopped;
            };

            if received == Received::Closed {
                info!("Notification channel closed, reconnecting");
                if !self.connect_retry(&stop).await {
                    return self.exit_after_failed_connect(&stop);
                }
                continue;
            }

            self.process(&received);
        }
    }
}

impl std::fmt::Debug for WebSocketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSource")
            .field("host", &self.server.host)
            .field("port", &self.server.port)
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn source() -> (WebSocketSource, Arc<Mutex<Vec<event_pipe::Event>>>) {
        let activity = EventPipe::new("activity", WEBSOCKET_EVENTS.iter().copied());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        activity
            .subscribe("websocket.*", move |event| sink.lock().unwrap().push(event.clone()))
            .unwrap();

        let source =
            WebSocketSource::new(ServerConfig::default(), ReconnectPolicy::default(), &activity)
                .unwrap();
        (source, seen)
    }

    fn text(payload: &str) -> Received {
        Received::Data {
            opcode: Opcode::Text,
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_process_emits_through_activity() {
        let (source, seen) = source();
        assert_eq!(source.state(), ConnectionState::Disconnected);

        assert!(source.process(&text(
            r#"{"type":"playing","PlaySessionStateNotification":[{"sessionKey":"1"}]}"#
        )));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "websocket.playing");
        assert_eq!(seen[0].payload_str("sessionKey"), Some("1"));
    }

    #[test]
    fn test_process_drops_bad_frames() {
        let (source, seen) = source();

        assert!(!source.process(&text("{not json")));
        assert!(!source.process(&text(r#"{"size": 1}"#)));
        assert!(!source.process(&Received::Ignored));
        assert!(!source.process(&Received::Closed));
        assert!(!source.process(&Received::Data {
            opcode: Opcode::Binary,
            payload: vec![0xff, 0xfe],
        }));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_binary_frames_are_decoded() {
        let (source, seen) = source();
        assert!(source.process(&Received::Data {
            opcode: Opcode::Binary,
            payload: br#"{"type":"status","StatusNotification":[{"title":"Library scan complete"}]}"#
                .to_vec(),
        }));
        assert_eq!(seen.lock().unwrap()[0].name, "websocket.scanner.finished");
        assert_eq!(seen.lock().unwrap()[0].payload, None);
    }

    #[test]
    fn test_activity_must_accept_socket_events() {
        let activity = EventPipe::new("activity", ["action.scrobble"]);
        let result = WebSocketSource::new(ServerConfig::default(), ReconnectPolicy::default(), &activity);
        assert!(matches!(result, Err(Error::Pipe(_))));
    }

    #[smol_potat::test]
    async fn test_receive_without_connection_reports_closed() {
        let (mut source, _) = source();
        assert_eq!(source.receive().await, Received::Closed);
        source.close().await;
        assert_eq!(source.state(), ConnectionState::Disconnected);
    }
}
