//! Real-time activity from a Plex Media Server
//!
//! Two independent sources feed a single [`Activity`] facade:
//!
//! - the notification socket source subscribes to the server's push channel
//!   and classifies playback, library scan and timeline notifications
//! - the log tailing source follows the server's activity log and runs every
//!   new line through a chain of line parsers
//!
//! Both publish normalized events (`websocket.playing`, `action.scrobble`,
//! ...) through [`event_pipe::EventPipe`]s forwarded into the facade, where
//! callers subscribe by name or wildcard pattern.
//!
//! # Example
//!
//! ```no_run
//! use plex_activity::{Activity, ActivityConfig};
//!
//! # fn main() -> plex_activity::Result<()> {
//! let activity = Activity::new(ActivityConfig::from_env());
//!
//! activity.on("websocket.playing", |event| {
//!     println!("playing: {:?}", event.payload);
//! })?;
//! activity.on("action.scrobble", |event| {
//!     println!("scrobble: {:?}", event.payload);
//! })?;
//!
//! smol::block_on(async {
//!     let handle = activity.start()?;
//!     for (source, exit) in handle.join().await {
//!         println!("{} source exited: {:?}", source, exit);
//!     }
//!     Ok::<_, plex_activity::Error>(())
//! })
//! # }
//! ```

#![warn(missing_docs)]

pub mod activity;
pub mod config;
pub mod error;
pub mod events;
pub mod sources;
pub mod stop;

pub use activity::{Activity, ActivityHandle};
pub use config::{ActivityConfig, LoggingConfig, ServerConfig, WebSocketConfig};
pub use error::{Error, Result};
pub use events::Emission;
pub use sources::logging::{LineParser, LogSource, ParserChain};
pub use sources::websocket::{ReconnectPolicy, WebSocketSource};
pub use sources::{Source, SourceExit};
pub use stop::{StopSignal, StopToken, stop_pair};

pub use event_pipe::{Event, EventPattern, EventPipe, SubscriptionId};
