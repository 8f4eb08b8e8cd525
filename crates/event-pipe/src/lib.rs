//! Declared-name publish/subscribe relay
//!
//! An [`EventPipe`] is created with the set of event names it may carry.
//! Components emit [`Event`]s into their own pipe and forward selected names
//! to one or more parent pipes with [`EventPipe::pipe`]. Registration is
//! checked against the declared names of both ends, so an undeclared name can
//! never be routed anywhere.
//!
//! # Example
//!
//! ```
//! use event_pipe::EventPipe;
//!
//! # fn example() -> event_pipe::Result<()> {
//! let activity = EventPipe::new("activity", ["action.scrobble", "logging.playing"]);
//! let source = EventPipe::new("logging", ["action.scrobble"]);
//! source.pipe(["action.scrobble"], &activity)?;
//!
//! activity.subscribe("action.scrobble", |event| {
//!     println!("{}: {:?}", event.name, event.payload);
//! })?;
//!
//! source.publish("action.scrobble", Some(serde_json::json!({"rating_key": "123"})));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod pipe;

pub use error::{Error, Result};
pub use event::{Event, EventPattern};
pub use pipe::{EventPipe, Handler, SubscriptionId};
