//! Activity sources
//!
//! Each source owns an [`EventPipe`] declaring the names it may emit, piped
//! into the facade pipe at construction, and runs its ingestion loop until
//! stopped or until a fatal condition ends it.

pub mod logging;
pub mod websocket;

use crate::stop::StopToken;
use async_trait::async_trait;
use event_pipe::EventPipe;
use serde::Serialize;

/// Why a source's run loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceExit {
    /// Stop was requested
    Stopped,
    /// Input could not be opened or read at startup
    Unavailable,
    /// No new input within the staleness timeout
    Stale,
    /// Reconnection attempts were exhausted or rejected
    ReconnectExhausted,
    /// Unrecoverable error while running
    Failed,
}

impl SourceExit {
    /// Whether the source ended on request
    pub fn is_stopped(&self) -> bool {
        matches!(self, SourceExit::Stopped)
    }
}

/// A long-running ingestion loop
#[async_trait]
pub trait Source: Send {
    /// Source name, also the label of its pipe
    fn name(&self) -> &'static str;

    /// Pipe the source emits into
    fn pipe(&self) -> &EventPipe;

    /// Run until stopped or a fatal condition is reached
    async fn run(&mut self, stop: StopToken) -> SourceExit;
}
