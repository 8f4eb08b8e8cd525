//! Log tailing source
//!
//! Follows the server's activity log from its current end and feeds every
//! new line through a [`ParserChain`].

pub mod parsers;
pub mod path;
pub mod tail;

pub use parsers::{LineParser, NowPlayingParser, ParserChain, ScrobbleParser};
pub use path::{default_log_paths, resolve_log_path};
pub use tail::{FileIdentity, LogTail};

use super::{Source, SourceExit};
use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::stop::StopToken;
use async_trait::async_trait;
use event_pipe::EventPipe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hook invoked once per staleness episode to check the server is alive
pub type LivenessProbe = Arc<dyn Fn() + Send + Sync>;

/// Tails the server activity log
pub struct LogSource {
    tail: LogTail,
    config: LoggingConfig,
    parsers: Arc<ParserChain>,
    pipe: EventPipe,
    liveness_probe: Option<LivenessProbe>,
}

impl LogSource {
    /// Source name
    pub const NAME: &'static str = "logging";

    /// Create a source tailing `path`, piping the chain's events into `activity`
    pub fn new(
        path: impl Into<PathBuf>,
        config: &LoggingConfig,
        parsers: Arc<ParserChain>,
        activity: &EventPipe,
    ) -> Result<Self> {
        let events = parsers.event_names();
        let pipe = EventPipe::new(Self::NAME, events.iter().copied());
        pipe.pipe(events, activity)?;

        Ok(Self {
            tail: LogTail::new(path),
            config: config.clone(),
            parsers,
            pipe,
            liveness_probe: None,
        })
    }

    /// Install a liveness probe
    pub fn with_liveness_probe(mut self, probe: impl Fn() + Send + Sync + 'static) -> Self {
        self.liveness_probe = Some(Arc::new(probe));
        self
    }

    /// Wait for the next line
    ///
    /// Polls every `stale_sleep` while no line is available. Once the log has
    /// been silent for half of `timeout`, checks for rotation and reopens the
    /// path if the file changed (restarting the staleness window); otherwise,
    /// if `ping` is set, runs the liveness probe once. Fails with
    /// [`Error::Stale`] after a full `timeout` of silence.
    ///
    /// Returns `Ok(None)` if stop was requested.
    pub async fn read_line_retry(
        &mut self,
        timeout: Duration,
        mut ping: bool,
        stale_sleep: Duration,
        stop: &StopToken,
    ) -> Result<Option<String>> {
        let mut stale_since: Option<Instant> = None;

        loop {
            if stop.is_stopped() {
                return Ok(None);
            }

            if let Some(line) = self.tail.read_line().await? {
                // Rate limit
                stop.sleep(self.config.line_pause()).await;
                return Ok(Some(line));
            }

            match stale_since {
                None => stale_since = Some(Instant::now()),
                Some(since) => {
                    let elapsed = since.elapsed();

                    if elapsed > timeout {
                        return Err(Error::Stale { elapsed });
                    }

                    if elapsed > timeout / 2 {
                        if self.tail.rotated().await {
                            info!("Log file moved (probably rotated), reopening");
                            self.tail.close();
                            stale_since = None;
                        } else if ping {
                            if let Some(probe) = &self.liveness_probe {
                                debug!("Log stale for {:?}, probing server", elapsed);
                                probe();
                            }
                            ping = false;
                        }
                    }
                }
            }

            if stop.sleep(stale_sleep).await {
                return Ok(None);
            }
        }
    }

    /// Feed one line through the parser chain
    pub fn process(&self, line: &str) -> bool {
        self.parsers.process(line, &self.pipe)
    }

    /// Release the log file
    pub fn close(&mut self) {
        self.tail.close();
    }

    async fn run_loop(&mut self, stop: &StopToken) -> SourceExit {
        let timeout = self.config.timeout();

        let priming = self
            .read_line_retry(timeout, true, self.config.priming_stale_sleep(), stop)
            .await;

        match priming {
            Ok(Some(line)) => {
                self.process(&line);
            }
            Ok(None) => return SourceExit::Stopped,
            Err(err) => {
                warn!("Unable to read log file {:?}: {}", self.tail.path(), err);
                return match err {
                    Error::Stale { .. } => SourceExit::Stale,
                    _ => SourceExit::Unavailable,
                };
            }
        }

        debug!("Ready");

        let mut ping = true;
        loop {
            match self
                .read_line_retry(timeout, ping, self.config.stale_sleep(), stop)
                .await
            {
                Ok(Some(line)) => {
                    self.process(&line);
                }
                Ok(None) => return SourceExit::Stopped,
                Err(Error::Stale { elapsed }) => {
                    warn!("No new log lines for {:?}, stopping", elapsed);
                    return SourceExit::Stale;
                }
                Err(err) => {
                    warn!("Unable to read log file {:?}: {}", self.tail.path(), err);
                    return SourceExit::Failed;
                }
            }
            ping = false;
        }
    }
}

#[async_trait]
impl Source for LogSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pipe(&self) -> &EventPipe {
        &self.pipe
    }

    async fn run(&mut self, stop: StopToken) -> SourceExit {
        let exit = self.run_loop(&stop).await;
        self.close();
        debug!("Logging source exited: {:?}", exit);
        exit
    }
}

impl std::fmt::Debug for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSource")
            .field("tail", &self.tail)
            .field("parsers", &self.parsers)
            .field("liveness_probe", &self.liveness_probe.is_some())
            .finish()
    }
}
