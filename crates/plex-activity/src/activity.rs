//! Process-wide activity facade

use crate::config::ActivityConfig;
use crate::error::Result;
use crate::events::{LOGGING_EVENTS, WEBSOCKET_EVENTS};
use crate::sources::logging::{LogSource, ParserChain, resolve_log_path};
use crate::sources::websocket::WebSocketSource;
use crate::sources::{Source, SourceExit};
use crate::stop::{StopSignal, stop_pair};
use event_pipe::{Event, EventPattern, EventPipe, SubscriptionId};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

static GLOBAL: OnceLock<Activity> = OnceLock::new();

/// Owns the sources and the pipe every source forwards into
pub struct Activity {
    config: ActivityConfig,
    pipe: EventPipe,
    parsers: Arc<ParserChain>,
}

impl Activity {
    /// Activity with the default parser chain
    pub fn new(config: ActivityConfig) -> Self {
        Self::with_parsers(config, ParserChain::default())
    }

    /// Activity with a custom parser chain for the log source
    pub fn with_parsers(config: ActivityConfig, parsers: ParserChain) -> Self {
        let mut declared: Vec<&'static str> = WEBSOCKET_EVENTS.to_vec();
        for name in LOGGING_EVENTS.iter().copied().chain(parsers.event_names()) {
            if !declared.contains(&name) {
                declared.push(name);
            }
        }

        Self {
            config,
            pipe: EventPipe::new("activity", declared),
            parsers: Arc::new(parsers),
        }
    }

    /// The process-wide instance, configured from the environment on first use
    pub fn global() -> &'static Activity {
        GLOBAL.get_or_init(|| Activity::new(ActivityConfig::from_env()))
    }

    /// Active configuration
    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    /// The facade pipe
    pub fn pipe(&self) -> &EventPipe {
        &self.pipe
    }

    /// Subscribe to events matching `pattern`
    pub fn on<F>(&self, pattern: impl Into<EventPattern>, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Ok(self.pipe.subscribe(pattern, handler)?)
    }

    /// Remove a subscription
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.pipe.unsubscribe(id)
    }

    /// Build every enabled source, wired into the facade pipe
    pub fn sources(&self) -> Result<Vec<Box<dyn Source>>> {
        let mut sources: Vec<Box<dyn Source>> = Vec::new();

        if self.config.websocket.enabled {
            sources.push(Box::new(WebSocketSource::new(
                self.config.server.clone(),
                self.config.websocket.reconnect.clone(),
                &self.pipe,
            )?));
        }

        if self.config.logging.enabled {
            match resolve_log_path(self.config.logging.path.as_deref()) {
                Some(path) => sources.push(Box::new(LogSource::new(
                    path,
                    &self.config.logging,
                    self.parsers.clone(),
                    &self.pipe,
                )?)),
                None => warn!("No server log file found, logging source disabled"),
            }
        }

        Ok(sources)
    }

    /// Launch every enabled source on its own task
    pub fn start(&self) -> Result<ActivityHandle> {
        self.config.validate()?;

        let sources = self.sources()?;
        let (signal, token) = stop_pair();

        let tasks = sources
            .into_iter()
            .map(|mut source| {
                let name = source.name();
                let token = token.clone();
                info!("Starting {} source", name);
                (name, smol::spawn(async move { source.run(token).await }))
            })
            .collect();

        Ok(ActivityHandle { signal, tasks })
    }
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activity")
            .field("config", &self.config)
            .field("pipe", &self.pipe)
            .field("parsers", &self.parsers)
            .finish()
    }
}

/// Running sources
///
/// Dropping the handle stops and cancels the sources.
pub struct ActivityHandle {
    signal: StopSignal,
    tasks: Vec<(&'static str, smol::Task<SourceExit>)>,
}

impl ActivityHandle {
    /// Names of the running sources
    pub fn sources(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Ask every source to stop
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Wait for every source to end
    pub async fn join(self) -> Vec<(&'static str, SourceExit)> {
        let Self { signal, tasks } = self;
        let mut exits = Vec::with_capacity(tasks.len());

        for (name, task) in tasks {
            let exit = task.await;
            info!("{} source exited: {:?}", name, exit);
            exits.push((name, exit));
        }

        drop(signal);
        exits
    }
}

impl std::fmt::Debug for ActivityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityHandle")
            .field("sources", &self.sources())
            .field("stopped", &self.signal.is_stopped())
            .finish()
    }
}
