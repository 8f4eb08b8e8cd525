//! Publish/subscribe relay with declared event names

use crate::{
    error::{Error, Result},
    event::{Event, EventPattern},
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// Callback invoked for every matching event
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies a subscription so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    handler: Handler,
}

struct Inner {
    label: String,
    declared: Vec<EventPattern>,
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

/// A relay for a fixed set of declared event names
///
/// Handlers run synchronously on the emitting thread, in the order they
/// subscribed. Forwarding to another pipe is itself a subscription, so
/// composition happens purely by registration.
///
/// Cloning an `EventPipe` yields another handle to the same relay.
#[derive(Clone)]
pub struct EventPipe {
    inner: Arc<Inner>,
}

impl EventPipe {
    /// Create a pipe that may carry the given names
    pub fn new<I, P>(label: impl Into<String>, declared: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<EventPattern>,
    {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                declared: declared.into_iter().map(Into::into).collect(),
                subscriptions: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Label used in log output
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The declared event names
    pub fn declared(&self) -> &[EventPattern] {
        &self.inner.declared
    }

    /// Check whether every name matched by `pattern` is declared
    pub fn declares(&self, pattern: &EventPattern) -> bool {
        self.inner.declared.iter().any(|d| d.covers(pattern))
    }

    /// Register `handler` for every event matching `pattern`
    pub fn subscribe<F>(&self, pattern: impl Into<EventPattern>, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let pattern = pattern.into();

        if !self.inner.declared.iter().any(|d| d.overlaps(&pattern)) {
            return Err(self.undeclared(&pattern));
        }

        Ok(self.insert(pattern, Arc::new(handler)))
    }

    /// Remove a subscription, returning whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Forward every one of `names` to `target`, unmodified
    ///
    /// Each name must be declared by both pipes. On error nothing is
    /// registered.
    pub fn pipe<I, P>(&self, names: I, target: &EventPipe) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<EventPattern>,
    {
        let names: Vec<EventPattern> = names.into_iter().map(Into::into).collect();

        for name in &names {
            if !self.declares(name) {
                return Err(self.undeclared(name));
            }
            if !target.declares(name) {
                return Err(target.undeclared(name));
            }
        }

        for name in names {
            debug!("Piping {} from {} to {}", name, self.label(), target.label());

            let target = target.clone();
            self.insert(name, Arc::new(move |event: &Event| target.emit(event)));
        }

        Ok(())
    }

    /// Alias of [`EventPipe::pipe`]
    pub fn forward_all<I, P>(&self, names: I, target: &EventPipe) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<EventPattern>,
    {
        self.pipe(names, target)
    }

    /// Deliver an event to every matching subscriber
    pub fn emit(&self, event: &Event) {
        // Snapshot so handlers may (un)subscribe without deadlocking
        let handlers: Vec<Handler> = {
            let subscriptions = self
                .inner
                .subscriptions
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            subscriptions
                .iter()
                .filter(|s| s.pattern.matches(&event.name))
                .map(|s| s.handler.clone())
                .collect()
        };

        trace!("{}: {} -> {} handler(s)", self.label(), event.name, handlers.len());

        for handler in handlers {
            handler(event);
        }
    }

    /// Build an event from a name and optional payload, then emit it
    pub fn publish(&self, name: impl Into<String>, payload: Option<serde_json::Value>) -> Event {
        let event = match payload {
            Some(payload) => Event::with_payload(name, payload),
            None => Event::new(name),
        };
        self.emit(&event);
        event
    }

    /// Number of active subscriptions, forwards included
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn insert(&self, pattern: EventPattern, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription { id, pattern, handler });
        id
    }

    fn undeclared(&self, pattern: &EventPattern) -> Error {
        Error::Undeclared {
            name: pattern.to_string(),
            pipe: self.inner.label.clone(),
        }
    }
}

impl fmt::Debug for EventPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPipe")
            .field("label", &self.inner.label)
            .field("declared", &self.inner.declared)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
