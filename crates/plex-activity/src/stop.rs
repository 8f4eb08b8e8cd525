//! Cooperative stop signal for source loops

use async_io::Timer;
use std::future::Future;
use std::time::Duration;

/// Create a connected signal/token pair
pub fn stop_pair() -> (StopSignal, StopToken) {
    let (tx, rx) = async_channel::bounded(1);
    (StopSignal { tx }, StopToken { rx: Some(rx) })
}

/// Owner side: requests every token of the pair to stop
///
/// Dropping the last signal also stops the tokens.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: async_channel::Sender<()>,
}

impl StopSignal {
    /// Ask all tokens to stop
    pub fn stop(&self) {
        self.tx.close();
    }

    /// Check whether stop was requested
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Source side: observed between blocking steps
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: Option<async_channel::Receiver<()>>,
}

impl StopToken {
    /// A token that never stops
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Check whether stop was requested
    pub fn is_stopped(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| rx.is_closed())
    }

    /// Resolve once stop is requested
    pub async fn stopped(&self) {
        match &self.rx {
            // Nothing is ever sent, so recv only returns once the channel closes
            Some(rx) => while rx.recv().await.is_ok() {},
            None => futures_lite::future::pending::<()>().await,
        }
    }

    /// Drive `future` unless stop is requested first
    pub async fn run_until<T>(&self, future: impl Future<Output = T>) -> Option<T> {
        futures_lite::future::or(async { Some(future.await) }, async {
            self.stopped().await;
            None
        })
        .await
    }

    /// Sleep for `duration`; returns `true` if interrupted by stop
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run_until(Timer::after(duration)).await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[smol_potat::test]
    async fn test_sleep_completes_without_stop() {
        let (_signal, token) = stop_pair();
        assert!(!token.sleep(Duration::from_millis(10)).await);
        assert!(!token.is_stopped());
    }

    #[smol_potat::test]
    async fn test_stop_interrupts_sleep() {
        let (signal, token) = stop_pair();

        let sleeper = smol::spawn(async move {
            let start = Instant::now();
            let interrupted = token.sleep(Duration::from_secs(30)).await;
            (interrupted, start.elapsed())
        });

        async_io::Timer::after(Duration::from_millis(20)).await;
        signal.stop();

        let (interrupted, elapsed) = sleeper.await;
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(5));
        assert!(signal.is_stopped());
    }

    #[smol_potat::test]
    async fn test_dropping_signal_stops_token() {
        let (signal, token) = stop_pair();
        drop(signal);
        assert!(token.is_stopped());
        token.stopped().await;
        assert_eq!(token.run_until(futures_lite::future::pending::<()>()).await, None);
    }

    #[smol_potat::test]
    async fn test_never_token() {
        let token = StopToken::never();
        assert!(!token.is_stopped());
        assert_eq!(token.run_until(async { 7 }).await, Some(7));
    }
}
