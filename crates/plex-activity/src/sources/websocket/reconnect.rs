use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry with linearly increasing backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Attempt ceiling per reconnect episode
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff growth per attempt
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Length of one backoff unit in milliseconds
    #[serde(default = "default_unit_ms")]
    pub unit_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_factor() -> f64 {
    1.2
}

fn default_unit_ms() -> u64 {
    1000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            factor: default_factor(),
            unit_ms: default_unit_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Sleep after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let units = (f64::from(attempt) * self.factor).round().max(0.0);
        Duration::from_millis((units as u64).saturating_mul(self.unit_ms))
    }

    /// Every sleep of a fully exhausted episode, in order
    ///
    /// There is no sleep after the final attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let secs: Vec<u64> = ReconnectPolicy::default()
            .delays()
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(secs, vec![1, 2, 4, 5, 6, 7, 8, 10, 11]);
    }

    #[test]
    fn test_delays_never_decrease() {
        for factor in [0.3, 1.0, 1.2, 2.5] {
            let policy = ReconnectPolicy {
                max_attempts: 25,
                factor,
                unit_ms: 7,
            };
            let delays: Vec<Duration> = policy.delays().collect();
            assert_eq!(delays.len(), 24);
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "factor {}", factor);
        }
    }

    #[test]
    fn test_single_attempt_never_sleeps() {
        let policy = ReconnectPolicy {
            max_attempts: 1,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delays().count(), 0);
    }
}
