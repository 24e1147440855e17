//! Randomized pauses between portal interactions.

use std::time::Duration;

use tracing::trace;

use crate::config::{DelayRange, PacingConfig};

/// Sleeps drawn from the configured pacing ranges.
#[derive(Debug, Clone)]
pub struct Throttle {
    pacing: PacingConfig,
}

impl Throttle {
    pub fn new(pacing: PacingConfig) -> Self {
        Self { pacing }
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    pub async fn settle(&self) {
        self.pause("settle", self.pacing.settle).await;
    }

    pub async fn court_settle(&self) {
        self.pause("court", self.pacing.court_settle).await;
    }

    pub async fn participant(&self) {
        self.pause("participant", self.pacing.participant).await;
    }

    pub async fn cooldown(&self) {
        self.pause("cooldown", self.pacing.cooldown).await;
    }

    pub async fn landing(&self) {
        self.pause("landing", self.pacing.landing).await;
    }

    pub fn keystroke(&self) -> Duration {
        self.pacing.keystroke()
    }

    pub fn email_keystroke(&self) -> Duration {
        self.pacing.email_keystroke()
    }

    async fn pause(&self, label: &str, range: DelayRange) {
        let delay = range.sample();
        if delay.is_zero() {
            return;
        }
        trace!("Pausing {:.2}s ({})", delay.as_secs_f64(), label);
        tokio::time::sleep(delay).await;
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_sleeps_within_range() {
        let throttle = Throttle::default();
        let start = tokio::time::Instant::now();
        throttle.cooldown().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(15) + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_no_pacing_returns_immediately() {
        let throttle = Throttle::new(PacingConfig::none());
        let start = std::time::Instant::now();
        throttle.cooldown().await;
        throttle.landing().await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(throttle.keystroke(), Duration::ZERO);
    }
}
