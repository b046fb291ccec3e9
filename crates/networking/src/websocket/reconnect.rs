//! Capped exponential backoff for unexpected connection loss

use std::time::Duration;
use tokio::task::JoinHandle;

/// Reconnection limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Consecutive automatic attempts before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// `min(base * 2^attempt, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

/// What to do about an unexpected close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

/// Tracks consecutive reconnect attempts and the single pending timer
#[derive(Debug)]
pub struct ReconnectScheduler {
    policy: BackoffPolicy,
    attempt: u32,
    timer: Option<JoinHandle<()>>,
}

impl ReconnectScheduler {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            timer: None,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Decide on an unexpected close. Any pending timer is cancelled first.
    pub fn on_unexpected_close(&mut self) -> ReconnectDecision {
        self.cancel();

        if self.attempt >= self.policy.max_attempts {
            return ReconnectDecision::Exhausted {
                attempts: self.attempt,
            };
        }

        self.attempt += 1;
        ReconnectDecision::Retry {
            attempt: self.attempt,
            delay: self.policy.delay_for(self.attempt),
        }
    }

    /// Keep the timer spawned for the last `Retry` decision
    pub fn arm(&mut self, timer: JoinHandle<()>) {
        self.cancel();
        self.timer = Some(timer);
    }

    /// The armed timer ran to completion; forget it without aborting
    pub fn timer_fired(&mut self) {
        self.timer = None;
    }

    pub fn on_open(&mut self) {
        self.attempt = 0;
    }

    /// Abort the pending timer, if any
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Cancel and start counting from zero again
    pub fn reset(&mut self) {
        self.cancel();
        self.attempt = 0;
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
