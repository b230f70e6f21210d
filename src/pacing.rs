//! Global request pacing
//!
//! Every outbound attempt reserves a start slot at least `min_gap` after the
//! previous one, then sleeps until that slot. Reservations are handed out
//! under a lock, so concurrent attempts queue up behind each other instead
//! of all observing the same stale timestamp.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Process-wide (per fetcher) pacing clock
pub struct Pacer {
    min_gap: Duration,
    last_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Creates a pacer enforcing `min_gap` between attempts
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_slot: Mutex::new(None),
        }
    }

    /// Reserves the next start slot and returns it
    pub fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut last = self.last_slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let slot = match *last {
            Some(previous) => (previous + self.min_gap).max(now),
            None => now,
        };
        *last = Some(slot);

        slot
    }

    /// Waits until this caller may issue its attempt
    pub async fn wait_turn(&self) {
        let slot = self.reserve();
        let now = Instant::now();

        if slot > now {
            tracing::debug!(
                delay_ms = (slot - now).as_millis() as u64,
                "Pacing outbound request"
            );
            sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let pacer = Pacer::new(Duration::from_millis(1200));
        let start = Instant::now();
        pacer.wait_turn().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_are_spaced() {
        let pacer = Pacer::new(Duration::from_millis(1200));
        let a = pacer.reserve();
        let b = pacer.reserve();
        let c = pacer.reserve();

        assert_eq!(b - a, Duration::from_millis(1200));
        assert_eq!(c - b, Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_period_resets_to_now() {
        let pacer = Pacer::new(Duration::from_millis(1200));
        pacer.wait_turn().await;

        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        pacer.wait_turn().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_waits_sleep_the_remainder() {
        let pacer = Pacer::new(Duration::from_millis(1200));
        let start = Instant::now();

        pacer.wait_turn().await;
        tokio::time::advance(Duration::from_millis(200)).await;
        pacer.wait_turn().await;

        assert!(start.elapsed() >= Duration::from_millis(1200));
    }
}
