use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::time::Instant;

/// Spacing rules for requests to one domain.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub base: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            jitter_min: Duration::from_millis(100),
            jitter_max: Duration::from_millis(300),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    fn spacing(&self) -> Duration {
        let jitter = if self.jitter_max <= self.jitter_min {
            self.jitter_min
        } else {
            rand::thread_rng().gen_range(self.jitter_min..self.jitter_max)
        };
        self.base + jitter
    }
}

/// Reserves request slots per domain so that consecutive requests to the same
/// host are spaced by at least [`Pacing::base`] plus jitter.
pub struct DomainPacer {
    pacing: Pacing,
    next_slot: DashMap<String, Instant>,
}

impl DomainPacer {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            next_slot: DashMap::new(),
        }
    }

    /// Wait until `domain` may be contacted again and reserve the slot.
    pub async fn wait(&self, domain: &str) {
        let now = Instant::now();
        let spacing = self.pacing.spacing();
        let slot = {
            let mut next = self.next_slot.entry(domain.to_string()).or_insert(now);
            let slot = (*next).max(now);
            *next = slot + spacing;
            slot
        };
        if slot > now {
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Forget every reservation. Called when configuration is reloaded.
    pub fn reset(&self) {
        self.next_slot.clear();
    }

    pub fn tracked_domains(&self) -> usize {
        self.next_slot.len()
    }
}
