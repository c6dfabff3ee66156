use crate::domain::payment::Provider;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

pub mod stats;

pub use stats::{ProviderStats, ALPHA, EPSILON, MARGIN, MIN_SAMPLES, OPEN_FOR, TRIP_RATE};

use stats::{apply_health, apply_observation};

struct Routes {
    default: ProviderStats,
    fallback: ProviderStats,
}

impl Routes {
    fn get_mut(&mut self, provider: Provider) -> &mut ProviderStats {
        match provider {
            Provider::Default => &mut self.default,
            Provider::Fallback => &mut self.fallback,
        }
    }
}

pub struct Decider {
    inner: RwLock<Routes>,
}

impl Decider {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Routes {
                default: ProviderStats::seeded(Duration::from_millis(50)),
                fallback: ProviderStats::seeded(Duration::from_millis(60)),
            }),
        }
    }

    pub fn choose(&self) -> Provider {
        if rand::random::<f64>() < EPSILON {
            // exploration keeps feeding samples to a degraded provider
            return if rand::random::<bool>() {
                Provider::Default
            } else {
                Provider::Fallback
            };
        }
        self.route(Instant::now())
    }

    pub fn route(&self, now: Instant) -> Provider {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match (inner.default.blocked(now), inner.fallback.blocked(now)) {
            (false, true) => Provider::Default,
            (true, false) => Provider::Fallback,
            (true, true) => {
                if inner.default.latency <= inner.fallback.latency {
                    Provider::Default
                } else {
                    Provider::Fallback
                }
            }
            (false, false) => {
                if inner.default.latency <= inner.fallback.latency + MARGIN {
                    Provider::Default
                } else {
                    Provider::Fallback
                }
            }
        }
    }

    pub fn observe(&self, provider: Provider, elapsed: Duration, ok: bool) {
        self.observe_at(provider, elapsed, ok, Instant::now());
    }

    pub fn observe_at(&self, provider: Provider, elapsed: Duration, ok: bool, now: Instant) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply_observation(inner.get_mut(provider), elapsed, ok, now);
    }

    pub fn update_health(&self, provider: Provider, failing: bool, min_response_ms: u64) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply_health(inner.get_mut(provider), failing, min_response_ms, Instant::now());
    }

    pub fn stats(&self, provider: Provider) -> ProviderStats {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match provider {
            Provider::Default => inner.default.clone(),
            Provider::Fallback => inner.fallback.clone(),
        }
    }
}

impl Default for Decider {
    fn default() -> Self {
        Self::new()
    }
}
