//! Per-host circuit breakers
//!
//! A host that keeps failing is skipped for a cooldown period so one dead
//! news site cannot eat the whole fetch budget. After the cooldown a single
//! probe request is let through; its outcome closes or re-opens the circuit.
//! A probe that is dropped before it finishes counts as a failed probe.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker for a single host
#[derive(Debug)]
pub struct CircuitBreaker {
    host: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(host: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            host: host.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            trips: AtomicU64::new(0),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Returns false while the host is cooling down
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner.opened_at.map_or(true, |t| t.elapsed() >= self.cooldown);
                if cooled {
                    info!(host = %self.host, "Circuit half-open, sending probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    debug!(host = %self.host, "Circuit open, request skipped");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Takes a request slot that settles the breaker when dropped.
    ///
    /// Call [`BreakerPermit::success`] or [`BreakerPermit::failure`] with the
    /// outcome. A permit dropped without either (timeout, cancellation)
    /// releases the half-open probe slot and re-opens the circuit.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.allow_request().then(|| BreakerPermit {
            breaker: Arc::clone(self),
            settled: false,
        })
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(host = %self.host, "Circuit closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        host = %self.host,
                        failures = inner.consecutive_failures,
                        cooldown_secs = self.cooldown.as_secs(),
                        "Circuit tripped"
                    );
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                warn!(host = %self.host, "Probe failed, circuit re-opened");
                self.open(&mut inner);
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    fn record_abandoned(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            warn!(host = %self.host, "Probe abandoned, circuit re-opened");
            inner.probe_in_flight = false;
            self.open(&mut inner);
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        self.trips.fetch_add(1, Ordering::Relaxed);
        metrics::CIRCUIT_TRIPS.with_label_values(&[&self.host]).inc();
    }
}

/// One admitted request against a [`CircuitBreaker`]
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    settled: bool,
}

impl BreakerPermit {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_abandoned();
        }
    }
}

/// Lazily creates one breaker per host
#[derive(Debug)]
pub struct BreakerRegistry {
    failure_threshold: u32,
    cooldown: Duration,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn for_host(&self, host: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(host) {
            return breaker.clone();
        }
        self.breakers
            .write()
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(host, self.failure_threshold, self.cooldown)))
            .clone()
    }

    /// Hosts whose circuit is not closed
    pub fn unhealthy_hosts(&self) -> Vec<String> {
        self.breakers
            .read()
            .values()
            .filter(|b| b.state() != CircuitState::Closed)
            .map(|b| b.host().to_string())
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}
