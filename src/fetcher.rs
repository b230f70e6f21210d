//! Rate-limited, cached, de-duplicating fetcher for one upstream API
//!
//! ```text
//! fetch(endpoint, query, policy)
//!     ↓
//! ResponseCache (fresh under policy.ttl?) ──yes──→ payload
//!     ↓ no
//! InFlightRegistry (same URL pending?) ──yes──→ attach, await shared result
//!     ↓ no
//! Pacer (global min gap) → HttpTransport GET → 2xx: cache + return
//!                                            → 429: Retry-After / backoff, retry
//!                                            → other: fail
//! ```

use crate::{
    cache::ResponseCache,
    config::FetcherConfig,
    constants::{
        BACKOFF_JITTER_MS, DEFAULT_BACKOFF_MS, DEFAULT_RETRIES, DEFAULT_TTL_MS,
        MAX_RETRY_AFTER_SECS,
    },
    error::{ConfigError, FetchError},
    metrics::{FetchMetrics, MetricsCollector},
    pacing::Pacer,
    transport::{HttpTransport, ReqwestTransport},
};
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

type FetchResult = Result<Arc<Value>, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Per-call cache and retry policy
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// How long a cached payload counts as fresh for this caller
    pub ttl: Duration,
    /// Retries allowed after the first attempt when throttled
    pub retries: u32,
    /// Base delay for exponential backoff
    pub backoff: Duration,
    /// Also retry transport failures (DNS, timeouts)
    pub retry_on_network: bool,
    /// Caller-owned cancellation signal
    pub cancel: Option<CancellationToken>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(DEFAULT_TTL_MS),
            retries: DEFAULT_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            retry_on_network: false,
            cancel: None,
        }
    }
}

impl FetchPolicy {
    /// Default policy with the given TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn retry_on_network(mut self, retry: bool) -> Self {
        self.retry_on_network = retry;
        self
    }

    pub fn cancel(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Retry parameters carried into the shared request
#[derive(Debug, Clone, Copy)]
struct AttemptPlan {
    retries: u32,
    backoff: Duration,
    retry_on_network: bool,
}

impl From<&FetchPolicy> for AttemptPlan {
    fn from(policy: &FetchPolicy) -> Self {
        Self {
            retries: policy.retries,
            backoff: policy.backoff,
            retry_on_network: policy.retry_on_network,
        }
    }
}

struct InFlight {
    future: SharedFetch,
    waiters: usize,
    generation: u64,
}

enum Lookup {
    Cached(Arc<Value>),
    Pending(SharedFetch, WaiterGuard),
}

struct FetcherInner {
    name: &'static str,
    base_url: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn HttpTransport>,
    cache: ResponseCache,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_generation: AtomicU64,
    pacer: Pacer,
    metrics: MetricsCollector,
}

impl FetcherInner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(
                upstream = self.name,
                "In-flight registry lock was poisoned, recovering"
            );
            poisoned.into_inner()
        })
    }

    /// Removes the entry for `key` if it still belongs to `generation`
    fn settle(&self, key: &str, generation: u64) {
        let removed = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get(key) {
                Some(entry) if entry.generation == generation => in_flight.remove(key),
                _ => None,
            }
        };
        // Dropped outside the lock: releasing the last shared handle drops the request future
        drop(removed);
    }

    /// Detaches one caller; the last one out clears the entry
    fn detach(&self, key: &str, generation: u64) {
        let removed = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get_mut(key) {
                Some(entry) if entry.generation == generation => {
                    entry.waiters = entry.waiters.saturating_sub(1);
                    if entry.waiters == 0 {
                        tracing::debug!(url = %key, "All callers left, abandoning request");
                        in_flight.remove(key)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        drop(removed);
    }

    async fn run_attempts(&self, url: &str, plan: AttemptPlan) -> FetchResult {
        let mut attempt: u32 = 0;

        loop {
            self.pacer.wait_turn().await;
            let started = Instant::now();

            let response = match self.transport.get(url, &self.headers).await {
                Ok(response) => response,
                Err(e) => {
                    self.metrics.record_attempt(started.elapsed(), false).await;

                    if plan.retry_on_network && attempt < plan.retries {
                        let wait = backoff_delay(plan.backoff, attempt);
                        tracing::warn!(
                            url = %url,
                            attempt = attempt + 1,
                            wait_ms = wait.as_millis() as u64,
                            error = %e,
                            "Transport failure, retrying"
                        );
                        sleep(wait).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::warn!(url = %url, error = %e, "Transport failure");
                    return Err(e);
                }
            };

            let success = response.is_success();
            self.metrics.record_attempt(started.elapsed(), success).await;

            if success {
                let payload: Value = serde_json::from_str(&response.body).map_err(|e| {
                    FetchError::invalid_response(format!(
                        "Failed to parse response from {}: {}",
                        url, e
                    ))
                })?;
                let payload = Arc::new(payload);
                self.cache.insert(url, payload.clone());

                tracing::debug!(
                    url = %url,
                    attempts = attempt + 1,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Fetched fresh payload"
                );
                return Ok(payload);
            }

            if response.is_throttled() && attempt < plan.retries {
                let wait = response
                    .retry_after
                    .as_deref()
                    .and_then(retry_after_delay)
                    .unwrap_or_else(|| backoff_delay(plan.backoff, attempt));

                self.metrics.record_throttled_retry();
                tracing::warn!(
                    url = %url,
                    attempt = attempt + 1,
                    max_retries = plan.retries,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited, backing off"
                );

                sleep(wait).await;
                attempt += 1;
                continue;
            }

            if response.is_throttled() {
                tracing::warn!(url = %url, attempts = attempt + 1, "Rate limit retries exhausted");
                return Err(FetchError::ThrottledExceeded {
                    attempts: attempt + 1,
                });
            }

            tracing::warn!(url = %url, status = response.status, "Upstream returned an error");
            return Err(FetchError::upstream(response.status, response.status_text));
        }
    }
}

/// Removes the in-flight entry when the shared request settles or is dropped
struct SettleGuard {
    inner: Arc<FetcherInner>,
    key: String,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.inner.settle(&self.key, self.generation);
    }
}

/// One caller's attachment to an in-flight request
struct WaiterGuard {
    inner: Arc<FetcherInner>,
    key: String,
    generation: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.inner.detach(&self.key, self.generation);
    }
}

async fn execute(
    inner: Arc<FetcherInner>,
    url: String,
    generation: u64,
    plan: AttemptPlan,
) -> FetchResult {
    let _settle = SettleGuard {
        inner: inner.clone(),
        key: url.clone(),
        generation,
    };
    inner.run_attempts(&url, plan).await
}

/// `backoff * 2^attempt` plus up to `BACKOFF_JITTER_MS` of jitter
pub fn backoff_delay(backoff: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
    backoff
        .saturating_mul(factor)
        .saturating_add(Duration::from_millis(jitter))
}

/// Parses a `Retry-After` value given in seconds
///
/// HTTP-date values, garbage and waits longer than `MAX_RETRY_AFTER_SECS`
/// yield `None` so the caller falls back to computed backoff. Negative
/// values mean "retry now".
pub fn retry_after_delay(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds > MAX_RETRY_AFTER_SECS as f64 {
        return None;
    }
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}

/// Fetcher fronting one rate-limited upstream API
///
/// Owns the response cache, the in-flight registry and the pacing clock.
/// Cloning shares all three.
///
/// # Example
/// ```no_run
/// use coin_market_sdk::{FetchPolicy, FetcherConfig, RateLimitedFetcher};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = RateLimitedFetcher::new(FetcherConfig::coingecko_from_env())?;
/// let policy = FetchPolicy::with_ttl(Duration::from_secs(60)).retries(3);
/// let global = fetcher.fetch("/global", "", &policy).await?;
/// println!("{}", global["data"]["active_cryptocurrencies"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimitedFetcher {
    inner: Arc<FetcherInner>,
}

impl RateLimitedFetcher {
    /// Creates a fetcher backed by reqwest
    pub fn new(config: FetcherConfig) -> Result<Self, ConfigError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a fetcher with a custom transport
    ///
    /// This is primarily for testing with mock transports.
    pub fn with_transport(config: FetcherConfig, transport: Arc<dyn HttpTransport>) -> Self {
        tracing::debug!(
            upstream = config.name,
            base_url = %config.base_url,
            transport = transport.transport_name(),
            min_gap_ms = config.min_gap.as_millis() as u64,
            "Creating rate-limited fetcher"
        );

        let inner = FetcherInner {
            name: config.name,
            headers: config.request_headers(),
            base_url: config.base_url,
            transport,
            cache: ResponseCache::new(),
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            pacer: Pacer::new(config.min_gap),
            metrics: MetricsCollector::new(config.name),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Name of the upstream API
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Fully-qualified request URL, also the cache and de-dup key
    pub fn request_url(&self, endpoint: &str, query: &str) -> String {
        format!("{}{}{}", self.inner.base_url, endpoint, query)
    }

    /// Fetches `endpoint` + `query` as JSON
    ///
    /// # Arguments
    /// * `endpoint` - Path appended to the base URL, e.g. `/coins/markets`
    /// * `query` - Query string including the leading `?`, or empty
    /// * `policy` - TTL, retry budget, backoff and cancellation for this call
    ///
    /// # Returns
    /// The cached, coalesced or freshly fetched payload. Concurrent callers
    /// for the same URL receive the same `Arc`.
    pub async fn fetch(&self, endpoint: &str, query: &str, policy: &FetchPolicy) -> FetchResult {
        if policy.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(FetchError::Cancelled);
        }

        let key = self.request_url(endpoint, query);

        let (future, _waiter) = match self.lookup(&key, policy) {
            Lookup::Cached(payload) => {
                self.inner.metrics.record_cache_hit();
                tracing::debug!(url = %key, "Serving cached payload");
                return Ok(payload);
            }
            Lookup::Pending(future, waiter) => (future, waiter),
        };

        match &policy.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(url = %key, "Caller cancelled request");
                        Err(FetchError::Cancelled)
                    }
                    result = future => result,
                }
            }
            None => future.await,
        }
    }

    /// Cache check and in-flight check-then-set, atomically under the registry lock
    fn lookup(&self, key: &str, policy: &FetchPolicy) -> Lookup {
        let mut in_flight = self.inner.lock_in_flight();

        if let Some(payload) = self.inner.cache.get_fresh(key, policy.ttl) {
            return Lookup::Cached(payload);
        }

        if let Some(entry) = in_flight.get_mut(key) {
            entry.waiters += 1;
            self.inner.metrics.record_coalesced();
            tracing::debug!(url = %key, waiters = entry.waiters, "Joining in-flight request");

            let waiter = WaiterGuard {
                inner: self.inner.clone(),
                key: key.to_string(),
                generation: entry.generation,
            };
            return Lookup::Pending(entry.future.clone(), waiter);
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let plan = AttemptPlan::from(policy);
        let future = execute(self.inner.clone(), key.to_string(), generation, plan)
            .boxed()
            .shared();

        in_flight.insert(
            key.to_string(),
            InFlight {
                future: future.clone(),
                waiters: 1,
                generation,
            },
        );

        let waiter = WaiterGuard {
            inner: self.inner.clone(),
            key: key.to_string(),
            generation,
        };
        Lookup::Pending(future, waiter)
    }

    /// The response cache
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Number of requests currently in flight
    pub fn in_flight_len(&self) -> usize {
        self.inner.lock_in_flight().len()
    }

    /// Current metrics snapshot
    pub async fn metrics(&self) -> FetchMetrics {
        self.inner.metrics.snapshot().await
    }
}
