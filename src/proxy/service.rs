//! The proxy service object.
//!
//! Constructed once at startup and shared by all handlers; tests build fresh
//! instances so no state leaks between them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::in_flight::{InFlight, Joined};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::models::ProxyRequest;
use crate::scheduler::Scheduler;
use crate::upstream::UpstreamClient;

/// Whether a response came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A payload ready to send back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: Value,
    pub cache_status: CacheStatus,
}

/// Cache-fronted, rate-limited, retrying proxy to the upstream API.
pub struct ProxyService {
    cache: Arc<RwLock<CacheStore>>,
    scheduler: Arc<Scheduler>,
    upstream: Arc<UpstreamClient>,
    in_flight: Option<InFlight>,
    cache_control: String,
}

impl ProxyService {
    // == Init ==
    /// Validates `config` and builds every component from it.
    pub fn init(config: &Config) -> Result<Self> {
        config.validate()?;

        let cache = CacheStore::new(config.max_entries, config.cache_ttl_duration());
        let scheduler = Scheduler::with_min_interval(config.dispatch_interval()?);
        let upstream = UpstreamClient::from_config(config)?;

        info!(
            max_entries = config.max_entries,
            ttl_secs = config.cache_ttl,
            target_rps = config.target_rps,
            max_attempts = config.max_attempts,
            dedupe_in_flight = config.dedupe_in_flight,
            "proxy service initialized"
        );

        Ok(Self::new(cache, scheduler, upstream, config.dedupe_in_flight))
    }

    pub fn new(
        cache: CacheStore,
        scheduler: Arc<Scheduler>,
        upstream: UpstreamClient,
        dedupe_in_flight: bool,
    ) -> Self {
        let cache_control = cache_control_directive(cache.ttl());
        Self {
            cache: Arc::new(RwLock::new(cache)),
            scheduler,
            upstream: Arc::new(upstream),
            in_flight: dedupe_in_flight.then(InFlight::new),
            cache_control,
        }
    }

    /// Shared handle to the cache, for the cleanup task and stats.
    pub fn cache(&self) -> Arc<RwLock<CacheStore>> {
        Arc::clone(&self.cache)
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// `Cache-Control` value for successful proxy responses.
    pub fn cache_control(&self) -> &str {
        &self.cache_control
    }

    // == Fetch ==
    /// Serves `request` from the cache, or from the upstream on a miss.
    ///
    /// A hit never touches the scheduler. A miss queues one upstream call
    /// sequence (or joins one already running for the same key when
    /// coalescing is enabled).
    pub async fn fetch(&self, request: &ProxyRequest) -> Result<Fetched> {
        if let Some(reason) = request.validate() {
            return Err(ProxyError::InvalidRequest(reason));
        }

        let key = request.cache_key(self.upstream.api_key_param());

        let cached = self.cache.write().await.get(&key);
        if let Some(body) = cached {
            debug!(key = %key, "cache hit");
            return Ok(Fetched {
                body,
                cache_status: CacheStatus::Hit,
            });
        }
        debug!(key = %key, "cache miss");

        let body = match &self.in_flight {
            None => self.fetch_upstream(key, request).await?,
            Some(in_flight) => match in_flight.join(&key) {
                Joined::Leader(guard) => {
                    let outcome = self.fetch_upstream(key, request).await;
                    guard.complete(&outcome);
                    outcome?
                }
                Joined::Follower(rx) => {
                    debug!(key = %key, "joined in-flight upstream request");
                    rx.await.map_err(|_| {
                        ProxyError::Internal(
                            "in-flight upstream request was abandoned".to_string(),
                        )
                    })??
                }
            },
        };

        Ok(Fetched {
            body,
            cache_status: CacheStatus::Miss,
        })
    }

    /// Queues the retrying upstream call; the task itself writes the cache
    /// so a successful result is kept even if the caller has gone away.
    async fn fetch_upstream(&self, key: String, request: &ProxyRequest) -> Result<Value> {
        let url = self.upstream.build_url(request)?;
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);

        self.scheduler
            .schedule(move || async move {
                let body = upstream.fetch_with_retry(&url).await?;
                cache.write().await.put(key, body.clone());
                Ok(body)
            })
            .await
    }
}

/// Lets a CDN serve the response for one TTL and revalidate in the
/// background for two more.
fn cache_control_directive(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    format!(
        "public, s-maxage={}, stale-while-revalidate={}",
        secs,
        secs.saturating_mul(2)
    )
}
