//! Conditional, retrying, circuit-broken JSON fetcher.
//!
//! One `HttpFetcher` instance is bound to one external endpoint and owns
//! that endpoint's breaker, cache access, and metrics. Breaker and cache
//! mutations happen only here, and the breaker counts one failure per
//! logical call, not per internal retry attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::{cache_key, canonical_url, CacheEntry, CacheEntryStore};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::clock::{Clock, Delay, SystemClock, TokioDelay};
use crate::config::ClientConfig;
use crate::domain::parse_http_date;
use crate::error::{FetchError, ValidationError};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::retry::RetryPolicy;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Header carrying the client identifier on every outbound request.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const IF_NONE_MATCH_HEADER: &str = "if-none-match";
pub const ETAG_HEADER: &str = "etag";
pub const EXPIRES_HEADER: &str = "expires";
pub const LAST_MODIFIED_HEADER: &str = "last-modified";
/// Declared page count for the paginated resource.
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

const SNIPPET_MAX_CHARS: usize = 200;

/// Cache behavior for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Look up the entry, send `If-None-Match` when an etag is cached, and
    /// refresh the entry from response headers. (Default)
    #[default]
    Conditional,
    /// Neither read nor write the cache for this call.
    Bypass,
}

/// Normalized outcome of one fetch. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body; `Null` for empty bodies and 304s.
    pub body: Value,
    pub from_cache: bool,
}

impl FetchResult {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

enum AttemptError {
    /// Retryable status, budget exhausted.
    Status(HttpResponse),
    /// Transport failure, exhausted or fatal.
    Transport(TransportError),
}

/// Resilient JSON fetcher for one endpoint.
pub struct HttpFetcher {
    endpoint: String,
    client_id: String,
    timeout_ms: u64,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheEntryStore>,
    breaker: CircuitBreaker,
    metrics: ClientMetrics,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
}

impl HttpFetcher {
    /// Validates the configuration and builds a fetcher with production
    /// clock and delay.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheEntryStore>,
    ) -> Result<Self, ValidationError> {
        Self::with_runtime(
            config,
            transport,
            store,
            Arc::new(SystemClock),
            Arc::new(TokioDelay),
        )
    }

    /// Full-injection constructor for deterministic tests.
    pub fn with_runtime(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheEntryStore>,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            endpoint: config.base_url.clone(),
            client_id: config.client_id.clone(),
            timeout_ms: config.timeout_ms,
            retry: config.retry.clone(),
            transport,
            store,
            breaker: CircuitBreaker::new(config.breaker),
            metrics: ClientMetrics::new(),
            clock,
            delay,
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.breaker.snapshot())
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn fetch_json(
        &self,
        url: &str,
        query: &BTreeMap<String, String>,
    ) -> Result<FetchResult, FetchError> {
        self.fetch_json_with(url, query, CacheMode::Conditional)
            .await
    }

    pub async fn fetch_json_with(
        &self,
        url: &str,
        query: &BTreeMap<String, String>,
        mode: CacheMode,
    ) -> Result<FetchResult, FetchError> {
        let key = cache_key(url, query);
        let full_url = canonical_url(url, query);

        let cached = match mode {
            CacheMode::Conditional => match self.store.get(&key) {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(%error, url = %full_url, "cache store read failed; treating as miss");
                    None
                }
            },
            CacheMode::Bypass => None,
        };

        if !self.breaker.try_acquire() {
            let circuit = self.breaker.snapshot();
            let reason = circuit
                .opened_reason
                .clone()
                .unwrap_or_else(|| String::from("circuit is open"));
            return Err(FetchError::CircuitOpen {
                endpoint: self.endpoint.clone(),
                reason,
                metrics: Box::new(self.metrics.snapshot(circuit)),
            });
        }

        self.metrics.record_request();

        let mut attempts = 0u32;
        let outcome = loop {
            attempts += 1;
            let request = self.build_request(&full_url, cached.as_ref());
            match self.transport.send(request).await {
                Ok(response) => {
                    self.observe_response(&full_url, &response);
                    if RetryPolicy::is_retryable_status(response.status) {
                        if attempts <= self.retry.max_retries {
                            self.backoff(attempts).await;
                            continue;
                        }
                        break Err(AttemptError::Status(response));
                    }
                    break Ok(response);
                }
                Err(error) if error.retryable() && attempts <= self.retry.max_retries => {
                    tracing::debug!(
                        error = %error,
                        attempt = attempts,
                        url = %full_url,
                        "transport attempt failed; retrying"
                    );
                    self.backoff(attempts).await;
                }
                Err(error) => break Err(AttemptError::Transport(error)),
            }
        };

        match outcome {
            Ok(response) => self.finish(&full_url, key, mode, cached, response),
            Err(AttemptError::Status(response)) => {
                let reason = format!("http status {}", response.status);
                self.breaker.record_failure(&reason);
                Err(FetchError::Upstream {
                    status: response.status,
                    snippet: truncate_snippet(&response.body),
                })
            }
            Err(AttemptError::Transport(error)) => {
                self.breaker.record_failure(error.message());
                Err(FetchError::Transport {
                    attempts,
                    message: error.message().to_owned(),
                })
            }
        }
    }

    async fn backoff(&self, attempts_so_far: u32) {
        self.metrics.record_retry();
        let pause = self.retry.delay(attempts_so_far - 1);
        self.delay.sleep(pause).await;
    }

    fn build_request(&self, full_url: &str, cached: Option<&CacheEntry>) -> HttpRequest {
        let mut request = HttpRequest::get(full_url)
            .with_header(CLIENT_ID_HEADER, &self.client_id)
            .with_timeout_ms(self.timeout_ms);

        if let Some(etag) = cached.and_then(|entry| entry.etag.as_deref()) {
            request = request.with_header(IF_NONE_MATCH_HEADER, etag);
        }

        request
    }

    fn observe_response(&self, full_url: &str, response: &HttpResponse) {
        let remaining = response
            .header(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|value| value.trim().parse().ok());
        let reset = response
            .header(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.trim().parse().ok());
        self.metrics
            .record_response(response.status, full_url, remaining, reset);
    }

    fn finish(
        &self,
        full_url: &str,
        key: String,
        mode: CacheMode,
        cached: Option<CacheEntry>,
        response: HttpResponse,
    ) -> Result<FetchResult, FetchError> {
        // Terminal statuses prove the backend is answering coherently, so
        // they count as breaker successes even when the caller sees an error.
        self.breaker.record_success();

        if response.status == 304 {
            if cached.is_none() {
                tracing::warn!(url = %full_url, "304 response without a cached entry");
                return Err(FetchError::Upstream {
                    status: 304,
                    snippet: String::from("conditional response without a cached entry"),
                });
            }
            self.metrics.record_cache_hit_304();
            return Ok(FetchResult {
                status: response.status,
                headers: response.headers,
                body: Value::Null,
                from_cache: true,
            });
        }

        let body = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str::<Value>(&response.body)
                .map_err(|error| FetchError::Decode(error.to_string()))?
        };

        if mode == CacheMode::Conditional {
            let entry = CacheEntry {
                cache_key: key,
                url: full_url.to_owned(),
                etag: response.header(ETAG_HEADER).map(str::to_owned),
                expires_at: response.header(EXPIRES_HEADER).and_then(parse_http_date),
                last_modified: response.header(LAST_MODIFIED_HEADER).map(str::to_owned),
                fetched_at: self.clock.now_utc(),
                http_status: response.status,
            };
            if let Err(error) = self.store.upsert(&entry) {
                tracing::warn!(%error, url = %full_url, "cache store write failed; continuing without entry");
            }
        }

        Ok(FetchResult {
            status: response.status,
            headers: response.headers,
            body,
            from_cache: false,
        })
    }
}

fn truncate_snippet(body: &str) -> String {
    body.trim().chars().take(SNIPPET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::clock::NoopDelay;
    use crate::transport::ScriptedTransport;
    use std::time::Duration;

    const BASE_URL: &str = "https://api.example.test/orders";

    struct Harness {
        fetcher: HttpFetcher,
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryCacheStore>,
        delay: Arc<NoopDelay>,
    }

    fn harness(mutate: impl FnOnce(&mut ClientConfig)) -> Harness {
        let mut config = ClientConfig::new(BASE_URL);
        mutate(&mut config);

        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryCacheStore::new());
        let delay = Arc::new(NoopDelay::new());
        let fetcher = HttpFetcher::with_runtime(
            &config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&store) as Arc<dyn CacheEntryStore>,
            Arc::new(SystemClock),
            Arc::clone(&delay) as Arc<dyn Delay>,
        )
        .expect("config is valid");

        Harness {
            fetcher,
            transport,
            store,
            delay,
        }
    }

    fn no_query() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn stores_entry_from_response_headers() {
        let h = harness(|_| {});
        h.transport.push_response(
            HttpResponse::new(200, r#"{"orders":[]}"#)
                .with_header("ETag", "\"v1\"")
                .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
                .with_header("Expires", "Wed, 21 Oct 2015 07:33:00 GMT"),
        );

        let result = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("fetch succeeds");

        assert_eq!(result.status, 200);
        assert!(!result.from_cache);

        let key = cache_key(BASE_URL, &no_query());
        let entry = h
            .store
            .get(&key)
            .expect("store readable")
            .expect("entry stored");
        assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
        assert_eq!(entry.http_status, 200);
        assert!(entry.expires_at.is_some());
    }

    #[tokio::test]
    async fn second_call_sends_if_none_match_and_interprets_304() {
        let h = harness(|_| {});
        h.transport
            .push_response(HttpResponse::new(200, r#"{"orders":[]}"#).with_header("etag", "\"v1\""));
        h.transport.push_response(HttpResponse::new(304, ""));

        h.fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("first fetch succeeds");
        let second = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("second fetch succeeds");

        let requests = h.transport.requests();
        assert_eq!(requests[0].header(IF_NONE_MATCH_HEADER), None);
        assert_eq!(requests[1].header(IF_NONE_MATCH_HEADER), Some("\"v1\""));

        assert!(second.from_cache);
        assert_eq!(second.status, 304);
        assert!(second.body.is_null());

        // Stored entry untouched by the 304.
        let key = cache_key(BASE_URL, &no_query());
        let entry = h.store.get(&key).expect("readable").expect("present");
        assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
        assert_eq!(entry.http_status, 200);

        let metrics = h.fetcher.metrics();
        assert_eq!(metrics.total_cache_hits_304, 1);
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let h = harness(|config| config.retry.max_retries = 2);
        h.transport.push_response(HttpResponse::new(502, "bad gateway"));
        h.transport.push_response(HttpResponse::new(200, "{}"));

        let result = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("retry recovers");

        assert_eq!(result.status, 200);
        assert_eq!(h.transport.request_count(), 2);

        let metrics = h.fetcher.metrics();
        assert_eq!(metrics.total_requests, 1, "one logical call");
        assert_eq!(metrics.total_retries, 1);

        // The recorded backoff stays within the attempt-0 ceiling.
        let recorded = h.delay.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0] <= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_upstream_error_and_one_breaker_failure() {
        let h = harness(|config| {
            config.retry.max_retries = 1;
            config.breaker = CircuitBreakerConfig {
                failure_threshold: 2,
                min_open_duration: Duration::from_secs(30),
            };
        });
        h.transport.push_response(HttpResponse::new(503, "overloaded"));
        h.transport.push_response(HttpResponse::new(503, "overloaded"));

        let error = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect_err("retries exhausted");

        assert!(matches!(
            error,
            FetchError::Upstream { status: 503, .. }
        ));
        assert_eq!(h.transport.request_count(), 2);
        // One logical call, one breaker failure despite two attempts.
        assert_eq!(h.fetcher.metrics().circuit_state, CircuitState::Closed);
        assert_eq!(h.fetcher.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn circuit_opens_and_fails_fast_without_touching_transport() {
        let h = harness(|config| {
            config.retry.max_retries = 0;
            config.breaker = CircuitBreakerConfig {
                failure_threshold: 2,
                min_open_duration: Duration::from_secs(30),
            };
        });
        h.transport.push_response(HttpResponse::new(500, "boom"));
        h.transport.push_response(HttpResponse::new(500, "boom"));

        for _ in 0..2 {
            let error = h
                .fetcher
                .fetch_json(BASE_URL, &no_query())
                .await
                .expect_err("500 fails");
            assert!(matches!(error, FetchError::Upstream { status: 500, .. }));
        }

        let error = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect_err("circuit open");
        match error {
            FetchError::CircuitOpen { metrics, .. } => {
                assert_eq!(metrics.circuit_state, CircuitState::Open);
                assert_eq!(metrics.total_requests, 2);
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
        assert_eq!(h.transport.request_count(), 2, "third call never sent");
    }

    #[tokio::test]
    async fn non_retryable_4xx_is_terminal_and_not_a_breaker_failure() {
        let h = harness(|config| config.retry.max_retries = 3);
        h.transport.push_response(HttpResponse::new(404, "no such book"));

        let error = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect_err("404 is terminal");

        assert!(matches!(error, FetchError::Upstream { status: 404, .. }));
        assert_eq!(h.transport.request_count(), 1, "no retries for 4xx");
        assert_eq!(h.fetcher.circuit_state(), CircuitState::Closed);
        assert_eq!(h.fetcher.metrics().total_retries, 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error_without_retry() {
        let h = harness(|config| config.retry.max_retries = 3);
        h.transport.push_response(HttpResponse::new(200, "{not json"));

        let error = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect_err("decode fails");

        assert!(matches!(error, FetchError::Decode(_)));
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(h.fetcher.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn empty_body_parses_as_null() {
        let h = harness(|_| {});
        h.transport.push_response(HttpResponse::new(200, "  "));

        let result = h
            .fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("empty body is fine");
        assert!(result.body.is_null());
        assert!(!result.from_cache);
    }

    #[tokio::test]
    async fn cache_store_failure_degrades_to_miss() {
        struct FailingStore;

        impl CacheEntryStore for FailingStore {
            fn get(&self, _: &str) -> Result<Option<CacheEntry>, crate::error::CacheStoreError> {
                Err(crate::error::CacheStoreError::new("disk on fire"))
            }

            fn upsert(&self, _: &CacheEntry) -> Result<(), crate::error::CacheStoreError> {
                Err(crate::error::CacheStoreError::new("disk on fire"))
            }
        }

        let config = ClientConfig::new(BASE_URL);
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(HttpResponse::new(200, "{}").with_header("etag", "\"v1\""));
        let fetcher = HttpFetcher::with_runtime(
            &config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(FailingStore),
            Arc::new(SystemClock),
            Arc::new(NoopDelay::new()),
        )
        .expect("config is valid");

        let result = fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("store failure never fails the fetch");
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn rate_limit_headers_are_observed() {
        let h = harness(|_| {});
        h.transport.push_response(
            HttpResponse::new(200, "{}")
                .with_header(RATE_LIMIT_REMAINING_HEADER, "17")
                .with_header(RATE_LIMIT_RESET_HEADER, "1700000000"),
        );

        h.fetcher
            .fetch_json(BASE_URL, &no_query())
            .await
            .expect("fetch succeeds");

        let metrics = h.fetcher.metrics();
        assert_eq!(metrics.last_rate_limit_remaining, Some(17));
        assert_eq!(metrics.last_rate_limit_reset, Some(1_700_000_000));
        assert_eq!(metrics.last_status, Some(200));
    }

    #[tokio::test]
    async fn bypass_mode_skips_cache_reads_and_writes() {
        let h = harness(|_| {});
        h.transport
            .push_response(HttpResponse::new(200, "{}").with_header("etag", "\"v1\""));

        h.fetcher
            .fetch_json_with(BASE_URL, &no_query(), CacheMode::Bypass)
            .await
            .expect("fetch succeeds");

        assert!(h.store.is_empty(), "bypass must not write entries");
        assert_eq!(h.transport.requests()[0].header(IF_NONE_MATCH_HEADER), None);
    }
}
