use crate::config::Config;
use crate::error::AppError;
use colored::*;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use super::endpoints;
use super::models::*;

/// Seconds to wait when a 429 arrives without a Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// A raw HTTP exchange result, before any interpretation of the status code.
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<u64>,
    pub body: String,
}

/// Minimal GET transport so tests can script responses without a network.
pub trait Transport {
    fn get(&self, url: &str) -> Result<RawResponse, String>;
}

impl<T: Transport> Transport for &T {
    fn get(&self, url: &str) -> Result<RawResponse, String> {
        (**self).get(url)
    }
}

pub struct UreqTransport {
    api_key: String,
}

impl UreqTransport {
    pub fn new(api_key: String) -> Self {
        UreqTransport { api_key }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<RawResponse, String> {
        let result = ureq::get(url)
            .set("X-Riot-Token", &self.api_key)
            .set("User-Agent", "synergy_scan/0.1.0")
            .call();

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.into_string().map_err(|e| e.to_string())?;
                Ok(RawResponse {
                    status,
                    retry_after: None,
                    body,
                })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let retry_after = resp
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse().ok());
                let body = resp.into_string().unwrap_or_default();
                Ok(RawResponse {
                    status,
                    retry_after,
                    body,
                })
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Injectable sleep so tests can observe throttle delays instead of waiting.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// How long to keep retrying 429 responses. The default mirrors the observed
/// behavior: retry forever until the endpoint stops throttling.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_retries: None }
    }
}

pub struct RiotApiClient<T: Transport, S: Sleeper> {
    transport: T,
    sleeper: S,
    routing: String,
    policy: RetryPolicy,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RiotApiClient<UreqTransport, ThreadSleeper> {
    pub fn new(config: &Config) -> Self {
        // Self-throttle independent of the 429 handler: ~7 req/sec keeps a
        // dev key comfortably under Riot's 20 req/sec window.
        Self::with_parts(
            UreqTransport::new(config.api_key.clone()),
            ThreadSleeper,
            config.routing.clone(),
            RetryPolicy::default(),
            NonZeroU32::new(7).unwrap(),
        )
    }
}

impl<T: Transport, S: Sleeper> RiotApiClient<T, S> {
    pub fn with_parts(
        transport: T,
        sleeper: S,
        routing: String,
        policy: RetryPolicy,
        per_second: NonZeroU32,
    ) -> Self {
        RiotApiClient {
            transport,
            sleeper,
            routing,
            policy,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    fn throttle(&self) {
        while self.limiter.check().is_err() {
            self.sleeper.sleep(Duration::from_millis(50));
        }
    }

    /// One second at a time, so the user sees the wait shrink.
    fn wait_out_throttle(&self, seconds: u64) {
        for remaining in (1..=seconds).rev() {
            println!(
                "{} Rate limited, retrying in {}s...",
                "⏳".yellow(),
                remaining
            );
            self.sleeper.sleep(Duration::from_secs(1));
        }
    }

    /// Core fetch. 200 -> body, 429 -> wait and retry the same URL, 403 ->
    /// fatal, anything else (including transport failure) -> None and the
    /// caller drops the item.
    fn fetch_raw(&self, url: &str) -> Result<Option<String>, AppError> {
        let mut retries: u32 = 0;
        loop {
            self.throttle();
            let resp = match self.transport.get(url) {
                Ok(r) => r,
                Err(_) => return Ok(None),
            };
            match resp.status {
                200 => return Ok(Some(resp.body)),
                429 => {
                    if let Some(max) = self.policy.max_retries {
                        if retries >= max {
                            return Err(AppError::RateLimited);
                        }
                    }
                    let wait = resp.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    self.wait_out_throttle(wait);
                    retries += 1;
                }
                403 => return Err(AppError::ApiKeyRejected),
                _ => return Ok(None),
            }
        }
    }

    /// Typed boundary: a body that fails to parse is treated like any other
    /// failed fetch and dropped.
    fn fetch<D: DeserializeOwned>(&self, url: &str) -> Result<Option<D>, AppError> {
        match self.fetch_raw(url)? {
            Some(body) => Ok(serde_json::from_str(&body).ok()),
            None => Ok(None),
        }
    }

    pub fn get_account(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Option<AccountDto>, AppError> {
        let url = endpoints::account_url(&self.routing, game_name, tag_line);
        self.fetch(&url)
    }

    pub fn get_match(&self, match_id: &str) -> Result<Option<MatchDto>, AppError> {
        let url = endpoints::match_url(&self.routing, match_id);
        self.fetch(&url)
    }

    /// Full history: pages of up to 100 ids until a short page or a failed
    /// fetch. Ids come back newest-first, in fetch order.
    pub fn list_match_ids(&self, puuid: &str) -> Result<Vec<String>, AppError> {
        let mut ids = Vec::new();
        let mut start = 0;
        loop {
            let url = endpoints::match_ids_url(&self.routing, puuid, start);
            let page: Vec<String> = match self.fetch(&url)? {
                Some(p) => p,
                None => break,
            };
            if page.is_empty() {
                break;
            }
            let short = page.len() < endpoints::PAGE_SIZE;
            ids.extend(page);
            if short {
                break;
            }
            start += endpoints::PAGE_SIZE;
        }
        Ok(ids)
    }

    /// Incremental history: stop at (and exclude) `last_known_id`, then
    /// reverse so results are oldest-first for chronological processing.
    /// A sentinel that never appears degrades to a full re-scan.
    pub fn list_new_match_ids(
        &self,
        puuid: &str,
        last_known_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut fresh = Vec::new();
        let mut start = 0;
        'pages: loop {
            let url = endpoints::match_ids_url(&self.routing, puuid, start);
            let page: Vec<String> = match self.fetch(&url)? {
                Some(p) => p,
                None => break,
            };
            if page.is_empty() {
                break;
            }
            let short = page.len() < endpoints::PAGE_SIZE;
            for id in page {
                if id == last_known_id {
                    break 'pages;
                }
                fresh.push(id);
            }
            if short {
                break;
            }
            start += endpoints::PAGE_SIZE;
        }
        fresh.reverse();
        Ok(fresh)
    }
}
