use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

const FETCH_ERROR_PREFIX: &str = "Error fetching public keys for Google certs: ";

/// One snapshot of the signing keys published at a certificate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKeySet {
    keys: HashMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
}

impl PublicKeySet {
    pub fn new(keys: HashMap<String, String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { keys, expires_at }
    }

    /// PEM material for `kid`.
    pub fn get(&self, kid: &str) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// A set without an expiry is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now < expires_at)
    }
}

/// Downloads the key-id to PEM map from a certificate endpoint.
#[derive(Clone)]
pub struct PublicKeyFetcher {
    client: Client,
    url: String,
}

impl PublicKeyFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Use a pre-configured client, e.g. one routed through an outbound proxy.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<PublicKeySet> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            warn!(url = %self.url, error = %err, "public key request failed");
            AuthError::Transport(err)
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);
        let text = response.text().await?;

        let body = if is_json {
            serde_json::from_str::<Value>(&text).ok()
        } else {
            None
        };

        let keys = match &body {
            Some(Value::Object(map)) if status.is_success() && !map.contains_key("error") => {
                serde_json::from_value::<HashMap<String, String>>(Value::Object(map.clone())).ok()
            }
            _ => None,
        };
        let Some(keys) = keys else {
            warn!(url = %self.url, %status, "certificate endpoint returned an error response");
            return Err(fetch_error(body.as_ref(), &text));
        };

        let now = Utc::now();
        let expires_at = max_age.and_then(|seconds| expiry_after(now, seconds));
        debug!(
            url = %self.url,
            keys = keys.len(),
            max_age_seconds = ?max_age,
            "fetched public keys"
        );
        Ok(PublicKeySet::new(keys, expires_at))
    }
}

/// Last `max-age` directive of a `cache-control` header value.
pub fn parse_max_age(header: &str) -> Option<u64> {
    header
        .split(',')
        .filter_map(|directive| {
            let (name, value) = directive.trim().split_once('=')?;
            if name.trim() == "max-age" {
                value.trim().parse::<u64>().ok()
            } else {
                None
            }
        })
        .last()
}

fn expiry_after(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(Duration::try_seconds(seconds)?)
}

fn fetch_error(body: Option<&Value>, text: &str) -> AuthError {
    let mut message = FETCH_ERROR_PREFIX.to_string();
    match body.and_then(|body| body.get("error")) {
        Some(error) => {
            message.push_str(&json_text(error));
            if let Some(description) = body
                .and_then(|body| body.get("error_description"))
                .filter(|value| !value.is_null())
            {
                message.push_str(&format!(" ({})", json_text(description)));
            }
        }
        None => message.push_str(text),
    }
    AuthError::Internal(message)
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Fetch-or-reuse cache in front of a [`PublicKeyFetcher`].
///
/// The (keys, expiry) pair is swapped as one `Arc`, so readers never see a
/// half updated set. Concurrent misses are not coalesced: each one fetches
/// and the last write wins. Every fetched set is equally valid, so the only
/// cost is an extra request.
#[derive(Clone)]
pub struct PublicKeyCache {
    fetcher: PublicKeyFetcher,
    current: Arc<RwLock<Option<Arc<PublicKeySet>>>>,
}

impl PublicKeyCache {
    pub fn new(fetcher: PublicKeyFetcher) -> Self {
        Self {
            fetcher,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn fetcher(&self) -> &PublicKeyFetcher {
        &self.fetcher
    }

    /// Last successfully fetched set, fresh or not.
    pub fn cached(&self) -> Option<Arc<PublicKeySet>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current keys, fetching only when the cached set is missing or stale.
    /// A failed fetch is returned as is; stale keys are never served.
    pub async fn keys(&self) -> AuthResult<Arc<PublicKeySet>> {
        if let Some(current) = self.cached() {
            if current.is_fresh(Utc::now()) {
                debug!(url = %self.fetcher.url(), "public key cache hit");
                return Ok(current);
            }
        }

        debug!(url = %self.fetcher.url(), "public key cache miss");
        let fetched = Arc::new(self.fetcher.fetch().await?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(fetched.clone());
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn max_age_is_read_from_directives() {
        assert_eq!(parse_max_age("public, max-age=22151, must-revalidate"), Some(22151));
        assert_eq!(parse_max_age("max-age=60"), Some(60));
        assert_eq!(parse_max_age("max-age=10, max-age=20"), Some(20));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
        assert_eq!(parse_max_age("s-maxage=30"), None);
    }

    #[test]
    fn key_set_freshness_depends_on_expiry() {
        let now = Utc::now();
        let keys = HashMap::from([("kid".to_string(), "pem".to_string())]);

        let never_fetched = PublicKeySet::new(keys.clone(), None);
        assert!(!never_fetched.is_fresh(now));

        let fresh = PublicKeySet::new(keys.clone(), Some(now + Duration::seconds(10)));
        assert!(fresh.is_fresh(now));
        assert_eq!(fresh.get("kid"), Some("pem"));

        let stale = PublicKeySet::new(keys, Some(now));
        assert!(!stale.is_fresh(now));
    }

    #[tokio::test]
    async fn fetch_parses_keys_and_expiry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200)
                    .header("content-type", "application/json; charset=UTF-8")
                    .header("cache-control", "public, max-age=3600, must-revalidate")
                    .json_body(json!({"k1": "pem-one", "k2": "pem-two"}));
            })
            .await;

        let before = Utc::now();
        let fetcher = PublicKeyFetcher::new(server.url("/certs"));
        let set = fetcher.fetch().await.expect("fetch succeeds");

        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("k2"), Some("pem-two"));
        let expires_at = set.expires_at().expect("max-age sets an expiry");
        assert!(expires_at >= before + Duration::seconds(3600));
        assert!(expires_at <= Utc::now() + Duration::seconds(3600));
    }

    #[tokio::test]
    async fn fetch_reports_error_field_with_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"error": "invalid_request", "error_description": "bad things"}));
            })
            .await;

        let err = PublicKeyFetcher::new(server.url("/certs"))
            .fetch()
            .await
            .expect_err("error payload must fail");
        match err {
            AuthError::Internal(message) => assert_eq!(
                message,
                "Error fetching public keys for Google certs: invalid_request (bad things)"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_reports_raw_text_for_non_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(503)
                    .header("content-type", "text/html")
                    .body("<html>unavailable</html>");
            })
            .await;

        let err = PublicKeyFetcher::new(server.url("/certs"))
            .fetch()
            .await
            .expect_err("non JSON must fail");
        match err {
            AuthError::Internal(message) => assert_eq!(
                message,
                "Error fetching public keys for Google certs: <html>unavailable</html>"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cache_reuses_keys_within_max_age() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200)
                    .header("content-type", "application/json")
                    .header("cache-control", "max-age=3600")
                    .json_body(json!({"k1": "pem-one"}));
            })
            .await;

        let cache = PublicKeyCache::new(PublicKeyFetcher::new(server.url("/certs")));
        let first = cache.keys().await.expect("first fetch");
        let second = cache.keys().await.expect("cache hit");

        assert_eq!(mock.hits_async().await, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn cache_refetches_without_max_age() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"k1": "pem-one"}));
            })
            .await;

        let cache = PublicKeyCache::new(PublicKeyFetcher::new(server.url("/certs")));
        cache.keys().await.expect("first fetch");
        cache.keys().await.expect("second fetch");

        assert_eq!(mock.hits_async().await, 2);
        assert!(cache.cached().is_some_and(|set| set.expires_at().is_none()));
    }

    #[tokio::test]
    async fn failed_refresh_does_not_serve_stale_keys() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200)
                    .header("content-type", "application/json")
                    .header("cache-control", "max-age=0")
                    .json_body(json!({"k1": "pem-one"}));
            })
            .await;

        let cache = PublicKeyCache::new(PublicKeyFetcher::new(server.url("/certs")));
        cache.keys().await.expect("first fetch");
        ok.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(500).body("backend down");
            })
            .await;

        let err = cache.keys().await.expect_err("stale keys must not be served");
        assert!(err.to_string().ends_with("backend down"));
    }
}
