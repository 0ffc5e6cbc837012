use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::schema::{FetchFailure, FetchOutcome, FetchedMedia};
use crate::services::retry::{RetryPolicy, Sleeper};

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REDIRECTS: usize = 10;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const SNIFF_LEN: usize = 100;

// some media CDNs reject default client signatures
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

pub struct MediaFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl MediaFetcher {
    pub fn new(max_retries: u32, sleeper: Arc<dyn Sleeper>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .default_headers(browser_headers())
            .build()?;
        Ok(Self {
            client,
            policy: RetryPolicy::fixed(max_retries, RETRY_DELAY),
            sleeper,
        })
    }

    async fn attempt(&self, url: &str, attempt: u32) -> FetchOutcome {
        let failure = |reason: String, status: Option<u16>| {
            FetchOutcome::Failed(FetchFailure {
                reason,
                url: url.to_string(),
                status,
                attempt,
            })
        };

        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return failure(format!("request failed: {e}"), None),
        };

        let status = resp.status();
        if !status.is_success() {
            return failure(format!("unexpected status {status}"), Some(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = match resp.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => return failure(format!("failed to read body: {e}"), Some(status.as_u16())),
        };

        if bytes.is_empty() {
            return failure("empty body".to_string(), Some(status.as_u16()));
        }
        if looks_like_html(&bytes) {
            return failure(
                "received an HTML page instead of media".to_string(),
                Some(status.as_u16()),
            );
        }

        FetchOutcome::Fetched(FetchedMedia {
            size: bytes.len(),
            bytes,
            content_type,
        })
    }
}

#[async_trait::async_trait]
impl MediaSource for MediaFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let outcome = self
            .policy
            .run(
                self.sleeper.as_ref(),
                |attempt| async move {
                    let outcome = self.attempt(url, attempt).await;
                    match &outcome {
                        FetchOutcome::Fetched(media) => tracing::info!(
                            url,
                            attempt,
                            bytes = media.size,
                            content_type = %media.content_type,
                            "fetched media"
                        ),
                        FetchOutcome::Failed(failure) => tracing::warn!(
                            url,
                            attempt,
                            status = ?failure.status,
                            reason = %failure.reason,
                            "media fetch attempt failed"
                        ),
                    }
                    outcome
                },
                |outcome| !outcome.is_fetched(),
            )
            .await;

        if let FetchOutcome::Failed(failure) = &outcome {
            tracing::error!(%failure, "giving up on media");
        }
        outcome
    }
}

/// CDN error pages come back as 200 with HTML; only the head of the body matters.
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype")
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("es-PE,es;q=0.9,en;q=0.8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}
