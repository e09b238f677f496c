//! Fetching puzzle pages, with exponential backoff for transient failures.
//!
//! # Architecture
//!
//! - [`PageSource`]: core trait, one page per category and identifier
//! - [`HttpSource`]: `reqwest` implementation driven by a URL template
//! - [`RetrySource`]: decorator that retries [`FetchError::Transient`]
//!
//! Not-found responses are the common case for most of the identifier space
//! and are never retried.
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::{ConfigError, FetchError};
use crate::models::{Category, FetchedDocument, Identifier};

/// Something that can produce the page for a puzzle.
pub trait PageSource {
    async fn fetch(
        &self,
        category: Category,
        id: Identifier,
    ) -> Result<FetchedDocument, FetchError>;
}

/// A URL template with `{category}` and `{id}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    /// Check that the template names an identifier and renders to a valid URL.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        if !template.contains("{id}") {
            return Err(ConfigError::Invalid(format!(
                "base URL template {template:?} has no {{id}} placeholder"
            )));
        }
        let candidate = Self(template.to_string());
        Url::parse(&candidate.render(Category::Cryptic, 0)).map_err(|e| {
            ConfigError::Invalid(format!("base URL template {template:?} is not a URL: {e}"))
        })?;
        Ok(candidate)
    }

    pub fn render(&self, category: Category, id: Identifier) -> String {
        self.0
            .replace("{category}", category.as_str())
            .replace("{id}", &id.to_string())
    }
}

/// Fetches pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    template: UrlTemplate,
}

impl HttpSource {
    pub fn new(
        template: UrlTemplate,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, template })
    }
}

/// Map an HTTP status onto the fetch taxonomy. `None` means success.
fn classify_status(url: &str, status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Some(FetchError::NotFound {
            url: url.to_string(),
        })
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Some(FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        })
    } else {
        Some(FetchError::Rejected {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(
        &self,
        category: Category,
        id: Identifier,
    ) -> Result<FetchedDocument, FetchError> {
        let url = self.template.render(category, id);
        let transient = |e: reqwest::Error| FetchError::Transient {
            url: url.clone(),
            reason: e.to_string(),
        };

        let response = self.client.get(&url).send().await.map_err(transient)?;
        let status = response.status();
        if let Some(err) = classify_status(&url, status) {
            return Err(err);
        }

        let body = response.text().await.map_err(transient)?;
        debug!(%url, bytes = body.len(), "Fetched page");
        Ok(FetchedDocument {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Wraps any [`PageSource`] and retries transient failures.
pub struct RetrySource<S> {
    inner: S,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl<S> RetrySource<S>
where
    S: PageSource,
{
    /// Retry up to `max_retries` times, starting at `base_delay`.
    pub fn new(inner: S, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<S> fmt::Debug for RetrySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("max_jitter", &self.max_jitter)
            .finish()
    }
}

impl<S> PageSource for RetrySource<S>
where
    S: PageSource,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(
        &self,
        category: Category,
        id: Identifier,
    ) -> Result<FetchedDocument, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(category, id).await {
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_template_render() {
        let template =
            UrlTemplate::parse("https://www.theguardian.com/crosswords/{category}/{id}").unwrap();
        assert_eq!(
            template.render(Category::Prize, 21622),
            "https://www.theguardian.com/crosswords/prize/21622"
        );
    }

    #[test]
    fn test_template_requires_id() {
        assert!(matches!(
            UrlTemplate::parse("https://example.org/{category}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(UrlTemplate::parse("not a url/{id}").is_err());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status("u", StatusCode::OK).is_none());
        assert!(matches!(
            classify_status("u", StatusCode::NOT_FOUND),
            Some(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            classify_status("u", StatusCode::GONE),
            Some(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            classify_status("u", StatusCode::BAD_GATEWAY),
            Some(FetchError::Transient { .. })
        ));
        assert!(matches!(
            classify_status("u", StatusCode::TOO_MANY_REQUESTS),
            Some(FetchError::Transient { .. })
        ));
        assert!(matches!(
            classify_status("u", StatusCode::FORBIDDEN),
            Some(FetchError::Rejected { status: 403, .. })
        ));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetrySource::new(FakeSource::default(), 5, Duration::from_millis(100))
            .with_max_jitter(Duration::ZERO);
        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(200));
        assert_eq!(retry.delay(3), Duration::from_millis(400));
        assert_eq!(retry.delay(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let source = FakeSource::default()
            .with_transient(Category::Cryptic, 5, 2)
            .with_page(Category::Cryptic, 5, "<html></html>");
        let retry = RetrySource::new(source, 3, Duration::ZERO).with_max_jitter(Duration::ZERO);

        let doc = retry.fetch(Category::Cryptic, 5).await.unwrap();
        assert_eq!(doc.body, "<html></html>");
        assert_eq!(retry.inner.calls(), vec![(Category::Cryptic, 5); 3]);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let source = FakeSource::default().with_transient(Category::Cryptic, 5, 10);
        let retry = RetrySource::new(source, 2, Duration::ZERO).with_max_jitter(Duration::ZERO);

        let err = retry.fetch(Category::Cryptic, 5).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(retry.inner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let retry = RetrySource::new(FakeSource::default(), 3, Duration::ZERO)
            .with_max_jitter(Duration::ZERO);
        let err = retry.fetch(Category::Prize, 9).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(retry.inner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_http_source_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crosswords/cryptic/100"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>puzzle</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/crosswords/cryptic/101"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/crosswords/cryptic/102"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let template =
            UrlTemplate::parse(&format!("{}/crosswords/{{category}}/{{id}}", server.uri())).unwrap();
        let source = HttpSource::new(template, Duration::from_secs(5), "crossword_archiver-test")
            .unwrap();

        let doc = source.fetch(Category::Cryptic, 100).await.unwrap();
        assert_eq!(doc.status, 200);
        assert_eq!(doc.body, "<html>puzzle</html>");
        assert!(doc.url.ends_with("/crosswords/cryptic/100"));

        assert!(matches!(
            source.fetch(Category::Cryptic, 101).await,
            Err(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            source.fetch(Category::Cryptic, 102).await,
            Err(FetchError::Transient { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_source_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let template = UrlTemplate::parse(&format!("{}/{{category}}/{{id}}", server.uri())).unwrap();
        let source = HttpSource::new(template, Duration::from_millis(50), "test").unwrap();
        assert!(matches!(
            source.fetch(Category::Quick, 1).await,
            Err(FetchError::Transient { .. })
        ));
    }
}
