use crate::config::ClientConfig;
use crate::events::{EventBroadcaster, RateLimitEvent, RateLimitEventReceiver};
use crate::r#trait::ChartmetricApi;
use crate::token::{obtain_token, AccessToken, Credential};
use crate::{ChartmetricError, Result};
use async_trait::async_trait;
use http_client::{HttpClient, Request, Response};
use http_types::{Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// Wait applied to a 429 that carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

const MAX_ERROR_BODY: usize = 300;

/// Authenticated client for the Chartmetric REST API.
///
/// The client owns the HTTP implementation and the bearer token it was
/// given; it does no token management of its own.
///
/// # Examples
///
/// ```rust,no_run
/// use cm_spins::{ChartmetricApi, ChartmetricClient, ClientConfig, Credential, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let credential = Credential::new(std::env::var("CM_REFRESH_TOKEN").unwrap_or_default())?;
///     let client = ChartmetricClient::login(
///         Box::new(http_client::native::NativeClient::new()),
///         ClientConfig::default(),
///         &credential,
///     )
///     .await?;
///
///     let body = client
///         .get_json("/radio/artist/127473/airplay-totals/station", &[])
///         .await?;
///     println!("{body}");
///     Ok(())
/// }
/// ```
pub struct ChartmetricClient {
    http: Box<dyn HttpClient>,
    config: ClientConfig,
    token: AccessToken,
    broadcaster: EventBroadcaster,
}

impl ChartmetricClient {
    /// Create a client around an already obtained token.
    pub fn new(http: Box<dyn HttpClient>, config: ClientConfig, token: AccessToken) -> Self {
        Self {
            http,
            config,
            token,
            broadcaster: EventBroadcaster::new(),
        }
    }

    /// Exchange `credential` for a token and build a client with it.
    pub async fn login(
        http: Box<dyn HttpClient>,
        config: ClientConfig,
        credential: &Credential,
    ) -> Result<Self> {
        let token = obtain_token(http.as_ref(), &config, credential).await?;
        Ok(Self::new(http, config, token))
    }

    /// Create a client that publishes rate limit events on the same channel
    /// as this one.
    pub fn with_shared_broadcaster(&self, http: Box<dyn HttpClient>) -> Self {
        Self {
            http,
            config: self.config.clone(),
            token: self.token.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Subscribe to rate limit events.
    pub fn subscribe(&self) -> RateLimitEventReceiver {
        self.broadcaster.subscribe()
    }

    /// The most recent rate limit event, if any.
    pub fn latest_event(&self) -> Option<RateLimitEvent> {
        self.broadcaster.latest_event()
    }

    fn build_url(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let raw = format!("{}{}", self.config.base_url, path);
        let mut url = raw
            .parse::<Url>()
            .map_err(|e| ChartmetricError::Config(format!("Invalid URL '{raw}': {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Send a request and read its body, bounded by the configured timeout.
    async fn send_with_timeout(&self, request: Request) -> Result<(Response, String)> {
        let url = request.url().to_string();
        let exchange = async move {
            let mut response = self
                .http
                .send(request)
                .await
                .map_err(|e| ChartmetricError::Http(e.to_string()))?;
            let body = response
                .body_string()
                .await
                .map_err(|e| ChartmetricError::Http(e.to_string()))?;
            Ok::<_, ChartmetricError>((response, body))
        };

        tokio::time::timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| {
                ChartmetricError::Http(format!(
                    "request to {url} timed out after {:?}",
                    self.config.request_timeout
                ))
            })?
    }
}

#[async_trait(?Send)]
impl ChartmetricApi for ChartmetricClient {
    async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.build_url(path, params)?;

        let mut request = Request::new(Method::Get, url);
        request.insert_header("Authorization", self.token.bearer().as_str());
        request.insert_header("Accept", "application/json");

        let (response, body) = self.send_with_timeout(request).await?;
        let status = response.status();

        log::debug!("GET {path}: {} ({} bytes)", u16::from(status), body.len());

        if status == StatusCode::TooManyRequests {
            let retry_after = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
            self.broadcaster.broadcast(RateLimitEvent::Detected {
                timestamp: chrono::Utc::now(),
                retry_after_ms: retry_after.as_millis() as u64,
                path: path.to_string(),
            });
            return Err(ChartmetricError::RateLimit { retry_after });
        }

        if !status.is_success() {
            return Err(ChartmetricError::Remote {
                status: status.into(),
                message: truncate_body(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ChartmetricError::Parse(format!("GET {path}: {e}")))
    }

    fn notify_rate_limit(&self, event: RateLimitEvent) {
        self.broadcaster.broadcast(event);
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|h| h.get(0))
        .and_then(|v| v.as_str().trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Shorten a response body for error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    format!("{cut}...")
}
