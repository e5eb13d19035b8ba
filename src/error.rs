use std::time::Duration;
use thiserror::Error;

/// Error types for Chartmetric collection runs.
///
/// The variants follow the lifecycle of a run: configuration is validated
/// first, then the refresh credential is exchanged for a bearer token, then
/// listing endpoints are paged through.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use cm_spins::{ChartmetricError, ClientConfig, Credential};
///
/// #[tokio::main]
/// async fn main() {
///     let http = http_client::native::NativeClient::new();
///     let credential = Credential::new("refresh-token").unwrap();
///
///     match cm_spins::obtain_token(&http, &ClientConfig::default(), &credential).await {
///         Ok(_token) => println!("Token obtained"),
///         Err(ChartmetricError::Auth(msg)) => eprintln!("Token exchange failed: {}", msg),
///         Err(e) => eprintln!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum ChartmetricError {
    /// Missing or invalid configuration.
    ///
    /// Raised before any network call is attempted, e.g. when
    /// `CM_REFRESH_TOKEN` is absent or a date bound does not parse.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The refresh credential could not be exchanged for an access token.
    ///
    /// # Common Causes
    /// - Expired or revoked refresh token
    /// - Token endpoint unreachable
    /// - Response without a `token` field
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// HTTP 429 from the API.
    ///
    /// Page requests recover from this locally by waiting and retrying the
    /// same page; it only surfaces once the retry budget is spent.
    #[error("Rate limited, retry after {}s", retry_after.as_secs_f64())]
    RateLimit {
        /// How long the server asked us to wait
        retry_after: Duration,
    },

    /// Any other non-2xx response.
    #[error("Remote error {status}: {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        message: String,
    },

    /// Transport failures, including per-call timeouts.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response body was not the JSON we expected.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The run was cancelled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ChartmetricError {
    /// Whether this is a 429 that a retry policy may absorb.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ChartmetricError::RateLimit { .. })
    }

    /// Errors that must terminate the run before any collection starts.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(self, ChartmetricError::Config(_) | ChartmetricError::Auth(_))
    }

    /// HTTP status associated with the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChartmetricError::RateLimit { .. } => Some(429),
            ChartmetricError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ChartmetricError {
    fn from(e: serde_json::Error) -> Self {
        ChartmetricError::Parse(e.to_string())
    }
}
