//! Run configuration read from the environment, plus tuning knobs for the
//! HTTP client and the paginated collector.

use crate::retry::RetryConfig;
use crate::token::Credential;
use crate::{ChartmetricError, Result};
use chrono::NaiveDate;
use std::time::Duration;

/// Default Chartmetric API root.
pub const DEFAULT_BASE_URL: &str = "https://api.chartmetric.com/api";

/// Sample artist used when `ARTIST_ID` is not set (Airbag).
pub const DEFAULT_ARTIST_ID: u64 = 127473;

/// Default lower bound of the date window.
pub const DEFAULT_SINCE: &str = "2020-01-01";

/// Upper bound on `CONCURRENCY`. The API rate limits aggressively.
pub const MAX_CONCURRENCY: usize = 4;

pub const ENV_REFRESH_TOKEN: &str = "CM_REFRESH_TOKEN";
pub const ENV_ARTIST_ID: &str = "ARTIST_ID";
pub const ENV_SINCE: &str = "SINCE";
pub const ENV_UNTIL: &str = "UNTIL";
pub const ENV_CONCURRENCY: &str = "CONCURRENCY";
pub const ENV_BASE_URL: &str = "CM_API_BASE_URL";

/// Everything a run needs before its first network call.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub credential: Credential,
    pub artist_id: u64,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub concurrency: usize,
    pub base_url: String,
}

impl RunConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credential = get(ENV_REFRESH_TOKEN)
            .ok_or_else(|| {
                ChartmetricError::Config(format!("{ENV_REFRESH_TOKEN} environment variable not set"))
            })
            .and_then(Credential::new)?;

        let artist_id = match get(ENV_ARTIST_ID) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ChartmetricError::Config(format!("Invalid {ENV_ARTIST_ID}: '{raw}'"))
            })?,
            None => DEFAULT_ARTIST_ID,
        };

        let since = parse_date(ENV_SINCE, get(ENV_SINCE).as_deref().unwrap_or(DEFAULT_SINCE))?;
        let until = match get(ENV_UNTIL) {
            Some(raw) => parse_date(ENV_UNTIL, &raw)?,
            None => chrono::Utc::now().date_naive(),
        };
        if since > until {
            return Err(ChartmetricError::Config(format!(
                "{ENV_SINCE} ({since}) cannot be after {ENV_UNTIL} ({until})"
            )));
        }

        let concurrency = match get(ENV_CONCURRENCY) {
            Some(raw) => parse_concurrency(&raw)?,
            None => 1,
        };

        let base_url = get(ENV_BASE_URL)
            .map(|raw| raw.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            credential,
            artist_id,
            since,
            until,
            concurrency,
            base_url,
        })
    }

    /// Client settings derived from this run.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::with_base_url(self.base_url.as_str())
    }
}

/// Parse a `YYYY-MM-DD` date, naming the variable in the error.
pub fn parse_date(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ChartmetricError::Config(format!("Invalid {name}: '{raw}' (expected YYYY-MM-DD)"))
    })
}

fn parse_concurrency(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_CONCURRENCY).contains(&n) => Ok(n),
        _ => Err(ChartmetricError::Config(format!(
            "Invalid {ENV_CONCURRENCY}: '{raw}' (expected 1..={MAX_CONCURRENCY})"
        ))),
    }
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub base_url: String,
    /// Upper bound on a single request, response body included
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(25),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

/// Paginated collector settings.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// Records requested per page (the API caps this at 100)
    pub page_size: u32,
    /// Hard stop on page requests, for APIs that never return a short page
    pub max_pages: u32,
    /// Courtesy pause between successful page fetches
    pub page_delay: Duration,
    /// 429 handling for each page request
    pub retry: RetryConfig,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 500,
            page_delay: Duration::from_millis(500),
            retry: RetryConfig::default(),
        }
    }
}
