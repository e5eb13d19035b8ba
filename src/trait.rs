use crate::events::RateLimitEvent;
use crate::record::{records_from_listing, PageRequest, Record};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Read-only Chartmetric operations used by the collectors.
///
/// Everything above the transport (pagination, probes, radio listings,
/// artist analysis) is written against this trait, so it can be driven by a
/// scripted fake or, with the `mock` feature, by `MockChartmetricApi`.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait ChartmetricApi {
    /// GET `path` with query `params` and decode the body as JSON.
    ///
    /// HTTP 429 must surface as [`ChartmetricError::RateLimit`] and any other
    /// non-2xx status as [`ChartmetricError::Remote`].
    ///
    /// [`ChartmetricError::RateLimit`]: crate::ChartmetricError::RateLimit
    /// [`ChartmetricError::Remote`]: crate::ChartmetricError::Remote
    async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value>;

    /// Fetch one page of a listing endpoint.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Record>> {
        log::debug!(
            "GET {} offset={} limit={}",
            request.endpoint,
            request.offset,
            request.limit
        );
        let body = self.get_json(&request.endpoint, &request.to_query()).await?;
        records_from_listing(body)
    }

    /// Hook for publishing rate limit events. Does nothing by default.
    fn notify_rate_limit(&self, _event: RateLimitEvent) {}
}
