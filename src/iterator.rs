use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::config::PaginationConfig;
use crate::events::RateLimitEvent;
use crate::r#trait::ChartmetricApi;
use crate::record::{PageRequest, Record};
use crate::retry::retry_with_backoff;
use crate::{ChartmetricError, Result};

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::watch;

/// Async iterator trait for offset-paginated Chartmetric listings.
///
/// Implementations fetch pages lazily. Offsets are never revisited: once a
/// page has been returned the next request starts `page_size` further on.
#[async_trait(?Send)]
pub trait AsyncPaginatedIterator<T> {
    /// Fetch the next page.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(items))` - The next page (possibly empty if it was the last)
    /// - `Ok(None)` - Iteration has ended, see [`stop_reason`](Self::stop_reason)
    /// - `Err(...)` - The page could not be fetched; the offset is not advanced
    async fn next_page(&mut self) -> Result<Option<Vec<T>>>;

    /// Fetch the next item, loading pages as needed.
    async fn next(&mut self) -> Result<Option<T>>;

    /// Take up to n items from the iterator.
    async fn take(&mut self, n: usize) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for _ in 0..n {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Drain every remaining page.
    ///
    /// Never fails as a whole: when a page request fails the items gathered
    /// so far are returned together with the error.
    async fn collect_all(&mut self) -> Collection<T> {
        let mut items = Vec::new();
        loop {
            match self.next_page().await {
                Ok(Some(page)) => items.extend(page),
                Ok(None) => {
                    let end = match self.stop_reason() {
                        Some(StopReason::SafetyCap { max_pages }) => {
                            CollectionEnd::SafetyCap { max_pages }
                        }
                        Some(StopReason::Cancelled) => CollectionEnd::Cancelled,
                        _ => CollectionEnd::Exhausted,
                    };
                    return Collection {
                        items,
                        pages_fetched: self.pages_fetched(),
                        end,
                    };
                }
                Err(e) => {
                    log::warn!(
                        "Collection aborted at offset {} after {} records: {e}",
                        self.current_offset(),
                        items.len()
                    );
                    return Collection {
                        items,
                        pages_fetched: self.pages_fetched(),
                        end: CollectionEnd::Failed(e),
                    };
                }
            }
        }
    }

    /// Offset of the next page to be requested.
    fn current_offset(&self) -> u32;

    /// Number of pages successfully fetched so far.
    fn pages_fetched(&self) -> u32;

    /// Why iteration ended, once it has.
    fn stop_reason(&self) -> Option<StopReason>;
}

/// Why a paginator stopped handing out pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A short or empty page was returned
    Exhausted,
    /// `max_pages` were fetched without the listing ending
    SafetyCap { max_pages: u32 },
    /// Cancellation was requested between pages or during a backoff
    Cancelled,
}

/// How a [`Collection`] ended.
#[derive(Debug)]
pub enum CollectionEnd {
    Exhausted,
    SafetyCap { max_pages: u32 },
    Cancelled,
    Failed(ChartmetricError),
}

/// Records gathered by a collection run, complete or not.
#[derive(Debug)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    pub end: CollectionEnd,
}

impl<T> Collection<T> {
    /// True only when the listing signalled its own end.
    pub fn is_complete(&self) -> bool {
        matches!(self.end, CollectionEnd::Exhausted)
    }

    pub fn error(&self) -> Option<&ChartmetricError> {
        match &self.end {
            CollectionEnd::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Short description of how the collection ended.
    pub fn end_description(&self) -> String {
        match &self.end {
            CollectionEnd::Exhausted => "complete".to_string(),
            CollectionEnd::SafetyCap { max_pages } => {
                format!("stopped at safety cap of {max_pages} pages")
            }
            CollectionEnd::Cancelled => "cancelled".to_string(),
            CollectionEnd::Failed(e) => format!("failed: {e}"),
        }
    }
}

/// Offset/limit paginator over a Chartmetric listing endpoint.
///
/// Each page request is retried on HTTP 429 according to
/// [`PaginationConfig::retry`] without advancing the offset, and successive
/// page requests are spaced by [`PaginationConfig::page_delay`].
pub struct OffsetPaginator<'a, C: ChartmetricApi + ?Sized> {
    api: &'a C,
    request: PageRequest,
    config: PaginationConfig,
    cancel: Option<watch::Receiver<bool>>,
    buffer: VecDeque<Record>,
    pages_fetched: u32,
    stop: Option<StopReason>,
    throttle_pending: bool,
}

impl<'a, C: ChartmetricApi + ?Sized> OffsetPaginator<'a, C> {
    pub fn new(
        api: &'a C,
        endpoint: impl Into<String>,
        fixed_params: Vec<(String, String)>,
        config: PaginationConfig,
    ) -> Self {
        let page_size = config.page_size.max(1);
        Self {
            api,
            request: PageRequest::new(endpoint, fixed_params, 0, page_size),
            config,
            cancel: None,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            stop: None,
            throttle_pending: false,
        }
    }

    /// Stop between pages, or during a rate limit backoff, once `cancel` is
    /// triggered.
    pub fn with_cancellation(mut self, cancel: &CancellationState) -> Self {
        self.cancel = Some(cancel.subscribe());
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    async fn throttle(&mut self) -> Result<()> {
        if !self.throttle_pending || self.config.page_delay.is_zero() {
            return Ok(());
        }
        match &self.cancel {
            Some(rx) => sleep_with_cancel(rx.clone(), self.config.page_delay).await?,
            None => tokio::time::sleep(self.config.page_delay).await,
        }
        self.throttle_pending = false;
        Ok(())
    }
}

#[async_trait(?Send)]
impl<'a, C: ChartmetricApi + ?Sized> AsyncPaginatedIterator<Record> for OffsetPaginator<'a, C> {
    async fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        if self.stop.is_some() {
            return Ok(None);
        }

        if self.is_cancelled() {
            log::info!("Collection cancelled at offset {}", self.request.offset);
            self.stop = Some(StopReason::Cancelled);
            return Ok(None);
        }

        match self.throttle().await {
            Ok(()) => {}
            Err(ChartmetricError::Cancelled) => {
                log::info!("Collection cancelled at offset {}", self.request.offset);
                self.stop = Some(StopReason::Cancelled);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let api = self.api;
        let request = &self.request;
        let operation = format!("{} offset={}", request.endpoint, request.offset);
        let max_retries = self.config.retry.max_retries;

        let fetched = retry_with_backoff(
            &self.config.retry,
            &operation,
            self.cancel.as_ref(),
            || api.fetch_page(request),
            |delay, attempt| {
                api.notify_rate_limit(RateLimitEvent::RetryStarting {
                    timestamp: chrono::Utc::now(),
                    delay_ms: delay.as_millis() as u64,
                    attempt,
                    max_attempts: max_retries,
                    operation: operation.clone(),
                });
            },
        )
        .await;

        let page = match fetched {
            Ok(retried) => retried.result,
            Err(ChartmetricError::Cancelled) => {
                log::info!(
                    "Collection cancelled during rate limit backoff at offset {}",
                    self.request.offset
                );
                self.stop = Some(StopReason::Cancelled);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.pages_fetched += 1;
        self.throttle_pending = true;

        log::debug!(
            "Fetched {} records at offset {} (page {})",
            page.len(),
            self.request.offset,
            self.pages_fetched
        );

        if (page.len() as u64) < u64::from(self.request.limit) {
            self.stop = Some(StopReason::Exhausted);
        } else if let Some(next) = self.request.next() {
            self.request = next;
            if self.pages_fetched >= self.config.max_pages {
                log::warn!(
                    "Safety cap of {} pages reached for {}, listing may be incomplete",
                    self.config.max_pages,
                    self.request.endpoint
                );
                self.stop = Some(StopReason::SafetyCap {
                    max_pages: self.config.max_pages,
                });
            }
        } else {
            log::warn!(
                "Offset overflow after {} for {}, stopping",
                self.request.offset,
                self.request.endpoint
            );
            self.stop = Some(StopReason::Exhausted);
        }

        Ok(Some(page))
    }

    async fn next(&mut self) -> Result<Option<Record>> {
        while self.buffer.is_empty() {
            match self.next_page().await? {
                Some(page) => self.buffer.extend(page),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.pop_front())
    }

    fn current_offset(&self) -> u32 {
        self.request.offset
    }

    fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }
}

/// Collect every record of a listing endpoint.
///
/// Pages through `endpoint` from offset 0 with `fixed_params` until a short
/// or empty page, the safety cap, or a non-recoverable error. Records
/// gathered before a failure are kept.
///
/// # Examples
///
/// ```rust,no_run
/// # use cm_spins::{collect_all, ChartmetricApi, PaginationConfig};
/// # async fn run(api: &dyn ChartmetricApi) {
/// let params = vec![("artists[]".to_string(), "127473".to_string())];
/// let collection = collect_all(api, "/track/list/filter", params, PaginationConfig::default()).await;
/// println!("{} tracks ({})", collection.items.len(), collection.end_description());
/// # }
/// ```
pub async fn collect_all<C: ChartmetricApi + ?Sized>(
    api: &C,
    endpoint: &str,
    fixed_params: Vec<(String, String)>,
    config: PaginationConfig,
) -> Collection<Record> {
    OffsetPaginator::new(api, endpoint, fixed_params, config)
        .collect_all()
        .await
}
