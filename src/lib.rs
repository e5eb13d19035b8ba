//! Collect and reconcile SiriusXM play counts from the Chartmetric API.
//!
//! A run exchanges a refresh credential for a bearer token, pages through a
//! listing endpoint, sums a metric across the collected records and reports
//! totals and top records.

pub mod aggregate;
pub mod analysis;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod iterator;
pub mod probe;
pub mod radio;
pub mod record;
pub mod report;
pub mod retry;
pub mod token;
pub mod r#trait;

pub use aggregate::{aggregate, AggregateResult, StationCategory};
pub use analysis::{analyze_artist, analyze_artists, ArtistAnalysis, ArtistTarget, RunSummary};
pub use cancel::CancellationState;
pub use client::ChartmetricClient;
pub use config::{ClientConfig, PaginationConfig, RunConfig};
pub use error::ChartmetricError;
pub use events::{RateLimitEvent, RateLimitEventReceiver};
pub use iterator::{collect_all, AsyncPaginatedIterator, Collection, CollectionEnd, OffsetPaginator};
pub use probe::{probe_all, ProbeCandidate, ProbeOutcome};
pub use record::{PageRequest, Record};
pub use report::{format_summary, Report, TopEntry};
pub use retry::RetryConfig;
pub use token::{obtain_token, AccessToken, Credential};
pub use r#trait::ChartmetricApi;

#[cfg(feature = "mock")]
pub use r#trait::MockChartmetricApi;

pub type Result<T> = std::result::Result<T, ChartmetricError>;
