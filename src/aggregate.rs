//! Field extraction and summation over collected records.
//!
//! All functions here are pure: they read [`Record`]s and return fresh
//! totals without touching the network or the input.

use crate::record::Record;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metric the track analysis is built around.
pub const SIRIUSXM_METRIC: &str = "siriusxm_streams";

/// Time-window prefixes under which Chartmetric reports track metrics.
pub const TIME_WINDOWS: [&str; 3] = ["latest", "weekly_diff", "monthly_diff"];

/// Running sum for one partition key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionTotal {
    pub record_count: usize,
    pub total: f64,
    pub positive_count: usize,
}

impl PartitionTotal {
    fn add(&mut self, value: f64) {
        self.record_count += 1;
        self.total += value;
        if value > 0.0 {
            self.positive_count += 1;
        }
    }
}

/// Totals of one field across a record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    /// The field path that was summed
    pub field: String,
    pub record_count: usize,
    pub total: f64,
    /// Records whose value was strictly greater than zero
    pub positive_count: usize,
    /// Per-partition totals; empty when no partition function was given
    pub partitions: BTreeMap<String, PartitionTotal>,
}

/// Sum the number at `path` over `records`.
///
/// Missing, null and non-numeric values count as zero. When `partition` is
/// given every value is also added to the partition named by its result, so
/// the partition totals always add up to [`AggregateResult::total`].
///
/// # Examples
///
/// ```
/// use cm_spins::aggregate::{aggregate, StationCategory};
/// use cm_spins::Record;
/// use serde_json::json;
///
/// let stations: Vec<Record> = [
///     json!({"name": "SiriusXM Pop2K", "plays": 40}),
///     json!({"name": "KEXP", "plays": 2}),
/// ]
/// .into_iter()
/// .map(|v| Record::from_value(v).unwrap())
/// .collect();
///
/// let by_category = |r: &Record| StationCategory::classify(&r.name()).label().to_string();
/// let result = aggregate(&stations, "plays", Some(&by_category));
/// assert_eq!(result.total, 42.0);
/// assert_eq!(result.partitions["SiriusXM"].total, 40.0);
/// ```
pub fn aggregate(
    records: &[Record],
    path: &str,
    partition: Option<&dyn Fn(&Record) -> String>,
) -> AggregateResult {
    let mut result = AggregateResult {
        field: path.to_string(),
        ..AggregateResult::default()
    };

    for record in records {
        let value = record.number_at(path);
        result.record_count += 1;
        result.total += value;
        if value > 0.0 {
            result.positive_count += 1;
        }
        if let Some(key_fn) = partition {
            result.partitions.entry(key_fn(record)).or_default().add(value);
        }
    }

    result
}

/// One metric summed under several time windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowTotals {
    pub metric: String,
    pub record_count: usize,
    /// Keyed by window name (`latest`, `weekly_diff`, ...)
    pub windows: BTreeMap<String, PartitionTotal>,
    /// Records with a positive value in at least one window
    pub records_with_any_signal: usize,
}

impl WindowTotals {
    pub fn total(&self, window: &str) -> f64 {
        self.windows.get(window).map(|w| w.total).unwrap_or(0.0)
    }
}

/// Sum `{window}.{metric}` for every window in `windows`.
pub fn aggregate_windows(records: &[Record], metric: &str, windows: &[&str]) -> WindowTotals {
    let mut totals = WindowTotals {
        metric: metric.to_string(),
        record_count: records.len(),
        ..WindowTotals::default()
    };

    for window in windows {
        let path = format!("{window}.{metric}");
        let summed = aggregate(records, &path, None);
        totals.windows.insert(
            window.to_string(),
            PartitionTotal {
                record_count: summed.record_count,
                total: summed.total,
                positive_count: summed.positive_count,
            },
        );
    }

    totals.records_with_any_signal = records
        .iter()
        .filter(|record| {
            windows
                .iter()
                .any(|window| record.number_at(&format!("{window}.{metric}")) > 0.0)
        })
        .count();

    totals
}

/// Partition function splitting records by whether `path` is positive.
pub fn signal_partition(path: &str) -> impl Fn(&Record) -> String + '_ {
    move |record| {
        if record.number_at(path) > 0.0 {
            "with signal".to_string()
        } else {
            "without signal".to_string()
        }
    }
}

/// Coarse station classification by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StationCategory {
    SiriusXm,
    Other,
}

const SIRIUSXM_MARKERS: [&str; 3] = ["sirius", "xm", "satellite"];

impl StationCategory {
    /// Case-insensitive substring match against known satellite markers.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if SIRIUSXM_MARKERS.iter().any(|marker| lower.contains(marker)) {
            StationCategory::SiriusXm
        } else {
            StationCategory::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StationCategory::SiriusXm => "SiriusXM",
            StationCategory::Other => "Other",
        }
    }
}
