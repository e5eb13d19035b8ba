//! Per-artist SiriusXM analysis: collect an artist's tracks, sum their
//! SiriusXM streams per time window and compare them with radio airplay.

use crate::aggregate::{aggregate, aggregate_windows, WindowTotals, SIRIUSXM_METRIC, TIME_WINDOWS};
use crate::cancel::CancellationState;
use crate::config::{PaginationConfig, DEFAULT_SINCE};
use crate::iterator::{AsyncPaginatedIterator, CollectionEnd, OffsetPaginator};
use crate::r#trait::ChartmetricApi;
use crate::radio::{station_airplay, StationBreakdown};
use crate::report::{format_number, format_percent, format_summary, ratio_percent, Comparison, Report, TopEntry};
use crate::{ChartmetricError, Result};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Track listing endpoint, filterable by artist.
pub const TRACK_LISTING: &str = "/track/list/filter";

/// Sort key used for track listings and top-N reports.
pub const LATEST_SIRIUSXM: &str = "latest.siriusxm_streams";

/// An artist to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistTarget {
    pub id: u64,
    pub name: String,
}

impl ArtistTarget {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ArtistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl FromStr for ArtistTarget {
    type Err = ChartmetricError;

    /// Parse `ID` or `ID=NAME`.
    fn from_str(s: &str) -> Result<Self> {
        let (id, name) = match s.split_once('=') {
            Some((id, name)) => (id.trim(), name.trim().to_string()),
            None => (s.trim(), String::new()),
        };
        let id = id
            .parse::<u64>()
            .map_err(|_| ChartmetricError::Config(format!("Invalid artist '{s}' (expected ID or ID=NAME)")))?;
        let name = if name.is_empty() {
            format!("artist {id}")
        } else {
            name
        };
        Ok(Self { id, name })
    }
}

/// Sample artists the workflow was built around.
pub const KNOWN_ARTISTS: [(u64, &str); 3] = [
    (550716, "Duki"),
    (127473, "Airbag"),
    (1417553, "Nicki Nicole"),
];

pub fn known_artists() -> Vec<ArtistTarget> {
    KNOWN_ARTISTS
        .iter()
        .map(|(id, name)| ArtistTarget::new(*id, *name))
        .collect()
}

/// Query parameters selecting an artist's tracks, SiriusXM-heaviest first.
pub fn track_listing_params(artist_id: u64) -> Vec<(String, String)> {
    vec![
        ("artists[]".to_string(), artist_id.to_string()),
        ("sortColumn".to_string(), LATEST_SIRIUSXM.to_string()),
        ("sortOrderDesc".to_string(), "true".to_string()),
        ("range_period".to_string(), "latest".to_string()),
    ]
}

/// Knobs for [`analyze_artist`].
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub pagination: PaginationConfig,
    pub top_n: usize,
    /// Lower bound for the airplay comparison
    pub since: NaiveDate,
    pub airplay_limit: Option<u32>,
    pub cancel: Option<CancellationState>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            top_n: 5,
            since: NaiveDate::parse_from_str(DEFAULT_SINCE, "%Y-%m-%d").unwrap_or_default(),
            airplay_limit: Some(100),
            cancel: None,
        }
    }
}

/// Everything gathered for one artist.
#[derive(Debug, Clone, Serialize)]
pub struct ArtistAnalysis {
    pub artist: ArtistTarget,
    pub tracks: usize,
    pub pages_fetched: u32,
    /// False when the track listing ended early
    pub complete: bool,
    /// How the track collection ended
    pub collection: String,
    pub windows: WindowTotals,
    pub report: Report,
    pub airplay: Option<StationBreakdown>,
    pub comparison: Option<Comparison>,
    /// Collection error, if the track listing failed part way
    pub error: Option<String>,
}

impl ArtistAnalysis {
    pub fn latest_total(&self) -> f64 {
        self.windows.total("latest")
    }
}

impl fmt::Display for ArtistAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.artist)?;
        writeln!(
            f,
            "Tracks: {} in {} pages ({})",
            format_number(self.tracks as f64),
            self.pages_fetched,
            self.collection
        )?;
        for (window, total) in &self.windows.windows {
            writeln!(
                f,
                "  {window}.{}: {} ({} tracks positive)",
                self.windows.metric,
                format_number(total.total),
                total.positive_count
            )?;
        }
        writeln!(
            f,
            "  tracks with any signal: {}",
            self.windows.records_with_any_signal
        )?;
        write!(f, "{}", self.report)?;
        match (&self.airplay, &self.comparison) {
            (Some(airplay), Some(comparison)) => {
                writeln!(
                    f,
                    "Airplay: {} plays on {} stations, SiriusXM {} plays on {} stations",
                    format_number(airplay.total_plays),
                    airplay.station_count,
                    format_number(airplay.siriusxm_plays),
                    airplay.siriusxm_stations
                )?;
                writeln!(f, "{comparison}")?;
            }
            _ => writeln!(f, "Airplay: unavailable")?,
        }
        Ok(())
    }
}

/// Collect, aggregate and report one artist's SiriusXM numbers.
///
/// Never fails as a whole. A track listing error keeps the tracks collected
/// so far and is recorded in [`ArtistAnalysis::error`]; an airplay error
/// only drops the comparison.
pub async fn analyze_artist<C: ChartmetricApi + ?Sized>(
    api: &C,
    artist: &ArtistTarget,
    options: &AnalysisOptions,
) -> ArtistAnalysis {
    log::info!("Analysing {artist}");

    let mut paginator = OffsetPaginator::new(
        api,
        TRACK_LISTING,
        track_listing_params(artist.id),
        options.pagination.clone(),
    );
    if let Some(cancel) = &options.cancel {
        paginator = paginator.with_cancellation(cancel);
    }
    let collection = paginator.collect_all().await;

    let error = match &collection.end {
        CollectionEnd::Failed(e) => {
            log::error!(
                "Track collection for {artist} failed after {} tracks: {e}",
                collection.items.len()
            );
            Some(e.to_string())
        }
        _ => None,
    };

    let tracks = &collection.items;
    let windows = aggregate_windows(tracks, SIRIUSXM_METRIC, &TIME_WINDOWS);
    let latest = aggregate(tracks, LATEST_SIRIUSXM, None);
    let report = format_summary(&latest, tracks, LATEST_SIRIUSXM, options.top_n);

    let cancelled = matches!(collection.end, CollectionEnd::Cancelled);
    let (airplay, comparison) = if cancelled {
        (None, None)
    } else {
        match station_airplay(api, artist.id, options.since, options.airplay_limit).await {
            Ok(stations) => {
                let breakdown = StationBreakdown::from_records(&stations);
                let comparison = Comparison::new(
                    "SiriusXM streams",
                    latest.total,
                    "airplay plays",
                    breakdown.total_plays,
                );
                (Some(breakdown), Some(comparison))
            }
            Err(e) => {
                log::warn!("Airplay for {artist} unavailable: {e}");
                (None, None)
            }
        }
    };

    ArtistAnalysis {
        artist: artist.clone(),
        tracks: tracks.len(),
        pages_fetched: collection.pages_fetched,
        complete: collection.is_complete(),
        collection: collection.end_description(),
        windows,
        report,
        airplay,
        comparison,
        error,
    }
}

/// Analyse several artists with at most `concurrency` in flight.
///
/// Results come back in the order of `artists`, not completion order.
pub async fn analyze_artists<C: ChartmetricApi + ?Sized>(
    api: &C,
    artists: &[ArtistTarget],
    options: &AnalysisOptions,
    concurrency: usize,
) -> Vec<ArtistAnalysis> {
    stream::iter(artists)
        .map(|artist| analyze_artist(api, artist, options))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// One row of the cross-artist ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub rank: usize,
    pub artist: ArtistTarget,
    pub tracks: usize,
    pub tracks_with_signal: usize,
    pub total: f64,
    /// Share of tracks with a positive latest value, in percent
    pub signal_share: Option<f64>,
    pub top_track: Option<TopEntry>,
    pub complete: bool,
}

/// Artists ranked by their latest SiriusXM total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows: Vec<SummaryRow>,
    pub total: f64,
    pub incomplete: usize,
}

impl RunSummary {
    pub fn from_analyses(analyses: &[ArtistAnalysis]) -> Self {
        let mut ranked: Vec<&ArtistAnalysis> = analyses.iter().collect();
        ranked.sort_by(|a, b| b.latest_total().total_cmp(&a.latest_total()));

        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, analysis)| SummaryRow {
                rank: i + 1,
                artist: analysis.artist.clone(),
                tracks: analysis.tracks,
                tracks_with_signal: analysis.report.positive_count,
                total: analysis.latest_total(),
                signal_share: ratio_percent(
                    analysis.report.positive_count as f64,
                    analysis.tracks as f64,
                ),
                top_track: analysis
                    .report
                    .top
                    .first()
                    .filter(|entry| entry.value > 0.0)
                    .cloned(),
                complete: analysis.complete,
            })
            .collect::<Vec<_>>();

        Self {
            total: rows.iter().map(|r| r.total).sum(),
            incomplete: rows.iter().filter(|r| !r.complete).count(),
            rows,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Summary ==")?;
        for row in &self.rows {
            let top = row
                .top_track
                .as_ref()
                .map(|t| format!("{} ({})", t.name, format_number(t.value)))
                .unwrap_or_else(|| "N/A".to_string());
            writeln!(
                f,
                "{}. {}: {} SiriusXM streams, {}/{} tracks with signal ({}), top track {}{}",
                row.rank,
                row.artist.name,
                format_number(row.total),
                row.tracks_with_signal,
                row.tracks,
                format_percent(row.signal_share),
                top,
                if row.complete { "" } else { " [partial]" }
            )?;
        }
        writeln!(f, "Total across artists: {}", format_number(self.total))?;
        if self.incomplete > 0 {
            writeln!(f, "{} artist(s) with incomplete track listings", self.incomplete)?;
        }
        Ok(())
    }
}
