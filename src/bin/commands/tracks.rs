use super::output::{emit, log_partial};
use super::RunContext;
use cm_spins::aggregate::{aggregate, aggregate_windows, WindowTotals, SIRIUSXM_METRIC, TIME_WINDOWS};
use cm_spins::analysis::{track_listing_params, LATEST_SIRIUSXM, TRACK_LISTING};
use cm_spins::report::format_number;
use cm_spins::{format_summary, AsyncPaginatedIterator, OffsetPaginator, PaginationConfig, Report};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct TracksOutput {
    artist_id: u64,
    tracks: usize,
    pages_fetched: u32,
    complete: bool,
    collection: String,
    windows: WindowTotals,
    report: Report,
}

impl fmt::Display for TracksOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Artist {}: {} tracks in {} pages ({})",
            self.artist_id,
            format_number(self.tracks as f64),
            self.pages_fetched,
            self.collection
        )?;
        for (window, total) in &self.windows.windows {
            writeln!(
                f,
                "  {window}.{}: {}",
                self.windows.metric,
                format_number(total.total)
            )?;
        }
        writeln!(
            f,
            "  tracks with any signal: {}",
            self.windows.records_with_any_signal
        )?;
        write!(f, "{}", self.report)
    }
}

pub async fn handle_tracks(
    context: &RunContext,
    artist_id: u64,
    top: usize,
    page_size: u32,
    max_pages: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Collecting tracks for artist {artist_id}");

    let config = PaginationConfig {
        page_size,
        max_pages,
        ..PaginationConfig::default()
    };
    let collection = OffsetPaginator::new(
        &context.client,
        TRACK_LISTING,
        track_listing_params(artist_id),
        config,
    )
    .with_cancellation(&context.cancel)
    .collect_all()
    .await;

    if !collection.is_complete() {
        log_partial("Tracks", collection.items.len(), &collection.end_description());
    }

    let tracks = &collection.items;
    let latest = aggregate(tracks, LATEST_SIRIUSXM, None);
    let output = TracksOutput {
        artist_id,
        tracks: tracks.len(),
        pages_fetched: collection.pages_fetched,
        complete: collection.is_complete(),
        collection: collection.end_description(),
        windows: aggregate_windows(tracks, SIRIUSXM_METRIC, &TIME_WINDOWS),
        report: format_summary(&latest, tracks, LATEST_SIRIUSXM, top),
    };

    emit(&output, context.json)?;
    Ok(())
}
