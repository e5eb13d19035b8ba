use super::output::{emit, log_partial};
use super::RunContext;
use cm_spins::analysis::{known_artists, AnalysisOptions};
use cm_spins::{analyze_artists, ArtistAnalysis, ArtistTarget, RunSummary};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct ArtistsOutput {
    artists: Vec<ArtistAnalysis>,
    summary: RunSummary,
}

impl fmt::Display for ArtistsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for analysis in &self.artists {
            writeln!(f, "{analysis}")?;
        }
        write!(f, "{}", self.summary)
    }
}

pub async fn handle_artists(
    context: &RunContext,
    raw_targets: &[String],
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = if raw_targets.is_empty() {
        known_artists()
    } else {
        raw_targets
            .iter()
            .map(|raw| raw.parse::<ArtistTarget>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let options = AnalysisOptions {
        top_n: top,
        since: context.config.since,
        cancel: Some(context.cancel.clone()),
        ..AnalysisOptions::default()
    };

    log::info!(
        "Analysing {} artists, {} at a time",
        targets.len(),
        context.config.concurrency
    );
    let artists = analyze_artists(&context.client, &targets, &options, context.config.concurrency).await;

    for analysis in artists.iter().filter(|a| !a.complete) {
        log_partial(&analysis.artist.name, analysis.tracks, &analysis.collection);
    }

    let summary = RunSummary::from_analyses(&artists);
    emit(&ArtistsOutput { artists, summary }, context.json)?;
    Ok(())
}
