use super::output::emit;
use super::RunContext;
use cm_spins::probe::{default_candidates, probe_all, ProbeResult};
use cm_spins::RetryConfig;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

const PROBE_DELAY: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct ProbeOutput {
    artist_id: u64,
    results: Vec<ProbeResult>,
}

impl fmt::Display for ProbeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let working = self.results.iter().filter(|r| r.outcome.is_success()).count();
        writeln!(
            f,
            "Probed {} endpoints for artist {}, {} answered",
            self.results.len(),
            self.artist_id,
            working
        )?;
        for result in &self.results {
            let mark = if result.outcome.is_success() { "✅" } else { "❌" };
            writeln!(f, "{mark} {}: {}", result.candidate, result.outcome)?;
        }
        Ok(())
    }
}

pub async fn handle_probe(
    context: &RunContext,
    artist_id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = default_candidates(artist_id, context.config.since);
    let results = probe_all(
        &context.client,
        &candidates,
        &RetryConfig::default(),
        PROBE_DELAY,
        Some(&context.cancel),
    )
    .await;
    emit(&ProbeOutput { artist_id, results }, context.json)?;
    Ok(())
}
