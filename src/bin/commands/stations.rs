use super::output::emit;
use super::RunContext;
use chrono::NaiveDate;
use cm_spins::radio::{station_airplay, StationBreakdown};
use cm_spins::report::{format_number, format_percent, ratio_percent};
use cm_spins::Record;
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct StationsOutput {
    artist_id: u64,
    since: NaiveDate,
    breakdown: StationBreakdown,
    siriusxm_share: Option<f64>,
    stations: Vec<Record>,
}

impl fmt::Display for StationsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Artist {} airplay since {}: {} plays on {} stations",
            self.artist_id,
            self.since,
            format_number(self.breakdown.total_plays),
            self.breakdown.station_count
        )?;
        for (i, station) in self.stations.iter().enumerate() {
            writeln!(
                f,
                "  {:>3}. {} ({}): {}",
                i + 1,
                station.name(),
                station.text_at("country"),
                format_number(station.number_at("plays"))
            )?;
        }
        writeln!(
            f,
            "SiriusXM: {} plays on {} stations ({} of all plays)",
            format_number(self.breakdown.siriusxm_plays),
            self.breakdown.siriusxm_stations,
            format_percent(self.siriusxm_share)
        )?;
        for station in self.breakdown.siriusxm_stations(&self.stations) {
            writeln!(
                f,
                "  - {}: {}",
                station.name(),
                format_number(station.number_at("plays"))
            )?;
        }
        Ok(())
    }
}

pub async fn handle_stations(
    context: &RunContext,
    artist_id: u64,
    since: NaiveDate,
    limit: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stations = station_airplay(&context.client, artist_id, since, limit).await?;
    let breakdown = StationBreakdown::from_records(&stations);

    let output = StationsOutput {
        artist_id,
        since,
        siriusxm_share: ratio_percent(breakdown.siriusxm_plays, breakdown.total_plays),
        breakdown,
        stations,
    };

    emit(&output, context.json)?;
    Ok(())
}
