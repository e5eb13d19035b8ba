use super::output::emit;
use super::RunContext;
use chrono::NaiveDate;
use cm_spins::radio::{broadcast_markets, MarketTotals};
use cm_spins::report::format_number;
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct MarketsOutput {
    artist_id: u64,
    since: NaiveDate,
    markets: MarketTotals,
}

impl fmt::Display for MarketsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.markets;
        writeln!(
            f,
            "Artist {} broadcast markets in {} since {}",
            self.artist_id, m.country, self.since
        )?;
        if m.is_empty() {
            return writeln!(f, "  no data");
        }
        writeln!(
            f,
            "  country total: {} ({} stations)",
            format_number(m.country_count),
            format_number(m.country_stations)
        )?;
        writeln!(
            f,
            "  city total:    {} across {} markets ({} stations)",
            format_number(m.city_count),
            m.city_markets,
            format_number(m.city_stations)
        )
    }
}

pub async fn handle_markets(
    context: &RunContext,
    artist_id: u64,
    since: NaiveDate,
    country: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let markets = broadcast_markets(&context.client, artist_id, since, country).await?;
    emit(
        &MarketsOutput {
            artist_id,
            since,
            markets,
        },
        context.json,
    )?;
    Ok(())
}
