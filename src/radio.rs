//! Radio airplay listings: per-station play totals and broadcast markets.

use crate::aggregate::{aggregate, AggregateResult, StationCategory};
use crate::r#trait::ChartmetricApi;
use crate::record::{records_from_listing, Record};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Per-station airplay totals for an artist.
pub fn station_airplay_path(artist_id: u64) -> String {
    format!("/radio/artist/{artist_id}/airplay-totals/station")
}

pub fn broadcast_markets_path(artist_id: u64) -> String {
    format!("/radio/artist/{artist_id}/broadcast-markets")
}

/// Stations that played `artist_id` since `since`, each with `name`,
/// `country` and `plays`.
///
/// This listing is not paginated; `limit` is passed through when given.
pub async fn station_airplay<C: ChartmetricApi + ?Sized>(
    api: &C,
    artist_id: u64,
    since: NaiveDate,
    limit: Option<u32>,
) -> Result<Vec<Record>> {
    let mut params = vec![("since".to_string(), since.format("%Y-%m-%d").to_string())];
    if let Some(limit) = limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    let path = station_airplay_path(artist_id);
    let stations = records_from_listing(api.get_json(&path, &params).await?)?;
    log::info!("{} stations with airplay for artist {artist_id}", stations.len());
    Ok(stations)
}

/// Station plays split into SiriusXM and other stations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationBreakdown {
    pub station_count: usize,
    pub total_plays: f64,
    pub siriusxm_stations: usize,
    pub siriusxm_plays: f64,
    pub plays: AggregateResult,
}

impl StationBreakdown {
    pub fn from_records(stations: &[Record]) -> Self {
        let by_category = |r: &Record| StationCategory::classify(&r.name()).label().to_string();
        let plays = aggregate(stations, "plays", Some(&by_category));
        let siriusxm = plays
            .partitions
            .get(StationCategory::SiriusXm.label())
            .cloned()
            .unwrap_or_default();

        Self {
            station_count: plays.record_count,
            total_plays: plays.total,
            siriusxm_stations: siriusxm.record_count,
            siriusxm_plays: siriusxm.total,
            plays,
        }
    }

    /// SiriusXM stations, in listing order.
    pub fn siriusxm_stations<'a>(&self, stations: &'a [Record]) -> Vec<&'a Record> {
        stations
            .iter()
            .filter(|s| StationCategory::classify(&s.name()) == StationCategory::SiriusXm)
            .collect()
    }
}

/// Broadcast market counts for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketTotals {
    /// ISO 3166 alpha-2 code, upper case
    pub country: String,
    /// `market_count_data` of the country-level entry
    pub country_count: f64,
    pub country_stations: f64,
    /// Number of city-level entries for the country
    pub city_markets: usize,
    /// Sum of `market_count_data` across those cities
    pub city_count: f64,
    pub city_stations: f64,
}

impl MarketTotals {
    /// Sum the entries for `country` out of a `broadcast-markets` body.
    ///
    /// Accepts the full response (`{"obj": {...}}`) or the bare object.
    pub fn from_value(body: &Value, country: &str) -> Self {
        let data = body.get("obj").unwrap_or(body);
        let country = country.to_uppercase();
        let mut totals = MarketTotals {
            country: country.clone(),
            ..Self::default()
        };

        for entry in market_entries(data, "countryRatios", &country) {
            totals.country_count += entry.number_at("market_count_data");
            totals.country_stations += entry.number_at("count_of_stations");
        }
        for entry in market_entries(data, "cityRatios", &country) {
            totals.city_markets += 1;
            totals.city_count += entry.number_at("market_count_data");
            totals.city_stations += entry.number_at("count_of_stations");
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.country_count == 0.0 && self.city_markets == 0
    }
}

fn market_entries(data: &Value, key: &str, country: &str) -> Vec<Record> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| Record::from_value(v.clone()).ok())
                .filter(|r| r.text_at("code2").eq_ignore_ascii_case(country))
                .collect()
        })
        .unwrap_or_default()
}

/// Broadcast market totals for `country` since `since`.
pub async fn broadcast_markets<C: ChartmetricApi + ?Sized>(
    api: &C,
    artist_id: u64,
    since: NaiveDate,
    country: &str,
) -> Result<MarketTotals> {
    let params = vec![("since".to_string(), since.format("%Y-%m-%d").to_string())];
    let body = api
        .get_json(&broadcast_markets_path(artist_id), &params)
        .await?;
    let totals = MarketTotals::from_value(&body, country);
    if totals.is_empty() {
        log::warn!("No {} broadcast market data for artist {artist_id}", totals.country);
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_station_breakdown() {
        let stations: Vec<Record> = [
            json!({"name": "SiriusXM Hits 1", "country": "United States", "plays": 300}),
            json!({"name": "Z100", "country": "United States", "plays": 50}),
            json!({"name": "XM Caliente", "country": "United States", "plays": 25}),
            json!({"name": "Rock & Pop", "country": "Argentina", "plays": 1000}),
        ]
        .into_iter()
        .map(|v| Record::from_value(v).unwrap())
        .collect();

        let breakdown = StationBreakdown::from_records(&stations);
        assert_eq!(breakdown.station_count, 4);
        assert_eq!(breakdown.total_plays, 1375.0);
        assert_eq!(breakdown.siriusxm_stations, 2);
        assert_eq!(breakdown.siriusxm_plays, 325.0);

        let names: Vec<String> = breakdown
            .siriusxm_stations(&stations)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["SiriusXM Hits 1", "XM Caliente"]);
    }

    #[test]
    fn test_breakdown_without_stations() {
        let breakdown = StationBreakdown::from_records(&[]);
        assert_eq!(breakdown.siriusxm_plays, 0.0);
        assert_eq!(breakdown.station_count, 0);
    }

    #[test]
    fn test_market_totals() {
        let body = json!({"obj": {
            "countryRatios": [
                {"code2": "US", "market_count_data": "5430", "count_of_stations": 12},
                {"code2": "AR", "market_count_data": "900", "count_of_stations": 40},
            ],
            "cityRatios": [
                {"code2": "us", "market_count_data": "3000", "count_of_stations": 4},
                {"code2": "US", "market_count_data": "1200", "count_of_stations": 2},
                {"code2": "AR", "market_count_data": "700"},
            ],
        }});

        let us = MarketTotals::from_value(&body, "us");
        assert_eq!(us.country, "US");
        assert_eq!(us.country_count, 5430.0);
        assert_eq!(us.country_stations, 12.0);
        assert_eq!(us.city_markets, 2);
        assert_eq!(us.city_count, 4200.0);
        assert_eq!(us.city_stations, 6.0);

        let missing = MarketTotals::from_value(&json!({"obj": {}}), "US");
        assert!(missing.is_empty());
    }
}
