//! Endpoint probe harness.
//!
//! A probe is a declarative `(path, params)` pair. [`probe_all`] requests
//! each one once and classifies the response, so new guesses are added to
//! [`default_candidates`] rather than written as new procedures.

use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::r#trait::ChartmetricApi;
use crate::record::records_from_listing;
use crate::retry::{retry_operation, RetryConfig};
use crate::ChartmetricError;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// One endpoint shape to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeCandidate {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ProbeCandidate {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }
}

impl fmt::Display for ProbeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.path)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            write!(f, "{}{key}={value}", if i == 0 { "?" } else { "&" })?;
        }
        Ok(())
    }
}

/// Endpoint shapes known to be worth trying for SiriusXM and radio data.
pub fn default_candidates(artist_id: u64, since: NaiveDate) -> Vec<ProbeCandidate> {
    let since = since.format("%Y-%m-%d").to_string();
    let artist = format!("/radio/artist/{artist_id}");
    vec![
        ProbeCandidate::new(format!("{artist}/airplay-totals/station"))
            .param("since", &since)
            .param("limit", 100),
        ProbeCandidate::new(format!("{artist}/airplay-totals")).param("since", &since),
        ProbeCandidate::new(format!("{artist}/airplay")).param("since", &since),
        ProbeCandidate::new(format!("{artist}/airplay/station")).param("since", &since),
        ProbeCandidate::new(format!("{artist}/plays/station")).param("since", &since),
        ProbeCandidate::new(format!("{artist}/spins/station")).param("since", &since),
        ProbeCandidate::new(format!("{artist}/broadcast-markets")).param("since", &since),
        ProbeCandidate::new(format!("/artist/{artist_id}/tracks")).param("limit", 10),
        ProbeCandidate::new(format!("/siriusxm/artist/{artist_id}/spins")).param("since", &since),
        ProbeCandidate::new("/siriusxm/stations"),
        ProbeCandidate::new("/charts/airplay/artists")
            .param("since", &since)
            .param("duration", "weekly")
            .param("limit", 100)
            .param("cm_artist", artist_id),
        ProbeCandidate::new("/charts/airplay/tracks")
            .param("since", &since)
            .param("duration", "weekly")
            .param("limit", 100)
            .param("cm_artist", artist_id),
        ProbeCandidate::new("/radio/station/search")
            .param("q", "siriusxm")
            .param("limit", 20),
    ]
}

/// What a probe found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// A listing with `items` records; keys of the first record
    Listing { items: usize, sample_keys: Vec<String> },
    /// A non-listing object with these top-level keys
    Object { keys: Vec<String> },
    NotFound,
    Failed {
        status: Option<u16>,
        message: String,
    },
}

impl ProbeOutcome {
    /// Classify a successful response body.
    pub fn from_body(body: Value) -> Self {
        let is_listing = match &body {
            Value::Array(_) => true,
            Value::Object(top) => match top.get("obj") {
                Some(Value::Array(_)) => true,
                Some(Value::Object(obj)) => matches!(obj.get("data"), Some(Value::Array(_))),
                _ => false,
            },
            _ => false,
        };

        if is_listing {
            if let Ok(records) = records_from_listing(body.clone()) {
                let sample_keys = records
                    .first()
                    .map(|r| r.fields().keys().cloned().collect())
                    .unwrap_or_default();
                return ProbeOutcome::Listing {
                    items: records.len(),
                    sample_keys,
                };
            }
        }

        let inner = body.get("obj").unwrap_or(&body);
        let keys = inner
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        ProbeOutcome::Object { keys }
    }

    pub fn from_error(error: &ChartmetricError) -> Self {
        match error.status() {
            Some(404) => ProbeOutcome::NotFound,
            status => ProbeOutcome::Failed {
                status,
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Listing { .. } | ProbeOutcome::Object { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Listing { items, sample_keys } => {
                write!(f, "listing of {items} records")?;
                if !sample_keys.is_empty() {
                    write!(f, " [{}]", sample_keys.join(", "))?;
                }
                Ok(())
            }
            ProbeOutcome::Object { keys } => write!(f, "object {{{}}}", keys.join(", ")),
            ProbeOutcome::NotFound => write!(f, "not found"),
            ProbeOutcome::Failed { message, .. } => write!(f, "failed: {message}"),
        }
    }
}

/// A candidate together with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub candidate: ProbeCandidate,
    pub outcome: ProbeOutcome,
}

/// Probe every candidate in order, `delay` apart.
///
/// A 429 is retried according to `retry`; any other failure is recorded
/// against that candidate and the remaining candidates are still probed.
/// Once `cancel` fires, probing stops and the results so far are returned.
pub async fn probe_all<C: ChartmetricApi + ?Sized>(
    api: &C,
    candidates: &[ProbeCandidate],
    retry: &RetryConfig,
    delay: Duration,
    cancel: Option<&CancellationState>,
) -> Vec<ProbeResult> {
    let cancel_rx = cancel.map(CancellationState::subscribe);
    let mut results = Vec::with_capacity(candidates.len());

    for (i, candidate) in candidates.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            let waited = match &cancel_rx {
                Some(rx) => sleep_with_cancel(rx.clone(), delay).await,
                None => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            };
            if waited.is_err() {
                break;
            }
        }
        if cancel_rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            break;
        }

        let name = candidate.to_string();
        let response = retry_operation(retry, &name, cancel_rx.as_ref(), || {
            api.get_json(&candidate.path, &candidate.params)
        })
        .await;

        let outcome = match response {
            Ok(body) => ProbeOutcome::from_body(body.result),
            Err(ChartmetricError::Cancelled) => break,
            Err(e) => {
                if !e.status().is_some_and(|s| s == 404) {
                    log::warn!("Probe {name} failed: {e}");
                }
                ProbeOutcome::from_error(&e)
            }
        };
        log::info!("{name}: {outcome}");

        results.push(ProbeResult {
            candidate: candidate.clone(),
            outcome,
        });
    }

    if results.len() < candidates.len() {
        log::info!(
            "Probing cancelled after {} of {} candidates",
            results.len(),
            candidates.len()
        );
    }

    results
}
