#![allow(dead_code)]
use async_trait::async_trait;
use cm_spins::{ChartmetricApi, ChartmetricError, PaginationConfig, Record, Result, RetryConfig};
use http_client::{HttpClient, Request, Response};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub delay: Duration,
}

impl Canned {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as seen by [`ScriptedHttpClient`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// In-process `HttpClient` answering from a queue of canned responses.
///
/// Clones share the queue and the request log, so a test can keep a handle
/// after boxing one into a client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHttpClient {
    responses: Arc<Mutex<VecDeque<Canned>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedHttpClient {
    pub fn new(responses: Vec<Canned>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn send(&self, mut req: Request) -> std::result::Result<Response, http_client::Error> {
        let body = req.body_string().await.unwrap_or_default();
        self.seen.lock().unwrap().push(SeenRequest {
            method: req.method().to_string(),
            url: req.url().to_string(),
            authorization: req
                .header("Authorization")
                .and_then(|values| values.get(0))
                .map(|value| value.as_str().to_string()),
            body,
        });

        let canned = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Canned::text(503, "no scripted response left"));

        if !canned.delay.is_zero() {
            tokio::time::sleep(canned.delay).await;
        }

        let mut response = Response::new(canned.status);
        for (name, value) in &canned.headers {
            response.insert_header(name.as_str(), value.as_str());
        }
        response.set_body(canned.body);
        Ok(response)
    }
}

/// Pagination settings with no throttle and millisecond retry delays.
pub fn fast_pagination(page_size: u32) -> PaginationConfig {
    PaginationConfig {
        page_size,
        max_pages: 500,
        page_delay: Duration::ZERO,
        retry: fast_retry(3),
    }
}

pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

/// `count` track records whose `latest.siriusxm_streams` come from `value`.
pub fn tracks(count: usize, value: impl Fn(usize) -> f64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::from_value(json!({
                "name": format!("Track {i}"),
                "cm_track": i,
                "album": [{"name": "Album"}],
                "latest": {"siriusxm_streams": value(i)},
            }))
            .unwrap()
        })
        .collect()
}

/// Failure to inject on a given call.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    RateLimit,
    Remote(u16),
    Transport,
}

impl Fault {
    fn into_error(self) -> ChartmetricError {
        match self {
            Fault::RateLimit => ChartmetricError::RateLimit {
                retry_after: Duration::from_millis(1),
            },
            Fault::Remote(status) => ChartmetricError::Remote {
                status,
                message: "scripted failure".to_string(),
            },
            Fault::Transport => ChartmetricError::Http("connection reset".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `ChartmetricApi` backed by in-memory listings.
///
/// `/track/list/filter` pages through the tracks of the `artists[]` param,
/// `/radio/artist/{id}/airplay-totals/station` returns that artist's
/// stations, and every other path answers 404.
#[derive(Default)]
pub struct FakeApi {
    pub tracks: HashMap<u64, Vec<Record>>,
    pub stations: HashMap<u64, Vec<Record>>,
    pub bodies: HashMap<String, Value>,
    /// Faults keyed by 0-based call number
    pub faults: Mutex<HashMap<usize, Fault>>,
    /// Always return a full page, ignoring the backing data length
    pub never_short: bool,
    /// Simulated latency per artist track request
    pub latency: HashMap<u64, Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: Mutex<usize>,
    max_in_flight: Mutex<usize>,
}

impl FakeApi {
    pub fn with_tracks(artist_id: u64, records: Vec<Record>) -> Self {
        let mut api = Self::default();
        api.tracks.insert(artist_id, records);
        api
    }

    pub fn fail_on(self, call: usize, fault: Fault) -> Self {
        self.faults.lock().unwrap().insert(call, fault);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock().unwrap()
    }

    fn page(&self, call: &Call) -> Value {
        let artist = call
            .param("artists[]")
            .and_then(|id| id.parse::<u64>().ok())
            .unwrap_or_default();
        let offset: usize = call.param("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit: usize = call.param("limit").and_then(|v| v.parse().ok()).unwrap_or(100);
        let records = self.tracks.get(&artist).cloned().unwrap_or_default();

        let page: Vec<Record> = if self.never_short {
            (0..limit)
                .map(|i| records[(offset + i) % records.len().max(1)].clone())
                .collect()
        } else {
            records.into_iter().skip(offset).take(limit).collect()
        };
        json!({ "obj": page })
    }
}

#[async_trait(?Send)]
impl ChartmetricApi for FakeApi {
    async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let call = Call {
            path: path.to_string(),
            params: params.to_vec(),
        };
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };

        if let Some(fault) = self.faults.lock().unwrap().remove(&index) {
            return Err(fault.into_error());
        }

        if path == "/track/list/filter" {
            let artist = call
                .param("artists[]")
                .and_then(|id| id.parse::<u64>().ok())
                .unwrap_or_default();

            {
                let mut in_flight = self.in_flight.lock().unwrap();
                *in_flight += 1;
                let mut max = self.max_in_flight.lock().unwrap();
                *max = (*max).max(*in_flight);
            }
            if let Some(latency) = self.latency.get(&artist) {
                tokio::time::sleep(*latency).await;
            }
            *self.in_flight.lock().unwrap() -= 1;

            return Ok(self.page(&call));
        }

        if let Some(artist) = path
            .strip_prefix("/radio/artist/")
            .and_then(|rest| rest.strip_suffix("/airplay-totals/station"))
            .and_then(|id| id.parse::<u64>().ok())
        {
            if let Some(stations) = self.stations.get(&artist) {
                return Ok(json!({ "obj": stations }));
            }
        }

        if let Some(body) = self.bodies.get(path) {
            return Ok(body.clone());
        }

        Err(ChartmetricError::Remote {
            status: 404,
            message: format!("no route for {path}"),
        })
    }
}
