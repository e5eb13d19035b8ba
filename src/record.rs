//! Loosely-typed catalog records as returned by Chartmetric listing endpoints.
//!
//! The shape of a record (track, station, artist) is only partially known, so
//! fields are read defensively: a missing or null numeric field reads as zero
//! and a missing name reads as an empty string.

use crate::{ChartmetricError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields tried, in order, when looking for a record identifier.
const ID_FIELDS: [&str; 4] = ["id", "cm_track", "cm_artist", "cm_station"];

/// One item of a listing response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ChartmetricError::Parse(format!(
                "expected a JSON object record, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a dotted path such as `latest.siriusxm_streams` or
    /// `album.0.name`. Numeric segments index into arrays.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Numeric value at `path`; missing, null and non-numeric values read as 0.
    ///
    /// Numeric strings (`"1200"`) are parsed, since some endpoints report
    /// counts as text.
    pub fn number_at(&self, path: &str) -> f64 {
        match self.value_at(path) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Text at `path`; numbers are rendered, anything else reads as "".
    pub fn text_at(&self, path: &str) -> String {
        match self.value_at(path) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn name(&self) -> String {
        self.text_at("name")
    }

    /// First non-empty identifier field.
    pub fn id(&self) -> String {
        ID_FIELDS
            .iter()
            .map(|field| self.text_at(field))
            .find(|id| !id.is_empty())
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Pull the record array out of a listing response body.
///
/// Chartmetric wraps listings as `{"obj": [...]}` or `{"obj": {"data": [...]}}`.
/// A body with neither shape is treated as an empty page.
pub fn records_from_listing(body: Value) -> Result<Vec<Record>> {
    let items = match body {
        Value::Object(mut top) => match top.remove("obj") {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut obj)) => match obj.remove("data") {
                Some(Value::Array(items)) => items,
                _ => {
                    log::warn!("Listing response has no obj.data array, treating as empty page");
                    Vec::new()
                }
            },
            _ => {
                log::warn!("Listing response has no obj array, treating as empty page");
                Vec::new()
            }
        },
        Value::Array(items) => items,
        other => {
            return Err(ChartmetricError::Parse(format!(
                "expected a listing object, got {}",
                json_kind(&other)
            )))
        }
    };

    items.into_iter().map(Record::from_value).collect()
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(endpoint: impl Into<String>, params: Vec<(String, String)>, offset: u32, limit: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            offset,
            limit,
        }
    }

    /// Fixed params followed by `limit` and `offset`.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = self.params.clone();
        query.push(("limit".to_string(), self.limit.to_string()));
        query.push(("offset".to_string(), self.offset.to_string()));
        query
    }

    /// The request for the page after this one, or `None` once the offset
    /// would no longer fit in a `u32`.
    pub fn next(&self) -> Option<Self> {
        let offset = self.offset.checked_add(self.limit)?;
        Some(Self {
            offset,
            ..self.clone()
        })
    }
}
