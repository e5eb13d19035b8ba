//! Human and JSON summaries of aggregated records.

use crate::aggregate::{AggregateResult, PartitionTotal};
use crate::record::Record;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One row of a top-N listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    /// 1-based position in the sorted order
    pub rank: usize,
    pub name: String,
    pub id: String,
    pub value: f64,
}

/// Summary of one aggregate plus its top records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub field: String,
    pub record_count: usize,
    pub total: f64,
    pub positive_count: usize,
    pub partitions: BTreeMap<String, PartitionTotal>,
    pub sort_key: String,
    pub top: Vec<TopEntry>,
}

/// The `n` records with the highest value at `sort_key`.
///
/// Sorting is stable, so records with equal values keep their input order.
/// Asking for more records than exist returns all of them.
pub fn top_n(records: &[Record], sort_key: &str, n: usize) -> Vec<TopEntry> {
    let mut keyed: Vec<(f64, &Record)> = records
        .iter()
        .map(|record| (record.number_at(sort_key), record))
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));

    keyed
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (value, record))| TopEntry {
            rank: i + 1,
            name: record.name(),
            id: record.id(),
            value,
        })
        .collect()
}

/// Build a [`Report`] from an aggregate and the records it was computed over.
pub fn format_summary(
    aggregate: &AggregateResult,
    records: &[Record],
    sort_key: &str,
    top: usize,
) -> Report {
    Report {
        field: aggregate.field.clone(),
        record_count: aggregate.record_count,
        total: aggregate.total,
        positive_count: aggregate.positive_count,
        partitions: aggregate.partitions.clone(),
        sort_key: sort_key.to_string(),
        top: top_n(records, sort_key, top),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records:             {}", format_number(self.record_count as f64))?;
        writeln!(f, "Total {}: {}", self.field, format_number(self.total))?;
        writeln!(
            f,
            "With positive value: {} ({})",
            format_number(self.positive_count as f64),
            format_percent(ratio_percent(
                self.positive_count as f64,
                self.record_count as f64
            ))
        )?;

        if !self.partitions.is_empty() {
            writeln!(f, "By partition:")?;
            for (key, partition) in &self.partitions {
                writeln!(
                    f,
                    "  {key}: {} across {} records ({} positive)",
                    format_number(partition.total),
                    format_number(partition.record_count as f64),
                    format_number(partition.positive_count as f64)
                )?;
            }
        }

        if !self.top.is_empty() {
            writeln!(f, "Top {} by {}:", self.top.len(), self.sort_key)?;
            for entry in &self.top {
                let name = if entry.name.is_empty() { "(unnamed)" } else { &entry.name };
                writeln!(
                    f,
                    "  {:>3}. {} [{}]: {}",
                    entry.rank,
                    name,
                    entry.id,
                    format_number(entry.value)
                )?;
            }
        }
        Ok(())
    }
}

/// `numerator / denominator * 100`, or `None` when the denominator is zero.
pub fn ratio_percent(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let ratio = numerator / denominator * 100.0;
    ratio.is_finite().then_some(ratio)
}

/// Two totals over the same subject, compared as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub numerator_label: String,
    pub numerator: f64,
    pub denominator_label: String,
    pub denominator: f64,
    /// `null` when the denominator is zero
    pub percent: Option<f64>,
}

impl Comparison {
    pub fn new(
        numerator_label: impl Into<String>,
        numerator: f64,
        denominator_label: impl Into<String>,
        denominator: f64,
    ) -> Self {
        Self {
            numerator_label: numerator_label.into(),
            numerator,
            denominator_label: denominator_label.into(),
            denominator,
            percent: ratio_percent(numerator, denominator),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} vs {} {}: {}",
            self.numerator_label,
            format_number(self.numerator),
            self.denominator_label,
            format_number(self.denominator),
            format_percent(self.percent)
        )
    }
}

/// Render a percentage with two decimals, or "undefined".
pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{p:.2}%"),
        None => "undefined".to_string(),
    }
}

/// Render a number with thousands separators; fractions keep two decimals.
pub fn format_number(value: f64) -> String {
    let abs = value.abs();
    let rendered = if abs.fract() == 0.0 {
        format!("{abs:.0}")
    } else {
        format!("{abs:.2}")
    };
    // Values that round to zero print without a sign
    let negative = value < 0.0 && rendered.chars().any(|c| matches!(c, '1'..='9'));
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rendered, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}
