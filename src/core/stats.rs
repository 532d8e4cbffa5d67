//! Aggregate statistics over collected records

use serde::Serialize;

use super::record::Record;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub max: Record,
    pub min: Record,
    pub mean: f64,
    pub count: usize,
}

/// Scans `records` once for the highest rate, the lowest rate and the mean.
///
/// Ties keep the first record seen: the extremes only move on a strictly
/// greater (or strictly smaller) rate. Returns `None` for empty input, which
/// callers are expected to report as "no data" before getting here.
pub fn summarize(records: &[Record]) -> Option<Summary> {
    let (first, rest) = records.split_first()?;

    let mut max = first;
    let mut min = first;
    let mut sum = first.rate;

    for record in rest {
        if record.rate > max.rate {
            max = record;
        }
        if record.rate < min.rate {
            min = record;
        }
        sum += record.rate;
    }

    Some(Summary {
        max: max.clone(),
        min: min.clone(),
        mean: sum / records.len() as f64,
        count: records.len(),
    })
}
