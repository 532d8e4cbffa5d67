//! Exchange rate observations

use chrono::NaiveDate;
use serde::Serialize;

/// One currency's rate on one date, quoted in roubles per unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// The requested date, not the feed's publication date.
    pub date: NaiveDate,
    pub code: String,
    pub name: String,
    pub rate: f64,
}

impl Record {
    pub fn new(date: NaiveDate, code: &str, name: &str, rate: f64) -> Self {
        Record {
            date,
            code: code.to_string(),
            name: name.to_string(),
            rate,
        }
    }
}
