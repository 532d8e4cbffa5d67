//! Decoding of the daily rates document.
//!
//! The feed is usually served as windows-1251, so the body is transcoded to
//! UTF-8 before it reaches the XML deserializer. The encoding is picked from,
//! in order: a byte order mark, the XML declaration, the `Content-Type`
//! charset, and finally UTF-8.

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use serde::Deserialize;
use std::borrow::Cow;
use tracing::debug;

use crate::core::{FetchError, Record};

#[derive(Debug, Deserialize)]
pub struct ValCurs {
    #[serde(rename = "@Date")]
    pub date: String,
    #[serde(rename = "Valute", default)]
    pub valutes: Vec<Valute>,
}

#[derive(Debug, Deserialize)]
pub struct Valute {
    #[serde(rename = "CharCode")]
    pub char_code: String,
    #[serde(rename = "Name")]
    pub name: String,
    // Older documents predate this element; those entries are dropped.
    #[serde(rename = "VunitRate", default)]
    pub vunit_rate: String,
}

/// Parses a rate written with a decimal comma, e.g. `"93,4409"`.
///
/// Only finite, positive values are accepted.
pub fn parse_rate(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).take(1024).position(|w| w == b"?>")?;
    let decl = &bytes[..end];

    let key = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = &decl[key + 8..];
    let eq = rest.iter().position(|b| *b == b'=')?;
    let rest = &rest[eq + 1..];
    let quote_at = rest.iter().position(|b| *b == b'"' || *b == b'\'')?;
    let quote = rest[quote_at];
    let value = &rest[quote_at + 1..];
    let close = value.iter().position(|b| *b == quote)?;

    Encoding::for_label(&value[..close])
}

fn header_encoding(content_type: Option<&str>) -> Option<&'static Encoding> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

/// Detects the body's character set and transcodes it to UTF-8.
pub fn transcode<'a>(bytes: &'a [u8], content_type: Option<&str>) -> Cow<'a, str> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| declared_encoding(bytes))
        .or_else(|| header_encoding(content_type))
        .unwrap_or(UTF_8);

    let (text, actual, had_errors) = encoding.decode(bytes);
    debug!(encoding = actual.name(), had_errors, "Transcoded feed body");
    text
}

/// Parses an already transcoded document.
pub fn parse_document(text: &str) -> Result<ValCurs, FetchError> {
    // The declaration still names the original charset, which no longer holds.
    let body = match text.trim_start().strip_prefix("<?xml") {
        Some(rest) => rest
            .split_once("?>")
            .map(|(_, body)| body)
            .ok_or_else(|| FetchError::Decode("unterminated XML declaration".to_string()))?,
        None => text,
    };

    quick_xml::de::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Turns a document into records for `date`, skipping unparseable rates.
pub fn to_records(doc: ValCurs, date: NaiveDate) -> Vec<Record> {
    let total = doc.valutes.len();
    let records: Vec<Record> = doc
        .valutes
        .into_iter()
        .filter_map(|v| match parse_rate(&v.vunit_rate) {
            Some(rate) => Some(Record {
                date,
                code: v.char_code,
                name: v.name,
                rate,
            }),
            None => {
                debug!(code = %v.char_code, rate = %v.vunit_rate, "Skipping unparseable rate");
                None
            }
        })
        .collect();

    if records.len() < total {
        debug!(
            "Kept {} of {} entries for {}",
            records.len(),
            total,
            date
        );
    }
    records
}

/// Full decode pipeline: charset detection, parsing and record extraction.
pub fn decode_records(
    bytes: &[u8],
    content_type: Option<&str>,
    date: NaiveDate,
) -> Result<Vec<Record>, FetchError> {
    let text = transcode(bytes, content_type);
    let doc = parse_document(&text)?;

    let requested = date.format("%d.%m.%Y").to_string();
    if doc.date != requested {
        debug!(requested = %requested, published = %doc.date, "Feed returned another date");
    }
    Ok(to_records(doc, date))
}
