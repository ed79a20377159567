//! Strongly-typed provider call records.
//!
//! The telephony provider hands us call records in three shapes:
//!
//! - a header-less, semicolon-delimited stats report with a fixed column
//!   order ([`STATS_FIELDS`]),
//! - JSON objects keyed by the English field names,
//! - JSON objects keyed by the Russian labels of the exported report.
//!
//! All of them are resolved here, once, into [`CallRecord`]. Nothing
//! downstream looks at raw keys.

use serde::Serialize;
use serde_json::Value;

/// `fields` value of a stats request. The provider returns the columns in
/// this order.
pub const STATS_FIELDS: &str =
    "records, start, finish, from_number, to_number, disconnect_reason, entry_id";

/// A single call as reported by the provider. Every field may be absent;
/// the reconciler decides which gaps are fatal for the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub entry_id: Option<String>,
    /// Unix seconds.
    pub start: Option<i64>,
    /// Unix seconds.
    pub finish: Option<i64>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub disconnect_reason: Option<String>,
    /// Opaque recording token (the `records` field).
    pub recording_token: Option<String>,
}

// ---------------------------------------------------------------------------
// JSON input formats
// ---------------------------------------------------------------------------

/// The two key sets a JSON call record may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    English,
    RussianReport,
}

struct FieldKeys {
    entry_id: &'static str,
    start: &'static str,
    finish: &'static str,
    from_number: &'static str,
    to_number: &'static str,
    disconnect_reason: &'static str,
    records: &'static str,
}

const ENGLISH_KEYS: FieldKeys = FieldKeys {
    entry_id: "entry_id",
    start: "start",
    finish: "finish",
    from_number: "from_number",
    to_number: "to_number",
    disconnect_reason: "disconnect_reason",
    records: "records",
};

const RUSSIAN_KEYS: FieldKeys = FieldKeys {
    entry_id: "ID записи",
    start: "Начало",
    finish: "Окончание",
    from_number: "Кто звонил",
    to_number: "Куда звонил",
    disconnect_reason: "Причина завершения",
    records: "Запись",
};

impl RecordFormat {
    /// Pick the key set from the keys present in the object.
    pub fn detect(object: &serde_json::Map<String, Value>) -> Self {
        let russian = [
            RUSSIAN_KEYS.entry_id,
            RUSSIAN_KEYS.from_number,
            RUSSIAN_KEYS.to_number,
        ];
        if russian.iter().any(|k| object.contains_key(*k)) {
            Self::RussianReport
        } else {
            Self::English
        }
    }

    fn keys(self) -> &'static FieldKeys {
        match self {
            Self::English => &ENGLISH_KEYS,
            Self::RussianReport => &RUSSIAN_KEYS,
        }
    }
}

impl CallRecord {
    /// Parse a JSON object in either supported format.
    ///
    /// Returns `None` when `value` is not an object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let keys = RecordFormat::detect(object).keys();

        Some(Self {
            entry_id: object.get(keys.entry_id).and_then(text_value),
            start: object.get(keys.start).and_then(unix_value),
            finish: object.get(keys.finish).and_then(unix_value),
            from_number: object.get(keys.from_number).and_then(text_value),
            to_number: object.get(keys.to_number).and_then(text_value),
            disconnect_reason: object.get(keys.disconnect_reason).and_then(text_value),
            recording_token: object.get(keys.records).and_then(token_value),
        })
    }

    /// Parse a list of records from a JSON body: either an array, or an
    /// object wrapping the array under `list` or `data`.
    pub fn list_from_json(value: &Value) -> Vec<Self> {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(object) => match object.get("list").or_else(|| object.get("data")) {
                Some(Value::Array(items)) => items.as_slice(),
                _ => return Self::from_json(value).into_iter().collect(),
            },
            _ => return Vec::new(),
        };
        items.iter().filter_map(Self::from_json).collect()
    }
}

// ---------------------------------------------------------------------------
// Stats report text
// ---------------------------------------------------------------------------

/// Parse the header-less, semicolon-delimited stats report.
///
/// Columns map positionally onto [`STATS_FIELDS`]. Blank lines are skipped;
/// short lines leave the trailing fields empty.
pub fn parse_stats_csv(text: &str) -> Vec<CallRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_stats_line)
        .collect()
}

fn parse_stats_line(line: &str) -> CallRecord {
    let mut cols = line.split(';').map(|c| {
        let c = c.trim();
        c.strip_prefix('"')
            .and_then(|c| c.strip_suffix('"'))
            .unwrap_or(c)
            .trim()
    });
    let mut next = || cols.next().filter(|c| !c.is_empty()).map(str::to_string);

    let recording_token = next();
    let start = next().and_then(|s| parse_unix(&s));
    let finish = next().and_then(|s| parse_unix(&s));
    let from_number = next();
    let to_number = next();
    let disconnect_reason = next();
    let entry_id = next();

    CallRecord {
        entry_id,
        start,
        finish,
        from_number,
        to_number,
        disconnect_reason,
        recording_token: recording_token.filter(|t| t != "[]"),
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unix_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_unix(s),
        _ => None,
    }
}

fn token_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(text_value),
        other => text_value(other).filter(|t| t != "[]"),
    }
}

/// Accept unix seconds as a number-like string, or a report datetime
/// (`2024-03-01 10:15:00` / `01.03.2024 10:15:00`, taken as UTC).
fn parse_unix(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(secs) = raw.parse::<f64>() {
        return Some(secs as i64);
    }
    ["%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}
