//! Field extraction and normalisation for loosely-typed API records
//!
//! All functions here are pure and never fail: malformed input yields `None`
//! or a sentinel so the pipeline and presentation always have something to use.

use crate::model::{Source, UkValues};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Shown in place of UK period values when no submitted report exists
pub const UK_ERROR_SENTINEL: &str = "error UK";

/// Report statuses meaning "accepted and submitted to the management company"
pub const STATUS_SENT: &[&str] = &["sent", "отправлено"];

/// Report statuses meaning "rejected by the management company"
pub const STATUS_UK_ERROR: &[&str] = &["error at management company", "ошибка ук"];

/// Label prefixes the API puts in front of the personal account number
pub const PERSONAL_ACCOUNT_LABELS: &[&str] = &["Personal account:", "Лицевой счёт:"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Coerce a foreign-key field: integers pass, digit-only strings are parsed
pub fn coerce_foreign_key(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Owning source of a channel record
pub fn extract_source_id(raw: &Map<String, Value>) -> Option<i64> {
    coerce_foreign_key(raw.get("source"))
}

/// Export document referenced by a channel record
pub fn extract_export_id(raw: &Map<String, Value>) -> Option<i64> {
    coerce_foreign_key(raw.get("export"))
}

/// Coerce a primary `id` field; numeric strings and integral numbers are accepted
pub fn coerce_record_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Typed source from a raw record.
///
/// The `id` must coerce and the `name` key must be present. A `null` name
/// becomes an empty string; other non-string names are stringified.
pub fn extract_source(raw: &Map<String, Value>) -> Option<Source> {
    let id = coerce_record_id(raw.get("id"))?;
    let name = match raw.get("name")? {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(Source { id, name })
}

/// First key present in the record wins, even when its value is null
pub fn first_present<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| raw.get(*k))
}

/// Current meter reading: `last_value`, then `value`, then `last`
pub fn extract_last_value(raw: &Map<String, Value>) -> Value {
    first_present(raw, &["last_value", "value", "last"])
        .cloned()
        .unwrap_or(Value::Null)
}

fn normalized_status(report: &Map<String, Value>) -> String {
    report
        .get("status_text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

fn field_or_null(report: &Map<String, Value>, key: &str) -> Value {
    report.get(key).cloned().unwrap_or(Value::Null)
}

/// Derive the last submitted reading pair from a channel's report history.
///
/// Reports are scanned in API order. Rejected reports are skipped, the first
/// submitted one wins. Without a submitted report both values carry the
/// sentinel and the timestamp of the first report (if any).
pub fn extract_uk_period_values(reports: &[Map<String, Value>]) -> UkValues {
    for report in reports {
        let status = normalized_status(report);
        if STATUS_UK_ERROR.contains(&status.as_str()) {
            continue;
        }
        if STATUS_SENT.contains(&status.as_str()) {
            return UkValues {
                prev_period_value: field_or_null(report, "uk_read_value"),
                curr_period_value: field_or_null(report, "uk_send_value"),
                timestamp: field_or_null(report, "timestamp"),
            };
        }
    }

    UkValues {
        prev_period_value: Value::String(UK_ERROR_SENTINEL.to_string()),
        curr_period_value: Value::String(UK_ERROR_SENTINEL.to_string()),
        timestamp: reports
            .first()
            .map(|r| field_or_null(r, "timestamp"))
            .unwrap_or(Value::Null),
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Normalise a due date: datetimes pass through, plain dates become UTC midnight
pub fn normalize_due_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains('T') {
        return raw.to_string();
    }
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => midnight_utc(date).format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Calendar date of a due-date string, in the offset it was written with
fn due_date_of(raw: &str) -> Option<NaiveDate> {
    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, DATE_FORMAT).ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

/// Parse a (normalised) due date into a UTC instant; naive datetimes are taken as UTC
pub fn parse_due_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .map(midnight_utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Days between `today` and the due date; `None` on empty or unparseable input
pub fn compute_days_left_at(raw: &str, today: NaiveDate) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    due_date_of(raw).map(|due| (due - today).num_days())
}

/// Days between the current UTC date and the due date
pub fn compute_days_left(raw: &str) -> Option<i64> {
    compute_days_left_at(raw, Utc::now().date_naive())
}

/// Strip the label from a personal-account title field
pub fn parse_personal_account(title: Option<&Value>) -> String {
    let text = match title {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    PERSONAL_ACCOUNT_LABELS
        .iter()
        .fold(text.trim().to_string(), |acc, label| acc.replace(label, ""))
        .trim()
        .to_string()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// State attributes of a channel sensor
pub fn build_channel_attrs(raw: &Map<String, Value>, uk: &UkValues) -> Map<String, Value> {
    let lookup = |keys: &[&str]| first_present(raw, keys).cloned().unwrap_or(Value::Null);

    let mut attrs = Map::new();
    attrs.insert("serial_number".into(), lookup(&["serial"]));
    attrs.insert(
        "report_status".into(),
        lookup(&["report_status", "reportStatus"]),
    );
    attrs.insert(
        "verification_date".into(),
        lookup(&["service_date", "serviceDate"]),
    );
    if let Some(warnings) = raw.get("warnings").filter(|w| is_truthy(w)) {
        attrs.insert("warnings".into(), warnings.clone());
    }
    attrs.insert("previous_period_value".into(), uk.prev_period_value.clone());
    attrs.insert("current_period_value".into(), uk.curr_period_value.clone());
    attrs.insert("submitted_to_uk".into(), uk.timestamp.clone());
    attrs
}
