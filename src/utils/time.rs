use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar date of `now_utc()` as `YYYY-MM-DD`
pub fn today() -> String {
    now_utc().date_naive().to_string()
}

/// ISO 8601 with millisecond precision, e.g. `2024-01-01T09:30:00.000Z`
pub fn to_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` helper writing optional timestamps through `to_iso8601`
pub fn serialize_iso8601_opt<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(timestamp) => serializer.serialize_str(&to_iso8601(timestamp)),
        None => serializer.serialize_none(),
    }
}
