use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 10;

/// One symptom entry on the timeline. Never edited once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthLogEntry {
    #[serde(alias = "logId")]
    pub id: String,
    pub description: String,
    pub severity: u8,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// The backend writes `datetime.isoformat()` without an offset; treat those as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Colour band shown next to a severity value.
pub fn severity_band(severity: u8) -> &'static str {
    match severity {
        1..=2 => "mild",
        3..=4 => "moderate",
        5..=6 => "marked",
        7..=8 => "severe",
        _ => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_log_id_alias() {
        let json = r#"{"logId":"l-1","description":"Headache","severity":4,
                       "timestamp":"2026-03-01T08:30:00Z"}"#;
        let entry: HealthLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "l-1");
        assert_eq!(entry.severity, 4);
    }

    #[test]
    fn naive_backend_timestamp_is_utc() {
        let json = r#"{"logId":"l-2","description":"Fever","severity":7,
                       "timestamp":"2026-03-01T08:30:00.123456"}"#;
        let entry: HealthLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.timestamp.to_rfc3339(), "2026-03-01T08:30:00.123456+00:00");
    }

    #[test]
    fn severity_bands() {
        assert_eq!(severity_band(1), "mild");
        assert_eq!(severity_band(6), "marked");
        assert_eq!(severity_band(10), "critical");
    }
}
