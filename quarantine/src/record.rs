//! The persisted shape of a quarantine decision.

use chrono::{DateTime, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

/// One quarantine decision as it is written to a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRecord {
    pub name: String,
    pub passes: bool,
    /// Source test file, relative to the configured root.
    pub test_path: String,
    #[serde(with = "iso_millis")]
    pub date: DateTime<Utc>,
}

impl QuarantineRecord {
    pub fn new(
        name: impl Into<String>,
        passes: bool,
        test_path: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            passes,
            test_path: test_path.into(),
            date,
        }
    }

    /// `--> <name> - passes: <passes>`
    pub fn detail_line(&self) -> String {
        format!("--> {} - passes: {}", self.name, self.passes)
    }
}

/// Render records the way logs are stored on disk: a JSON array indented by
/// four spaces.
pub fn to_log_json(records: &[QuarantineRecord]) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(serde_json::Error::custom)
}

pub fn from_log_json(raw: &str) -> serde_json::Result<Vec<QuarantineRecord>> {
    serde_json::from_str(raw)
}

/// Timestamps are written as `2020-01-20T00:00:00.000Z` and read back from
/// any RFC 3339 string.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
