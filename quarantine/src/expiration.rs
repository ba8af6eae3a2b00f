//! Quarantine expiration dates.
//!
//! An expiration is a calendar date written exactly as `yyyy-MM-dd`. A
//! quarantine has expired once the evaluation day (UTC) is on or after that
//! date.

use crate::host::{QuarantineError, QuarantineResult};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The expiration argument as the caller supplied it, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpirationArg {
    /// No expiration: the quarantine never lapses.
    #[default]
    Absent,
    /// Text that still has to match `yyyy-MM-dd`.
    Date(String),
    /// A value that can never be a date, kept for the error message.
    Invalid(String),
}

impl ExpirationArg {
    /// Validate the argument. `Ok(None)` means no expiration was given.
    pub fn resolve(self) -> QuarantineResult<Option<Expiration>> {
        match self {
            ExpirationArg::Absent => Ok(None),
            ExpirationArg::Date(raw) => Expiration::parse(&raw).map(Some),
            ExpirationArg::Invalid(value) => Err(QuarantineError::InvalidExpirationFormat { value }),
        }
    }
}

impl From<&str> for ExpirationArg {
    fn from(raw: &str) -> Self {
        ExpirationArg::Date(raw.to_string())
    }
}

impl From<String> for ExpirationArg {
    fn from(raw: String) -> Self {
        ExpirationArg::Date(raw)
    }
}

impl From<&String> for ExpirationArg {
    fn from(raw: &String) -> Self {
        ExpirationArg::Date(raw.clone())
    }
}

impl From<NaiveDate> for ExpirationArg {
    fn from(date: NaiveDate) -> Self {
        ExpirationArg::Date(date.format(Expiration::FORMAT).to_string())
    }
}

impl From<bool> for ExpirationArg {
    fn from(value: bool) -> Self {
        ExpirationArg::Invalid(value.to_string())
    }
}

macro_rules! invalid_expiration_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ExpirationArg {
                fn from(value: $ty) -> Self {
                    ExpirationArg::Invalid(value.to_string())
                }
            }
        )*
    };
}

invalid_expiration_from!(i32, i64, u32, u64, usize, f64);

impl<T: Into<ExpirationArg>> From<Option<T>> for ExpirationArg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ExpirationArg::Absent)
    }
}

/// A validated expiration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expiration(NaiveDate);

impl Expiration {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn parse(raw: &str) -> QuarantineResult<Self> {
        let invalid = || QuarantineError::InvalidExpirationFormat {
            value: raw.to_string(),
        };

        if !date_pattern().is_match(raw) {
            return Err(invalid());
        }

        NaiveDate::parse_from_str(raw, Self::FORMAT)
            .map(Expiration)
            .map_err(|_| invalid())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whether `now` falls on or after the expiration day. Time of day is
    /// ignored.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now.date_naive().signed_duration_since(self.0).num_days() >= 0
    }
}

impl FromStr for Expiration {
    type Err = QuarantineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date pattern"))
}
