//! Time handling for billing
//!
//! - `Clock`: injectable source of "now" so issue and due dates are testable
//! - `Timezone`: serde-friendly wrapper around `chrono_tz::Tz`
//! - `BillingPeriod`: the calendar month an invoice is issued in

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur with temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid billing period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to an instant, adjustable between calls
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Moves the clock to a new instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.instant.lock().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Timezone wrapper for billing jurisdictions
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(Tz::UTC)
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// The local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date_naive()
    }
}

/// Calendar month used to scope invoice sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(TemporalError::InvalidPeriod(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// The period containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Compact `YYYYMM` key, used in invoice numbers and as a storage key
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingPeriod {
    type Err = TemporalError;

    /// Parses the `YYYYMM` key form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(TemporalError::InvalidPeriod(s.to_string()));
        }
        let year = s[..4]
            .parse()
            .map_err(|_| TemporalError::InvalidPeriod(s.to_string()))?;
        let month = s[4..]
            .parse()
            .map_err(|_| TemporalError::InvalidPeriod(s.to_string()))?;
        Self::new(year, month)
    }
}
