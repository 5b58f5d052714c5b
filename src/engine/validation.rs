use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The only way a score calculation can fail: malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInputError {
    #[error("Invalid {field} '{value}' (expected YYYY-MM-DD): {reason}")]
    Date {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Invalid time format (expected HH:MM): {0}")]
    TimeFormat(String),
    #[error("Hour must be 0-23: {0}")]
    HourOutOfRange(i64),
    #[error("Gender must be 'M' or 'F': {0}")]
    Gender(String),
    #[error("{0}")]
    Missing(&'static str),
    #[error("Minimum {0} agents required for match analysis")]
    TooFewAgents(usize),
    #[error("Maximum {0} agents allowed for survival analysis")]
    TooManyAgents(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl FromStr for Gender {
    type Err = InvalidInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            other => Err(InvalidInputError::Gender(other.to_string())),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "M",
            Gender::Female => "F",
        })
    }
}

fn has_four_digit_year(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() > 4 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'-'
}

/// Parse a `YYYY-MM-DD` date, naming the offending field on failure.
///
/// The year is exactly four digits and at least 0001; chrono alone would
/// also take `0000` and signed or longer years.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, InvalidInputError> {
    let invalid = |reason: String| InvalidInputError::Date {
        field,
        value: value.to_string(),
        reason,
    };
    if !has_four_digit_year(value) {
        return Err(invalid("year must be four digits".to_string()));
    }
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| invalid(e.to_string()))?;
    if date.year() < 1 {
        return Err(invalid("year is out of range".to_string()));
    }
    Ok(date)
}

/// Extract the hour from an `HH:MM` string.
///
/// Only the hour is interpreted; whatever follows the first ':' is ignored.
pub fn parse_birth_hour(birth_time: &str) -> Result<u32, InvalidInputError> {
    let Some((hour_part, _)) = birth_time.split_once(':') else {
        return Err(InvalidInputError::TimeFormat(birth_time.to_string()));
    };
    let hour: i64 = hour_part
        .trim()
        .parse()
        .map_err(|_| InvalidInputError::TimeFormat(birth_time.to_string()))?;
    if !(0..=23).contains(&hour) {
        return Err(InvalidInputError::HourOutOfRange(hour));
    }
    Ok(hour as u32)
}

/// Validated inputs for one score calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuckInput {
    pub birth_date: NaiveDate,
    pub birth_time: String,
    pub birth_hour: u32,
    pub target_date: NaiveDate,
    pub gender: Gender,
}

impl LuckInput {
    /// Validate raw string inputs. Dates are checked before time, time before gender.
    pub fn parse(
        birth_date: &str,
        birth_time: &str,
        target_date: &str,
        gender: &str,
    ) -> Result<Self, InvalidInputError> {
        let birth = parse_date("birth_date", birth_date)?;
        let target = parse_date("target_date", target_date)?;
        let birth_hour = parse_birth_hour(birth_time)?;
        let gender = gender.parse()?;

        Ok(Self {
            birth_date: birth,
            birth_time: birth_time.to_string(),
            birth_hour,
            target_date: target,
            gender,
        })
    }
}
