//! Daily station observation parsing.
//!
//! Each non-blank line of a station file holds four tab separated fields:
//! `YYYYMMDD`, max temperature (tenths °C), min temperature (tenths °C) and
//! precipitation (tenths mm). `-9999` marks a missing reading.

use crate::error::{excerpt, IngestError, IngestResult};

/// Marks a missing reading in any numeric column.
pub const MISSING_VALUE: i64 = -9999;

const FIELD_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyObservation {
    pub obs_date: String,
    pub max_temp_tenth_c: Option<i64>,
    pub min_temp_tenth_c: Option<i64>,
    pub precip_tenth_mm: Option<i64>,
}

impl DailyObservation {
    /// Parse one trimmed, non-blank line. `file_name` is only used for error context.
    pub fn from_line(line: &str, file_name: &str) -> IngestResult<Self> {
        let malformed = || IngestError::MalformedRecord {
            file: file_name.to_string(),
            excerpt: excerpt(line),
        };

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != FIELD_COUNT {
            return Err(malformed());
        }

        let obs_date = yyyymmdd_to_iso(parts[0]).ok_or_else(malformed)?;
        let max_temp_tenth_c = to_int_or_none(parts[1]).map_err(|_| malformed())?;
        let min_temp_tenth_c = to_int_or_none(parts[2]).map_err(|_| malformed())?;
        let precip_tenth_mm = to_int_or_none(parts[3]).map_err(|_| malformed())?;

        Ok(DailyObservation {
            obs_date,
            max_temp_tenth_c,
            min_temp_tenth_c,
            precip_tenth_mm,
        })
    }
}

/// Parse a signed integer field, mapping the sentinel to `None`.
pub fn to_int_or_none(field: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let value: i64 = field.trim().parse()?;

    Ok((value != MISSING_VALUE).then_some(value))
}

/// `19850101` -> `1985-01-01`. Calendar validity is not checked.
pub fn yyyymmdd_to_iso(date: &str) -> Option<String> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("{}-{}-{}", &date[0..4], &date[4..6], &date[6..8]))
}

// -- Tests -------------------------------------------------------------------
