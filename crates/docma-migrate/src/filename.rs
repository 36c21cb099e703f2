//! Scan date and barcode extraction from document filenames.
//!
//! Scanned documents are named `YYYYMMDD_BBBBBBB.ext`: the scan date followed
//! by a 7 character barcode.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

const DATE_LEN: usize = 8;
const BARCODE_LEN: usize = 7;

/// Scan date and barcode parsed from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    /// Scan date at midnight, local wall-clock time.
    pub date: NaiveDateTime,
    /// Barcode identifier.
    pub barcode: String,
}

impl Default for ScanInfo {
    /// The zero date and an empty barcode.
    fn default() -> Self {
        Self {
            date: zero_date(),
            barcode: String::new(),
        }
    }
}

/// `0001-01-01 00:00:00`, stored for dates that are unknown.
#[must_use]
pub fn zero_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Parses the scan date and barcode out of `filename`.
///
/// # Errors
///
/// Returns [`Error::InvalidFilenameFormat`] when the stem is not exactly an
/// 8 digit date and a 7 character barcode joined by `_`, or when the digits
/// do not form a calendar date. Callers that want to carry on use
/// [`ScanInfo::default`] in that case.
pub fn parse_filename(filename: &str) -> Result<ScanInfo> {
    let invalid = || Error::InvalidFilenameFormat {
        filename: filename.to_string(),
    };

    let stem = match filename.rfind('.') {
        Some(dot) => &filename[..dot],
        None => filename,
    };

    let mut parts = stem.split('_');
    let (date_part, barcode) = match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(barcode), None) => (date, barcode),
        _ => return Err(invalid()),
    };

    if date_part.len() != DATE_LEN || barcode.len() != BARCODE_LEN {
        return Err(invalid());
    }
    if !date_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = date_part[0..4].parse().map_err(|_| invalid())?;
    let month: u32 = date_part[4..6].parse().map_err(|_| invalid())?;
    let day: u32 = date_part[6..8].parse().map_err(|_| invalid())?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

    Ok(ScanInfo {
        date: date.and_time(NaiveTime::MIN),
        barcode: barcode.to_string(),
    })
}
