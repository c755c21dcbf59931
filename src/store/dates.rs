//! Date parsing for the three accepted input encodings (spec.md §6):
//! calendar dates, spreadsheet serials with origin 1899-12-30, and (fund
//! closing date only) `dd.mm.yyyy`. Grounded on the teacher's
//! `converter::timeformat` module, generalized from fixed timestamp-millis
//! conversion to the multi-format contract this spec requires.

use chrono::{Duration, NaiveDate};

/// Spreadsheet serial date epoch used by Excel/Sheets-style exports.
const SPREADSHEET_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Parses a date cell that may be a calendar date string, a spreadsheet
/// serial number, or (only where the caller opts in via
/// [`parse_fund_closing_date`]) `dd.mm.yyyy`. Returns `None` rather than
/// erroring: an unparseable date is a per-row anomaly (spec.md §7),
/// replaced by the documented default (absent) at the call site.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(serial) = raw.parse::<f64>() {
        return spreadsheet_serial_to_date(serial);
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    None
}

/// Fund closing date accepts the calendar/serial encodings above plus
/// `dd.mm.yyyy` (spec.md §6).
pub fn parse_fund_closing_date(raw: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_flexible_date(raw) {
        return Some(date);
    }
    NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y").ok()
}

fn spreadsheet_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(SPREADSHEET_EPOCH.0, SPREADSHEET_EPOCH.1, SPREADSHEET_EPOCH.2)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_flexible_date("2020-06-15"),
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
    }

    #[test]
    fn parses_spreadsheet_serial() {
        // Serial 1 is 1899-12-31 under the 1899-12-30 epoch.
        assert_eq!(
            parse_flexible_date("1"),
            NaiveDate::from_ymd_opt(1899, 12, 31)
        );
        // A realistic serial: 43991 -> 2020-06-15.
        assert_eq!(
            parse_flexible_date("43991"),
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
    }

    #[test]
    fn parses_dd_mm_yyyy_for_fund_closing_only() {
        assert_eq!(
            parse_fund_closing_date("31.12.2015"),
            NaiveDate::from_ymd_opt(2015, 12, 31)
        );
        assert_eq!(parse_flexible_date("31.12.2015"), None);
    }

    #[test]
    fn unparseable_returns_none() {
        assert_eq!(parse_flexible_date("not-a-date"), None);
        assert_eq!(parse_flexible_date(""), None);
    }
}
