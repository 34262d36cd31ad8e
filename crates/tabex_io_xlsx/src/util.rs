//! Stateless helper utilities used across the export pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

use crate::conf::{
    C_SHEET_NAME_FALLBACK, C_XLSX_EXTENSION, N_DIGITS_EXCEL_PRECISION_MAX,
    N_LEN_EXCEL_SHEET_NAME_MAX,
};
use crate::spec::{EnumCellValue, EnumCellWrite, SpecSheetCell};

const N_SECONDS_PER_DAY: f64 = 86_400.0;

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert a raw stored value into a passthrough write.
///
/// Plain decimal literals become numbers, `""` becomes blank, everything else
/// stays text. Literals with leading zeros or more digits than Excel keeps
/// exactly (postal codes, phone numbers, long ids) stay text.
pub fn convert_scalar_cell(raw_value: &str) -> EnumCellWrite {
    if raw_value.is_empty() {
        return EnumCellWrite::Blank;
    }
    if is_plain_decimal_literal(raw_value)
        && let Ok(val) = raw_value.parse::<f64>()
        && val.is_finite()
    {
        return EnumCellWrite::Number(val);
    }
    EnumCellWrite::Text(raw_value.to_string())
}

fn is_plain_decimal_literal(s: &str) -> bool {
    let c_unsigned = s.strip_prefix('-').unwrap_or(s);
    let (c_int, c_frac) = match c_unsigned.split_once('.') {
        Some((c_int, c_frac)) => (c_int, Some(c_frac)),
        None => (c_unsigned, None),
    };

    if c_int.is_empty() || !c_int.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if c_int.len() > 1 && c_int.starts_with('0') {
        return false;
    }
    if let Some(c_frac) = c_frac
        && (c_frac.is_empty() || !c_frac.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }

    let n_digits = c_int.len() + c_frac.map_or(0, str::len);
    n_digits <= N_DIGITS_EXCEL_PRECISION_MAX
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateConversion

const TUP_DATETIME_PATTERNS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a stored date/datetime representation.
///
/// Returns `Ok(None)` for MySQL zero dates, which carry no value.
/// Integer strings are read as unix timestamps (UTC).
pub fn parse_stored_datetime(raw_value: &str) -> Result<Option<NaiveDateTime>, String> {
    let c_value = raw_value.trim();
    if c_value.starts_with("0000-00-00") {
        return Ok(None);
    }

    if !c_value.is_empty() && c_value.bytes().all(|b| b.is_ascii_digit()) {
        let n_secs = c_value
            .parse::<i64>()
            .map_err(|err| format!("Invalid unix timestamp {c_value:?}: {err}"))?;
        return DateTime::from_timestamp(n_secs, 0)
            .map(|dt| Some(dt.naive_utc()))
            .ok_or_else(|| format!("Unix timestamp out of range: {c_value:?}"));
    }

    for c_pattern in TUP_DATETIME_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(c_value, c_pattern) {
            return Ok(Some(dt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(c_value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }

    Err(format!("Unrecognized date value: {raw_value:?}"))
}

/// Convert a date-time to an Excel 1900-system day-serial.
///
/// Excel treats 1900 as a leap year, so serials from 1900-03-01 onward are
/// counted from 1899-12-30 and earlier ones from 1899-12-31. Dates before
/// 1900-01-01 cannot be represented.
pub fn convert_datetime_to_excel_serial(dt: &NaiveDateTime) -> Result<f64, String> {
    let date_min = NaiveDate::from_ymd_opt(1900, 1, 1).ok_or("invalid epoch")?;
    let date_leap_fix = NaiveDate::from_ymd_opt(1900, 3, 1).ok_or("invalid epoch")?;

    let date = dt.date();
    if date < date_min {
        return Err(format!("Date before 1900-01-01 is not representable: {dt}"));
    }

    let date_epoch = if date < date_leap_fix {
        NaiveDate::from_ymd_opt(1899, 12, 31).ok_or("invalid epoch")?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30).ok_or("invalid epoch")?
    };

    let n_days = (date - date_epoch).num_days() as f64;
    let n_secs = f64::from(dt.num_seconds_from_midnight())
        + f64::from(dt.nanosecond()) / 1_000_000_000.0;

    Ok(n_days + n_secs / N_SECONDS_PER_DAY)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Lowercase, strip every non-alphanumeric char and trim to a valid Excel
/// sheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let c_name: String = name
        .chars()
        .filter(|chr| chr.is_ascii_alphanumeric())
        .map(|chr| chr.to_ascii_lowercase())
        .take(N_LEN_EXCEL_SHEET_NAME_MAX)
        .collect();

    if c_name.is_empty() {
        return C_SHEET_NAME_FALLBACK.to_string();
    }
    c_name
}

/// Split a stored comma-separated file list, dropping empty items.
pub fn split_file_list(raw_value: &str) -> Vec<&str> {
    raw_value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Build the URL-escaped attachment filename `{timestamp}_{table}.xlsx`.
pub fn derive_export_filename(timestamp: i64, table_id: &str) -> String {
    let c_filename = format!("{timestamp}_{table_id}.{C_XLSX_EXTENSION}");
    urlencoding::encode(&c_filename).into_owned()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one sheet cell.
///
/// Multi-line text counts its longest line; formatted numbers count their
/// format code length.
pub fn estimate_cell_width(cell: &SpecSheetCell) -> usize {
    match &cell.value {
        None | Some(EnumCellValue::None) => 0,
        Some(EnumCellValue::String(s)) => s
            .split(['\n', '\r'])
            .map(estimate_unicode_string_width)
            .max()
            .unwrap_or(0),
        Some(EnumCellValue::Number(n)) => match &cell.num_format {
            Some(c_fmt) => c_fmt.len(),
            None => n.to_string().len(),
        },
    }
}

/// Width of a string where non-ASCII chars count as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
