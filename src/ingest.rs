//! Raw-table ingest (C1, spec.md §3): reads the firm/company/round/fund
//! CSVs into the `Raw*Row` types `store::CanonicalStore::build` consumes.
//!
//! Every column is read as `DataType::String` — the input's date columns
//! mix calendar dates, spreadsheet serials, and (fund closing date only)
//! `dd.mm.yyyy`, none of which `polars`' own date inference handles — and
//! parsed cell-by-cell with `store::dates`. Column-name harmonization is
//! assumed done upstream (spec.md's ingest Non-goals), so each CSV's header
//! must already match the field names below.

use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;

use crate::error::{DegradationLog, IoError, PanelResult};
use crate::store::dates::{parse_flexible_date, parse_fund_closing_date};
use crate::store::{RawCompanyRow, RawFirmRow, RawFundRow, RawRoundRow, Situation};

fn read_all_string(path: &Path, columns: &[&str]) -> PanelResult<DataFrame> {
    let fields: Vec<Field> = columns.iter().map(|&name| Field::new(name.into(), DataType::String)).collect();
    let schema = Schema::from_iter(fields);

    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_schema(Some(Arc::new(schema)))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| IoError::DataFrame(e.to_string()).into())
}

fn get_str<'a>(df: &'a DataFrame, column: &str, row: usize) -> PolarsResult<Option<&'a str>> {
    Ok(df.column(column)?.str()?.get(row))
}

fn parse_opt_f64(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim).filter(|s| !s.is_empty()).and_then(|s| s.parse::<f64>().ok())
}

fn parse_opt_i32(raw: Option<&str>) -> Option<i32> {
    raw.map(str::trim).filter(|s| !s.is_empty()).and_then(|s| s.parse::<i32>().ok())
}

fn parse_opt_string(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn read_firms(path: &Path) -> PanelResult<Vec<RawFirmRow>> {
    let df = read_all_string(path, &["name", "founding_year", "state", "zip", "nation", "classification"])?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(RawFirmRow {
            name: get_str(&df, "name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            founding_year: parse_opt_i32(get_str(&df, "founding_year", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            state: parse_opt_string(get_str(&df, "state", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            zip: parse_opt_string(get_str(&df, "zip", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            nation: parse_opt_string(get_str(&df, "nation", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            classification: parse_opt_string(get_str(&df, "classification", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
        });
    }
    Ok(out)
}

pub fn read_companies(path: &Path, log: &mut DegradationLog) -> PanelResult<Vec<RawCompanyRow>> {
    let df = read_all_string(
        path,
        &["name", "industry", "situation", "situation_date", "ipo_date", "zip", "nation"],
    )?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let situation_raw = get_str(&df, "situation", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let situation = situation_raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<Situation>().ok());

        let situation_date_raw = get_str(&df, "situation_date", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let situation_date = parse_date_cell(situation_date_raw, log);

        let ipo_date_raw = get_str(&df, "ipo_date", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let ipo_date = parse_date_cell(ipo_date_raw, log);

        out.push(RawCompanyRow {
            name: get_str(&df, "name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            industry: parse_opt_string(get_str(&df, "industry", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            situation,
            situation_date,
            ipo_date,
            zip: parse_opt_string(get_str(&df, "zip", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            nation: parse_opt_string(get_str(&df, "nation", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
        });
    }
    Ok(out)
}

pub fn read_rounds(path: &Path, log: &mut DegradationLog) -> PanelResult<Vec<RawRoundRow>> {
    let df = read_all_string(
        path,
        &[
            "firm_name",
            "company_name",
            "round_date",
            "round_number",
            "amount_disclosed",
            "amount_estimated",
            "stage_level_1",
        ],
    )?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let round_date_raw = get_str(&df, "round_date", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let Some(round_date) = parse_date_cell(round_date_raw, log) else {
            log.unparseable_dates += 1;
            continue;
        };
        let round_number_raw = get_str(&df, "round_number", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let round_number = parse_opt_i32(round_number_raw).filter(|&n| n >= 0).map(|n| n as u32).unwrap_or(0);

        out.push(RawRoundRow {
            firm_name: get_str(&df, "firm_name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            company_name: get_str(&df, "company_name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            round_date,
            round_number,
            amount_disclosed: parse_opt_f64(get_str(&df, "amount_disclosed", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            amount_estimated: parse_opt_f64(get_str(&df, "amount_estimated", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
            stage_level_1: parse_opt_string(get_str(&df, "stage_level_1", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
        });
    }
    Ok(out)
}

pub fn read_funds(path: &Path, log: &mut DegradationLog) -> PanelResult<Vec<RawFundRow>> {
    let df = read_all_string(path, &["firm_name", "fund_name", "fund_year", "initial_closing_date", "fund_size"])?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let fund_year_raw = get_str(&df, "fund_year", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let Some(fund_year) = parse_opt_i32(fund_year_raw) else {
            log.unparseable_dates += 1;
            continue;
        };
        let closing_raw = get_str(&df, "initial_closing_date", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let initial_closing_date = closing_raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| {
                let parsed = parse_fund_closing_date(s);
                if parsed.is_none() {
                    log.unparseable_dates += 1;
                }
                parsed
            });

        out.push(RawFundRow {
            firm_name: get_str(&df, "firm_name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            fund_name: get_str(&df, "fund_name", i).map_err(|e| IoError::DataFrame(e.to_string()))?.unwrap_or_default().to_string(),
            fund_year,
            initial_closing_date,
            fund_size: parse_opt_f64(get_str(&df, "fund_size", i).map_err(|e| IoError::DataFrame(e.to_string()))?),
        });
    }
    Ok(out)
}

/// Reads a `zip,lat,lng` lookup table into the resolver's backing map
/// (spec.md §4.2's "lookup table is built once, offline"). A row whose
/// zip fails normalization is skipped rather than failing the whole read.
pub fn read_geo_table(path: &Path) -> PanelResult<std::collections::HashMap<String, crate::geo::Coordinates>> {
    let df = read_all_string(path, &["zip", "lat", "lng"])?;
    let mut table = std::collections::HashMap::with_capacity(df.height());
    for i in 0..df.height() {
        let zip_raw = get_str(&df, "zip", i).map_err(|e| IoError::DataFrame(e.to_string()))?;
        let Some(zip) = zip_raw.and_then(crate::geo::normalize_postal_code) else {
            continue;
        };
        let lat = parse_opt_f64(get_str(&df, "lat", i).map_err(|e| IoError::DataFrame(e.to_string()))?);
        let lng = parse_opt_f64(get_str(&df, "lng", i).map_err(|e| IoError::DataFrame(e.to_string()))?);
        if let (Some(lat), Some(lng)) = (lat, lng) {
            table.insert(zip, crate::geo::Coordinates { lat, lng });
        }
    }
    Ok(table)
}

fn parse_date_cell(raw: Option<&str>, log: &mut DegradationLog) -> Option<chrono::NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let parsed = parse_flexible_date(raw);
    if parsed.is_none() {
        log.unparseable_dates += 1;
    }
    parsed
}
