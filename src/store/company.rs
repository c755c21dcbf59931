//! Company registry ingest (spec.md §3/§4.1, component C1).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::ids::CompanyId;
use crate::error::DegradationLog;

pub const UNDISCLOSED_COMPANY_NAME: &str = "Undisclosed Company";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum Situation {
    #[strum(serialize = "Operating")]
    Operating,
    #[strum(serialize = "Went Public")]
    WentPublic,
    #[strum(serialize = "Merger")]
    Merger,
    #[strum(serialize = "Acquisition")]
    Acquisition,
    #[strum(serialize = "Closed")]
    Closed,
    #[strum(serialize = "Other")]
    Other,
}

/// A row as it arrives from the company registry, before dedup/interning.
#[derive(Debug, Clone, Default)]
pub struct RawCompanyRow {
    pub name: String,
    pub industry: Option<String>,
    pub situation: Option<Situation>,
    pub situation_date: Option<NaiveDate>,
    pub ipo_date: Option<NaiveDate>,
    pub zip: Option<String>,
    pub nation: Option<String>,
}

impl RawCompanyRow {
    /// Count of non-null optional columns, used by the dedup tie-break.
    fn non_null_count(&self) -> usize {
        [
            self.industry.is_some(),
            self.situation.is_some(),
            self.situation_date.is_some(),
            self.ipo_date.is_some(),
            self.zip.is_some(),
            self.nation.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub industry: Option<String>,
    pub situation: Option<Situation>,
    pub situation_date: Option<NaiveDate>,
    pub ipo_date: Option<NaiveDate>,
    pub zip: Option<String>,
    pub nation: Option<String>,
}

/// Derived exit classification (spec.md §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitInfo {
    pub ipo_exit: bool,
    pub mna_exit: bool,
    pub exit_year: Option<i32>,
}

impl Company {
    pub fn exit_info(&self) -> ExitInfo {
        let ipo_exit =
            self.situation == Some(Situation::WentPublic) && (self.situation_date.is_some() || self.ipo_date.is_some());
        let mna_exit = matches!(self.situation, Some(Situation::Merger) | Some(Situation::Acquisition))
            && self.situation_date.is_some();

        let exit_year = if ipo_exit && self.ipo_date.is_some() {
            self.ipo_date.map(|d| d.year())
        } else {
            self.situation_date.map(|d| d.year())
        };

        ExitInfo {
            ipo_exit,
            mna_exit,
            exit_year,
        }
    }
}

/// Builds the company table: drops `"Undisclosed Company"` rows, dedups
/// rows that share a name by keeping the one with the largest non-null
/// column count (ties broken by first occurrence), then assigns dense ids
/// (spec.md §3).
pub fn build_companies(
    rows: Vec<RawCompanyRow>,
    interner: &mut super::ids::Interner<CompanyId>,
    log: &mut DegradationLog,
) -> Vec<Company> {
    use std::collections::HashMap;

    let mut best_by_name: HashMap<String, RawCompanyRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in rows {
        if row.name == UNDISCLOSED_COMPANY_NAME {
            log.dropped_undisclosed_companies += 1;
            continue;
        }
        match best_by_name.get(&row.name) {
            None => {
                order.push(row.name.clone());
                best_by_name.insert(row.name.clone(), row);
            }
            Some(existing) => {
                if row.non_null_count() > existing.non_null_count() {
                    best_by_name.insert(row.name.clone(), row);
                }
                // Equal or fewer non-null columns: keep the first occurrence.
            }
        }
    }

    let mut companies = Vec::with_capacity(order.len());
    for name in order {
        let row = best_by_name.remove(&name).expect("present by construction");
        let id = interner.intern(&row.name);
        companies.push(Company {
            id,
            name: row.name,
            industry: row.industry,
            situation: row.situation,
            situation_date: row.situation_date,
            ipo_date: row.ipo_date,
            zip: row.zip,
            nation: row.nation,
        });
    }
    companies
}
