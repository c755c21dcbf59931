//! Investment round ingest (spec.md §3/§4.1, component C1).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::{CompanyId, FirmId};
use crate::error::DegradationLog;

#[derive(Debug, Clone)]
pub struct RawRoundRow {
    pub firm_name: String,
    pub company_name: String,
    pub round_date: NaiveDate,
    pub round_number: u32,
    pub amount_disclosed: Option<f64>,
    pub amount_estimated: Option<f64>,
    pub stage_level_1: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub firm_id: FirmId,
    pub company_id: CompanyId,
    pub round_date: NaiveDate,
    pub year: i32,
    pub round_number: u32,
    pub amount_disclosed: Option<f64>,
    pub amount_estimated: Option<f64>,
    pub stage_level_1: Option<String>,
}

impl Round {
    /// `InvestmentAmount = max(disclosed, estimated)` (original source
    /// `variables/investment.py`); both absent yields `None`, never 0, so
    /// sums over rounds can distinguish "no investments" from "zero-valued
    /// investments".
    pub fn investment_amount(&self) -> Option<f64> {
        match (self.amount_disclosed, self.amount_estimated) {
            (Some(d), Some(e)) => Some(d.max(e)),
            (Some(d), None) => Some(d),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    pub fn stage_level_1(&self) -> Option<&str> {
        self.stage_level_1.as_deref()
    }
}

/// A hashable fingerprint of a round row, used to remove exact duplicates
/// (spec.md §3: "exact-duplicate rows MUST be removed").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RoundFingerprint {
    firm_id: FirmId,
    company_id: CompanyId,
    round_date: NaiveDate,
    round_number: u32,
    amount_disclosed_bits: Option<u64>,
    amount_estimated_bits: Option<u64>,
    stage_level_1: Option<String>,
}

/// Builds the rounds relation ordered by year, interning firm/company
/// names via the already-populated store interners (a round referencing a
/// firm or company dropped at ingest, e.g. "Undisclosed Firm", is itself
/// dropped — it cannot be attributed to a surviving entity) and removing
/// exact-duplicate rows.
pub fn build_rounds(
    rows: Vec<RawRoundRow>,
    firm_interner: &super::ids::Interner<FirmId>,
    company_interner: &super::ids::Interner<CompanyId>,
    log: &mut DegradationLog,
) -> Vec<Round> {
    use std::collections::HashSet;

    let mut seen: HashSet<RoundFingerprint> = HashSet::new();
    let mut rounds = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(firm_id) = firm_interner.get(&row.firm_name) else {
            continue;
        };
        let Some(company_id) = company_interner.get(&row.company_name) else {
            continue;
        };

        let fingerprint = RoundFingerprint {
            firm_id,
            company_id,
            round_date: row.round_date,
            round_number: row.round_number,
            amount_disclosed_bits: row.amount_disclosed.map(f64::to_bits),
            amount_estimated_bits: row.amount_estimated.map(f64::to_bits),
            stage_level_1: row.stage_level_1.clone(),
        };
        if !seen.insert(fingerprint) {
            log.dropped_duplicate_rounds += 1;
            continue;
        }

        rounds.push(Round {
            firm_id,
            company_id,
            round_date: row.round_date,
            year: row.round_date.year(),
            round_number: row.round_number,
            amount_disclosed: row.amount_disclosed,
            amount_estimated: row.amount_estimated,
            stage_level_1: row.stage_level_1,
        });
    }

    rounds.sort_by_key(|r| r.year);
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ids::Interner;

    fn setup() -> (Interner<FirmId>, Interner<CompanyId>) {
        let mut firms = Interner::new();
        firms.intern("Sequoia");
        let mut companies = Interner::new();
        companies.intern("Acme");
        (firms, companies)
    }

    #[test]
    fn removes_exact_duplicates_but_keeps_distinct_rounds() {
        let (firms, companies) = setup();
        let mut log = DegradationLog::default();
        let date = NaiveDate::from_ymd_opt(2015, 3, 1).unwrap();
        let row = RawRoundRow {
            firm_name: "Sequoia".into(),
            company_name: "Acme".into(),
            round_date: date,
            round_number: 1,
            amount_disclosed: Some(1_000.0),
            amount_estimated: None,
            stage_level_1: None,
        };
        let rows = vec![row.clone(), row.clone(), {
            let mut r = row;
            r.round_date = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
            r
        }];
        let rounds = build_rounds(rows, &firms, &companies, &mut log);
        assert_eq!(rounds.len(), 2);
        assert_eq!(log.dropped_duplicate_rounds, 1);
    }

    #[test]
    fn investment_amount_takes_max_of_disclosed_and_estimated() {
        let (firms, companies) = setup();
        let mut log = DegradationLog::default();
        let rows = vec![RawRoundRow {
            firm_name: "Sequoia".into(),
            company_name: "Acme".into(),
            round_date: NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
            round_number: 1,
            amount_disclosed: Some(500.0),
            amount_estimated: Some(900.0),
            stage_level_1: None,
        }];
        let rounds = build_rounds(rows, &firms, &companies, &mut log);
        assert_eq!(rounds[0].investment_amount(), Some(900.0));
    }

    #[test]
    fn rounds_referencing_dropped_entities_are_skipped() {
        let (firms, companies) = setup();
        let mut log = DegradationLog::default();
        let rows = vec![RawRoundRow {
            firm_name: "Ghost Firm".into(),
            company_name: "Acme".into(),
            round_date: NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
            round_number: 1,
            amount_disclosed: None,
            amount_estimated: None,
            stage_level_1: None,
        }];
        let rounds = build_rounds(rows, &firms, &companies, &mut log);
        assert!(rounds.is_empty());
    }
}
