//! Fund registry ingest (spec.md §3/§4.1, component C1).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::FirmId;
use crate::error::DegradationLog;

#[derive(Debug, Clone, Default)]
pub struct RawFundRow {
    pub firm_name: String,
    pub fund_name: String,
    pub fund_year: i32,
    pub initial_closing_date: Option<NaiveDate>,
    pub fund_size: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fund {
    pub firm_id: FirmId,
    pub fund_name: String,
    pub fund_year: i32,
    pub initial_closing_date: Option<NaiveDate>,
    pub closing_year: Option<i32>,
    pub fund_size: Option<f64>,
}

impl Fund {
    /// "Still open at year `t`": raised strictly before `t` and either
    /// never closed or closed strictly after `t` (spec.md §3/§4.3,
    /// fund-vintage state used by the reputation compositor's
    /// `missing_fund_data` inputs and the still-open aggregate).
    pub fn is_open_at(&self, t: i32) -> bool {
        self.fund_year < t && self.closing_year.map_or(true, |closed| closed > t)
    }
}

/// Builds the funds relation. A fund naming a firm absent from the firm
/// table is dropped (it cannot be attributed to a surviving firm) rather
/// than treated as the missing-fund-table degradation, which instead
/// applies when a firm has no fund rows at all (handled downstream by the
/// reputation compositor).
pub fn build_funds(
    rows: Vec<RawFundRow>,
    firm_interner: &super::ids::Interner<FirmId>,
    _log: &mut DegradationLog,
) -> Vec<Fund> {
    rows.into_iter()
        .filter_map(|row| {
            let firm_id = firm_interner.get(&row.firm_name)?;
            Some(Fund {
                firm_id,
                fund_name: row.fund_name,
                fund_year: row.fund_year,
                initial_closing_date: row.initial_closing_date,
                closing_year: row.initial_closing_date.map(|d| d.year()),
                fund_size: row.fund_size,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ids::Interner;

    fn interner_with_firm() -> Interner<FirmId> {
        let mut interner = Interner::new();
        interner.intern("Sequoia");
        interner
    }

    #[test]
    fn open_fund_has_no_closing_year() {
        let fund = Fund {
            firm_id: FirmId(0),
            fund_name: "Fund I".into(),
            fund_year: 2000,
            initial_closing_date: None,
            closing_year: None,
            fund_size: None,
        };
        assert!(!fund.is_open_at(2000));
        assert!(fund.is_open_at(2001));
        assert!(fund.is_open_at(2020));
        assert!(!fund.is_open_at(1999));
    }

    #[test]
    fn closed_fund_is_open_strictly_before_closing_year() {
        let fund = Fund {
            firm_id: FirmId(0),
            fund_name: "Fund I".into(),
            fund_year: 2000,
            initial_closing_date: NaiveDate::from_ymd_opt(2003, 6, 1),
            closing_year: Some(2003),
            fund_size: None,
        };
        assert!(fund.is_open_at(2002));
        assert!(!fund.is_open_at(2003));
        assert!(!fund.is_open_at(2004));
    }

    #[test]
    fn funds_referencing_unknown_firms_are_dropped() {
        let interner = interner_with_firm();
        let mut log = DegradationLog::default();
        let rows = vec![RawFundRow {
            firm_name: "Ghost Capital".into(),
            fund_name: "Fund I".into(),
            fund_year: 2000,
            ..Default::default()
        }];
        let funds = build_funds(rows, &interner, &mut log);
        assert!(funds.is_empty());
    }
}
