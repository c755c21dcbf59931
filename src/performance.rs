//! Performance engine (C7, spec.md §4.7): per-firm-year IPO/M&A exit
//! counts, window-matched against each portfolio company's exit year.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Config, PerformanceWindowMode};
use crate::store::{Company, CompanyId, FirmId, Round};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub perf_ipo: u32,
    pub perf_mna: u32,
    pub perf_all: u32,
}

/// For every `(firm_id, year)` present in `rounds`, counts companies the
/// firm invested in whose round year falls in the lookback window *and*
/// whose derived exit year equals the investment's round year (spec.md
/// §4.7). `lookback_years=0` means "round and exit both occur in `t`",
/// independent of window mode.
pub fn compute(
    rounds: &[Round],
    companies: &[Company],
    config: &Config,
) -> BTreeMap<(FirmId, i32), PerformanceRow> {
    let exit_years: BTreeMap<CompanyId, (bool, bool, Option<i32>)> = companies
        .iter()
        .map(|c| {
            let info = c.exit_info();
            (c.id, (info.ipo_exit, info.mna_exit, info.exit_year))
        })
        .collect();

    let mut out: BTreeMap<(FirmId, i32), PerformanceRow> = BTreeMap::new();
    let target_years: Vec<(FirmId, i32)> = rounds.iter().map(|r| (r.firm_id, r.year)).collect();
    for &(firm_id, year) in &target_years {
        out.entry((firm_id, year)).or_default();
    }

    for round in rounds {
        let Some(&(ipo_exit, mna_exit, exit_year)) = exit_years.get(&round.company_id) else {
            continue;
        };
        let Some(exit_year) = exit_year else { continue };
        if exit_year != round.year {
            continue;
        }

        for &(_, target_year) in target_years.iter().filter(|(f, _)| *f == round.firm_id) {
            if !in_lookback_window(round.year, target_year, config.lookback_years, config.performance_window_mode) {
                continue;
            }
            let row = out.entry((round.firm_id, target_year)).or_default();
            if ipo_exit {
                row.perf_ipo += 1;
            }
            if mna_exit {
                row.perf_mna += 1;
            }
        }
    }

    for row in out.values_mut() {
        row.perf_all = row.perf_ipo + row.perf_mna;
    }
    out
}

fn in_lookback_window(round_year: i32, target_year: i32, lookback: u32, mode: PerformanceWindowMode) -> bool {
    if lookback == 0 {
        return round_year == target_year;
    }
    match mode {
        PerformanceWindowMode::Inclusive => {
            round_year >= target_year - lookback as i32 && round_year <= target_year
        }
        PerformanceWindowMode::HalfOpen => {
            round_year >= target_year - lookback as i32 && round_year < target_year
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Situation;
    use chrono::NaiveDate;

    fn round(firm: u32, company: u32, year: i32) -> Round {
        Round {
            firm_id: FirmId(firm),
            company_id: CompanyId(company),
            round_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            year,
            round_number: 1,
            amount_disclosed: None,
            amount_estimated: None,
            stage_level_1: None,
        }
    }

    #[test]
    fn s4_exit_matching_l0() {
        let rounds = vec![round(0, 0, 2020), round(0, 0, 2021)];
        let companies = vec![Company {
            id: CompanyId(0),
            name: "X".into(),
            industry: None,
            situation: Some(Situation::WentPublic),
            situation_date: None,
            ipo_date: NaiveDate::from_ymd_opt(2020, 6, 1),
            zip: None,
            nation: None,
        }];
        let config = Config::default();
        let result = compute(&rounds, &companies, &config);
        assert_eq!(result[&(FirmId(0), 2020)].perf_ipo, 1);
        assert_eq!(result[&(FirmId(0), 2021)].perf_ipo, 0);
    }

    #[test]
    fn missing_firm_years_default_to_zero() {
        let rounds = vec![round(0, 0, 2020)];
        let companies = vec![];
        let config = Config::default();
        let result = compute(&rounds, &companies, &config);
        assert_eq!(result[&(FirmId(0), 2020)], PerformanceRow::default());
    }
}
