//! Per-firm-year descriptive variables feeding both the reputation/
//! imprinting engines and the final panel: firm age, industry Blau,
//! early-stage ratio, investment amount/count, and HQ dummies (spec.md
//! §4.10 "Industry Blau", §6 output columns).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::store::{CanonicalStore, Company, FirmId, Round};

/// Stage values counted as "early" for `early_stage_ratio`. The source
/// dataset's stage taxonomy isn't part of this spec's contract; these
/// are the common early-stage venture labels (DESIGN.md open-question
/// decision).
const EARLY_STAGE_VALUES: &[&str] = &["Seed", "Angel", "Series A", "Early Stage Venture"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmYearMetrics {
    pub firm_age: i32,
    pub industry_blau: f64,
    pub early_stage_ratio: f64,
    pub inv_amt: f64,
    pub inv_num: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmHqDummies {
    pub firm_hq: bool,
    pub firm_hq_ca: bool,
    pub firm_hq_ma: bool,
    pub firm_hq_ny: bool,
}

/// `Blau = 1 - Σ(n_i / |I|)²` over the multiset of industries the firm
/// invested in during the year; `0` when `|I| = 0` (spec.md §4.10).
fn blau_index(industries: &[&str]) -> f64 {
    if industries.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for &industry in industries {
        *counts.entry(industry).or_insert(0) += 1;
    }
    let n = industries.len() as f64;
    let sum_sq: f64 = counts.values().map(|&c| (c as f64 / n).powi(2)).sum();
    1.0 - sum_sq
}

pub fn compute_firm_year_metrics(
    store: &CanonicalStore,
    target_keys: &[(FirmId, i32)],
) -> BTreeMap<(FirmId, i32), FirmYearMetrics> {
    let companies_by_id: BTreeMap<_, &Company> = store.companies.iter().map(|c| (c.id, c)).collect();

    let mut rows_by_key: BTreeMap<(FirmId, i32), Vec<&Round>> = BTreeMap::new();
    for round in &store.rounds {
        rows_by_key.entry((round.firm_id, round.year)).or_default().push(round);
    }

    let founding_year: BTreeMap<FirmId, Option<i32>> =
        store.firms.iter().map(|f| (f.id, f.founding_year)).collect();

    target_keys
        .iter()
        .map(|&(firm_id, year)| {
            let rounds = rows_by_key.get(&(firm_id, year)).cloned().unwrap_or_default();

            let firm_age = founding_year
                .get(&firm_id)
                .copied()
                .flatten()
                .map(|founded| (year - founded).max(0))
                .unwrap_or(0);

            let industries: Vec<&str> = rounds
                .iter()
                .filter_map(|r| companies_by_id.get(&r.company_id))
                .filter_map(|c| c.industry.as_deref())
                .collect();
            let industry_blau = blau_index(&industries);

            let early_count = rounds
                .iter()
                .filter(|r| {
                    r.stage_level_1()
                        .is_some_and(|stage| EARLY_STAGE_VALUES.contains(&stage))
                })
                .count();
            let early_stage_ratio = if rounds.is_empty() {
                0.0
            } else {
                early_count as f64 / rounds.len() as f64
            };

            let inv_amt = rounds.iter().filter_map(|r| r.investment_amount()).sum();
            let inv_num = rounds.len() as u64;

            (
                (firm_id, year),
                FirmYearMetrics {
                    firm_age,
                    industry_blau,
                    early_stage_ratio,
                    inv_amt,
                    inv_num,
                },
            )
        })
        .collect()
}

/// Major-VC-hub HQ dummies: `firm_hq` is 1 iff the firm's state is CA or
/// MA; `firm_hq_CA/MA/NY` are the individual state dummies.
pub fn compute_hq_dummies(store: &CanonicalStore) -> BTreeMap<FirmId, FirmHqDummies> {
    store
        .firms
        .iter()
        .map(|firm| {
            let state = firm.state.as_deref();
            let is_ca = matches!(state, Some("CA") | Some("California"));
            let is_ma = matches!(state, Some("MA") | Some("Massachusetts"));
            let is_ny = matches!(state, Some("NY") | Some("New York"));
            (
                firm.id,
                FirmHqDummies {
                    firm_hq: is_ca || is_ma,
                    firm_hq_ca: is_ca,
                    firm_hq_ma: is_ma,
                    firm_hq_ny: is_ny,
                },
            )
        })
        .collect()
}

/// All distinct `(firm_id, year)` keys present in the round data (spec.md
/// §3: the panel's primary key set).
pub fn all_target_keys(store: &CanonicalStore) -> Vec<(FirmId, i32)> {
    let set: BTreeSet<(FirmId, i32)> = store.rounds.iter().map(|r| (r.firm_id, r.year)).collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blau_is_zero_for_single_industry() {
        assert_eq!(blau_index(&["Software", "Software", "Software"]), 0.0);
    }

    #[test]
    fn blau_is_positive_for_mixed_industries() {
        let blau = blau_index(&["Software", "Biotechnology"]);
        assert!(blau > 0.0 && blau < 1.0);
    }

    #[test]
    fn blau_is_zero_for_empty_set() {
        assert_eq!(blau_index(&[]), 0.0);
    }
}
