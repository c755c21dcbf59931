//! Lead-VC identifier (C11, supplemented — spec.md §5's mention of
//! "tie-breaking in lead-VC selection" as an order-dependent reduction
//! implies this computation without spec.md itself defining it; grounded
//! on `sampling/leadvc.py`'s `identify_lead_vcs`).
//!
//! Per company, the lead VC is the firm that invested in the company's
//! first round and scores highest on a three-criterion weighted sum
//! (first-round participation, investment-frequency ratio, total amount
//! invested), with ties broken by a single seeded RNG so the result is
//! independent of iteration order (spec.md §5).

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::store::{CompanyId, FirmId, Round};

#[derive(Debug, Clone, Copy, Default)]
struct FirmCompanyStats {
    round_count: u32,
    first_round: bool,
    total_amount: f64,
}

/// `(company_id -> firm_id)`: the identified lead VC per company.
pub fn compute(rounds: &[Round], config: &Config) -> BTreeMap<CompanyId, FirmId> {
    let mut min_round_number: BTreeMap<CompanyId, u32> = BTreeMap::new();
    let mut rounds_per_company: BTreeMap<CompanyId, u32> = BTreeMap::new();
    for round in rounds {
        min_round_number
            .entry(round.company_id)
            .and_modify(|n| *n = (*n).min(round.round_number))
            .or_insert(round.round_number);
        *rounds_per_company.entry(round.company_id).or_insert(0) += 1;
    }

    let mut stats: BTreeMap<(FirmId, CompanyId), FirmCompanyStats> = BTreeMap::new();
    for round in rounds {
        let entry = stats.entry((round.firm_id, round.company_id)).or_default();
        entry.round_count += 1;
        if Some(&round.round_number) == min_round_number.get(&round.company_id) {
            entry.first_round = true;
        }
        entry.total_amount += round.investment_amount().unwrap_or(0.0);
    }

    let mut firms_by_company: BTreeMap<CompanyId, Vec<FirmId>> = BTreeMap::new();
    for &(firm_id, company_id) in stats.keys() {
        firms_by_company.entry(company_id).or_default().push(firm_id);
    }

    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let mut result = BTreeMap::new();

    for (company_id, firms) in firms_by_company {
        let com_invested = *rounds_per_company.get(&company_id).unwrap_or(&0) as f64;
        if com_invested <= 0.0 {
            continue;
        }

        let ratio = |firm_id: FirmId| -> f64 {
            stats[&(firm_id, company_id)].round_count as f64 / com_invested
        };
        let amount = |firm_id: FirmId| -> f64 { stats[&(firm_id, company_id)].total_amount };

        let max_ratio = firms.iter().map(|&f| ratio(f)).fold(f64::MIN, f64::max);
        let max_amount = firms.iter().map(|&f| amount(f)).fold(f64::MIN, f64::max);

        let score = |firm_id: FirmId| -> f64 {
            let s = &stats[&(firm_id, company_id)];
            let lead_vc1 = s.first_round;
            let lead_vc2 = (ratio(firm_id) - max_ratio).abs() < 1e-12;
            let lead_vc3 = (amount(firm_id) - max_amount).abs() < 1e-12;
            lead_vc1 as u8 as f64 * config.leadvc_first_round_weight
                + lead_vc2 as u8 as f64 * config.leadvc_investment_ratio_weight
                + lead_vc3 as u8 as f64 * config.leadvc_total_amount_weight
        };

        let first_round_firms: Vec<FirmId> = firms.iter().copied().filter(|&f| stats[&(f, company_id)].first_round).collect();
        let pool: &[FirmId] = if first_round_firms.is_empty() { &firms } else { &first_round_firms };

        let mut scored: Vec<(FirmId, f64)> = pool.iter().map(|&f| (f, score(f))).collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0));
        let max_score = scored.iter().map(|(_, s)| *s).fold(f64::MIN, f64::max);
        let candidates: Vec<FirmId> = scored
            .iter()
            .filter(|(_, s)| (*s - max_score).abs() < 1e-12)
            .map(|(f, _)| *f)
            .collect();

        let chosen = if candidates.len() == 1 {
            candidates[0]
        } else {
            candidates[rng.gen_range(0..candidates.len())]
        };

        result.insert(company_id, chosen);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn round(firm: u32, company: u32, round_number: u32, amount: f64) -> Round {
        Round {
            firm_id: FirmId(firm),
            company_id: CompanyId(company),
            round_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            year: 2015,
            round_number,
            amount_disclosed: Some(amount),
            amount_estimated: None,
            stage_level_1: None,
        }
    }

    #[test]
    fn sole_first_round_investor_wins_outright() {
        let rounds = vec![round(0, 0, 1, 100.0), round(1, 0, 2, 50.0)];
        let config = Config::default();
        let result = compute(&rounds, &config);
        assert_eq!(result[&CompanyId(0)], FirmId(0));
    }

    #[test]
    fn highest_total_amount_breaks_tie_among_first_round_investors() {
        let rounds = vec![round(0, 0, 1, 500.0), round(1, 0, 1, 100.0)];
        let config = Config::default();
        let result = compute(&rounds, &config);
        assert_eq!(result[&CompanyId(0)], FirmId(0));
    }

    #[test]
    fn no_rounds_for_company_is_absent_from_result() {
        let rounds: Vec<Round> = vec![];
        let config = Config::default();
        let result = compute(&rounds, &config);
        assert!(result.is_empty());
    }
}
