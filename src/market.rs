//! Market-condition engine (C9, spec.md §4.9): industry-level Market Heat
//! and New-Venture Demand series.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::store::{CanonicalStore, CompanyId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub market_heat: f64,
    pub new_venture_demand: f64,
}

/// `funds_raised(y)` = distinct fund names first raised in year `y`.
/// Missing years between the observed min and max fund year are treated
/// as zero before the rolling three-year sum (spec.md §4.9).
fn funds_raised_by_year(store: &CanonicalStore) -> BTreeMap<i32, u64> {
    let mut first_year: BTreeMap<&str, i32> = BTreeMap::new();
    for fund in &store.funds {
        first_year
            .entry(fund.fund_name.as_str())
            .and_modify(|y| *y = (*y).min(fund.fund_year))
            .or_insert(fund.fund_year);
    }

    let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
    for &year in first_year.values() {
        *counts.entry(year).or_insert(0) += 1;
    }

    if let (Some(&min), Some(&max)) = (counts.keys().next(), counts.keys().next_back()) {
        for year in min..=max {
            counts.entry(year).or_insert(0);
        }
    }
    counts
}

/// Market Heat at year `t`: `ln((funds_raised(t)·3) / Σ_{k=t-3}^{t-1} funds_raised(k))`,
/// `NaN` if the denominator or ratio is non-positive.
fn market_heat(funds_raised: &BTreeMap<i32, u64>, year: i32) -> f64 {
    let current = *funds_raised.get(&year).unwrap_or(&0) as f64;
    let denominator: u64 = (year - 3..year).map(|y| *funds_raised.get(&y).unwrap_or(&0)).sum();
    let denominator = denominator as f64;
    if denominator <= 0.0 {
        return f64::NAN;
    }
    let ratio = (current * 3.0) / denominator;
    if ratio <= 0.0 {
        return f64::NAN;
    }
    ratio.ln()
}

/// New-Venture Demand at year `t`: ln of the count of distinct US
/// companies whose first-ever round occurred in `t` (spec.md §4.9).
fn new_venture_demand(first_round_year: &BTreeMap<CompanyId, i32>, us_companies: &BTreeSet<CompanyId>, year: i32) -> f64 {
    let count = first_round_year
        .iter()
        .filter(|(company_id, &first_year)| first_year == year && us_companies.contains(company_id))
        .count() as f64;
    if count <= 0.0 {
        f64::NAN
    } else {
        count.ln()
    }
}

/// Computes both series for every year in `store`'s range.
pub fn compute(store: &CanonicalStore, us_nation_code: &str) -> BTreeMap<i32, MarketRow> {
    let Some(years) = store.years else {
        return BTreeMap::new();
    };

    let funds_raised = funds_raised_by_year(store);

    let mut min_round_number: BTreeMap<CompanyId, u32> = BTreeMap::new();
    for round in &store.rounds {
        min_round_number
            .entry(round.company_id)
            .and_modify(|n| *n = (*n).min(round.round_number))
            .or_insert(round.round_number);
    }

    let mut first_round_year: BTreeMap<CompanyId, i32> = BTreeMap::new();
    for round in &store.rounds {
        if min_round_number.get(&round.company_id) != Some(&round.round_number) {
            continue;
        }
        first_round_year
            .entry(round.company_id)
            .and_modify(|y| *y = (*y).min(round.year))
            .or_insert(round.year);
    }

    let us_companies: BTreeSet<CompanyId> = store
        .companies
        .iter()
        .filter(|c| c.nation.as_deref() == Some(us_nation_code))
        .map(|c| c.id)
        .collect();

    years
        .iter()
        .map(|year| {
            (
                year,
                MarketRow {
                    market_heat: market_heat(&funds_raised, year),
                    new_venture_demand: new_venture_demand(&first_round_year, &us_companies, year),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_market_heat() {
        let mut funds_raised = BTreeMap::new();
        funds_raised.insert(2015, 10);
        funds_raised.insert(2016, 10);
        funds_raised.insert(2017, 10);
        funds_raised.insert(2018, 30);
        let heat = market_heat(&funds_raised, 2018);
        assert!((heat - 3.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn market_heat_is_nan_when_denominator_nonpositive() {
        let funds_raised = BTreeMap::new();
        assert!(market_heat(&funds_raised, 2018).is_nan());
    }

    #[test]
    fn new_venture_demand_is_nan_when_zero() {
        let first_round_year = BTreeMap::new();
        let us_companies = BTreeSet::new();
        assert!(new_venture_demand(&first_round_year, &us_companies, 2018).is_nan());
    }
}
