//! Reputation compositor (C8, spec.md §4.8): six rolling/state inputs per
//! firm–year, combined via per-year z-score, row-sum, and per-year
//! min-max rescale into `VC_reputation ∈ [0.01, 100]`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::rolling::{rolling_sum_and_count, rolling_unique_count, still_open_fund_mean};
use crate::store::{CanonicalStore, FirmId};

const REPUTATION_WINDOW: u32 = 5; // [t-4, t]

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReputationInputs {
    pub portfolio_count: f64,
    pub total_invested: f64,
    pub avg_open_fund_size: Option<f64>,
    pub funds_raised_count: Option<f64>,
    pub exit_count: f64,
    pub funding_age: Option<f64>,
    /// True iff the firm has no fund rows at all, the only source of
    /// genuine nulls in variables 3/4/6 (spec.md §4.8).
    pub missing_fund_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationRow {
    pub vc_reputation: f64,
    pub missing_fund_data: bool,
}

pub fn compute_inputs(
    store: &CanonicalStore,
    target_keys: &[(FirmId, i32)],
) -> BTreeMap<(FirmId, i32), ReputationInputs> {
    let company_rows: Vec<(FirmId, i32, crate::store::CompanyId)> =
        store.rounds.iter().map(|r| (r.firm_id, r.year, r.company_id)).collect();
    let portfolio_count = rolling_unique_count(&company_rows, target_keys, REPUTATION_WINDOW);

    let amount_rows: Vec<(FirmId, i32, f64)> = store
        .rounds
        .iter()
        .map(|r| (r.firm_id, r.year, r.investment_amount().unwrap_or(0.0)))
        .collect();
    let total_invested = rolling_sum_and_count(&amount_rows, target_keys, REPUTATION_WINDOW);

    let open_fund_mean = still_open_fund_mean(&store.funds, target_keys);

    let fund_rows: Vec<(FirmId, i32, String)> = store
        .funds
        .iter()
        .map(|f| (f.firm_id, f.fund_year, f.fund_name.clone()))
        .collect();
    let funds_raised = rolling_unique_count(&fund_rows, target_keys, REPUTATION_WINDOW);

    let mut ever_invested: BTreeMap<FirmId, BTreeSet<crate::store::CompanyId>> = BTreeMap::new();
    for r in &store.rounds {
        ever_invested.entry(r.firm_id).or_default().insert(r.company_id);
    }
    let exit_year_of: BTreeMap<crate::store::CompanyId, Option<i32>> = store
        .companies
        .iter()
        .map(|c| (c.id, c.exit_info().exit_year))
        .collect();

    let mut min_fund_year: BTreeMap<FirmId, i32> = BTreeMap::new();
    for fund in &store.funds {
        min_fund_year
            .entry(fund.firm_id)
            .and_modify(|y| *y = (*y).min(fund.fund_year))
            .or_insert(fund.fund_year);
    }

    let has_any_fund: BTreeSet<FirmId> = store.funds.iter().map(|f| f.firm_id).collect();

    target_keys
        .iter()
        .map(|&(firm_id, year)| {
            let (invested_sum, _) = total_invested.get(&(firm_id, year)).copied().unwrap_or((0.0, 0));
            let companies = ever_invested.get(&firm_id);
            let exit_count = companies
                .into_iter()
                .flatten()
                .filter(|company_id| {
                    exit_year_of
                        .get(company_id)
                        .and_then(|y| *y)
                        .is_some_and(|exit_year| exit_year >= year - 4 && exit_year <= year)
                })
                .count() as f64;

            let missing_fund_data = !has_any_fund.contains(&firm_id);
            let funding_age = if missing_fund_data {
                None
            } else {
                min_fund_year
                    .get(&firm_id)
                    .map(|&min_year| (year - min_year).max(0) as f64)
            };

            ReputationInputs {
                portfolio_count: portfolio_count.get(&(firm_id, year)).copied().unwrap_or(0) as f64,
                total_invested: invested_sum,
                avg_open_fund_size: if missing_fund_data {
                    None
                } else {
                    open_fund_mean.get(&(firm_id, year)).copied().flatten()
                },
                funds_raised_count: if missing_fund_data {
                    None
                } else {
                    Some(funds_raised.get(&(firm_id, year)).copied().unwrap_or(0) as f64)
                },
                exit_count,
                funding_age,
                missing_fund_data,
            }
        })
        .collect()
}

/// Per-year z-score each of the six (treating a `None` as its filled
/// value, 0, for the purpose of the z-score itself — the
/// `missing_fund_data` flag is what preserves the distinction
/// downstream), row-sum, then per-year min-max rescale to `[0.01, 100]`;
/// a constant column within a year maps every row to 50.0 (spec.md
/// §4.8).
pub fn compose(inputs: &BTreeMap<(FirmId, i32), ReputationInputs>) -> BTreeMap<(FirmId, i32), ReputationRow> {
    let mut by_year: BTreeMap<i32, Vec<FirmId>> = BTreeMap::new();
    for &(firm_id, year) in inputs.keys() {
        by_year.entry(year).or_default().push(firm_id);
    }

    let mut out = BTreeMap::new();
    for (year, firms) in by_year {
        let rows: Vec<(FirmId, [f64; 6])> = firms
            .iter()
            .map(|&firm_id| {
                let input = inputs[&(firm_id, year)];
                (
                    firm_id,
                    [
                        input.portfolio_count,
                        input.total_invested,
                        input.avg_open_fund_size.unwrap_or(0.0),
                        input.funds_raised_count.unwrap_or(0.0),
                        input.exit_count,
                        input.funding_age.unwrap_or(0.0),
                    ],
                )
            })
            .collect();

        let mut sums = vec![0.0; rows.len()];
        for col in 0..6 {
            let values: Vec<f64> = rows.iter().map(|(_, r)| r[col]).collect();
            let z = z_scores(&values);
            for (i, value) in z.into_iter().enumerate() {
                sums[i] += value;
            }
        }

        let rescaled = min_max_rescale(&sums);
        for (i, &(firm_id, _)) in rows.iter().enumerate() {
            out.insert(
                (firm_id, year),
                ReputationRow {
                    vc_reputation: rescaled[i],
                    missing_fund_data: inputs[&(firm_id, year)].missing_fund_data,
                },
            );
        }
    }
    out
}

fn z_scores(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    if n == 0.0 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std < 1e-12 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

fn min_max_rescale(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        return vec![50.0; values.len()];
    }
    values
        .iter()
        .map(|v| 0.01 + (v - min) / (max - min) * (100.0 - 0.01))
        .collect()
}
