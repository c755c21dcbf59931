//! Co-partner pair engine (C6, spec.md §4.6): explodes each deal into
//! firm↔firm and firm↔company pairs and streams per-focal-firm
//! geographic-distance aggregates, never materializing the full pair
//! table (spec.md §5: "the memory hazard ... stream pair emission into
//! per-focal-firm aggregators").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Config, DealKey};
use crate::geo::{haversine_km, Coordinates};
use crate::store::{CompanyId, FirmId, Round};

/// All-null unless at least one distance observation contributed (spec.md
/// §4.6: "Empty aggregates for a firm–year MUST appear as a row with all
/// stats null (not 0)").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    pub weighted_mean: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    values: Vec<f64>,
    weighted_sum: f64,
    weight_sum: f64,
}

impl Accumulator {
    fn push(&mut self, distance: f64, weight: Option<f64>) {
        self.values.push(distance);
        if let Some(w) = weight {
            self.weighted_sum += distance * w;
            self.weight_sum += w;
        }
    }

    fn finish(&self) -> DistanceStats {
        if self.values.is_empty() {
            return DistanceStats::default();
        }
        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let min = self.values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let variance = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let weighted_mean = if self.weight_sum > 0.0 {
            Some(self.weighted_sum / self.weight_sum)
        } else {
            None
        };
        DistanceStats {
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
            std: Some(std),
            weighted_mean,
        }
    }
}

/// Groups rounds into deals per `config.deal_key`. `CompanyYear` keys by
/// `(company_id, year)`, the contract spec.md fixes, fusing two different
/// rounds of the same company in the same calendar year. `RoundId` keys
/// by `(company_id, round_date)` instead, so rounds on different dates
/// within a year are treated as distinct deals (spec.md §9 open question
/// 3). Every round in one bucket necessarily shares a `year`, so the
/// bucket key doubles as the output year.
fn deal_bucket(round: &Round, mode: DealKey) -> (CompanyId, i64) {
    match mode {
        DealKey::CompanyYear => (round.company_id, round.year as i64),
        DealKey::RoundId => (round.company_id, round.round_date.num_days_from_ce() as i64),
    }
}

/// Co-investor (firm-to-firm) distance aggregates per `(focal_firm_id,
/// year)`, keyed with a resolver mapping each firm id to its zip's
/// coordinates.
pub fn firm_pair_distances(
    rounds: &[Round],
    firm_zip: &dyn Fn(FirmId) -> Option<Coordinates>,
    config: &Config,
) -> BTreeMap<(FirmId, i32), DistanceStats> {
    let mut deals: BTreeMap<(CompanyId, i64), (i32, Vec<FirmId>)> = BTreeMap::new();
    for round in rounds {
        let bucket = deals.entry(deal_bucket(round, config.deal_key)).or_insert((round.year, Vec::new()));
        bucket.1.push(round.firm_id);
    }

    let mut accumulators: BTreeMap<(FirmId, i32), Accumulator> = BTreeMap::new();
    for (_, (year, firms)) in deals {
        if firms.len() < 2 {
            continue;
        }
        for &focal in &firms {
            let focal_coords = firm_zip(focal);
            for &partner in &firms {
                if partner == focal {
                    continue;
                }
                if let Some(distance) = haversine_km(focal_coords, firm_zip(partner)) {
                    accumulators
                        .entry((focal, year))
                        .or_default()
                        .push(distance, None);
                } else {
                    accumulators.entry((focal, year)).or_default();
                }
            }
        }
    }

    accumulators.into_iter().map(|(k, acc)| (k, acc.finish())).collect()
}

/// Firm↔company distance aggregates per `(firm_id, year)` (spec.md §4.6,
/// "firm↔company variant").
pub fn firm_company_distances(
    rounds: &[Round],
    firm_zip: &dyn Fn(FirmId) -> Option<Coordinates>,
    company_zip: &dyn Fn(CompanyId) -> Option<Coordinates>,
) -> BTreeMap<(FirmId, i32), DistanceStats> {
    let mut accumulators: BTreeMap<(FirmId, i32), Accumulator> = BTreeMap::new();
    for round in rounds {
        let key = (round.firm_id, round.year);
        let entry = accumulators.entry(key).or_default();
        if let Some(distance) = haversine_km(firm_zip(round.firm_id), company_zip(round.company_id)) {
            entry.push(distance, None);
        }
    }
    accumulators.into_iter().map(|(k, acc)| (k, acc.finish())).collect()
}
