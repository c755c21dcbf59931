//! Imprinting engine (C10, spec.md §4.10): initial-year identification,
//! initial-partner extraction and initial-period firm variable aggregation
//! over a focal firm's first `imprinting_period` years in the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::firm_metrics::FirmYearMetrics;
use crate::graph::{GraphCentralities, NodeCentrality, YearGraph};
use crate::market::MarketRow;
use crate::store::{CanonicalStore, FirmId};

/// Mean/max/min of partner-level average centrality across the window
/// (spec.md §4.10, option 1/2/3). `None` iff the focal firm had no partner
/// with a centrality observation in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerStatusStats {
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

/// Partner status for each of [`NodeCentrality`]'s five measure families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerStatus {
    pub degree: PartnerStatusStats,
    pub betweenness: PartnerStatusStats,
    pub constraint: PartnerStatusStats,
    pub ego_density: PartnerStatusStats,
    pub power_p0: PartnerStatusStats,
    pub power_p75: PartnerStatusStats,
    pub power_p99: PartnerStatusStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprintingRow {
    pub n_initial_partners: u32,
    pub n_partner_years: u32,
    pub partner_status: PartnerStatus,
    pub initial_early_stage_ratio: f64,
    pub initial_industry_blau: f64,
    pub initial_inv_num: u64,
    pub initial_inv_amt: f64,
    pub initial_firm_age: i32,
    pub initial_market_heat: Option<f64>,
    pub initial_new_venture_demand: Option<f64>,
}

/// `t₁(f)` = minimum year `f` appears in any round (spec.md §4.10).
fn initial_years(store: &CanonicalStore) -> BTreeMap<FirmId, i32> {
    let mut out: BTreeMap<FirmId, i32> = BTreeMap::new();
    for round in &store.rounds {
        out.entry(round.firm_id)
            .and_modify(|y| *y = (*y).min(round.year))
            .or_insert(round.year);
    }
    out
}

/// Every year the focal firm tied a partner within `[t1, t1+period-1]`,
/// grouped by partner (spec.md §4.10, step 1: "each partner contributes one
/// tuple per year of co-appearance"). `YearGraph`s are keyed by their
/// analysis year `Y`, which reflects deals strictly *before* `Y` (spec.md
/// §4.4: window `[Y-W, Y-1]`); a deal in calendar year `year` is only
/// visible once the analysis year `year+1` graph is built. The recorded
/// tie is keyed by that same analysis year (not the nominal window year)
/// so `partner_status_for`'s later `centralities.get` lookup — which
/// shares this same `graphs`/`centralities` keying scheme — resolves.
fn tied_years(graphs: &BTreeMap<i32, YearGraph>, firm_id: FirmId, t1: i32, period: u32) -> BTreeMap<FirmId, Vec<i32>> {
    let mut out: BTreeMap<FirmId, Vec<i32>> = BTreeMap::new();
    for offset in 0..period {
        let analysis_year = t1 + offset as i32 + 1;
        let Some(graph) = graphs.get(&analysis_year) else { continue };
        if !graph.contains(firm_id) {
            continue;
        }
        for (partner, _weight) in graph.neighbors(firm_id) {
            out.entry(partner).or_default().push(analysis_year);
        }
    }
    out
}

/// Partner-weighted mean/max/min for one centrality measure: each
/// partner's own average over the years it was tied, then mean/max/min of
/// those partner averages (spec.md §4.10, step 2).
fn partner_status_for<F: Fn(&NodeCentrality) -> f64>(
    partner_years: &BTreeMap<FirmId, Vec<i32>>,
    centralities: &BTreeMap<i32, GraphCentralities>,
    extract: F,
) -> PartnerStatusStats {
    let mut partner_averages = Vec::with_capacity(partner_years.len());
    for (partner, years) in partner_years {
        let values: Vec<f64> = years
            .iter()
            .filter_map(|year| centralities.get(year).and_then(|c| c.rows.get(partner)).map(&extract))
            .collect();
        if values.is_empty() {
            continue;
        }
        partner_averages.push(values.iter().sum::<f64>() / values.len() as f64);
    }

    if partner_averages.is_empty() {
        return PartnerStatusStats::default();
    }
    let mean = partner_averages.iter().sum::<f64>() / partner_averages.len() as f64;
    let max = partner_averages.iter().cloned().fold(f64::MIN, f64::max);
    let min = partner_averages.iter().cloned().fold(f64::MAX, f64::min);
    PartnerStatusStats {
        mean: Some(mean),
        max: Some(max),
        min: Some(min),
    }
}

/// Mean of whatever firm-year observations exist for `f` in the window
/// (years with no round activity simply contribute no observation, as in
/// the original source's inner join against firm-year variables).
fn mean_over_window<F: Fn(&FirmYearMetrics) -> f64>(
    firm_metrics: &BTreeMap<(FirmId, i32), FirmYearMetrics>,
    firm_id: FirmId,
    t1: i32,
    period: u32,
    extract: F,
) -> f64 {
    let values: Vec<f64> = (0..period)
        .filter_map(|offset| firm_metrics.get(&(firm_id, t1 + offset as i32)).map(&extract))
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sum_over_window<T, F: Fn(&FirmYearMetrics) -> T>(
    firm_metrics: &BTreeMap<(FirmId, i32), FirmYearMetrics>,
    firm_id: FirmId,
    t1: i32,
    period: u32,
    extract: F,
) -> T
where
    T: Default + std::iter::Sum,
{
    (0..period)
        .filter_map(|offset| firm_metrics.get(&(firm_id, t1 + offset as i32)).map(&extract))
        .sum()
}

fn mean_over_window_series<F: Fn(&MarketRow) -> f64>(
    market: &BTreeMap<i32, MarketRow>,
    t1: i32,
    period: u32,
    extract: F,
) -> Option<f64> {
    let values: Vec<f64> = (0..period)
        .filter_map(|offset| market.get(&(t1 + offset as i32)).map(&extract))
        .filter(|v| !v.is_nan())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Computes one [`ImprintingRow`] per firm, keyed by `(firm_id, t1)`
/// (spec.md §4.10: "All outputs are keyed by (firm_id, t1)").
pub fn compute(
    store: &CanonicalStore,
    graphs: &BTreeMap<i32, YearGraph>,
    centralities: &BTreeMap<i32, GraphCentralities>,
    firm_metrics: &BTreeMap<(FirmId, i32), FirmYearMetrics>,
    market: &BTreeMap<i32, MarketRow>,
    config: &Config,
) -> BTreeMap<(FirmId, i32), ImprintingRow> {
    let period = config.imprinting_period;
    let mut out = BTreeMap::new();

    for (&firm_id, &t1) in &initial_years(store) {
        let partner_years = tied_years(graphs, firm_id, t1, period);

        let n_initial_partners = partner_years.len() as u32;
        let n_partner_years = partner_years.values().map(|years| years.len() as u32).sum();

        let partner_status = PartnerStatus {
            degree: partner_status_for(&partner_years, centralities, |nc| nc.degree),
            betweenness: partner_status_for(&partner_years, centralities, |nc| nc.betweenness),
            constraint: partner_status_for(&partner_years, centralities, |nc| nc.constraint),
            ego_density: partner_status_for(&partner_years, centralities, |nc| nc.ego_density),
            power_p0: partner_status_for(&partner_years, centralities, |nc| nc.power_p0),
            power_p75: partner_status_for(&partner_years, centralities, |nc| nc.power_p75),
            power_p99: partner_status_for(&partner_years, centralities, |nc| nc.power_p99),
        };

        let initial_firm_age = firm_metrics.get(&(firm_id, t1)).map_or(0, |m| m.firm_age);

        out.insert(
            (firm_id, t1),
            ImprintingRow {
                n_initial_partners,
                n_partner_years,
                partner_status,
                initial_early_stage_ratio: mean_over_window(firm_metrics, firm_id, t1, period, |m| m.early_stage_ratio),
                initial_industry_blau: mean_over_window(firm_metrics, firm_id, t1, period, |m| m.industry_blau),
                initial_inv_num: sum_over_window(firm_metrics, firm_id, t1, period, |m| m.inv_num),
                initial_inv_amt: sum_over_window(firm_metrics, firm_id, t1, period, |m| m.inv_amt),
                initial_firm_age,
                initial_market_heat: mean_over_window_series(market, t1, period, |m| m.market_heat),
                initial_new_venture_demand: mean_over_window_series(market, t1, period, |m| m.new_venture_demand),
            },
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RawCompanyRow, RawFirmRow, RawRoundRow};
    use chrono::NaiveDate;

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 1, 1).unwrap()
    }

    fn build_store(rounds: Vec<(&str, &str, i32)>) -> CanonicalStore {
        let mut firm_names: Vec<&str> = rounds.iter().map(|(f, _, _)| *f).collect();
        firm_names.sort();
        firm_names.dedup();
        let mut company_names: Vec<&str> = rounds.iter().map(|(_, c, _)| *c).collect();
        company_names.sort();
        company_names.dedup();

        let raw_firms: Vec<RawFirmRow> = firm_names
            .iter()
            .map(|&name| RawFirmRow {
                name: name.to_string(),
                founding_year: Some(2000),
                ..Default::default()
            })
            .collect();
        let raw_companies: Vec<RawCompanyRow> = company_names
            .iter()
            .map(|&name| RawCompanyRow {
                name: name.to_string(),
                ..Default::default()
            })
            .collect();
        let raw_rounds: Vec<RawRoundRow> = rounds
            .iter()
            .map(|&(firm, company, year)| RawRoundRow {
                firm_name: firm.to_string(),
                company_name: company.to_string(),
                round_date: date(year),
                round_number: 1,
                amount_disclosed: None,
                amount_estimated: None,
                stage_level_1: None,
            })
            .collect();

        let (store, _log) = CanonicalStore::build(raw_firms, raw_companies, raw_rounds, None);
        store
    }

    /// S6: Firm A first appears in 2010, co-invests with B in 2010 and C
    /// in 2012, P=3. Initial partners = {B, C}. `graphs`/`centralities` are
    /// keyed by their own natural analysis year (`Y` reflects deals in
    /// `[Y-W, Y-1]`, spec.md §4.4); `tied_years` accounts for the one-year
    /// lag itself, so the 2012 deal's edge — first visible in the
    /// analysis-year-2013 graph — still lands inside the `[2010, 2012]`
    /// imprinting window.
    #[test]
    fn s6_initial_partners_union_across_window() {
        let store = build_store(vec![
            ("A", "Deal1", 2010),
            ("B", "Deal1", 2010),
            ("A", "Deal2", 2012),
            ("C", "Deal2", 2012),
        ]);
        let firm_a = store.firm_interner.get("A").unwrap();
        let firm_b = store.firm_interner.get("B").unwrap();
        let firm_c = store.firm_interner.get("C").unwrap();

        let graph_2011 = crate::graph::build_year_graph(&store.rounds, 2011, 5, 1);
        let graph_2012 = crate::graph::build_year_graph(&store.rounds, 2012, 5, 1);
        let graph_2013 = crate::graph::build_year_graph(&store.rounds, 2013, 5, 1);
        let mut graphs = BTreeMap::new();
        graphs.insert(2011, graph_2011.clone());
        graphs.insert(2012, graph_2012.clone());
        graphs.insert(2013, graph_2013.clone());

        let config = Config::default();
        let mut log = crate::error::DegradationLog::default();
        let cent_2011 = crate::graph::compute_centrality(&graph_2011, &config, &mut log);
        let cent_2012 = crate::graph::compute_centrality(&graph_2012, &config, &mut log);
        let cent_2013 = crate::graph::compute_centrality(&graph_2013, &config, &mut log);
        let mut centralities = BTreeMap::new();
        centralities.insert(2011, cent_2011);
        centralities.insert(2012, cent_2012);
        centralities.insert(2013, cent_2013);

        let firm_metrics = BTreeMap::new();
        let market = BTreeMap::new();
        let rows = compute(&store, &graphs, &centralities, &firm_metrics, &market, &config);

        let row = &rows[&(firm_a, 2010)];
        assert_eq!(row.n_initial_partners, 2);
        assert_eq!(row.n_partner_years, 4);
        assert!(row.partner_status.degree.mean.is_some());

        // B and C themselves have their own t1 too.
        assert!(rows.contains_key(&(firm_b, 2010)));
        assert!(rows.contains_key(&(firm_c, 2012)));
    }

    #[test]
    fn firm_with_no_partners_gets_null_partner_stats() {
        let store = build_store(vec![("A", "Solo", 2010)]);
        let firm_a = store.firm_interner.get("A").unwrap();
        let graphs = BTreeMap::new();
        let centralities = BTreeMap::new();
        let firm_metrics = BTreeMap::new();
        let market = BTreeMap::new();
        let config = Config::default();

        let rows = compute(&store, &graphs, &centralities, &firm_metrics, &market, &config);
        let row = &rows[&(firm_a, 2010)];
        assert_eq!(row.n_initial_partners, 0);
        assert_eq!(row.n_partner_years, 0);
        assert_eq!(row.partner_status.degree, PartnerStatusStats::default());
    }

    #[test]
    fn firm_age_is_point_value_at_t1_not_averaged() {
        let store = build_store(vec![("A", "X", 2010)]);
        let firm_a = store.firm_interner.get("A").unwrap();
        let mut firm_metrics = BTreeMap::new();
        firm_metrics.insert(
            (firm_a, 2010),
            FirmYearMetrics {
                firm_age: 5,
                industry_blau: 0.0,
                early_stage_ratio: 0.0,
                inv_amt: 0.0,
                inv_num: 0,
            },
        );
        firm_metrics.insert(
            (firm_a, 2011),
            FirmYearMetrics {
                firm_age: 6,
                industry_blau: 0.0,
                early_stage_ratio: 0.0,
                inv_amt: 0.0,
                inv_num: 0,
            },
        );
        let config = Config::default();
        let graphs = BTreeMap::new();
        let centralities = BTreeMap::new();
        let market = BTreeMap::new();
        let rows = compute(&store, &graphs, &centralities, &firm_metrics, &market, &config);
        assert_eq!(rows[&(firm_a, 2010)].initial_firm_age, 5);
    }
}
