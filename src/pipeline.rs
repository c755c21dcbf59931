//! Pipeline driver (spec.md §5): wires C1 ingest through C10 imprinting
//! into a single run, dispatching the per-year graph/centrality stages
//! across a work-stealing `rayon` pool sized by `config.parallel_workers`,
//! with barriers between stages as spec.md requires ("all graphs for all
//! years must be complete before centrality begins; all centralities must
//! be complete before imprinting begins").

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::Config;
use crate::error::{DegradationLog, PanelError, PanelResult};
use crate::geo::{Coordinates, GeoResolver};
use crate::graph::{build_year_graph, compute_centrality, GraphCentralities, YearGraph};
use crate::market::MarketRow;
use crate::performance::PerformanceRow;
use crate::reputation::{ReputationInputs, ReputationRow};
use crate::store::{CanonicalStore, FirmId, RawCompanyRow, RawFirmRow, RawFundRow, RawRoundRow};
use crate::{copartner, firm_metrics, imprinting, leadvc, market, performance, reputation};

/// Everything a pipeline run needs besides `Config`: the four raw input
/// tables and an offline-resolved zip code lookup table (spec.md §5:
/// "the geo resolver cache... built offline before parallel work begins").
pub struct PipelineInputs {
    pub raw_firms: Vec<RawFirmRow>,
    pub raw_companies: Vec<RawCompanyRow>,
    pub raw_rounds: Vec<RawRoundRow>,
    pub raw_funds: Option<Vec<RawFundRow>>,
    pub geo_table: std::collections::HashMap<String, Coordinates>,
}

/// The full collection of intermediate and final results a run produces,
/// handed to the caller (CLI or cache writer) to persist as it sees fit.
pub struct PipelineOutput {
    pub store: CanonicalStore,
    pub degradation_log: DegradationLog,
    pub graphs: BTreeMap<i32, YearGraph>,
    pub centralities: BTreeMap<i32, GraphCentralities>,
    pub firm_metrics: BTreeMap<(FirmId, i32), firm_metrics::FirmYearMetrics>,
    pub hq_dummies: BTreeMap<FirmId, firm_metrics::FirmHqDummies>,
    pub performance: BTreeMap<(FirmId, i32), PerformanceRow>,
    pub reputation_inputs: BTreeMap<(FirmId, i32), ReputationInputs>,
    pub reputation_rows: BTreeMap<(FirmId, i32), ReputationRow>,
    pub market: BTreeMap<i32, MarketRow>,
    pub geo_dist_company: BTreeMap<(FirmId, i32), copartner::DistanceStats>,
    pub geo_dist_copartner: BTreeMap<(FirmId, i32), copartner::DistanceStats>,
    pub imprinting: BTreeMap<(FirmId, i32), imprinting::ImprintingRow>,
    pub lead_vcs: BTreeMap<crate::store::CompanyId, FirmId>,
}

fn check_cancelled(cancel: &AtomicBool) -> PanelResult<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(PanelError::Cancelled);
    }
    Ok(())
}

/// Runs the whole pipeline to completion, or returns [`PanelError::Cancelled`]
/// as soon as `cancel` is observed set at the top of any task (spec.md §5:
/// "a single atomic flag checked at the top of each task closure").
pub fn run(inputs: PipelineInputs, config: &Config, cancel: &AtomicBool) -> PanelResult<PipelineOutput> {
    check_cancelled(cancel)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_workers.max(1))
        .build()
        .map_err(|e| crate::error::IoError::DataFrame(e.to_string()))?;

    let (store, degradation_log) =
        CanonicalStore::build(inputs.raw_firms, inputs.raw_companies, inputs.raw_rounds, inputs.raw_funds);

    let Some(years) = store.years else {
        return Ok(empty_output(store, degradation_log));
    };

    let resolver = GeoResolver::new(inputs.geo_table);
    let firm_zip: BTreeMap<FirmId, Option<Coordinates>> =
        store.firms.iter().map(|f| (f.id, f.zip.as_deref().and_then(|z| resolver.resolve(z)))).collect();
    let company_zip: BTreeMap<crate::store::CompanyId, Option<Coordinates>> =
        store.companies.iter().map(|c| (c.id, c.zip.as_deref().and_then(|z| resolver.resolve(z)))).collect();

    // --- barrier 1: graphs for every year ---
    check_cancelled(cancel)?;
    let year_list: Vec<i32> = years.iter().collect();
    let graphs: BTreeMap<i32, YearGraph> = pool.install(|| {
        year_list
            .par_iter()
            .map(|&year| (year, build_year_graph(&store.rounds, year, config.window_years, config.edge_cutpoint)))
            .collect()
    });

    // --- barrier 2: centrality for every year's graph ---
    check_cancelled(cancel)?;
    let centrality_results: Vec<(i32, GraphCentralities, DegradationLog)> = pool.install(|| {
        graphs
            .par_iter()
            .map(|(&year, graph)| {
                let mut log = DegradationLog::default();
                let centrality = compute_centrality(graph, config, &mut log);
                (year, centrality, log)
            })
            .collect()
    });
    let mut degradation_log = degradation_log;
    let mut centralities = BTreeMap::new();
    for (year, centrality, log) in centrality_results {
        degradation_log.merge(&log);
        centralities.insert(year, centrality);
    }

    check_cancelled(cancel)?;
    let target_keys = firm_metrics::all_target_keys(&store);
    let computed_firm_metrics = firm_metrics::compute_firm_year_metrics(&store, &target_keys);
    let hq_dummies = firm_metrics::compute_hq_dummies(&store);
    let performance_rows = performance::compute(&store.rounds, &store.companies, config);
    let reputation_inputs = reputation::compute_inputs(&store, &target_keys);
    let reputation_rows = reputation::compose(&reputation_inputs);
    let market_rows = market::compute(&store, &config.us_nation_code);

    let firm_zip_fn = |firm_id: FirmId| firm_zip.get(&firm_id).copied().flatten();
    let company_zip_fn = |company_id: crate::store::CompanyId| company_zip.get(&company_id).copied().flatten();
    let geo_dist_copartner = copartner::firm_pair_distances(&store.rounds, &firm_zip_fn, config);
    let geo_dist_company = copartner::firm_company_distances(&store.rounds, &firm_zip_fn, &company_zip_fn);

    // --- barrier 3: imprinting depends on all years' graphs+centralities ---
    check_cancelled(cancel)?;
    let imprinting_rows = imprinting::compute(&store, &graphs, &centralities, &computed_firm_metrics, &market_rows, config);

    let lead_vcs = leadvc::compute(&store.rounds, config);

    Ok(PipelineOutput {
        store,
        degradation_log,
        graphs,
        centralities,
        firm_metrics: computed_firm_metrics,
        hq_dummies,
        performance: performance_rows,
        reputation_inputs,
        reputation_rows,
        market: market_rows,
        geo_dist_company,
        geo_dist_copartner,
        imprinting: imprinting_rows,
        lead_vcs,
    })
}

fn empty_output(store: CanonicalStore, degradation_log: DegradationLog) -> PipelineOutput {
    PipelineOutput {
        store,
        degradation_log,
        graphs: BTreeMap::new(),
        centralities: BTreeMap::new(),
        firm_metrics: BTreeMap::new(),
        hq_dummies: BTreeMap::new(),
        performance: BTreeMap::new(),
        reputation_inputs: BTreeMap::new(),
        reputation_rows: BTreeMap::new(),
        market: BTreeMap::new(),
        geo_dist_company: BTreeMap::new(),
        geo_dist_copartner: BTreeMap::new(),
        imprinting: BTreeMap::new(),
        lead_vcs: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn empty_store_yields_empty_output_without_panicking() {
        let inputs = PipelineInputs {
            raw_firms: Vec::new(),
            raw_companies: Vec::new(),
            raw_rounds: Vec::new(),
            raw_funds: None,
            geo_table: std::collections::HashMap::new(),
        };
        let config = Config::default();
        let cancel = AtomicBool::new(false);
        let output = run(inputs, &config, &cancel).unwrap();
        assert!(output.graphs.is_empty());
        assert!(output.store.years.is_none());
    }

    #[test]
    fn cancellation_flag_set_before_run_returns_cancelled_error() {
        let raw_firms = vec![RawFirmRow {
            name: "Sequoia".into(),
            founding_year: Some(1972),
            zip: Some("94025".into()),
            ..Default::default()
        }];
        let raw_companies = vec![RawCompanyRow {
            name: "Acme".into(),
            ..Default::default()
        }];
        let raw_rounds = vec![RawRoundRow {
            firm_name: "Sequoia".into(),
            company_name: "Acme".into(),
            round_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            round_number: 1,
            amount_disclosed: None,
            amount_estimated: None,
            stage_level_1: None,
        }];
        let inputs = PipelineInputs {
            raw_firms,
            raw_companies,
            raw_rounds,
            raw_funds: None,
            geo_table: std::collections::HashMap::new(),
        };
        let config = Config::default();
        let cancel = AtomicBool::new(true);
        let result = run(inputs, &config, &cancel);
        assert!(matches!(result, Err(PanelError::Cancelled)));
    }

    #[test]
    fn small_store_runs_end_to_end() {
        let raw_firms = vec![
            RawFirmRow {
                name: "Sequoia".into(),
                founding_year: Some(1972),
                zip: Some("94025".into()),
                ..Default::default()
            },
            RawFirmRow {
                name: "Accel".into(),
                founding_year: Some(1983),
                zip: Some("94025".into()),
                ..Default::default()
            },
        ];
        let raw_companies = vec![RawCompanyRow {
            name: "Acme".into(),
            ..Default::default()
        }];
        let raw_rounds = vec![
            RawRoundRow {
                firm_name: "Sequoia".into(),
                company_name: "Acme".into(),
                round_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                round_number: 1,
                amount_disclosed: Some(100.0),
                amount_estimated: None,
                stage_level_1: Some("Seed".into()),
            },
            RawRoundRow {
                firm_name: "Accel".into(),
                company_name: "Acme".into(),
                round_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                round_number: 1,
                amount_disclosed: Some(200.0),
                amount_estimated: None,
                stage_level_1: Some("Seed".into()),
            },
        ];
        let inputs = PipelineInputs {
            raw_firms,
            raw_companies,
            raw_rounds,
            raw_funds: None,
            geo_table: std::collections::HashMap::new(),
        };
        let config = Config::default();
        let cancel = AtomicBool::new(false);
        let output = run(inputs, &config, &cancel).unwrap();
        assert_eq!(output.store.rounds.len(), 2);
        assert!(output.lead_vcs.contains_key(&crate::store::CompanyId(0)));
    }
}
