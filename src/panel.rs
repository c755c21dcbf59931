//! Final panel assembly (spec.md §6): left-joins every component's
//! per-firm-year output by `(firm_id, year)` into the required output
//! schema, plus the separate initial-period table keyed by `(firm_id,
//! t1)`, and writes both to parquet (or CSV) via `polars`.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;

use crate::copartner::DistanceStats;
use crate::error::{IoError, PanelResult};
use crate::firm_metrics::{FirmHqDummies, FirmYearMetrics};
use crate::graph::GraphCentralities;
use crate::imprinting::ImprintingRow;
use crate::market::MarketRow;
use crate::performance::PerformanceRow;
use crate::reputation::ReputationRow;
use crate::store::CanonicalStore;
use crate::store::FirmId;

/// One fully-joined firm-year row, matching spec.md §6's required column
/// list (`VC_reputation`'s six raw inputs are exposed as `rep_*` per
/// DESIGN.md's reading of that wildcard).
#[derive(Debug, Clone)]
pub struct PanelRow {
    pub firm_id: FirmId,
    pub firm_name: String,
    pub year: i32,
    pub firm_age: i32,
    pub industry_blau: f64,
    pub perf_ipo: u32,
    pub perf_mna: u32,
    pub perf_all: u32,
    pub early_stage_ratio: f64,
    pub inv_amt: f64,
    pub inv_num: u64,
    pub firm_hq: bool,
    pub firm_hq_ca: bool,
    pub firm_hq_ma: bool,
    pub firm_hq_ny: bool,
    pub dgr_cent: Option<f64>,
    pub btw_cent: Option<f64>,
    pub constraint: Option<f64>,
    pub ego_dens: Option<f64>,
    pub pwr_p0: Option<f64>,
    pub pwr_p75: Option<f64>,
    pub pwr_p99: Option<f64>,
    pub pwr_max: Option<f64>,
    pub in_network: bool,
    pub vc_reputation: f64,
    pub rep_portfolio_count: f64,
    pub rep_total_invested: f64,
    pub rep_avg_open_fund_size: Option<f64>,
    pub rep_funds_raised_count: Option<f64>,
    pub rep_exit_count: f64,
    pub rep_funding_age: Option<f64>,
    pub missing_fund_data: bool,
    pub market_heat: f64,
    pub new_venture_demand: f64,
    pub geo_dist_company: DistanceStats,
    pub geo_dist_copartner: DistanceStats,
}

/// Inputs already computed by every upstream component, keyed the way
/// each component naturally produces them; `assemble` performs the
/// left-joins spec.md §5 requires ("the final panel is sorted by
/// (firm_id, year) before write").
pub struct PanelInputs<'a> {
    pub store: &'a CanonicalStore,
    pub firm_metrics: &'a BTreeMap<(FirmId, i32), FirmYearMetrics>,
    pub hq_dummies: &'a BTreeMap<FirmId, FirmHqDummies>,
    pub performance: &'a BTreeMap<(FirmId, i32), PerformanceRow>,
    pub centralities: &'a BTreeMap<i32, GraphCentralities>,
    pub reputation_rows: &'a BTreeMap<(FirmId, i32), ReputationRow>,
    pub reputation_inputs: &'a BTreeMap<(FirmId, i32), crate::reputation::ReputationInputs>,
    pub market: &'a BTreeMap<i32, MarketRow>,
    pub geo_dist_company: &'a BTreeMap<(FirmId, i32), DistanceStats>,
    pub geo_dist_copartner: &'a BTreeMap<(FirmId, i32), DistanceStats>,
}

/// Assembles one row per `(firm_id, year)` present in `firm_metrics`
/// (spec.md §3: the round table defines the primary key set), in
/// ascending `(firm_id, year)` order.
pub fn assemble(inputs: &PanelInputs) -> Vec<PanelRow> {
    let firm_names: BTreeMap<FirmId, &str> = inputs.store.firms.iter().map(|f| (f.id, f.name.as_str())).collect();
    let default_hq = FirmHqDummies::default();

    let mut rows: Vec<PanelRow> = inputs
        .firm_metrics
        .iter()
        .map(|(&(firm_id, year), metrics)| {
            let hq = inputs.hq_dummies.get(&firm_id).copied().unwrap_or(default_hq);
            let perf = inputs.performance.get(&(firm_id, year)).copied().unwrap_or_default();
            let rep = inputs.reputation_rows.get(&(firm_id, year)).copied().unwrap_or_default();
            let rep_inputs = inputs.reputation_inputs.get(&(firm_id, year)).copied().unwrap_or_default();
            let market = inputs.market.get(&year).copied().unwrap_or_default();

            let centrality = inputs.centralities.get(&year).and_then(|c| c.rows.get(&firm_id));
            let pwr_max = inputs.centralities.get(&year).map(|c| c.inv_lambda_max);

            PanelRow {
                firm_id,
                firm_name: firm_names.get(&firm_id).copied().unwrap_or_default().to_string(),
                year,
                firm_age: metrics.firm_age,
                industry_blau: metrics.industry_blau,
                perf_ipo: perf.perf_ipo,
                perf_mna: perf.perf_mna,
                perf_all: perf.perf_all,
                early_stage_ratio: metrics.early_stage_ratio,
                inv_amt: metrics.inv_amt,
                inv_num: metrics.inv_num,
                firm_hq: hq.firm_hq,
                firm_hq_ca: hq.firm_hq_ca,
                firm_hq_ma: hq.firm_hq_ma,
                firm_hq_ny: hq.firm_hq_ny,
                dgr_cent: centrality.map(|c| c.degree),
                btw_cent: centrality.map(|c| c.betweenness),
                constraint: centrality.map(|c| c.constraint),
                ego_dens: centrality.map(|c| c.ego_density),
                pwr_p0: centrality.map(|c| c.power_p0),
                pwr_p75: centrality.map(|c| c.power_p75),
                pwr_p99: centrality.map(|c| c.power_p99),
                pwr_max,
                in_network: centrality.is_some(),
                vc_reputation: rep.vc_reputation,
                rep_portfolio_count: rep_inputs.portfolio_count,
                rep_total_invested: rep_inputs.total_invested,
                rep_avg_open_fund_size: rep_inputs.avg_open_fund_size,
                rep_funds_raised_count: rep_inputs.funds_raised_count,
                rep_exit_count: rep_inputs.exit_count,
                rep_funding_age: rep_inputs.funding_age,
                missing_fund_data: rep.missing_fund_data,
                market_heat: market.market_heat,
                new_venture_demand: market.new_venture_demand,
                geo_dist_company: inputs.geo_dist_company.get(&(firm_id, year)).copied().unwrap_or_default(),
                geo_dist_copartner: inputs.geo_dist_copartner.get(&(firm_id, year)).copied().unwrap_or_default(),
            }
        })
        .collect();

    rows.sort_by_key(|r| (r.firm_id, r.year));
    rows
}

/// One row per `(firm_id, t1)` carrying every `initial_*` column (spec.md
/// §6: "An additional initial-period table keyed by (firm_id, t1) carries
/// all initial_* columns").
#[derive(Debug, Clone)]
pub struct InitialPeriodRow {
    pub firm_id: FirmId,
    pub firm_name: String,
    pub t1: i32,
    pub imprinting: ImprintingRow,
}

pub fn assemble_initial_period(
    store: &CanonicalStore,
    imprinting_rows: &BTreeMap<(FirmId, i32), ImprintingRow>,
) -> Vec<InitialPeriodRow> {
    let firm_names: BTreeMap<FirmId, &str> = store.firms.iter().map(|f| (f.id, f.name.as_str())).collect();
    let mut rows: Vec<InitialPeriodRow> = imprinting_rows
        .iter()
        .map(|(&(firm_id, t1), row)| InitialPeriodRow {
            firm_id,
            firm_name: firm_names.get(&firm_id).copied().unwrap_or_default().to_string(),
            t1,
            imprinting: *row,
        })
        .collect();
    rows.sort_by_key(|r| (r.firm_id, r.t1));
    rows
}

fn opt_f64_column(name: &str, values: &[Option<f64>]) -> Column {
    Column::new(name.into(), values)
}

/// Builds the panel's `DataFrame` from assembled rows, column order
/// matching spec.md §6's required-columns list.
pub fn to_dataframe(rows: &[PanelRow]) -> PanelResult<DataFrame> {
    let firm_id: Vec<u32> = rows.iter().map(|r| r.firm_id.0).collect();
    let firm_name: Vec<&str> = rows.iter().map(|r| r.firm_name.as_str()).collect();
    let year: Vec<i32> = rows.iter().map(|r| r.year).collect();
    let firm_age: Vec<i32> = rows.iter().map(|r| r.firm_age).collect();
    let industry_blau: Vec<f64> = rows.iter().map(|r| r.industry_blau).collect();
    let perf_ipo: Vec<u32> = rows.iter().map(|r| r.perf_ipo).collect();
    let perf_mna: Vec<u32> = rows.iter().map(|r| r.perf_mna).collect();
    let perf_all: Vec<u32> = rows.iter().map(|r| r.perf_all).collect();
    let early_stage_ratio: Vec<f64> = rows.iter().map(|r| r.early_stage_ratio).collect();
    let inv_amt: Vec<f64> = rows.iter().map(|r| r.inv_amt).collect();
    let inv_num: Vec<u64> = rows.iter().map(|r| r.inv_num).collect();
    let firm_hq: Vec<bool> = rows.iter().map(|r| r.firm_hq).collect();
    let firm_hq_ca: Vec<bool> = rows.iter().map(|r| r.firm_hq_ca).collect();
    let firm_hq_ma: Vec<bool> = rows.iter().map(|r| r.firm_hq_ma).collect();
    let firm_hq_ny: Vec<bool> = rows.iter().map(|r| r.firm_hq_ny).collect();
    let dgr_cent: Vec<Option<f64>> = rows.iter().map(|r| r.dgr_cent).collect();
    let btw_cent: Vec<Option<f64>> = rows.iter().map(|r| r.btw_cent).collect();
    let constraint: Vec<Option<f64>> = rows.iter().map(|r| r.constraint).collect();
    let ego_dens: Vec<Option<f64>> = rows.iter().map(|r| r.ego_dens).collect();
    let pwr_p0: Vec<Option<f64>> = rows.iter().map(|r| r.pwr_p0).collect();
    let pwr_p75: Vec<Option<f64>> = rows.iter().map(|r| r.pwr_p75).collect();
    let pwr_p99: Vec<Option<f64>> = rows.iter().map(|r| r.pwr_p99).collect();
    let pwr_max: Vec<Option<f64>> = rows.iter().map(|r| r.pwr_max).collect();
    let in_network: Vec<bool> = rows.iter().map(|r| r.in_network).collect();
    let vc_reputation: Vec<f64> = rows.iter().map(|r| r.vc_reputation).collect();
    let rep_portfolio_count: Vec<f64> = rows.iter().map(|r| r.rep_portfolio_count).collect();
    let rep_total_invested: Vec<f64> = rows.iter().map(|r| r.rep_total_invested).collect();
    let rep_avg_open_fund_size: Vec<Option<f64>> = rows.iter().map(|r| r.rep_avg_open_fund_size).collect();
    let rep_funds_raised_count: Vec<Option<f64>> = rows.iter().map(|r| r.rep_funds_raised_count).collect();
    let rep_exit_count: Vec<f64> = rows.iter().map(|r| r.rep_exit_count).collect();
    let rep_funding_age: Vec<Option<f64>> = rows.iter().map(|r| r.rep_funding_age).collect();
    let missing_fund_data: Vec<bool> = rows.iter().map(|r| r.missing_fund_data).collect();
    let market_heat: Vec<f64> = rows.iter().map(|r| r.market_heat).collect();
    let new_venture_demand: Vec<f64> = rows.iter().map(|r| r.new_venture_demand).collect();

    let geo_company_mean: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_company.mean).collect();
    let geo_company_min: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_company.min).collect();
    let geo_company_max: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_company.max).collect();
    let geo_company_std: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_company.std).collect();
    let geo_company_weighted_mean: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_company.weighted_mean).collect();

    let geo_copartner_mean: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_copartner.mean).collect();
    let geo_copartner_min: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_copartner.min).collect();
    let geo_copartner_max: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_copartner.max).collect();
    let geo_copartner_std: Vec<Option<f64>> = rows.iter().map(|r| r.geo_dist_copartner.std).collect();
    let geo_copartner_weighted_mean: Vec<Option<f64>> =
        rows.iter().map(|r| r.geo_dist_copartner.weighted_mean).collect();

    let df = DataFrame::new(vec![
        Column::new("firm_id".into(), firm_id),
        Column::new("firm_name".into(), firm_name),
        Column::new("year".into(), year),
        Column::new("firm_age".into(), firm_age),
        Column::new("industry_blau".into(), industry_blau),
        Column::new("perf_IPO".into(), perf_ipo),
        Column::new("perf_MnA".into(), perf_mna),
        Column::new("perf_all".into(), perf_all),
        Column::new("early_stage_ratio".into(), early_stage_ratio),
        Column::new("inv_amt".into(), inv_amt),
        Column::new("inv_num".into(), inv_num),
        Column::new("firm_hq".into(), firm_hq),
        Column::new("firm_hq_CA".into(), firm_hq_ca),
        Column::new("firm_hq_MA".into(), firm_hq_ma),
        Column::new("firm_hq_NY".into(), firm_hq_ny),
        opt_f64_column("dgr_cent", &dgr_cent),
        opt_f64_column("btw_cent", &btw_cent),
        opt_f64_column("constraint", &constraint),
        opt_f64_column("ego_dens", &ego_dens),
        opt_f64_column("pwr_p0", &pwr_p0),
        opt_f64_column("pwr_p75", &pwr_p75),
        opt_f64_column("pwr_p99", &pwr_p99),
        opt_f64_column("pwr_max", &pwr_max),
        Column::new("in_network".into(), in_network),
        Column::new("VC_reputation".into(), vc_reputation),
        Column::new("rep_portfolio_count".into(), rep_portfolio_count),
        Column::new("rep_total_invested".into(), rep_total_invested),
        opt_f64_column("rep_avg_open_fund_size", &rep_avg_open_fund_size),
        opt_f64_column("rep_funds_raised_count", &rep_funds_raised_count),
        Column::new("rep_exit_count".into(), rep_exit_count),
        opt_f64_column("rep_funding_age", &rep_funding_age),
        Column::new("missing_fund_data".into(), missing_fund_data),
        Column::new("market_heat".into(), market_heat),
        Column::new("new_venture_demand".into(), new_venture_demand),
        opt_f64_column("geo_dist_company_mean", &geo_company_mean),
        opt_f64_column("geo_dist_company_min", &geo_company_min),
        opt_f64_column("geo_dist_company_max", &geo_company_max),
        opt_f64_column("geo_dist_company_std", &geo_company_std),
        opt_f64_column("geo_dist_company_weighted_mean", &geo_company_weighted_mean),
        opt_f64_column("geo_dist_copartner_mean", &geo_copartner_mean),
        opt_f64_column("geo_dist_copartner_min", &geo_copartner_min),
        opt_f64_column("geo_dist_copartner_max", &geo_copartner_max),
        opt_f64_column("geo_dist_copartner_std", &geo_copartner_std),
        opt_f64_column("geo_dist_copartner_weighted_mean", &geo_copartner_weighted_mean),
    ])
    .map_err(|e| IoError::DataFrame(e.to_string()))?;

    Ok(df)
}

/// Writes the panel to `path` as parquet, or CSV if `path` ends in
/// `.csv` (spec.md §6: "a columnar on-disk format (parquet-like: column
/// chunks + row-group footer + schema header)").
pub fn write_panel(df: &mut DataFrame, path: &Path) -> PanelResult<()> {
    if path.extension().and_then(|e| e.to_str()) == Some("csv") {
        let mut file = std::fs::File::create(path).map_err(IoError::Io)?;
        CsvWriter::new(&mut file).finish(df).map_err(|e| IoError::DataFrame(e.to_string()))?;
    } else {
        let file = std::fs::File::create(path).map_err(IoError::Io)?;
        ParquetWriter::new(file).finish(df).map_err(|e| IoError::DataFrame(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{RawCompanyRow, RawFirmRow, RawRoundRow};
    use chrono::NaiveDate;

    fn build_store() -> CanonicalStore {
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
            amount_disclosed: Some(10.0),
            amount_estimated: None,
            stage_level_1: None,
        }];
        let (store, _log) = CanonicalStore::build(raw_firms, raw_companies, raw_rounds, None);
        store
    }

    #[test]
    fn assemble_joins_every_component_with_defaults_for_missing_ones() {
        let store = build_store();
        let firm_id = store.firm_interner.get("Sequoia").unwrap();
        let target_keys = crate::firm_metrics::all_target_keys(&store);
        let firm_metrics = crate::firm_metrics::compute_firm_year_metrics(&store, &target_keys);
        let hq_dummies = crate::firm_metrics::compute_hq_dummies(&store);
        let performance = BTreeMap::new();
        let centralities = BTreeMap::new();
        let reputation_rows = BTreeMap::new();
        let reputation_inputs = BTreeMap::new();
        let market = BTreeMap::new();
        let geo_dist_company = BTreeMap::new();
        let geo_dist_copartner = BTreeMap::new();

        let inputs = PanelInputs {
            store: &store,
            firm_metrics: &firm_metrics,
            hq_dummies: &hq_dummies,
            performance: &performance,
            centralities: &centralities,
            reputation_rows: &reputation_rows,
            reputation_inputs: &reputation_inputs,
            market: &market,
            geo_dist_company: &geo_dist_company,
            geo_dist_copartner: &geo_dist_copartner,
        };

        let rows = assemble(&inputs);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.firm_id, firm_id);
        assert_eq!(row.firm_name, "Sequoia");
        assert_eq!(row.year, 2015);
        assert!(!row.in_network);
        assert_eq!(row.dgr_cent, None);
        assert_eq!(row.vc_reputation, 0.0);
    }

    #[test]
    fn to_dataframe_builds_without_error() {
        let store = build_store();
        let target_keys = crate::firm_metrics::all_target_keys(&store);
        let firm_metrics = crate::firm_metrics::compute_firm_year_metrics(&store, &target_keys);
        let hq_dummies = crate::firm_metrics::compute_hq_dummies(&store);
        let performance = BTreeMap::new();
        let centralities = BTreeMap::new();
        let reputation_rows = BTreeMap::new();
        let reputation_inputs = BTreeMap::new();
        let market = BTreeMap::new();
        let geo_dist_company = BTreeMap::new();
        let geo_dist_copartner = BTreeMap::new();
        let inputs = PanelInputs {
            store: &store,
            firm_metrics: &firm_metrics,
            hq_dummies: &hq_dummies,
            performance: &performance,
            centralities: &centralities,
            reputation_rows: &reputation_rows,
            reputation_inputs: &reputation_inputs,
            market: &market,
            geo_dist_company: &geo_dist_company,
            geo_dist_copartner: &geo_dist_copartner,
        };
        let rows = assemble(&inputs);
        let df = to_dataframe(&rows).unwrap();
        assert_eq!(df.height(), 1);
        let _ = Config::default();
    }
}
