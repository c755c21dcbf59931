//! Command-line surface (spec.md §E): one subcommand per pipeline stage
//! plus `all`, which runs the whole driver in-process. Every stage
//! subcommand reads its prerequisite stage(s) from a cache directory and
//! writes its own output there, so a run can be resumed or re-staged
//! without recomputing earlier work. Modeled on the example CLI's
//! `Parser`/`Subcommand`/dispatch-and-exit-code pattern.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{Config, ConfigOverrides};
use crate::error::{IoError, PanelError, PanelResult};
use crate::io::StorageLocation;
use crate::store::{CanonicalStore, FirmId};
use crate::{copartner, firm_metrics, geo, graph, imprinting, ingest, leadvc, market, panel, performance, pipeline, reputation};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Parquet,
    Csv,
}

#[derive(Parser)]
#[command(name = "vcp", version, about = "Builds a firm-year venture capital panel from firm/company/round registries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional JSON config file, overlaid by any `--config-overrides`
    /// flags below (CLI wins).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity: repeat for more detail (overrides RUST_LOG).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read raw firm/company/round(/fund) CSVs into the canonical store.
    Ingest {
        #[arg(long)]
        firms: PathBuf,
        #[arg(long)]
        companies: PathBuf,
        #[arg(long)]
        rounds: PathBuf,
        #[arg(long)]
        funds: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Resolve postal codes to coordinates for every firm/company.
    Geo {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        geo_table: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Build the bipartite firm/company graph for every year.
    Graph {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Compute degree/betweenness/power/constraint centrality per year.
    Centrality {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        graphs: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Stream per-focal-firm geographic co-investor/portfolio distances.
    Copartner {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        geo: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// IPO/M&A exit counts per firm-year.
    Performance {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Firm-year reputation composite from the six rolling/state inputs.
    Reputation {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Per-year market heat / new-venture-demand.
    Market {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Firm-year age/diversification/HQ-dummy metrics.
    FirmMetrics {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Initial-period imprinting, keyed by (firm_id, t1).
    Imprinting {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        graphs: PathBuf,
        #[arg(long)]
        centrality: PathBuf,
        #[arg(long)]
        firm_metrics: PathBuf,
        #[arg(long)]
        market: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Per-company lead-VC attribution.
    LeadVc {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the full pipeline in-process and write the final panel.
    All {
        #[arg(long)]
        firms: PathBuf,
        #[arg(long)]
        companies: PathBuf,
        #[arg(long)]
        rounds: PathBuf,
        #[arg(long)]
        funds: Option<PathBuf>,
        #[arg(long)]
        geo_table: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "parquet")]
        format: OutputFormat,
    },
}

fn save<T: Serialize>(dir: &Path, name: &str, value: &T) -> PanelResult<()> {
    let bytes = postcard::to_allocvec(value).map_err(IoError::Postcard)?;
    StorageLocation::new(dir).write_atomic(name, &bytes)
}

fn load<T: DeserializeOwned>(dir: &Path, name: &str) -> PanelResult<T> {
    let bytes = StorageLocation::new(dir).read(name)?;
    postcard::from_bytes(&bytes).map_err(|e| IoError::Postcard(e).into())
}

const STORE_FILE: &str = "store.bin";
const GEO_ZIP_FILE: &str = "firm_zip.bin";
const GEO_COMPANY_ZIP_FILE: &str = "company_zip.bin";
const GRAPHS_FILE: &str = "graphs.bin";
const CENTRALITY_FILE: &str = "centralities.bin";
const FIRM_METRICS_FILE: &str = "firm_metrics.bin";
const HQ_DUMMIES_FILE: &str = "hq_dummies.bin";
const PERFORMANCE_FILE: &str = "performance.bin";
const REPUTATION_INPUTS_FILE: &str = "reputation_inputs.bin";
const REPUTATION_ROWS_FILE: &str = "reputation_rows.bin";
const MARKET_FILE: &str = "market.bin";
const GEO_DIST_COMPANY_FILE: &str = "geo_dist_company.bin";
const GEO_DIST_COPARTNER_FILE: &str = "geo_dist_copartner.bin";
const IMPRINTING_FILE: &str = "imprinting.bin";
const LEADVC_FILE: &str = "lead_vcs.bin";

fn load_config(path: &Option<PathBuf>, overrides: &ConfigOverrides) -> PanelResult<Config> {
    let mut config = match path {
        Some(p) => Config::from_json_file(p)?,
        None => Config::default(),
    };
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

pub fn run(cli: Cli) -> PanelResult<()> {
    let config = load_config(&cli.config, &cli.overrides)?;
    match cli.command {
        Commands::Ingest { firms, companies, rounds, funds, out } => run_ingest(&firms, &companies, &rounds, funds.as_deref(), &out),
        Commands::Geo { store, geo_table, out } => run_geo(&store, &geo_table, &out),
        Commands::Graph { store, out } => run_graph(&store, &out, &config),
        Commands::Centrality { store, graphs, out } => run_centrality(&store, &graphs, &out, &config),
        Commands::Copartner { store, geo, out } => run_copartner(&store, &geo, &out, &config),
        Commands::Performance { store, out } => run_performance(&store, &out, &config),
        Commands::Reputation { store, out } => run_reputation(&store, &out),
        Commands::Market { store, out } => run_market(&store, &out, &config),
        Commands::FirmMetrics { store, out } => run_firm_metrics(&store, &out),
        Commands::Imprinting { store, graphs, centrality, firm_metrics, market, out } => {
            run_imprinting(&store, &graphs, &centrality, &firm_metrics, &market, &out, &config)
        }
        Commands::LeadVc { store, out } => run_leadvc(&store, &out, &config),
        Commands::All { firms, companies, rounds, funds, geo_table, out, format } => {
            run_all(&firms, &companies, &rounds, funds.as_deref(), &geo_table, &out, format, &config)
        }
    }
}

fn run_ingest(firms: &Path, companies: &Path, rounds: &Path, funds: Option<&Path>, out: &Path) -> PanelResult<()> {
    let mut log = crate::error::DegradationLog::default();
    let raw_firms = ingest::read_firms(firms)?;
    let raw_companies = ingest::read_companies(companies, &mut log)?;
    let raw_rounds = ingest::read_rounds(rounds, &mut log)?;
    let raw_funds = funds.map(|p| ingest::read_funds(p, &mut log)).transpose()?;

    let (store, build_log) = CanonicalStore::build(raw_firms, raw_companies, raw_rounds, raw_funds);
    log.merge(&build_log);

    save(out, STORE_FILE, &store)?;
    save(out, "degradation_log.bin", &log)?;
    tracing::info!(firms = store.firms.len(), companies = store.companies.len(), rounds = store.rounds.len(), "ingest complete");
    Ok(())
}

fn run_geo(store_dir: &Path, geo_table: &Path, out: &Path) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let table = ingest::read_geo_table(geo_table)?;
    let resolver = geo::GeoResolver::new(table);

    let firm_zip: std::collections::BTreeMap<FirmId, Option<geo::Coordinates>> =
        store.firms.iter().map(|f| (f.id, f.zip.as_deref().and_then(|z| resolver.resolve(z)))).collect();
    let company_zip: std::collections::BTreeMap<crate::store::CompanyId, Option<geo::Coordinates>> =
        store.companies.iter().map(|c| (c.id, c.zip.as_deref().and_then(|z| resolver.resolve(z)))).collect();

    save(out, GEO_ZIP_FILE, &firm_zip)?;
    save(out, GEO_COMPANY_ZIP_FILE, &company_zip)?;
    tracing::info!(resolved = resolver.len(), "geo resolution complete");
    Ok(())
}

fn run_graph(store_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let Some(years) = store.years else {
        save(out, GRAPHS_FILE, &std::collections::BTreeMap::<i32, graph::YearGraph>::new())?;
        return Ok(());
    };
    let graphs: std::collections::BTreeMap<i32, graph::YearGraph> = years
        .iter()
        .map(|year| (year, graph::build_year_graph(&store.rounds, year, config.window_years, config.edge_cutpoint)))
        .collect();
    save(out, GRAPHS_FILE, &graphs)?;
    Ok(())
}

fn run_centrality(_store_dir: &Path, graphs_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let graphs: std::collections::BTreeMap<i32, graph::YearGraph> = load(graphs_dir, GRAPHS_FILE)?;
    let mut log = crate::error::DegradationLog::default();
    let centralities: std::collections::BTreeMap<i32, graph::GraphCentralities> = graphs
        .iter()
        .map(|(&year, g)| (year, graph::compute_centrality(g, config, &mut log)))
        .collect();
    save(out, CENTRALITY_FILE, &centralities)?;
    save(out, "degradation_log.bin", &log)?;
    Ok(())
}

fn run_copartner(store_dir: &Path, geo_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let firm_zip: std::collections::BTreeMap<FirmId, Option<geo::Coordinates>> = load(geo_dir, GEO_ZIP_FILE)?;
    let company_zip: std::collections::BTreeMap<crate::store::CompanyId, Option<geo::Coordinates>> =
        load(geo_dir, GEO_COMPANY_ZIP_FILE)?;

    let firm_zip_fn = |firm_id: FirmId| firm_zip.get(&firm_id).copied().flatten();
    let company_zip_fn = |company_id: crate::store::CompanyId| company_zip.get(&company_id).copied().flatten();

    let geo_dist_copartner = copartner::firm_pair_distances(&store.rounds, &firm_zip_fn, config);
    let geo_dist_company = copartner::firm_company_distances(&store.rounds, &firm_zip_fn, &company_zip_fn);

    save(out, GEO_DIST_COPARTNER_FILE, &geo_dist_copartner)?;
    save(out, GEO_DIST_COMPANY_FILE, &geo_dist_company)?;
    Ok(())
}

fn run_performance(store_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let performance_rows = performance::compute(&store.rounds, &store.companies, config);
    save(out, PERFORMANCE_FILE, &performance_rows)?;
    Ok(())
}

fn run_reputation(store_dir: &Path, out: &Path) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let target_keys = firm_metrics::all_target_keys(&store);
    let inputs = reputation::compute_inputs(&store, &target_keys);
    let rows = reputation::compose(&inputs);
    save(out, REPUTATION_INPUTS_FILE, &inputs)?;
    save(out, REPUTATION_ROWS_FILE, &rows)?;
    Ok(())
}

fn run_market(store_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let market_rows = market::compute(&store, &config.us_nation_code);
    save(out, MARKET_FILE, &market_rows)?;
    Ok(())
}

fn run_firm_metrics(store_dir: &Path, out: &Path) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let target_keys = firm_metrics::all_target_keys(&store);
    let metrics = firm_metrics::compute_firm_year_metrics(&store, &target_keys);
    let hq_dummies = firm_metrics::compute_hq_dummies(&store);
    save(out, FIRM_METRICS_FILE, &metrics)?;
    save(out, HQ_DUMMIES_FILE, &hq_dummies)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_imprinting(
    store_dir: &Path,
    graphs_dir: &Path,
    centrality_dir: &Path,
    firm_metrics_dir: &Path,
    market_dir: &Path,
    out: &Path,
    config: &Config,
) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let graphs: std::collections::BTreeMap<i32, graph::YearGraph> = load(graphs_dir, GRAPHS_FILE)?;
    let centralities: std::collections::BTreeMap<i32, graph::GraphCentralities> = load(centrality_dir, CENTRALITY_FILE)?;
    let metrics: std::collections::BTreeMap<(FirmId, i32), firm_metrics::FirmYearMetrics> =
        load(firm_metrics_dir, FIRM_METRICS_FILE)?;
    let market_rows: std::collections::BTreeMap<i32, market::MarketRow> = load(market_dir, MARKET_FILE)?;

    let rows = imprinting::compute(&store, &graphs, &centralities, &metrics, &market_rows, config);
    save(out, IMPRINTING_FILE, &rows)?;
    Ok(())
}

fn run_leadvc(store_dir: &Path, out: &Path, config: &Config) -> PanelResult<()> {
    let store: CanonicalStore = load(store_dir, STORE_FILE)?;
    let lead_vcs = leadvc::compute(&store.rounds, config);
    save(out, LEADVC_FILE, &lead_vcs)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_all(
    firms: &Path,
    companies: &Path,
    rounds: &Path,
    funds: Option<&Path>,
    geo_table: &Path,
    out: &Path,
    format: OutputFormat,
    config: &Config,
) -> PanelResult<()> {
    let mut log = crate::error::DegradationLog::default();
    let raw_firms = ingest::read_firms(firms)?;
    let raw_companies = ingest::read_companies(companies, &mut log)?;
    let raw_rounds = ingest::read_rounds(rounds, &mut log)?;
    let raw_funds = funds.map(|p| ingest::read_funds(p, &mut log)).transpose()?;
    let geo_table = ingest::read_geo_table(geo_table)?;

    let inputs = pipeline::PipelineInputs { raw_firms, raw_companies, raw_rounds, raw_funds, geo_table };
    let cancel = AtomicBool::new(false);
    let output = pipeline::run(inputs, config, &cancel)?;
    log.merge(&output.degradation_log);

    let panel_inputs = panel::PanelInputs {
        store: &output.store,
        firm_metrics: &output.firm_metrics,
        hq_dummies: &output.hq_dummies,
        performance: &output.performance,
        centralities: &output.centralities,
        reputation_rows: &output.reputation_rows,
        reputation_inputs: &output.reputation_inputs,
        market: &output.market,
        geo_dist_company: &output.geo_dist_company,
        geo_dist_copartner: &output.geo_dist_copartner,
    };
    let rows = panel::assemble(&panel_inputs);
    let mut df = panel::to_dataframe(&rows)?;

    std::fs::create_dir_all(out).map_err(|e| PanelError::Io(IoError::WriterCreation(out.display().to_string(), e.to_string())))?;
    let extension = match format {
        OutputFormat::Csv => "csv",
        OutputFormat::Parquet => "parquet",
    };
    let panel_path = out.join(format!("panel.{extension}"));
    panel::write_panel(&mut df, &panel_path)?;

    let initial_rows = panel::assemble_initial_period(&output.store, &output.imprinting);
    tracing::info!(
        rows = rows.len(),
        initial_rows = initial_rows.len(),
        lead_vcs = output.lead_vcs.len(),
        degradation = ?log,
        "pipeline run complete"
    );
    Ok(())
}
