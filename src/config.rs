//! Pipeline configuration: the tunable knobs enumerated in spec.md §6, plus
//! the open-question decisions recorded in DESIGN.md. A `Config` is loaded
//! from an optional JSON file and then overlaid with CLI flags (CLI wins),
//! mirroring the file-then-flags merge used by the example CLI this crate's
//! own CLI is modeled on.

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PanelResult};

/// How the performance engine's lookback window is bounded relative to the
/// target year `t` (spec.md §9, open question 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum PerformanceWindowMode {
    /// `[t-L, t]`, both ends inclusive.
    Inclusive,
    /// `[t-L, t)`: excludes the current year when `L>0`. This reproduces
    /// the original source's asymmetric behavior and is the default.
    HalfOpen,
}

/// Which identifier groups rounds into a "deal" for the co-partner pair
/// engine (spec.md §9, open question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum DealKey {
    /// `(company_id, year)`, the contract fixed by spec.md.
    CompanyYear,
    /// A caller-supplied stable round identifier, when available.
    RoundId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // --- §4.3/§4.4 windows ---
    pub window_years: u32,
    pub edge_cutpoint: u32,
    pub imprinting_period: u32,

    // --- §4.5 centrality ---
    pub betweenness_k: usize,
    pub use_approximate_betweenness: bool,
    pub power_beta_values: Vec<f64>,
    pub normalize_degree: bool,
    pub normalize_betweenness: bool,
    pub normalize_power: bool,
    pub normalize_constraint: bool,
    pub use_weighted_degree: bool,
    pub use_weighted_betweenness: bool,
    pub use_weighted_power: bool,
    pub use_weighted_constraint: bool,
    pub constraint_fill_na: bool,
    pub constraint_cap_at_one: bool,

    // --- §4.7 performance ---
    pub lookback_years: u32,
    pub performance_window_mode: PerformanceWindowMode,

    // --- §4.6 co-partner ---
    pub deal_key: DealKey,

    // --- §4.9 market ---
    pub us_nation_code: String,

    // --- §5 concurrency ---
    pub parallel_workers: usize,
    pub random_seed: u64,

    // --- C11 lead-VC (supplemented, DESIGN.md §D) ---
    pub leadvc_first_round_weight: f64,
    pub leadvc_investment_ratio_weight: f64,
    pub leadvc_total_amount_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_years: 5,
            edge_cutpoint: 1,
            imprinting_period: 3,

            betweenness_k: 500,
            use_approximate_betweenness: true,
            power_beta_values: vec![0.0, 0.75, 0.99],
            normalize_degree: false,
            normalize_betweenness: true,
            normalize_power: true,
            normalize_constraint: false,
            use_weighted_degree: false,
            use_weighted_betweenness: false,
            use_weighted_power: false,
            use_weighted_constraint: false,
            constraint_fill_na: true,
            constraint_cap_at_one: true,

            lookback_years: 0,
            performance_window_mode: PerformanceWindowMode::HalfOpen,

            deal_key: DealKey::CompanyYear,

            us_nation_code: "US".to_string(),

            parallel_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            random_seed: 123,

            leadvc_first_round_weight: 3.0,
            leadvc_investment_ratio_weight: 2.0,
            leadvc_total_amount_weight: 1.0,
        }
    }
}

/// CLI-flag overlay for [`Config`] (spec.md §C: "overridable by CLI flags
/// (`clap::Args`, merged over the file-loaded config — CLI wins)"). Every
/// field is optional so an absent flag leaves the file-loaded (or
/// default) value untouched; `#[command(flatten)]` onto [`super::cli::Cli`]
/// puts these alongside the stage subcommands, mirroring the example
/// CLI's file-then-flags merge.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    #[arg(long)]
    pub window_years: Option<u32>,
    #[arg(long)]
    pub edge_cutpoint: Option<u32>,
    #[arg(long)]
    pub imprinting_period: Option<u32>,

    #[arg(long)]
    pub betweenness_k: Option<usize>,
    #[arg(long)]
    pub use_approximate_betweenness: Option<bool>,
    #[arg(long, value_delimiter = ',')]
    pub power_beta_values: Option<Vec<f64>>,
    #[arg(long)]
    pub normalize_degree: Option<bool>,
    #[arg(long)]
    pub normalize_betweenness: Option<bool>,
    #[arg(long)]
    pub normalize_power: Option<bool>,
    #[arg(long)]
    pub normalize_constraint: Option<bool>,
    #[arg(long)]
    pub use_weighted_degree: Option<bool>,
    #[arg(long)]
    pub use_weighted_betweenness: Option<bool>,
    #[arg(long)]
    pub use_weighted_power: Option<bool>,
    #[arg(long)]
    pub use_weighted_constraint: Option<bool>,
    #[arg(long)]
    pub constraint_fill_na: Option<bool>,
    #[arg(long)]
    pub constraint_cap_at_one: Option<bool>,

    #[arg(long)]
    pub lookback_years: Option<u32>,
    #[arg(long, value_enum)]
    pub performance_window_mode: Option<PerformanceWindowMode>,

    #[arg(long, value_enum)]
    pub deal_key: Option<DealKey>,

    #[arg(long)]
    pub us_nation_code: Option<String>,

    #[arg(long)]
    pub parallel_workers: Option<usize>,
    #[arg(long)]
    pub random_seed: Option<u64>,

    #[arg(long)]
    pub leadvc_first_round_weight: Option<f64>,
    #[arg(long)]
    pub leadvc_investment_ratio_weight: Option<f64>,
    #[arg(long)]
    pub leadvc_total_amount_weight: Option<f64>,
}

impl Config {
    /// Overlays every `Some` field of `overrides` onto `self` (CLI wins).
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        macro_rules! overlay {
            ($field:ident) => {
                if let Some(value) = overrides.$field.clone() {
                    self.$field = value;
                }
            };
        }
        overlay!(window_years);
        overlay!(edge_cutpoint);
        overlay!(imprinting_period);
        overlay!(betweenness_k);
        overlay!(use_approximate_betweenness);
        overlay!(power_beta_values);
        overlay!(normalize_degree);
        overlay!(normalize_betweenness);
        overlay!(normalize_power);
        overlay!(normalize_constraint);
        overlay!(use_weighted_degree);
        overlay!(use_weighted_betweenness);
        overlay!(use_weighted_power);
        overlay!(use_weighted_constraint);
        overlay!(constraint_fill_na);
        overlay!(constraint_cap_at_one);
        overlay!(lookback_years);
        overlay!(performance_window_mode);
        overlay!(deal_key);
        overlay!(us_nation_code);
        overlay!(parallel_workers);
        overlay!(random_seed);
        overlay!(leadvc_first_round_weight);
        overlay!(leadvc_investment_ratio_weight);
        overlay!(leadvc_total_amount_weight);
    }

    pub fn from_json_file(path: &Path) -> PanelResult<Self> {
        let text = std::fs::read_to_string(path).map_err(crate::error::IoError::Io)?;
        let cfg: Config = serde_json::from_str(&text).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PanelResult<()> {
        if self.window_years == 0 {
            return Err(ConfigError::Invalid("window_years must be >= 1".into()).into());
        }
        if self.imprinting_period == 0 {
            return Err(ConfigError::Invalid("imprinting_period must be >= 1".into()).into());
        }
        if self.power_beta_values.iter().any(|b| !(0.0..1.0).contains(b)) {
            return Err(ConfigError::Invalid(
                "power_beta_values must be fractions of 1/lambda_max in [0, 1)".into(),
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.window_years, 5);
        assert_eq!(cfg.edge_cutpoint, 1);
        assert_eq!(cfg.imprinting_period, 3);
        assert_eq!(cfg.betweenness_k, 500);
        assert!(cfg.use_approximate_betweenness);
        assert_eq!(cfg.power_beta_values, vec![0.0, 0.75, 0.99]);
        assert_eq!(cfg.lookback_years, 0);
        assert_eq!(cfg.us_nation_code, "US");
        assert_eq!(cfg.random_seed, 123);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_only_touch_fields_that_were_set() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            window_years: Some(7),
            us_nation_code: Some("DE".into()),
            ..Default::default()
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.window_years, 7);
        assert_eq!(cfg.us_nation_code, "DE");
        // Untouched fields keep their default.
        assert_eq!(cfg.edge_cutpoint, 1);
        assert_eq!(cfg.random_seed, 123);
    }
}
