use thiserror::Error;

pub type PanelResult<T> = Result<T, PanelError>;

/// Top-level error type for the panel pipeline.
///
/// Mirrors the three-kind contract of spec.md §7: `Fatal` conditions are
/// represented as `Err` variants here and abort the pipeline; `Degradation`
/// and per-row-anomaly outcomes never produce an `Err` — they are recorded
/// in [`DegradationLog`] and the affected output is filled with its
/// documented default.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pipeline run was cancelled")]
    Cancelled,
}

/// Errors from ingesting and normalizing the canonical store (C1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("required column '{column}' missing from table '{table}'")]
    MissingRequiredColumn { table: String, column: String },

    #[error("table '{table}' could not be read: {reason}")]
    Unreadable { table: String, reason: String },

    #[error("invalid round number '{0}': must be a non-negative integer")]
    InvalidRoundNumber(String),

    #[error("invalid situation string: '{0}'")]
    InvalidSituation(String),

    #[error("unparseable date '{0}'")]
    UnparseableDate(String),
}

/// Errors from the geographic resolver (C2).
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("postal code '{0}' is not representable as a whole number")]
    NotNumeric(String),

    #[error("normalized postal code '{0}' does not have 5 digits")]
    InvalidLength(String),
}

/// Errors from graph construction and centrality (C4/C5).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(
        "power iteration did not converge for graph at year {year} after {iterations} iterations"
    )]
    PowerIterationDidNotConverge { year: i32, iterations: usize },

    #[error("singular system while solving Bonacich power for year {year}: {reason}")]
    SingularSystem { year: i32, reason: String },
}

/// Errors from reading/writing tables and the final panel.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize stage cache")]
    Postcard(#[from] postcard::Error),

    #[error("failed to read/write data frame: {0}")]
    DataFrame(String),

    #[error("failed to create writer for '{0}': {1}")]
    WriterCreation(String, String),

    #[error("unsupported output format: '{0}'")]
    UnsupportedFormat(String),
}

/// Errors from loading or merging configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Counts of degradation-kind and per-row-anomaly outcomes encountered
/// during a pipeline run (spec.md §7). Never aborts the pipeline; attached
/// to the run result so callers can decide whether to warn.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct DegradationLog {
    pub dropped_undisclosed_firms: u64,
    pub dropped_undisclosed_companies: u64,
    pub dropped_duplicate_rounds: u64,
    pub dropped_firms_missing_founding_and_zip: u64,
    pub unresolved_zip_lookups: u64,
    pub missing_fund_table: bool,
    pub unparseable_dates: u64,
    pub negative_firm_ages_clamped: u64,
    pub bonacich_fallbacks_to_degree: u64,
}

impl DegradationLog {
    pub fn merge(&mut self, other: &DegradationLog) {
        self.dropped_undisclosed_firms += other.dropped_undisclosed_firms;
        self.dropped_undisclosed_companies += other.dropped_undisclosed_companies;
        self.dropped_duplicate_rounds += other.dropped_duplicate_rounds;
        self.dropped_firms_missing_founding_and_zip +=
            other.dropped_firms_missing_founding_and_zip;
        self.unresolved_zip_lookups += other.unresolved_zip_lookups;
        self.missing_fund_table = self.missing_fund_table || other.missing_fund_table;
        self.unparseable_dates += other.unparseable_dates;
        self.negative_firm_ages_clamped += other.negative_firm_ages_clamped;
        self.bonacich_fallbacks_to_degree += other.bonacich_fallbacks_to_degree;
    }
}
