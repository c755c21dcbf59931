//! Temporal bipartite projection and centrality (C4/C5, spec.md §4.4–§4.5).

pub mod bipartite;
pub mod centrality;

pub use bipartite::{build_year_graph, YearGraph};
pub use centrality::{compute as compute_centrality, GraphCentralities, NodeCentrality};
