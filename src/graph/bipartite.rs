//! Bipartite projector (C4, spec.md §4.4): projects the firm↔deal
//! bipartite relation for a target year's lookback window into a
//! weighted firm–firm co-investment graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::sorted_vec_map::SortedVecMap;
use crate::store::{FirmId, Round};

/// Immutable sparse weighted undirected graph for one analysis year.
/// Adjacency is kept in [`SortedVecMap`] per node so iteration order is
/// deterministic (spec.md §5: "centrality output row order is
/// firm-id-ascending for deterministic test output").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearGraph {
    pub year: i32,
    nodes: Vec<FirmId>,
    adjacency: BTreeMap<FirmId, SortedVecMap<FirmId, u32>>,
}

impl YearGraph {
    /// Firm ids present in this graph, ascending.
    pub fn nodes(&self) -> &[FirmId] {
        &self.nodes
    }

    pub fn contains(&self, firm_id: FirmId) -> bool {
        self.adjacency.contains_key(&firm_id)
    }

    pub fn degree(&self, firm_id: FirmId) -> usize {
        self.adjacency.get(&firm_id).map_or(0, SortedVecMap::len)
    }

    pub fn weighted_degree(&self, firm_id: FirmId) -> u32 {
        self.adjacency
            .get(&firm_id)
            .map_or(0, |neighbors| neighbors.iter().map(|(_, w)| *w).sum())
    }

    pub fn neighbors(&self, firm_id: FirmId) -> impl Iterator<Item = (FirmId, u32)> + '_ {
        self.adjacency
            .get(&firm_id)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(|(id, w)| (*id, *w)))
    }

    pub fn weight(&self, u: FirmId, v: FirmId) -> Option<u32> {
        self.adjacency.get(&u)?.get(&v).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(SortedVecMap::len).sum::<usize>() / 2
    }
}

/// Builds `G_t`: the window is `[t-W, t-1]`, edges below `kappa` are
/// dropped along with any node left with no remaining edges, and no
/// self-loops are ever emitted (spec.md §4.4).
pub fn build_year_graph(rounds: &[Round], target_year: i32, window: u32, kappa: u32) -> YearGraph {
    let start = target_year - window as i32;
    let end = target_year - 1;

    let mut deals: BTreeMap<(crate::store::CompanyId, i32), BTreeSet<FirmId>> = BTreeMap::new();
    for round in rounds {
        if round.year < start || round.year > end {
            continue;
        }
        deals
            .entry((round.company_id, round.year))
            .or_default()
            .insert(round.firm_id);
    }

    let mut weights: BTreeMap<(FirmId, FirmId), u32> = BTreeMap::new();
    for participants in deals.values() {
        if participants.len() < 2 {
            continue;
        }
        let ordered: Vec<FirmId> = participants.iter().copied().collect();
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                let (u, v) = (ordered[i], ordered[j]);
                debug_assert!(u != v);
                *weights.entry((u, v)).or_insert(0) += 1;
            }
        }
    }

    let mut adjacency: BTreeMap<FirmId, SortedVecMap<FirmId, u32>> = BTreeMap::new();
    for ((u, v), w) in weights {
        if w < kappa {
            continue;
        }
        adjacency.entry(u).or_default().insert(v, w);
        adjacency.entry(v).or_default().insert(u, w);
    }

    // Nodes with no remaining edges after kappa-filtering are dropped
    // (spec.md §4.4); an entry with an empty SortedVecMap only arises if
    // every incident edge was below kappa, which never inserts an entry
    // above, so this retain is defensive rather than load-bearing.
    adjacency.retain(|_, neighbors| !neighbors.is_empty());

    let nodes: Vec<FirmId> = adjacency.keys().copied().collect();

    YearGraph {
        year: target_year,
        nodes,
        adjacency,
    }
}
