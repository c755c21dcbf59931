//! Centrality engine (C5, spec.md §4.5): degree, betweenness, Bonacich
//! power, Burt constraint and ego density over a single year's graph.

use std::collections::{BTreeMap, BinaryHeap};

use ndarray::{Array1, Array2};
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::DegradationLog;
use crate::graph::bipartite::YearGraph;
use crate::store::FirmId;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NodeCentrality {
    pub degree: f64,
    pub betweenness: f64,
    pub constraint: f64,
    pub ego_density: f64,
    /// Bonacich power at β = fraction·λ_max⁻¹ for `config.power_beta_values[0..3]`.
    pub power_p0: f64,
    pub power_p75: f64,
    pub power_p99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCentralities {
    pub year: i32,
    /// `1/λ_max` for this graph, emitted once per year (spec.md §4.5).
    pub inv_lambda_max: f64,
    pub rows: BTreeMap<FirmId, NodeCentrality>,
}

/// Computes all five centrality families for every node in `graph`.
/// Numerical issues in the Bonacich power step never abort the pipeline
/// (spec.md §7): the affected column falls back to `degree * inv_lambda_max`
/// and the fallback is counted in `log`.
pub fn compute(graph: &YearGraph, config: &Config, log: &mut DegradationLog) -> GraphCentralities {
    let n = graph.nodes().len();
    if n == 0 {
        return GraphCentralities {
            year: graph.year,
            inv_lambda_max: 0.0,
            rows: BTreeMap::new(),
        };
    }

    let degree = degree_centrality(graph, config);
    let betweenness = betweenness_centrality(graph, config);
    let constraint = burt_constraint(graph, config);
    let ego = ego_density(graph);
    let (power, inv_lambda_max) = bonacich_power(graph, config, log);

    let mut rows = BTreeMap::new();
    for &firm_id in graph.nodes() {
        let p = power.get(&firm_id).copied().unwrap_or([0.0, 0.0, 0.0]);
        rows.insert(
            firm_id,
            NodeCentrality {
                degree: degree.get(&firm_id).copied().unwrap_or(0.0),
                betweenness: betweenness.get(&firm_id).copied().unwrap_or(0.0),
                constraint: constraint.get(&firm_id).copied().unwrap_or(0.0),
                ego_density: ego.get(&firm_id).copied().unwrap_or(0.0),
                power_p0: p[0],
                power_p75: p[1],
                power_p99: p[2],
            },
        );
    }

    GraphCentralities {
        year: graph.year,
        inv_lambda_max,
        rows,
    }
}

fn degree_centrality(graph: &YearGraph, config: &Config) -> BTreeMap<FirmId, f64> {
    let n = graph.nodes().len();
    graph
        .nodes()
        .iter()
        .map(|&firm_id| {
            let raw = if config.use_weighted_degree {
                graph.weighted_degree(firm_id) as f64
            } else {
                graph.degree(firm_id) as f64
            };
            let value = if config.normalize_degree && n > 1 {
                raw / (n as f64 - 1.0)
            } else {
                raw
            };
            (firm_id, value)
        })
        .collect()
}

/// Brandes' algorithm, Dijkstra-based so the same code path covers both
/// weighted and unweighted graphs (unweighted uses uniform length 1.0,
/// weighted uses `1/edge_weight` since a heavier co-investment tie is a
/// shorter path).
fn betweenness_centrality(graph: &YearGraph, config: &Config) -> BTreeMap<FirmId, f64> {
    let nodes = graph.nodes();
    let n = nodes.len();
    let mut accum: BTreeMap<FirmId, f64> = nodes.iter().map(|&id| (id, 0.0)).collect();
    if n < 3 {
        return accum;
    }

    let sources: Vec<FirmId> = if n <= config.betweenness_k || !config.use_approximate_betweenness {
        nodes.to_vec()
    } else {
        let mut rng = rand::rngs::StdRng::seed_from_u64(config.random_seed);
        let mut pool = nodes.to_vec();
        pool.shuffle(&mut rng);
        pool.into_iter().take(config.betweenness_k).collect()
    };
    let sample_scale = if sources.len() < n {
        n as f64 / sources.len() as f64
    } else {
        1.0
    };

    for &source in &sources {
        single_source_brandes(graph, source, config.use_weighted_betweenness, &mut accum);
    }

    for value in accum.values_mut() {
        *value *= sample_scale / 2.0; // undirected: each pair counted from both endpoints' perspective
    }

    if config.normalize_betweenness && n > 2 {
        let factor = 2.0 / ((n as f64 - 1.0) * (n as f64 - 2.0));
        for value in accum.values_mut() {
            *value *= factor;
        }
    }

    accum
}

fn single_source_brandes(
    graph: &YearGraph,
    source: FirmId,
    weighted: bool,
    accum: &mut BTreeMap<FirmId, f64>,
) {
    let mut dist: BTreeMap<FirmId, f64> = BTreeMap::new();
    let mut sigma: BTreeMap<FirmId, f64> = BTreeMap::new();
    let mut preds: BTreeMap<FirmId, Vec<FirmId>> = BTreeMap::new();
    let mut order: Vec<FirmId> = Vec::new();

    dist.insert(source, 0.0);
    sigma.insert(source, 1.0);

    let mut heap: BinaryHeap<std::cmp::Reverse<(OrderedFloat<f64>, FirmId)>> = BinaryHeap::new();
    heap.push(std::cmp::Reverse((OrderedFloat(0.0), source)));
    let mut visited: BTreeMap<FirmId, bool> = BTreeMap::new();

    while let Some(std::cmp::Reverse((OrderedFloat(d), u))) = heap.pop() {
        if visited.get(&u).copied().unwrap_or(false) {
            continue;
        }
        visited.insert(u, true);
        order.push(u);

        for (v, weight) in graph.neighbors(u) {
            let length = if weighted { 1.0 / weight as f64 } else { 1.0 };
            let candidate = d + length;
            let existing = dist.get(&v).copied();

            if existing.is_none() || candidate < existing.unwrap() - 1e-12 {
                dist.insert(v, candidate);
                sigma.insert(v, sigma[&u]);
                preds.insert(v, vec![u]);
                heap.push(std::cmp::Reverse((OrderedFloat(candidate), v)));
            } else if (candidate - existing.unwrap()).abs() <= 1e-12 {
                *sigma.entry(v).or_insert(0.0) += sigma[&u];
                preds.entry(v).or_default().push(u);
            }
        }
    }

    let mut delta: BTreeMap<FirmId, f64> = BTreeMap::new();
    for &w in order.iter().rev() {
        for &v in preds.get(&w).into_iter().flatten() {
            let coeff = (sigma[&v] / sigma[&w]) * (1.0 + delta.get(&w).copied().unwrap_or(0.0));
            *delta.entry(v).or_insert(0.0) += coeff;
        }
        if w != source {
            *accum.entry(w).or_insert(0.0) += delta.get(&w).copied().unwrap_or(0.0);
        }
    }
}

fn ego_density(graph: &YearGraph) -> BTreeMap<FirmId, f64> {
    graph
        .nodes()
        .iter()
        .map(|&u| {
            let neighbors: Vec<FirmId> = graph.neighbors(u).map(|(v, _)| v).collect();
            let k = neighbors.len();
            if k < 2 {
                return (u, 0.0);
            }
            let mut edges_among = 0usize;
            for i in 0..neighbors.len() {
                for j in (i + 1)..neighbors.len() {
                    if graph.weight(neighbors[i], neighbors[j]).is_some() {
                        edges_among += 1;
                    }
                }
            }
            let possible = (k * (k - 1)) / 2;
            (u, edges_among as f64 / possible as f64)
        })
        .collect()
}

/// Standard Burt (1992) constraint. Isolates (degree 0, already impossible
/// in a built graph since zero-degree nodes are dropped at projection)
/// are filled with 0 defensively; values above 1.0 from numeric overshoot
/// in complete cliques are capped when `constraint_cap_at_one`.
fn burt_constraint(graph: &YearGraph, config: &Config) -> BTreeMap<FirmId, f64> {
    graph
        .nodes()
        .iter()
        .map(|&i| {
            let neighbors_i: Vec<(FirmId, f64)> = graph
                .neighbors(i)
                .map(|(j, w)| (j, if config.use_weighted_constraint { w as f64 } else { 1.0 }))
                .collect();
            let total_i: f64 = neighbors_i.iter().map(|(_, w)| w).sum();
            if total_i == 0.0 {
                return (i, 0.0);
            }

            let mut constraint = 0.0;
            for &(j, w_ij) in &neighbors_i {
                let p_ij = w_ij / total_i;

                let mut indirect = 0.0;
                for &(q, w_iq) in &neighbors_i {
                    if q == j {
                        continue;
                    }
                    let p_iq = w_iq / total_i;
                    let w_qj = if config.use_weighted_constraint {
                        graph.weight(q, j).map(|w| w as f64).unwrap_or(0.0)
                    } else if graph.weight(q, j).is_some() {
                        1.0
                    } else {
                        0.0
                    };
                    let total_q: f64 = graph
                        .neighbors(q)
                        .map(|(_, w)| if config.use_weighted_constraint { w as f64 } else { 1.0 })
                        .sum();
                    if total_q > 0.0 {
                        indirect += p_iq * (w_qj / total_q);
                    }
                }

                let c_ij = (p_ij + indirect).powi(2);
                constraint += c_ij;
            }

            let value = if config.constraint_cap_at_one {
                constraint.min(1.0)
            } else {
                constraint
            };
            (i, value)
        })
        .collect()
}

/// Solves `c = (I - βA)⁻¹ A·1` for every β in `config.power_beta_values`
/// (interpreted as fractions of `λ_max⁻¹`), via a hand-rolled
/// Gauss-Jordan solve over a dense adjacency matrix — these graphs are
/// small enough per spec.md §5's resource ceiling that a dependency on an
/// external linear-algebra backend isn't warranted.
fn bonacich_power(
    graph: &YearGraph,
    config: &Config,
    log: &mut DegradationLog,
) -> (BTreeMap<FirmId, [f64; 3]>, f64) {
    let nodes = graph.nodes();
    let n = nodes.len();
    let index_of: BTreeMap<FirmId, usize> = nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut a = Array2::<f64>::zeros((n, n));
    for &u in nodes {
        let ui = index_of[&u];
        for (v, w) in graph.neighbors(u) {
            let vi = index_of[&v];
            a[[ui, vi]] = if config.use_weighted_power { w as f64 } else { 1.0 };
        }
    }

    let lambda_max = spectral_radius(&a);
    let inv_lambda_max = if lambda_max > 1e-12 { 1.0 / lambda_max } else { 0.0 };

    let ones = Array1::<f64>::ones(n);
    let a_ones = a.dot(&ones);

    let degree_fallback: Vec<f64> = nodes
        .iter()
        .map(|&id| {
            if config.use_weighted_power {
                graph.weighted_degree(id) as f64
            } else {
                graph.degree(id) as f64
            }
        })
        .collect();

    let mut per_beta: Vec<Vec<f64>> = Vec::with_capacity(3);
    for &fraction in config.power_beta_values.iter().take(3) {
        let clamped_fraction = if fraction.abs() >= 1.0 { 0.99 } else { fraction };
        let beta = clamped_fraction * inv_lambda_max;

        let c = solve_bonacich(&a, beta, &a_ones).unwrap_or_else(|| {
            log.bonacich_fallbacks_to_degree += n as u64;
            degree_fallback.iter().map(|d| d * inv_lambda_max).collect()
        });
        per_beta.push(c);
    }
    while per_beta.len() < 3 {
        per_beta.push(degree_fallback.iter().map(|d| d * inv_lambda_max).collect());
    }

    if config.normalize_power {
        for column in per_beta.iter_mut() {
            let max = column.iter().cloned().fold(0.0_f64, f64::max);
            if max > 1e-12 {
                for value in column.iter_mut() {
                    *value /= max;
                }
            }
        }
    }

    let mut rows = BTreeMap::new();
    for (i, &firm_id) in nodes.iter().enumerate() {
        rows.insert(firm_id, [per_beta[0][i], per_beta[1][i], per_beta[2][i]]);
    }
    (rows, inv_lambda_max)
}

/// Power iteration for the dominant eigenvalue magnitude.
fn spectral_radius(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    if n == 0 {
        return 0.0;
    }
    let mut v = Array1::<f64>::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut eigenvalue = 0.0;
    for _ in 0..200 {
        let mut next = a.dot(&v);
        let norm = next.dot(&next).sqrt();
        if norm < 1e-15 {
            return 0.0;
        }
        next.mapv_inplace(|x| x / norm);
        eigenvalue = next.dot(&a.dot(&next));
        if (next.clone() - &v).mapv(f64::abs).sum() < 1e-10 {
            v = next;
            break;
        }
        v = next;
    }
    eigenvalue.abs()
}

/// Solves `(I - βA) c = rhs` via Gauss-Jordan elimination with partial
/// pivoting. Returns `None` on a singular/ill-conditioned system.
fn solve_bonacich(a: &Array2<f64>, beta: f64, rhs: &Array1<f64>) -> Option<Vec<f64>> {
    let n = a.nrows();
    let mut m = Array2::<f64>::eye(n) - beta * a;
    let mut b = rhs.clone();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = m[[col, col]].abs();
        for row in (col + 1)..n {
            if m[[row, col]].abs() > pivot_val {
                pivot_val = m[[row, col]].abs();
                pivot_row = row;
            }
        }
        if pivot_val < 1e-10 {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                m.swap([col, k], [pivot_row, k]);
            }
            b.swap(col, pivot_row);
        }

        let pivot = m[[col, col]];
        for k in 0..n {
            m[[col, k]] /= pivot;
        }
        b[col] /= pivot;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    Some(b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::bipartite::build_year_graph;
    use crate::store::{CompanyId, Round};
    use chrono::NaiveDate;

    fn round(firm: u32, company: u32, year: i32) -> Round {
        Round {
            firm_id: FirmId(firm),
            company_id: CompanyId(company),
            round_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            year,
            round_number: 1,
            amount_disclosed: None,
            amount_estimated: None,
            stage_level_1: None,
        }
    }

    #[test]
    fn triangle_has_degree_two_betweenness_zero_constraint_one() {
        let rounds = vec![round(0, 0, 2010), round(1, 0, 2010), round(2, 0, 2010)];
        let graph = build_year_graph(&rounds, 2011, 5, 1);
        let config = Config::default();
        let mut log = DegradationLog::default();
        let result = compute(&graph, &config, &mut log);

        for firm in [FirmId(0), FirmId(1), FirmId(2)] {
            let row = result.rows[&firm];
            assert_eq!(row.degree, 2.0);
            assert!(row.betweenness.abs() < 1e-6);
            assert!((row.constraint - 1.0).abs() < 1e-6);
            assert!((row.ego_density - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn disjoint_pairs_have_degree_one_and_zero_ego_density() {
        let rounds = vec![round(0, 0, 2010), round(1, 0, 2010), round(2, 1, 2010), round(3, 1, 2010)];
        let graph = build_year_graph(&rounds, 2011, 5, 1);
        let mut config = Config::default();
        config.normalize_power = false;
        let mut log = DegradationLog::default();
        let result = compute(&graph, &config, &mut log);

        for firm in [FirmId(0), FirmId(1), FirmId(2), FirmId(3)] {
            let row = result.rows[&firm];
            assert_eq!(row.degree, 1.0);
            assert!(row.ego_density.abs() < 1e-9);
        }
        // beta=0 power equals degree; inv_lambda_max for a disjoint-pair
        // graph (each component a single edge) is 1.
        assert!((result.inv_lambda_max - 1.0).abs() < 1e-6);
        for firm in [FirmId(0), FirmId(1), FirmId(2), FirmId(3)] {
            assert!((result.rows[&firm].power_p0 - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_graph_yields_no_rows() {
        let graph = build_year_graph(&[], 2011, 5, 1);
        let config = Config::default();
        let mut log = DegradationLog::default();
        let result = compute(&graph, &config, &mut log);
        assert!(result.rows.is_empty());
    }
}
