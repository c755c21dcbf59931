//! Rolling-window aggregator (C3, spec.md §4.3). A single sorted pass per
//! firm with a two-pointer sliding window, not the per-target-year full
//! rescan the design notes (§9) warn against.

use std::collections::{HashMap, HashSet};

use crate::store::FirmId;

/// Inclusive-both-ends window `[t-W+1, t]`.
fn window_start(target_year: i32, window: u32) -> i32 {
    target_year - window as i32 + 1
}

/// Sum and count over `[t-W+1, t]` for every requested `(firm_id,
/// target_year)` key. `rows` need not be pre-sorted; this groups by firm
/// internally and sorts each firm's years once, giving O(N log N) overall
/// and O(1) amortized per target year within a firm (spec.md §4.3:
/// "O(N) two-pointer sweep ... rather than O(N·Y) nested loops").
pub fn rolling_sum_and_count(
    rows: &[(FirmId, i32, f64)],
    target_keys: &[(FirmId, i32)],
    window: u32,
) -> HashMap<(FirmId, i32), (f64, u64)> {
    let mut by_firm: HashMap<FirmId, Vec<(i32, f64)>> = HashMap::new();
    for &(firm_id, year, value) in rows {
        by_firm.entry(firm_id).or_default().push((year, value));
    }
    for years in by_firm.values_mut() {
        years.sort_by_key(|&(year, _)| year);
    }

    let mut targets_by_firm: HashMap<FirmId, Vec<i32>> = HashMap::new();
    for &(firm_id, year) in target_keys {
        targets_by_firm.entry(firm_id).or_default().push(year);
    }

    let mut out = HashMap::with_capacity(target_keys.len());
    for (firm_id, mut targets) in targets_by_firm {
        targets.sort_unstable();
        let years = by_firm.get(&firm_id).map(Vec::as_slice).unwrap_or(&[]);

        let mut lo = 0usize; // first index still inside the window
        let mut hi = 0usize; // first index not yet included
        let mut running_sum = 0.0f64;
        let mut running_count = 0u64;

        for target_year in targets {
            let start = window_start(target_year, window);

            while hi < years.len() && years[hi].0 <= target_year {
                running_sum += years[hi].1;
                running_count += 1;
                hi += 1;
            }
            while lo < hi && years[lo].0 < start {
                running_sum -= years[lo].1;
                running_count -= 1;
                lo += 1;
            }

            out.insert((firm_id, target_year), (running_sum, running_count));
        }
    }
    out
}

/// Unique-count of a third column within `[t-W+1, t]`, per
/// `(firm_id, target_year)`. Uses a per-firm ring of `year -> set`
/// (spec.md §4.3) rather than recomputing the set from scratch per
/// target year.
pub fn rolling_unique_count<K>(
    rows: &[(FirmId, i32, K)],
    target_keys: &[(FirmId, i32)],
    window: u32,
) -> HashMap<(FirmId, i32), u64>
where
    K: std::hash::Hash + Eq + Clone,
{
    let mut by_firm: HashMap<FirmId, Vec<(i32, K)>> = HashMap::new();
    for (firm_id, year, key) in rows {
        by_firm.entry(*firm_id).or_default().push((*year, key.clone()));
    }
    for years in by_firm.values_mut() {
        years.sort_by_key(|&(year, _)| year);
    }

    let mut targets_by_firm: HashMap<FirmId, Vec<i32>> = HashMap::new();
    for &(firm_id, year) in target_keys {
        targets_by_firm.entry(firm_id).or_default().push(year);
    }

    let mut out = HashMap::with_capacity(target_keys.len());
    for (firm_id, mut targets) in targets_by_firm {
        targets.sort_unstable();
        let years = by_firm.get(&firm_id).map(Vec::as_slice).unwrap_or(&[]);

        // ring: year -> per-year key set, plus a running total count so a
        // unique element that recurs across years in the window is only
        // counted once.
        let mut ring: HashMap<i32, HashSet<K>> = HashMap::new();
        let mut counts: HashMap<K, u32> = HashMap::new();
        let mut lo = 0usize;
        let mut hi = 0usize;

        for target_year in targets {
            let start = window_start(target_year, window);

            while hi < years.len() && years[hi].0 <= target_year {
                let (year, ref key) = years[hi];
                if ring.entry(year).or_default().insert(key.clone()) {
                    *counts.entry(key.clone()).or_insert(0) += 1;
                }
                hi += 1;
            }
            while lo < hi && years[lo].0 < start {
                let (year, ref key) = years[lo];
                if let Some(set) = ring.get_mut(&year) {
                    if set.remove(key) {
                        if let Some(c) = counts.get_mut(key) {
                            *c -= 1;
                            if *c == 0 {
                                counts.remove(key);
                            }
                        }
                    }
                }
                lo += 1;
            }

            out.insert((firm_id, target_year), counts.len() as u64);
        }
    }
    out
}

/// "Still open at t" mean fund size per `(firm_id, target_year)` (spec.md
/// §4.3). Returns `None` when a firm has no fund open at `t`, which the
/// caller treats as 0 plus `missing_fund_data = true` (spec.md §4.8).
pub fn still_open_fund_mean(
    funds: &[crate::store::Fund],
    target_keys: &[(FirmId, i32)],
) -> HashMap<(FirmId, i32), Option<f64>> {
    let mut by_firm: HashMap<FirmId, Vec<&crate::store::Fund>> = HashMap::new();
    for fund in funds {
        by_firm.entry(fund.firm_id).or_default().push(fund);
    }

    target_keys
        .iter()
        .map(|&(firm_id, target_year)| {
            let open: Vec<f64> = by_firm
                .get(&firm_id)
                .into_iter()
                .flatten()
                .filter(|f| f.is_open_at(target_year))
                .filter_map(|f| f.fund_size)
                .collect();
            let value = if open.is_empty() {
                None
            } else {
                Some(open.iter().sum::<f64>() / open.len() as f64)
            };
            ((firm_id, target_year), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn rolling_sum_matches_full_rescan() {
        let rows = vec![
            (FirmId(0), 2015, 10.0),
            (FirmId(0), 2016, 20.0),
            (FirmId(0), 2017, 5.0),
        ];
        let targets = vec![(FirmId(0), 2019)];
        let result = rolling_sum_and_count(&rows, &targets, 5);
        // window [2015, 2019] inclusive covers all three rows.
        assert_eq!(result[&(FirmId(0), 2019)], (35.0, 3));
    }

    #[test]
    fn rolling_sum_excludes_years_outside_window() {
        let rows = vec![(FirmId(0), 2010, 100.0), (FirmId(0), 2016, 1.0)];
        let targets = vec![(FirmId(0), 2016)];
        // window [2012, 2016] excludes the 2010 row.
        let result = rolling_sum_and_count(&rows, &targets, 5);
        assert_eq!(result[&(FirmId(0), 2016)], (1.0, 1));
    }

    #[test]
    fn rolling_unique_count_counts_distinct_companies_once() {
        let rows = vec![
            (FirmId(0), 2015, 7u32),
            (FirmId(0), 2016, 7u32),
            (FirmId(0), 2017, 9u32),
        ];
        let targets = vec![(FirmId(0), 2019)];
        let result = rolling_unique_count(&rows, &targets, 5);
        assert_eq!(result[&(FirmId(0), 2019)], 2);
    }

    #[test]
    fn still_open_fund_mean_is_none_when_no_fund_open() {
        let fund = crate::store::Fund {
            firm_id: FirmId(0),
            fund_name: "Fund I".into(),
            fund_year: 2005,
            initial_closing_date: NaiveDate::from_ymd_opt(2006, 1, 1),
            closing_year: Some(2006),
            fund_size: Some(100.0),
        };
        let result = still_open_fund_mean(&[fund], &[(FirmId(0), 2010)]);
        assert_eq!(result[&(FirmId(0), 2010)], None);
    }

    #[test]
    fn still_open_fund_mean_averages_all_open_funds() {
        let f1 = crate::store::Fund {
            firm_id: FirmId(0),
            fund_name: "Fund I".into(),
            fund_year: 2005,
            initial_closing_date: None,
            closing_year: None,
            fund_size: Some(100.0),
        };
        let f2 = crate::store::Fund {
            firm_id: FirmId(0),
            fund_name: "Fund II".into(),
            fund_year: 2008,
            initial_closing_date: None,
            closing_year: None,
            fund_size: Some(200.0),
        };
        let result = still_open_fund_mean(&[f1, f2], &[(FirmId(0), 2010)]);
        assert_eq!(result[&(FirmId(0), 2010)], Some(150.0));
    }
}
