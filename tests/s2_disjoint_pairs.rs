//! S2: two disjoint deals (A,B) and (C,D), both in 2010. At t=2011 each
//! firm has degree=1, betweenness=0, ego density=0 (only one neighbor),
//! and `1/lambda_max = 1`; with `normalize_power` off, power at beta=0
//! equals degree.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use vc_panel::config::Config;
use vc_panel::pipeline::{self, PipelineInputs};
use vc_panel::store::{RawCompanyRow, RawFirmRow, RawRoundRow};

fn firm(name: &str) -> RawFirmRow {
    RawFirmRow {
        name: name.to_string(),
        founding_year: Some(2000),
        ..Default::default()
    }
}

fn round(firm_name: &str, company_name: &str) -> RawRoundRow {
    RawRoundRow {
        firm_name: firm_name.to_string(),
        company_name: company_name.to_string(),
        round_date: chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        round_number: 1,
        amount_disclosed: None,
        amount_estimated: None,
        stage_level_1: None,
    }
}

#[test]
fn disjoint_pairs_have_degree_one_betweenness_zero_ego_density_zero() {
    let raw_firms = vec![firm("A"), firm("B"), firm("C"), firm("D")];
    let raw_companies = vec![
        RawCompanyRow {
            name: "X".into(),
            ..Default::default()
        },
        RawCompanyRow {
            name: "Y".into(),
            ..Default::default()
        },
    ];
    let raw_rounds = vec![round("A", "X"), round("B", "X"), round("C", "Y"), round("D", "Y")];

    let inputs = PipelineInputs {
        raw_firms,
        raw_companies,
        raw_rounds,
        raw_funds: None,
        geo_table: HashMap::new(),
    };
    let mut config = Config::default();
    config.normalize_power = false;
    let cancel = AtomicBool::new(false);
    let output = pipeline::run(inputs, &config, &cancel).unwrap();

    let ids: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|name| output.store.firm_interner.get(name).unwrap())
        .collect();

    let graph_2011 = &output.graphs[&2011];
    assert_eq!(graph_2011.nodes().len(), 4);
    assert_eq!(graph_2011.edge_count(), 2);

    let centrality_2011 = &output.centralities[&2011];
    assert!((centrality_2011.inv_lambda_max - 1.0).abs() < 1e-6);
    for &firm_id in &ids {
        assert_eq!(graph_2011.degree(firm_id), 1);
        let row = centrality_2011.rows[&firm_id];
        assert_eq!(row.degree, 1.0);
        assert!(row.betweenness.abs() < 1e-9);
        assert!(row.ego_density.abs() < 1e-9);
        assert!((row.power_p0 - 1.0).abs() < 1e-6);
    }
}
