//! S1: firms {A,B,C} share one deal in company X in 2010. With W=5,
//! kappa=1, the year-2011 graph is a complete triangle: degree=2,
//! betweenness=0, Burt constraint=1.0 (capped), ego density=1.0.

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

#[test]
fn triangle_deal_produces_fully_tied_graph_at_t_plus_one() {
    let raw_firms = vec![firm("A"), firm("B"), firm("C")];
    let raw_companies = vec![RawCompanyRow {
        name: "X".into(),
        ..Default::default()
    }];
    let round = |firm_name: &str| RawRoundRow {
        firm_name: firm_name.to_string(),
        company_name: "X".into(),
        round_date: chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        round_number: 1,
        amount_disclosed: None,
        amount_estimated: None,
        stage_level_1: None,
    };
    let raw_rounds = vec![round("A"), round("B"), round("C")];

    let inputs = PipelineInputs {
        raw_firms,
        raw_companies,
        raw_rounds,
        raw_funds: None,
        geo_table: HashMap::new(),
    };
    let config = Config::default();
    let cancel = AtomicBool::new(false);
    let output = pipeline::run(inputs, &config, &cancel).unwrap();

    let a = output.store.firm_interner.get("A").unwrap();
    let b = output.store.firm_interner.get("B").unwrap();
    let c = output.store.firm_interner.get("C").unwrap();

    let graph_2011 = &output.graphs[&2011];
    assert_eq!(graph_2011.nodes().len(), 3);
    assert_eq!(graph_2011.edge_count(), 3);
    for &firm_id in &[a, b, c] {
        assert_eq!(graph_2011.degree(firm_id), 2);
    }

    let centrality_2011 = &output.centralities[&2011];
    for &firm_id in &[a, b, c] {
        let row = centrality_2011.rows[&firm_id];
        assert_eq!(row.degree, 2.0);
        assert!(row.betweenness.abs() < 1e-9);
        assert!((row.constraint - 1.0).abs() < 1e-9);
        assert!((row.ego_density - 1.0).abs() < 1e-9);
    }
}
