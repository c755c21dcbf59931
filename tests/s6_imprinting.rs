//! S6 (literal spec scenario): firm A first appears in 2010 (deal with
//! B), then ties C in 2012, with an imprinting period P=3 (years
//! 2010-2012). A deal in calendar year Y only becomes a graph edge
//! starting with the analysis-year-(Y+1) graph (the same one-year
//! lookback lag S1 and S2 exercise directly), so B's tie surfaces
//! starting with the 2011 graph and C's with the 2013 graph; both still
//! fall inside the imprinting window once that lag is accounted for,
//! giving initial partners {B, C} and a partner-average degree
//! centrality of 1.0 for each.

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

fn company(name: &str) -> RawCompanyRow {
    RawCompanyRow {
        name: name.to_string(),
        ..Default::default()
    }
}

fn round(firm_name: &str, company_name: &str, year: i32) -> RawRoundRow {
    RawRoundRow {
        firm_name: firm_name.to_string(),
        company_name: company_name.to_string(),
        round_date: chrono::NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        round_number: 1,
        amount_disclosed: None,
        amount_estimated: None,
        stage_level_1: None,
    }
}

#[test]
fn initial_partners_union_and_degree_average_over_the_imprinting_window() {
    let raw_firms = vec![firm("A"), firm("B"), firm("C"), firm("D"), firm("E")];
    let raw_companies = vec![company("X"), company("Y"), company("Z")];
    let raw_rounds = vec![
        round("A", "X", 2010),
        round("B", "X", 2010),
        round("A", "Y", 2012),
        round("C", "Y", 2012),
        // Filler deal, unrelated to A/B/C, only to extend the store's
        // year range through 2013 so the analysis-year-2013 graph (the
        // one that first shows C's 2012 tie) gets built.
        round("D", "Z", 2013),
        round("E", "Z", 2013),
    ];

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
    assert_eq!(output.store.rounds.iter().filter(|r| r.firm_id == a).map(|r| r.year).min(), Some(2010));

    let row = &output.imprinting[&(a, 2010)];
    assert_eq!(row.n_initial_partners, 2);
    assert_eq!(row.n_partner_years, 4);
    assert!((row.partner_status.degree.mean.unwrap() - 1.0).abs() < 1e-9);
    assert!((row.partner_status.degree.max.unwrap() - 1.0).abs() < 1e-9);
    assert!((row.partner_status.degree.min.unwrap() - 1.0).abs() < 1e-9);
}
