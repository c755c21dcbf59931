//! S5: funds_raised = {2015: 10, 2016: 10, 2017: 10, 2018: 30}. Market
//! Heat(2018) = ln((30*3) / (10+10+10)) = ln(3).

use chrono::NaiveDate;

use vc_panel::market;
use vc_panel::store::{CanonicalStore, RawCompanyRow, RawFirmRow, RawFundRow, RawRoundRow};

fn funds_for_year(year: i32, count: usize) -> Vec<RawFundRow> {
    (0..count)
        .map(|i| RawFundRow {
            firm_name: "A".into(),
            fund_name: format!("Fund-{year}-{i}"),
            fund_year: year,
            initial_closing_date: None,
            fund_size: None,
        })
        .collect()
}

#[test]
fn market_heat_matches_the_three_year_rolling_ratio() {
    let raw_firms = vec![RawFirmRow {
        name: "A".into(),
        founding_year: Some(2000),
        ..Default::default()
    }];
    let raw_companies = vec![RawCompanyRow {
        name: "X".into(),
        ..Default::default()
    }];
    // Only needed to extend the store's year range through 2018.
    let raw_rounds = vec![RawRoundRow {
        firm_name: "A".into(),
        company_name: "X".into(),
        round_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        round_number: 1,
        amount_disclosed: None,
        amount_estimated: None,
        stage_level_1: None,
    }];
    let mut raw_funds = Vec::new();
    raw_funds.extend(funds_for_year(2015, 10));
    raw_funds.extend(funds_for_year(2016, 10));
    raw_funds.extend(funds_for_year(2017, 10));
    raw_funds.extend(funds_for_year(2018, 30));

    let (store, _log): (CanonicalStore, _) =
        CanonicalStore::build(raw_firms, raw_companies, raw_rounds, Some(raw_funds));

    let rows = market::compute(&store, "US");
    let heat = rows[&2018].market_heat;
    assert!((heat - 3.0_f64.ln()).abs() < 1e-9);
}
