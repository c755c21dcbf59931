//! S4: firm A invests in company X in 2020; X goes public in 2020. With
//! L=0, the IPO exit is attributed to A's 2020 row and to no other year —
//! in particular A has no 2021 row at all, since it never invested then.

use chrono::NaiveDate;

use vc_panel::config::Config;
use vc_panel::performance;
use vc_panel::store::{CanonicalStore, RawCompanyRow, RawFirmRow, RawRoundRow, Situation};

#[test]
fn ipo_exit_matches_only_the_investing_year() {
    let raw_firms = vec![RawFirmRow {
        name: "A".into(),
        founding_year: Some(2000),
        ..Default::default()
    }];
    let raw_companies = vec![RawCompanyRow {
        name: "X".into(),
        situation: Some(Situation::WentPublic),
        ipo_date: Some(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()),
        ..Default::default()
    }];
    let raw_rounds = vec![RawRoundRow {
        firm_name: "A".into(),
        company_name: "X".into(),
        round_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        round_number: 1,
        amount_disclosed: Some(500_000.0),
        amount_estimated: None,
        stage_level_1: None,
    }];

    let (store, _log): (CanonicalStore, _) = CanonicalStore::build(raw_firms, raw_companies, raw_rounds, None);
    let a = store.firm_interner.get("A").unwrap();

    let config = Config::default();
    let rows = performance::compute(&store.rounds, &store.companies, &config);

    assert_eq!(rows[&(a, 2020)].perf_ipo, 1);
    assert!(!rows.contains_key(&(a, 2021)));
}
