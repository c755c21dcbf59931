//! Canonical store (C1, spec.md §4.1): the single owner of the three
//! required input tables plus the optional fund table, exposed as
//! immutable columnar relations keyed by dense integer ids.

pub mod company;
pub mod dates;
pub mod firm;
pub mod fund;
pub mod ids;
pub mod round;

pub use company::{build_companies, Company, RawCompanyRow, Situation};
pub use firm::{build_firms, Firm, RawFirmRow};
pub use fund::{build_funds, Fund, RawFundRow};
pub use ids::{CompanyId, FirmId, Interner};
pub use round::{build_rounds, RawRoundRow, Round};

use serde::{Deserialize, Serialize};

use crate::error::DegradationLog;

/// Inclusive year range covering every round year present in the store
/// (spec.md §4.1: "a dense `years = [Y_min, Y_max]` index").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }

    /// All years in the range, ascending.
    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

/// Read-only after construction (spec.md §5: "The canonical store is
/// read-only after ingest and shared by immutable reference"). Every
/// downstream component borrows from here rather than owning copies of
/// the tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalStore {
    pub firms: Vec<Firm>,
    pub companies: Vec<Company>,
    pub rounds: Vec<Round>,
    pub funds: Vec<Fund>,
    pub firm_interner: Interner<FirmId>,
    pub company_interner: Interner<CompanyId>,
    pub years: Option<YearRange>,
}

impl CanonicalStore {
    /// Ingests all four raw tables in dependency order (firms/companies
    /// first so rounds/funds can resolve their foreign keys against
    /// populated interners), producing one [`DegradationLog`] covering
    /// every drop and anomaly across the whole store.
    pub fn build(
        raw_firms: Vec<RawFirmRow>,
        raw_companies: Vec<RawCompanyRow>,
        raw_rounds: Vec<RawRoundRow>,
        raw_funds: Option<Vec<RawFundRow>>,
    ) -> (Self, DegradationLog) {
        let mut log = DegradationLog::default();

        let mut firm_interner = Interner::new();
        let firms = build_firms(raw_firms, &mut firm_interner, &mut log);

        let mut company_interner = Interner::new();
        let companies = build_companies(raw_companies, &mut company_interner, &mut log);

        let rounds = build_rounds(raw_rounds, &firm_interner, &company_interner, &mut log);

        let funds = match raw_funds {
            Some(raw) => build_funds(raw, &firm_interner, &mut log),
            None => {
                log.missing_fund_table = true;
                Vec::new()
            }
        };

        let years = rounds.iter().map(|r| r.year).fold(None, |acc, year| {
            Some(match acc {
                None => YearRange { min: year, max: year },
                Some(YearRange { min, max }) => YearRange {
                    min: min.min(year),
                    max: max.max(year),
                },
            })
        });

        (
            CanonicalStore {
                firms,
                companies,
                rounds,
                funds,
                firm_interner,
                company_interner,
                years,
            },
            log,
        )
    }

    pub fn firm(&self, id: FirmId) -> Option<&Firm> {
        self.firms.iter().find(|f| f.id == id)
    }

    pub fn company(&self, id: CompanyId) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    /// Funds belonging to `firm_id`, in ingest order.
    pub fn funds_of(&self, firm_id: FirmId) -> impl Iterator<Item = &Fund> {
        self.funds.iter().filter(move |f| f.firm_id == firm_id)
    }

    /// Rounds belonging to `firm_id`, in year order (the relation is
    /// built sorted by year already).
    pub fn rounds_of(&self, firm_id: FirmId) -> impl Iterator<Item = &Round> {
        self.rounds.iter().filter(move |r| r.firm_id == firm_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn build_wires_interners_and_year_range() {
        let raw_firms = vec![RawFirmRow {
            name: "Sequoia".into(),
            founding_year: Some(1972),
            zip: Some("94025".into()),
            ..Default::default()
        }];
        let raw_companies = vec![RawCompanyRow {
            name: "Acme".into(),
            ..Default::default()
        }];
        let raw_rounds = vec![RawRoundRow {
            firm_name: "Sequoia".into(),
            company_name: "Acme".into(),
            round_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            round_number: 1,
            amount_disclosed: None,
            amount_estimated: None,
            stage_level_1: None,
        }];

        let (store, log) = CanonicalStore::build(raw_firms, raw_companies, raw_rounds, None);
        assert_eq!(store.firms.len(), 1);
        assert_eq!(store.companies.len(), 1);
        assert_eq!(store.rounds.len(), 1);
        assert!(log.missing_fund_table);
        assert_eq!(store.years, Some(YearRange { min: 2015, max: 2015 }));
    }

    #[test]
    fn empty_rounds_yields_no_year_range() {
        let (store, _log) = CanonicalStore::build(Vec::new(), Vec::new(), Vec::new(), None);
        assert!(store.years.is_none());
    }
}
