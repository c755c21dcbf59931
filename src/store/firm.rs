//! Firm registry ingest (spec.md §3/§4.1, component C1).

use serde::{Deserialize, Serialize};

use super::ids::FirmId;
use crate::error::DegradationLog;

pub const UNDISCLOSED_FIRM_NAME: &str = "Undisclosed Firm";

/// A row as it arrives from the firm registry, before interning.
#[derive(Debug, Clone, Default)]
pub struct RawFirmRow {
    pub name: String,
    pub founding_year: Option<i32>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub nation: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firm {
    pub id: FirmId,
    pub name: String,
    pub founding_year: Option<i32>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub nation: Option<String>,
    pub classification: Option<String>,
}

/// Builds the firm table: drops `"Undisclosed Firm"` rows and firms lacking
/// both a founding date and a zip (spec.md §3, §7), assigning each
/// surviving row a dense id via `interner`. A name seen more than once
/// keeps only its first occurrence, preserving "each firm appears at most
/// once per id" (spec.md §3).
pub fn build_firms(
    rows: Vec<RawFirmRow>,
    interner: &mut super::ids::Interner<FirmId>,
    log: &mut DegradationLog,
) -> Vec<Firm> {
    let mut firms: Vec<Option<Firm>> = Vec::new();
    for row in rows {
        if row.name == UNDISCLOSED_FIRM_NAME {
            log.dropped_undisclosed_firms += 1;
            continue;
        }
        if row.founding_year.is_none() && row.zip.is_none() {
            log.dropped_firms_missing_founding_and_zip += 1;
            continue;
        }
        let id = interner.intern(&row.name);
        if id.index() < firms.len() && firms[id.index()].is_some() {
            continue;
        }
        if id.index() >= firms.len() {
            firms.resize(id.index() + 1, None);
        }
        firms[id.index()] = Some(Firm {
            id,
            name: row.name,
            founding_year: row.founding_year,
            state: row.state,
            zip: row.zip,
            nation: row.nation,
            classification: row.classification,
        });
    }
    firms.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, founding_year: Option<i32>, zip: Option<&str>) -> RawFirmRow {
        RawFirmRow {
            name: name.to_string(),
            founding_year,
            zip: zip.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn drops_undisclosed_and_firms_missing_both_anchors() {
        let mut interner = super::super::ids::Interner::new();
        let mut log = DegradationLog::default();
        let rows = vec![
            row("Sequoia", Some(1972), Some("94025")),
            row(UNDISCLOSED_FIRM_NAME, Some(1990), Some("10001")),
            row("NoAnchor", None, None),
            row("ZipOnly", None, Some("02139")),
        ];
        let firms = build_firms(rows, &mut interner, &mut log);
        assert_eq!(firms.len(), 2);
        assert_eq!(log.dropped_undisclosed_firms, 1);
        assert_eq!(log.dropped_firms_missing_founding_and_zip, 1);
        assert_eq!(firms[0].name, "Sequoia");
        assert_eq!(firms[1].name, "ZipOnly");
    }

    #[test]
    fn each_firm_appears_once_per_id() {
        let mut interner = super::super::ids::Interner::new();
        let mut log = DegradationLog::default();
        let rows = vec![
            row("Sequoia", Some(1972), Some("94025")),
            row("Sequoia", Some(1980), Some("10001")),
        ];
        let firms = build_firms(rows, &mut interner, &mut log);
        assert_eq!(firms.len(), 1);
        assert_eq!(firms[0].founding_year, Some(1972));
    }
}
