use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{AvailableUnit, LedgerRecord, source_hint};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorStatus {
    pub refactor: String,
    pub registered: bool,
    pub ran: bool,
    pub migration: Option<String>,
    pub batch: Option<i64>,
    pub source: Option<PathBuf>,
}

/// Join ledger records onto the available units. `runs` is expected in ledger order, so
/// the highest batch for a refactor wins. Unregistered source files are matched to records
/// through the file-name hint of the recorded name.
pub fn status_for(
    runs: &[LedgerRecord],
    available: &BTreeMap<String, AvailableUnit>,
) -> Vec<RefactorStatus> {
    let latest: HashMap<&str, &LedgerRecord> = runs
        .iter()
        .map(|record| (record.refactor.as_str(), record))
        .collect();
    let by_hint: HashMap<String, &LedgerRecord> = runs
        .iter()
        .map(|record| (source_hint(&record.refactor), record))
        .collect();
    available
        .iter()
        .map(|(refactor, unit)| {
            let record = if unit.registered {
                latest.get(refactor.as_str())
            } else {
                by_hint.get(refactor)
            };
            RefactorStatus {
                refactor: refactor.clone(),
                registered: unit.registered,
                ran: record.is_some(),
                migration: record.and_then(|record| record.migration.clone()),
                batch: record.map(|record| record.batch),
                source: unit.source.clone(),
            }
        })
        .collect()
}
