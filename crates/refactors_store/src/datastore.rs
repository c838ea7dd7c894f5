use std::path::{Path, PathBuf};

use refactors_core::RefactorResult;

use crate::{RefactorConfig, RefactorLedger};

const DEFAULT_DB_NAME: &str = "refactors.sqlite";

pub fn load_or_init_config(base: &Path) -> RefactorResult<RefactorConfig> {
    let default_sqlite = base.join(DEFAULT_DB_NAME);
    RefactorConfig::load_or_init(base, &default_sqlite)
}

pub async fn open_ledger(base: &Path) -> RefactorResult<RefactorLedger> {
    let config = load_or_init_config(base)?;
    RefactorLedger::connect(&config, base).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
