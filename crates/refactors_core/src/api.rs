use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::RefactorResult;

/// One completed refactor execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    pub refactor: String,
    pub migration: Option<String>,
    pub batch: i64,
}

/// Durable record of which refactors have run.
///
/// Every table operation provisions the backing table first when it is missing.
#[async_trait]
pub trait RefactorLedgerApi {
    async fn repository_exists(&self) -> RefactorResult<bool>;

    async fn create_repository(&self) -> RefactorResult<()>;

    async fn has_run(&self, refactor: &str) -> RefactorResult<bool>;

    /// Record a run. Returns `false` when an identical record already existed.
    async fn log(
        &self,
        refactor: &str,
        migration: Option<&str>,
        batch: Option<i64>,
    ) -> RefactorResult<bool>;

    async fn delete(&self, refactor: &str) -> RefactorResult<u64>;

    async fn reset(&self) -> RefactorResult<u64>;

    async fn last_batch_number(&self) -> RefactorResult<i64>;

    /// All records ordered by refactor name, then batch.
    async fn get_run(&self) -> RefactorResult<Vec<LedgerRecord>>;
}
