use sea_orm::DeriveIden;

#[derive(DeriveIden, Clone, Copy)]
pub enum Refactors {
    Table,
    Id,
    Refactor,
    Migration,
    Batch,
}

pub const REFACTORS_UNIQUE_INDEX: &str = "refactors_refactor_migration_unique";

/// Partial index covering direct runs, whose NULL migration the composite index ignores.
pub const REFACTORS_DIRECT_UNIQUE_INDEX: &str = "refactors_refactor_direct_unique";
