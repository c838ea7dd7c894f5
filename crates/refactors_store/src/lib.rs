pub mod config;
pub mod datastore;
mod db;
pub mod ledger;
pub mod lifecycle;
pub mod refactorer;
pub mod runner;

pub use refactors_core::*;

pub use config::{DatabaseConfig, PoolConfig, RefactorConfig, SourceConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_ledger};
pub use ledger::RefactorLedger;
pub use lifecycle::{
    HostMigration, LifecycleBridge, MigrationEvent, MigrationListener, MigrationNotifier,
};
pub use refactorer::Refactorer;
pub use runner::{MigrationRunner, RefactorMigrator};
