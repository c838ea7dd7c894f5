use log::info;
use sea_orm::DatabaseConnection;
use sea_orm_migration::{MigrationName, MigratorTrait};

use crate::lifecycle::{HostMigration, MigrationEvent, MigrationNotifier, UnlinkedMigration};
use refactors_core::{MigrationDirection, MigrationPhase, RefactorResult};

/// A sea-orm-migration migrator whose migrations may declare refactors.
pub trait RefactorMigrator: MigratorTrait {
    /// Migration objects that carry refactor associations, matched to
    /// [`MigratorTrait::migrations`] by name.
    fn host_migrations() -> Vec<Box<dyn HostMigration>> {
        Vec::new()
    }
}

/// Applies migrations one step at a time, notifying before and after each step.
pub struct MigrationRunner<'a> {
    conn: &'a DatabaseConnection,
    notifier: &'a MigrationNotifier,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(conn: &'a DatabaseConnection, notifier: &'a MigrationNotifier) -> Self {
        Self { conn, notifier }
    }

    /// Apply up to `steps` pending migrations (all when `None`). Returns the names applied.
    pub async fn up<M: RefactorMigrator>(&self, steps: Option<u32>) -> RefactorResult<Vec<String>> {
        M::install(self.conn).await?;
        let pending: Vec<String> = M::get_pending_migrations(self.conn)
            .await?
            .iter()
            .map(|migration| migration.name().to_string())
            .collect();
        let limit = steps.map_or(pending.len(), |steps| steps as usize);
        let hosts = M::host_migrations();
        let mut applied = Vec::new();
        for name in pending.into_iter().take(limit) {
            self.step::<M>(&hosts, &name, MigrationDirection::Up).await?;
            applied.push(name);
        }
        Ok(applied)
    }

    /// Roll back up to `steps` applied migrations, newest first (one when `None`, matching
    /// sea-orm-migration). Returns the names rolled back.
    pub async fn down<M: RefactorMigrator>(
        &self,
        steps: Option<u32>,
    ) -> RefactorResult<Vec<String>> {
        M::install(self.conn).await?;
        let applied: Vec<String> = M::get_applied_migrations(self.conn)
            .await?
            .iter()
            .rev()
            .map(|migration| migration.name().to_string())
            .collect();
        let limit = steps.map_or(1, |steps| steps as usize);
        let hosts = M::host_migrations();
        let mut reverted = Vec::new();
        for name in applied.into_iter().take(limit) {
            self.step::<M>(&hosts, &name, MigrationDirection::Down).await?;
            reverted.push(name);
        }
        Ok(reverted)
    }

    async fn step<M: RefactorMigrator>(
        &self,
        hosts: &[Box<dyn HostMigration>],
        name: &str,
        direction: MigrationDirection,
    ) -> RefactorResult<()> {
        let unlinked = UnlinkedMigration(name.to_string());
        let migration: &dyn HostMigration = hosts
            .iter()
            .find(|host| host.name() == name)
            .map(|host| &**host)
            .unwrap_or(&unlinked);

        self.notifier
            .notify(&MigrationEvent {
                migration,
                direction,
                phase: MigrationPhase::Started,
            })
            .await?;
        match direction {
            MigrationDirection::Up => M::up(self.conn, Some(1)).await?,
            MigrationDirection::Down => M::down(self.conn, Some(1)).await?,
        }
        info!("migrations: {name} {direction:?} applied");
        self.notifier
            .notify(&MigrationEvent {
                migration,
                direction,
                phase: MigrationPhase::Ended,
            })
            .await
    }
}
