//! Bridges migration start/end notifications into refactor steps.
//!
//! A migration opts in by returning a refactor identifier from [`HostMigration::refactor`].
//! `Started` becomes `before_up`/`before_down` and `Ended` becomes `up`/`down`, each
//! dispatched through the [`Refactorer`] with the migration name as the association.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use sea_orm_migration::MigrationName;

use crate::Refactorer;
use refactors_core::{LifecycleEvent, MigrationDirection, MigrationPhase, RefactorResult};

/// A migration as seen by the bridge.
pub trait HostMigration: MigrationName + Send + Sync {
    /// Refactor identifier to run alongside this migration.
    fn refactor(&self) -> Option<String> {
        None
    }
}

/// Stand-in for migrations that declare nothing.
pub(crate) struct UnlinkedMigration(pub(crate) String);

impl MigrationName for UnlinkedMigration {
    fn name(&self) -> &str {
        &self.0
    }
}

impl HostMigration for UnlinkedMigration {}

pub struct MigrationEvent<'a> {
    pub migration: &'a dyn HostMigration,
    pub direction: MigrationDirection,
    pub phase: MigrationPhase,
}

#[async_trait]
pub trait MigrationListener: Send + Sync {
    async fn on_migration(&self, event: &MigrationEvent<'_>) -> RefactorResult<()>;
}

/// Fan-out of migration notifications to subscribed listeners, in subscription order.
#[derive(Clone, Default)]
pub struct MigrationNotifier {
    listeners: Vec<Arc<dyn MigrationListener>>,
}

impl MigrationNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn MigrationListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Deliver `event`; the first failing listener aborts delivery.
    pub async fn notify(&self, event: &MigrationEvent<'_>) -> RefactorResult<()> {
        for listener in &self.listeners {
            listener.on_migration(event).await?;
        }
        Ok(())
    }
}

pub struct LifecycleBridge {
    refactorer: Arc<Refactorer>,
}

impl LifecycleBridge {
    pub fn new(refactorer: Arc<Refactorer>) -> Self {
        Self { refactorer }
    }

    /// Build a bridge and subscribe it to `notifier`.
    pub fn attach(refactorer: Arc<Refactorer>, notifier: &mut MigrationNotifier) -> Arc<Self> {
        let bridge = Arc::new(Self::new(refactorer));
        notifier.subscribe(bridge.clone());
        bridge
    }

    pub fn refactorer(&self) -> &Refactorer {
        &self.refactorer
    }

    /// Lifecycle event for `event`, if the migration declares a refactor.
    pub fn event_for(event: &MigrationEvent<'_>) -> Option<LifecycleEvent> {
        let refactor = event.migration.refactor()?;
        Some(LifecycleEvent::for_migration(
            refactor,
            event.migration.name(),
            event.direction,
            event.phase,
        ))
    }
}

#[async_trait]
impl MigrationListener for LifecycleBridge {
    async fn on_migration(&self, event: &MigrationEvent<'_>) -> RefactorResult<()> {
        let Some(lifecycle) = Self::event_for(event) else {
            return Ok(());
        };
        debug!(
            "bridge: {} -> {} {}",
            event.migration.name(),
            lifecycle.refactor,
            lifecycle.step
        );
        self.refactorer.dispatch(&lifecycle).await
    }
}
