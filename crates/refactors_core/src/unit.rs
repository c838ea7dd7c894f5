//! The contract user-authored refactors implement.
//!
//! A unit is resolved by name through the [`RefactorRegistry`](crate::RefactorRegistry) and
//! invoked by the engine. `up` and `down` change the ledger state; `before_up` and
//! `before_down` are optional announcements that never touch it; units that do not
//! override them get a no-op.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::{RefactorResult, RefactorStep};

/// The state-changing steps a unit implements. Hooks are always callable and default to
/// no-ops on [`RefactorUnit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub up: bool,
    pub down: bool,
}

impl Capabilities {
    pub const fn reversible() -> Self {
        Self { up: true, down: true }
    }

    pub const fn without_down(mut self) -> Self {
        self.down = false;
        self
    }

    pub fn supports(&self, step: RefactorStep) -> bool {
        match step {
            RefactorStep::BeforeUp | RefactorStep::BeforeDown => true,
            RefactorStep::Up => self.up,
            RefactorStep::Down => self.down,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::reversible()
    }
}

#[async_trait]
pub trait RefactorUnit: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::reversible()
    }

    async fn before_up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Ok(())
    }

    async fn up(&self, db: &DatabaseConnection) -> RefactorResult<()>;

    async fn before_down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Ok(())
    }

    async fn down(&self, db: &DatabaseConnection) -> RefactorResult<()>;
}

/// Invoke `step` on `unit`. Capability checks are the caller's concern.
pub async fn invoke(
    unit: &dyn RefactorUnit,
    step: RefactorStep,
    db: &DatabaseConnection,
) -> RefactorResult<()> {
    match step {
        RefactorStep::BeforeUp => unit.before_up(db).await,
        RefactorStep::Up => unit.up(db).await,
        RefactorStep::BeforeDown => unit.before_down(db).await,
        RefactorStep::Down => unit.down(db).await,
    }
}

#[cfg(test)]
mod tests {
    use super::Capabilities;
    use crate::RefactorStep;

    #[test]
    fn default_capabilities_are_reversible() {
        let caps = Capabilities::default();
        assert!(caps.supports(RefactorStep::Up));
        assert!(caps.supports(RefactorStep::Down));
    }

    #[test]
    fn hooks_are_always_supported() {
        let caps = Capabilities::reversible().without_down();
        assert!(caps.supports(RefactorStep::BeforeUp));
        assert!(caps.supports(RefactorStep::BeforeDown));
        assert!(!caps.supports(RefactorStep::Down));
    }
}
