use std::fmt;

use serde::{Deserialize, Serialize};

/// One invocation a refactor unit can receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactorStep {
    BeforeUp,
    Up,
    BeforeDown,
    Down,
}

impl RefactorStep {
    /// Steps that move a refactor between `NeverRun` and `Ran`.
    pub fn changes_state(self) -> bool {
        matches!(self, RefactorStep::Up | RefactorStep::Down)
    }

    /// The hook fired ahead of a state change, or the step itself for hooks.
    pub fn hook(self) -> RefactorStep {
        match self {
            RefactorStep::BeforeUp | RefactorStep::Up => RefactorStep::BeforeUp,
            RefactorStep::BeforeDown | RefactorStep::Down => RefactorStep::BeforeDown,
        }
    }

    pub fn for_migration(direction: MigrationDirection, phase: MigrationPhase) -> RefactorStep {
        match (phase, direction) {
            (MigrationPhase::Started, MigrationDirection::Up) => RefactorStep::BeforeUp,
            (MigrationPhase::Started, MigrationDirection::Down) => RefactorStep::BeforeDown,
            (MigrationPhase::Ended, MigrationDirection::Up) => RefactorStep::Up,
            (MigrationPhase::Ended, MigrationDirection::Down) => RefactorStep::Down,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefactorStep::BeforeUp => "before_up",
            RefactorStep::Up => "up",
            RefactorStep::BeforeDown => "before_down",
            RefactorStep::Down => "down",
        }
    }
}

impl fmt::Display for RefactorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Started,
    Ended,
}

/// Request to run one step of a refactor, optionally on behalf of a migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub refactor: String,
    pub step: RefactorStep,
    pub migration: Option<String>,
}

impl LifecycleEvent {
    pub fn direct(refactor: impl Into<String>, step: RefactorStep) -> Self {
        Self {
            refactor: refactor.into(),
            step,
            migration: None,
        }
    }

    pub fn for_migration(
        refactor: impl Into<String>,
        migration: impl Into<String>,
        direction: MigrationDirection,
        phase: MigrationPhase,
    ) -> Self {
        Self {
            refactor: refactor.into(),
            step: RefactorStep::for_migration(direction, phase),
            migration: Some(migration.into()),
        }
    }
}
