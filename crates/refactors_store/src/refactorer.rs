//! The run/rollback state machine.
//!
//! A refactor is either `NeverRun` (no ledger rows) or `Ran`. `up` moves it to `Ran` and
//! `down` back to `NeverRun`; the ledger is written only after the unit returns `Ok`, so a
//! failing unit leaves the ledger untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::RefactorLedger;
use refactors_core::{
    LifecycleEvent, RefactorError, RefactorLedgerApi, RefactorOutcome, RefactorRegistry,
    RefactorReporter, RefactorResult, RefactorStep, invoke,
};

pub struct Refactorer {
    registry: Arc<RefactorRegistry>,
    ledger: RefactorLedger,
    reporter: Option<Arc<dyn RefactorReporter>>,
}

impl Refactorer {
    pub fn new(registry: impl Into<Arc<RefactorRegistry>>, ledger: RefactorLedger) -> Self {
        Self {
            registry: registry.into(),
            ledger,
            reporter: None,
        }
    }

    /// Send outcomes to `reporter`, as when running interactively.
    pub fn with_reporter(mut self, reporter: Arc<dyn RefactorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn registry(&self) -> &RefactorRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &RefactorLedger {
        &self.ledger
    }

    /// Run one step and report its outcome, success or rejection alike.
    pub async fn execute(
        &self,
        refactor: &str,
        step: RefactorStep,
        migration: Option<&str>,
    ) -> RefactorResult<()> {
        let started = Instant::now();
        let result = self.execute_step(refactor, step, migration).await;
        let error = result.as_ref().err().map(ToString::to_string);
        if let Some(error) = &error {
            debug!("refactors: {refactor} {step} rejected: {error}");
        }
        self.report(refactor, step, started.elapsed(), error);
        result
    }

    async fn execute_step(
        &self,
        refactor: &str,
        step: RefactorStep,
        migration: Option<&str>,
    ) -> RefactorResult<()> {
        let unit = self.registry.resolve(refactor)?;
        if !unit.capabilities().supports(step) {
            return Err(RefactorError::missing_capability(refactor, step));
        }

        if step.changes_state() {
            let has_run = self.ledger.has_run(refactor).await?;
            if step == RefactorStep::Up && has_run {
                return Err(RefactorError::already_run(refactor));
            }
            if step == RefactorStep::Down && !has_run {
                return Err(RefactorError::not_run(refactor));
            }
        }

        let started = Instant::now();
        invoke(unit.as_ref(), step, self.ledger.connection()).await?;

        match step {
            RefactorStep::Up => {
                self.ledger.log(refactor, migration, None).await?;
            }
            RefactorStep::Down => {
                self.ledger.delete(refactor).await?;
            }
            RefactorStep::BeforeUp | RefactorStep::BeforeDown => return Ok(()),
        }
        info!(
            "refactors: {refactor} {step} finished in {:?}",
            started.elapsed()
        );
        Ok(())
    }

    pub async fn dispatch(&self, event: &LifecycleEvent) -> RefactorResult<()> {
        self.execute(&event.refactor, event.step, event.migration.as_deref())
            .await
    }

    /// Direct invocation: the `before_*` hook, then `up`, or `down` when rolling back.
    pub async fn run(&self, refactor: &str, rollback: bool) -> RefactorResult<()> {
        let step = if rollback {
            RefactorStep::Down
        } else {
            RefactorStep::Up
        };
        self.dispatch(&LifecycleEvent::direct(refactor, step.hook()))
            .await?;
        self.dispatch(&LifecycleEvent::direct(refactor, step)).await
    }

    fn report(&self, refactor: &str, step: RefactorStep, elapsed: Duration, error: Option<String>) {
        if let Some(reporter) = &self.reporter {
            reporter.report(&RefactorOutcome {
                refactor: refactor.to_string(),
                step,
                elapsed,
                error,
            });
        }
    }
}
