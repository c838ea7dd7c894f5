use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use refactors_store::{
    Capabilities, RefactorConfig, RefactorError, RefactorLedger, RefactorLedgerApi,
    RefactorOutcome, RefactorRegistry, RefactorReporter, RefactorResult, RefactorStep,
    RefactorUnit, Refactorer, refactor_name,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tempfile::tempdir;

type Calls = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct CreateMarks;

#[async_trait]
impl RefactorUnit for CreateMarks {
    async fn up(&self, db: &DatabaseConnection) -> RefactorResult<()> {
        db.execute_unprepared("CREATE TABLE marks (id INTEGER PRIMARY KEY)")
            .await?;
        Ok(())
    }

    async fn down(&self, db: &DatabaseConnection) -> RefactorResult<()> {
        db.execute_unprepared("DROP TABLE marks").await?;
        Ok(())
    }
}

#[derive(Default)]
struct Explodes;

#[async_trait]
impl RefactorUnit for Explodes {
    async fn up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Err(RefactorError::failed("boom"))
    }

    async fn down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Err(RefactorError::failed("boom"))
    }
}

#[derive(Default)]
struct ForwardOnly;

#[async_trait]
impl RefactorUnit for ForwardOnly {
    fn capabilities(&self) -> Capabilities {
        Capabilities::reversible().without_down()
    }

    async fn up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Ok(())
    }

    async fn down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        unreachable!("down is not a capability")
    }
}

struct Announced {
    calls: Calls,
}

impl Announced {
    fn record(&self, call: &str) {
        self.calls.lock().expect("calls").push(call.to_string());
    }
}

#[async_trait]
impl RefactorUnit for Announced {
    async fn before_up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.record("before_up");
        Ok(())
    }

    async fn up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.record("up");
        Ok(())
    }

    async fn before_down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.record("before_down");
        Ok(())
    }

    async fn down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.record("down");
        Ok(())
    }
}

struct Announcing {
    calls: Calls,
}

#[async_trait]
impl RefactorUnit for Announcing {
    async fn before_up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.calls.lock().expect("calls").push("before_up".to_string());
        Ok(())
    }

    async fn up(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        self.calls.lock().expect("calls").push("up".to_string());
        Ok(())
    }

    async fn down(&self, _db: &DatabaseConnection) -> RefactorResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Collecting {
    outcomes: Mutex<Vec<RefactorOutcome>>,
}

impl RefactorReporter for Collecting {
    fn report(&self, outcome: &RefactorOutcome) {
        self.outcomes.lock().expect("outcomes").push(outcome.clone());
    }
}

const ANNOUNCED: &str = "tests::Announced";
const ANNOUNCING: &str = "tests::Announcing";

fn registry(calls: &Calls) -> RefactorRegistry {
    let mut registry = RefactorRegistry::new();
    registry
        .register::<CreateMarks>()
        .register::<Explodes>()
        .register::<ForwardOnly>();
    let announced = calls.clone();
    registry.register_with(ANNOUNCED, move || {
        Box::new(Announced {
            calls: announced.clone(),
        })
    });
    let announcing = calls.clone();
    registry.register_with(ANNOUNCING, move || {
        Box::new(Announcing {
            calls: announcing.clone(),
        })
    });
    registry
}

async fn refactorer(base: &Path, calls: &Calls) -> RefactorResult<Refactorer> {
    let config = RefactorConfig::default_sqlite(base.join("ledger.sqlite").to_string_lossy());
    let ledger = RefactorLedger::connect(&config, base).await?;
    Ok(Refactorer::new(registry(calls), ledger))
}

#[tokio::test]
async fn up_twice_is_rejected_and_logged_once() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<CreateMarks>();

    refactorer.execute(name, RefactorStep::Up, None).await?;
    let err = refactorer
        .execute(name, RefactorStep::Up, None)
        .await
        .expect_err("second up");

    assert!(matches!(err, RefactorError::AlreadyRun { .. }));
    assert_eq!(refactorer.ledger().get_run().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn up_down_up_round_trips_the_state() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<CreateMarks>();

    refactorer.execute(name, RefactorStep::Up, None).await?;
    refactorer.execute(name, RefactorStep::Down, None).await?;
    assert!(refactorer.ledger().get_run().await?.is_empty());

    refactorer.execute(name, RefactorStep::Up, None).await?;
    assert!(refactorer.ledger().has_run(name).await?);
    Ok(())
}

#[tokio::test]
async fn down_without_up_is_rejected() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    refactorer.ledger().log("app::Unrelated", None, None).await?;

    let err = refactorer
        .execute(refactor_name::<CreateMarks>(), RefactorStep::Down, None)
        .await
        .expect_err("down before up");

    assert!(matches!(err, RefactorError::NotRun { .. }));
    let runs = refactorer.ledger().get_run().await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].refactor, "app::Unrelated");
    Ok(())
}

#[tokio::test]
async fn failing_unit_leaves_ledger_untouched() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<Explodes>();

    let err = refactorer
        .execute(name, RefactorStep::Up, Some("m1"))
        .await
        .expect_err("unit failure");

    assert!(matches!(err, RefactorError::Failed { .. }));
    assert!(!refactorer.ledger().has_run(name).await?);
    Ok(())
}

#[tokio::test]
async fn failing_down_keeps_the_record() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<Explodes>();
    refactorer.ledger().log(name, None, None).await?;

    refactorer
        .execute(name, RefactorStep::Down, None)
        .await
        .expect_err("unit failure");

    assert!(refactorer.ledger().has_run(name).await?);
    Ok(())
}

#[tokio::test]
async fn missing_capability_is_a_contract_error() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<ForwardOnly>();
    refactorer.execute(name, RefactorStep::Up, None).await?;

    let err = refactorer
        .execute(name, RefactorStep::Down, None)
        .await
        .expect_err("no down");

    assert!(matches!(
        err,
        RefactorError::MissingCapability {
            capability: RefactorStep::Down,
            ..
        }
    ));
    assert!(refactorer.ledger().has_run(name).await?);
    Ok(())
}

#[tokio::test]
async fn unknown_refactor_is_rejected_before_the_ledger() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;

    let err = refactorer
        .execute("app::Missing", RefactorStep::Up, None)
        .await
        .expect_err("unknown");

    assert!(matches!(err, RefactorError::UnknownRefactor { .. }));
    assert!(!refactorer.ledger().repository_exists().await?);
    Ok(())
}

#[tokio::test]
async fn hooks_run_first_and_never_touch_the_ledger() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let calls = Calls::default();
    let refactorer = refactorer(dir.path(), &calls).await?;

    refactorer
        .execute(ANNOUNCED, RefactorStep::BeforeUp, None)
        .await?;
    assert!(!refactorer.ledger().repository_exists().await?);

    refactorer.run(ANNOUNCED, false).await?;
    refactorer.run(ANNOUNCED, true).await?;

    let calls = calls.lock().expect("calls").clone();
    assert_eq!(
        calls,
        vec!["before_up", "before_up", "up", "before_down", "down"]
    );
    assert!(!refactorer.ledger().has_run(ANNOUNCED).await?);
    Ok(())
}

#[tokio::test]
async fn overridden_hook_runs_without_declaring_it() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let calls = Calls::default();
    let refactorer = refactorer(dir.path(), &calls).await?;

    refactorer.run(ANNOUNCING, false).await?;

    let calls = calls.lock().expect("calls").clone();
    assert_eq!(calls, vec!["before_up", "up"]);
    assert!(refactorer.ledger().has_run(ANNOUNCING).await?);
    Ok(())
}

#[tokio::test]
async fn absent_hooks_are_no_ops() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<CreateMarks>();

    refactorer.execute(name, RefactorStep::BeforeUp, None).await?;
    refactorer
        .execute(name, RefactorStep::BeforeDown, None)
        .await?;
    assert!(!refactorer.ledger().repository_exists().await?);
    Ok(())
}

#[tokio::test]
async fn forward_runs_advance_the_batch() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let names = [
        refactor_name::<CreateMarks>(),
        refactor_name::<ForwardOnly>(),
        ANNOUNCED,
    ];
    for name in names {
        refactorer.execute(name, RefactorStep::Up, None).await?;
    }
    assert!(refactorer.ledger().last_batch_number().await? >= names.len() as i64);
    Ok(())
}

#[tokio::test]
async fn migration_association_is_recorded() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let refactorer = refactorer(dir.path(), &Calls::default()).await?;
    let name = refactor_name::<CreateMarks>();

    refactorer
        .execute(name, RefactorStep::Up, Some("m20250101_000001_marks"))
        .await?;

    let runs = refactorer.ledger().get_run().await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].refactor, name);
    assert_eq!(runs[0].migration.as_deref(), Some("m20250101_000001_marks"));
    assert_eq!(runs[0].batch, 1);
    Ok(())
}

#[tokio::test]
async fn reporter_sees_successes_and_failures() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let reporter = Arc::new(Collecting::default());
    let refactorer = refactorer(dir.path(), &Calls::default())
        .await?
        .with_reporter(reporter.clone());

    refactorer
        .execute(refactor_name::<CreateMarks>(), RefactorStep::Up, None)
        .await?;
    refactorer
        .execute(refactor_name::<Explodes>(), RefactorStep::Up, None)
        .await
        .expect_err("unit failure");
    let err = refactorer
        .execute(refactor_name::<CreateMarks>(), RefactorStep::Up, None)
        .await
        .expect_err("already run");
    assert!(matches!(err, RefactorError::AlreadyRun { .. }));

    let outcomes = reporter.outcomes.lock().expect("outcomes").clone();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].succeeded());
    assert_eq!(outcomes[0].step, RefactorStep::Up);
    assert_eq!(outcomes[1].error.as_deref(), Some("refactor failed: boom"));
    assert_eq!(outcomes[2].refactor, refactor_name::<CreateMarks>());
    assert_eq!(
        outcomes[2].error,
        Some(format!(
            "refactor {} has already run",
            refactor_name::<CreateMarks>()
        ))
    );
    Ok(())
}

#[tokio::test]
async fn rejections_are_reported() -> RefactorResult<()> {
    let dir = tempdir().expect("tempdir");
    let reporter = Arc::new(Collecting::default());
    let refactorer = refactorer(dir.path(), &Calls::default())
        .await?
        .with_reporter(reporter.clone());

    refactorer
        .execute("app::Missing", RefactorStep::Up, None)
        .await
        .expect_err("unknown");
    refactorer
        .execute(refactor_name::<CreateMarks>(), RefactorStep::Down, None)
        .await
        .expect_err("not run");

    let not_run = format!(
        "unable to roll back refactor {}, it has not run yet",
        refactor_name::<CreateMarks>()
    );
    let outcomes = reporter.outcomes.lock().expect("outcomes").clone();
    let errors: Vec<_> = outcomes
        .iter()
        .map(|outcome| outcome.error.as_deref())
        .collect();
    assert_eq!(
        errors,
        vec![Some("unknown refactor: app::Missing"), Some(not_run.as_str())]
    );
    Ok(())
}
