use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use sea_orm::sea_query::{
    Alias, Expr, Func, Iden, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query,
    QueryStatementWriter, SqliteQueryBuilder,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    ExecResult, QueryResult, SqlErr, Statement,
};
use sea_orm_migration::SchemaManager;
use sea_orm_migration::prelude::{ColumnDef, Index, Table};

use crate::RefactorConfig;
use crate::db::{REFACTORS_DIRECT_UNIQUE_INDEX, REFACTORS_UNIQUE_INDEX, Refactors};
use refactors_core::{
    AvailableUnit, LedgerRecord, RefactorLedgerApi, RefactorRegistry, RefactorResult,
};

const UNKNOWN: u8 = 0;
const ABSENT: u8 = 1;
const PRESENT: u8 = 2;

/// sea-orm backed ledger of completed refactors.
///
/// Clones share the connection pool and the table-exists cache.
#[derive(Clone)]
pub struct RefactorLedger {
    conn: DatabaseConnection,
    exists: Arc<AtomicU8>,
    source_dir: Option<PathBuf>,
}

impl RefactorLedger {
    pub async fn connect(config: &RefactorConfig, base_dir: &Path) -> RefactorResult<Self> {
        let url = config.connection_url(base_dir)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await?;
        debug!("ledger: connected to {} backend", config.backend_name());
        Ok(Self::from_connection(conn).with_source_dir(config.source_dir(base_dir)))
    }

    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            exists: Arc::new(AtomicU8::new(UNKNOWN)),
            source_dir: None,
        }
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Registered units and unclaimed source files. Does not touch the table.
    pub fn available_refactor_units(
        &self,
        registry: &RefactorRegistry,
    ) -> RefactorResult<BTreeMap<String, AvailableUnit>> {
        registry.available(self.source_dir())
    }

    async fn ensure_repository(&self) -> RefactorResult<()> {
        if self.exists.load(Ordering::Acquire) == PRESENT {
            return Ok(());
        }
        if !self.repository_exists().await? {
            self.create_repository().await?;
        }
        Ok(())
    }

    async fn direct_record_exists(&self, refactor: &str) -> RefactorResult<bool> {
        let select = Query::select()
            .from(Refactors::Table)
            .column(Refactors::Id)
            .and_where(Expr::col(Refactors::Refactor).eq(refactor))
            .and_where(Expr::col(Refactors::Migration).is_null())
            .limit(1)
            .to_owned();
        Ok(query_one(&self.conn, &select).await?.is_some())
    }
}

#[async_trait]
impl RefactorLedgerApi for RefactorLedger {
    async fn repository_exists(&self) -> RefactorResult<bool> {
        match self.exists.load(Ordering::Acquire) {
            PRESENT => return Ok(true),
            ABSENT => return Ok(false),
            _ => {}
        }
        let manager = SchemaManager::new(&self.conn);
        let exists = manager.has_table(Refactors::Table.to_string()).await?;
        self.exists
            .store(if exists { PRESENT } else { ABSENT }, Ordering::Release);
        Ok(exists)
    }

    async fn create_repository(&self) -> RefactorResult<()> {
        let manager = SchemaManager::new(&self.conn);
        manager
            .create_table(
                Table::create()
                    .table(Refactors::Table)
                    .col(
                        ColumnDef::new(Refactors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Refactors::Refactor).string().not_null())
                    .col(ColumnDef::new(Refactors::Migration).string().null())
                    .col(ColumnDef::new(Refactors::Batch).big_integer().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name(REFACTORS_UNIQUE_INDEX)
                    .table(Refactors::Table)
                    .col(Refactors::Refactor)
                    .col(Refactors::Migration)
                    .unique()
                    .to_owned(),
            )
            .await?;
        if supports_partial_index(self.conn.get_database_backend()) {
            self.conn
                .execute_unprepared(&format!(
                    "CREATE UNIQUE INDEX {REFACTORS_DIRECT_UNIQUE_INDEX} ON {table} ({refactor}) \
                     WHERE {migration} IS NULL",
                    table = col_name(Refactors::Table),
                    refactor = col_name(Refactors::Refactor),
                    migration = col_name(Refactors::Migration),
                ))
                .await?;
        }
        self.exists.store(PRESENT, Ordering::Release);
        info!("ledger: created {} table", Refactors::Table.to_string());
        Ok(())
    }

    async fn has_run(&self, refactor: &str) -> RefactorResult<bool> {
        self.ensure_repository().await?;
        let select = Query::select()
            .from(Refactors::Table)
            .column(Refactors::Id)
            .and_where(Expr::col(Refactors::Refactor).eq(refactor))
            .limit(1)
            .to_owned();
        Ok(query_one(&self.conn, &select).await?.is_some())
    }

    async fn log(
        &self,
        refactor: &str,
        migration: Option<&str>,
        batch: Option<i64>,
    ) -> RefactorResult<bool> {
        self.ensure_repository().await?;
        // MySQL has no partial indexes, so direct runs are checked by hand there.
        if migration.is_none()
            && !supports_partial_index(self.conn.get_database_backend())
            && self.direct_record_exists(refactor).await?
        {
            debug!("ledger: {refactor} already logged without a migration");
            return Ok(false);
        }
        let batch = match batch {
            Some(batch) => batch,
            None => self.last_batch_number().await? + 1,
        };
        let insert = Query::insert()
            .into_table(Refactors::Table)
            .columns([Refactors::Refactor, Refactors::Migration, Refactors::Batch])
            .values_panic([
                refactor.into(),
                migration.map(str::to_string).into(),
                batch.into(),
            ])
            .to_owned();
        match exec(&self.conn, &insert).await {
            Ok(_) => {
                debug!("ledger: logged {refactor} in batch {batch}");
                Ok(true)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("ledger: {refactor} already logged for {migration:?}");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, refactor: &str) -> RefactorResult<u64> {
        self.ensure_repository().await?;
        let delete = Query::delete()
            .from_table(Refactors::Table)
            .and_where(Expr::col(Refactors::Refactor).eq(refactor))
            .to_owned();
        let result = exec(&self.conn, &delete).await?;
        Ok(result.rows_affected())
    }

    async fn reset(&self) -> RefactorResult<u64> {
        self.ensure_repository().await?;
        let delete = Query::delete().from_table(Refactors::Table).to_owned();
        let result = exec(&self.conn, &delete).await?;
        info!("ledger: reset removed {} records", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn last_batch_number(&self) -> RefactorResult<i64> {
        self.ensure_repository().await?;
        let select = Query::select()
            .expr_as(Func::max(Expr::col(Refactors::Batch)), Alias::new("max_batch"))
            .from(Refactors::Table)
            .to_owned();
        let Some(row) = query_one(&self.conn, &select).await? else {
            return Ok(0);
        };
        let max: Option<i64> = row.try_get("", "max_batch")?;
        Ok(max.unwrap_or(0))
    }

    async fn get_run(&self) -> RefactorResult<Vec<LedgerRecord>> {
        self.ensure_repository().await?;
        let select = Query::select()
            .from(Refactors::Table)
            .columns([
                Refactors::Id,
                Refactors::Refactor,
                Refactors::Migration,
                Refactors::Batch,
            ])
            .order_by(Refactors::Refactor, Order::Asc)
            .order_by(Refactors::Batch, Order::Asc)
            .to_owned();
        query_all(&self.conn, &select)
            .await?
            .iter()
            .map(read_record)
            .collect()
    }
}

fn read_record(row: &QueryResult) -> RefactorResult<LedgerRecord> {
    let id: i32 = row.try_get("", &col_name(Refactors::Id))?;
    Ok(LedgerRecord {
        id: i64::from(id),
        refactor: row.try_get("", &col_name(Refactors::Refactor))?,
        migration: row.try_get("", &col_name(Refactors::Migration))?,
        batch: row.try_get("", &col_name(Refactors::Batch))?,
    })
}

fn supports_partial_index(backend: DatabaseBackend) -> bool {
    matches!(backend, DatabaseBackend::Sqlite | DatabaseBackend::Postgres)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn col_name(column: impl Iden) -> String {
    column.to_string()
}

fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        #[allow(unreachable_patterns)]
        _ => stmt.build(SqliteQueryBuilder),
    }
}

async fn exec<C, S>(conn: &C, stmt: &S) -> Result<ExecResult, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.execute(Statement::from_sql_and_values(backend, sql, values))
        .await
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_all(Statement::from_sql_and_values(backend, sql, values))
        .await
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_one(Statement::from_sql_and_values(backend, sql, values))
        .await
}
