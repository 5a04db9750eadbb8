//! PostgreSQL record store.
//!
//! Uses deadpool-postgres connection pools as the session factory: one pool
//! for read sessions and one for write sessions. The read pool may point at a
//! replica; when no replica is configured both pools target the primary.
//!
//! Every operation checks a session out of the relevant pool for the duration
//! of a single statement. Streams keep their session until they are dropped.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime};
use futures_util::{pin_mut, Stream, StreamExt, TryStreamExt};
use roster_core::{NameFilter, Person, RosterError, RosterResult, StoreError};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use crate::record::{PersonStream, RecordStore};

/// Table holding person rows.
pub const PERSON_TABLE: &str = "person";

const SELECT_COLUMNS: &str = "SELECT login, first_name, last_name, age FROM person";

/// A pooled database session.
pub type Session = deadpool_postgres::Object;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host (primary, used for writes)
    pub host: String,
    /// Optional replica host for read sessions
    pub read_host: Option<String>,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum size of each pool
    pub max_size: usize,
    /// How long to wait for a free session before failing
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            read_host: None,
            port: 5432,
            dbname: "roster".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("ROSTER_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            read_host: std::env::var("ROSTER_DB_READ_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty()),
            port: std::env::var("ROSTER_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("ROSTER_DB_NAME").unwrap_or_else(|_| "roster".to_string()),
            user: std::env::var("ROSTER_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("ROSTER_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("ROSTER_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("ROSTER_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    fn create_pool(&self, host: &str) -> RosterResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(host.to_string());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            StoreError::Connection {
                reason: format!("Failed to create pool for {}: {}", host, e),
            }
            .into()
        })
    }
}

// ============================================================================
// SESSION FACTORY
// ============================================================================

/// Hands out read and write sessions from two connection pools.
#[derive(Clone)]
pub struct PgSessionFactory {
    read: Pool,
    write: Pool,
}

impl PgSessionFactory {
    /// Build both pools. Connections are established lazily on first use.
    pub fn from_config(config: &DbConfig) -> RosterResult<Self> {
        let write = config.create_pool(&config.host)?;
        let read = match &config.read_host {
            Some(replica) => config.create_pool(replica)?,
            None => write.clone(),
        };
        Ok(Self { read, write })
    }

    /// Check out a session for queries.
    pub async fn open_read_session(&self) -> RosterResult<Session> {
        self.read.get().await.map_err(map_pool_error)
    }

    /// Check out a session for statements that modify data.
    pub async fn open_write_session(&self) -> RosterResult<Session> {
        self.write.get().await.map_err(map_pool_error)
    }

    /// Current number of connections held by the write pool.
    pub fn pool_size(&self) -> usize {
        self.write.status().size
    }

    /// Close both pools. Checked-out sessions are dropped when returned.
    pub fn close(&self) {
        self.read.close();
        self.write.close();
    }
}

fn map_pool_error(err: PoolError) -> RosterError {
    tracing::error!("Connection pool error: {:?}", err);
    let reason = match err {
        PoolError::Timeout(_) => "timed out waiting for a database session".to_string(),
        PoolError::Closed => "database connection pool is closed".to_string(),
        other => other.to_string(),
    };
    StoreError::Connection { reason }.into()
}

fn map_pg_error(err: tokio_postgres::Error) -> RosterError {
    if err.is_closed() {
        return StoreError::Connection {
            reason: err.to_string(),
        }
        .into();
    }
    match err.as_db_error() {
        Some(db) => StoreError::Query {
            reason: format!("{}: {}", db.code().code(), db.message()),
        }
        .into(),
        None => StoreError::Connection {
            reason: err.to_string(),
        }
        .into(),
    }
}

fn map_insert_error(err: tokio_postgres::Error, login: &str) -> RosterError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return StoreError::Constraint {
            login: login.to_string(),
            reason: err
                .as_db_error()
                .map(|db| db.message().to_string())
                .unwrap_or_else(|| err.to_string()),
        }
        .into();
    }
    map_pg_error(err)
}

fn map_schema_error(err: RosterError) -> RosterError {
    match err {
        RosterError::Store(StoreError::Connection { reason })
        | RosterError::Store(StoreError::Query { reason }) => {
            StoreError::Schema { reason }.into()
        }
        other => other,
    }
}

fn row_to_person(row: &Row) -> RosterResult<Person> {
    let read = |e: tokio_postgres::Error| -> RosterError {
        StoreError::Query {
            reason: format!("Unexpected row shape: {}", e),
        }
        .into()
    };
    Ok(Person {
        login: row.try_get("login").map_err(read)?,
        first_name: row.try_get("first_name").map_err(read)?,
        last_name: row.try_get("last_name").map_err(read)?,
        age: row.try_get("age").map_err(read)?,
    })
}

/// Run a query on an owned session and yield rows as they arrive.
fn stream_rows(
    session: Session,
    sql: String,
    params: Vec<String>,
) -> impl Stream<Item = RosterResult<Person>> + Send + 'static {
    try_stream! {
        let rows = session
            .query_raw(sql.as_str(), params)
            .await
            .map_err(map_pg_error)?;
        pin_mut!(rows);
        while let Some(row) = rows.try_next().await.map_err(map_pg_error)? {
            yield row_to_person(&row)?;
        }
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// PostgreSQL implementation of [`RecordStore`].
#[derive(Clone)]
pub struct PgRecordStore {
    sessions: PgSessionFactory,
}

impl PgRecordStore {
    pub fn new(sessions: PgSessionFactory) -> Self {
        Self { sessions }
    }

    /// Build a store and its pools from configuration.
    pub fn from_config(config: &DbConfig) -> RosterResult<Self> {
        Ok(Self::new(PgSessionFactory::from_config(config)?))
    }

    pub fn sessions(&self) -> &PgSessionFactory {
        &self.sessions
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn init_schema(&self) -> RosterResult<()> {
        let session = self
            .sessions
            .open_write_session()
            .await
            .map_err(map_schema_error)?;

        session
            .batch_execute(
                "DROP TABLE IF EXISTS person;
                 CREATE TABLE IF NOT EXISTS person (
                     login VARCHAR(50) NOT NULL PRIMARY KEY,
                     first_name VARCHAR(256) NOT NULL,
                     last_name VARCHAR(256) NOT NULL,
                     age INT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS person_first_name_idx ON person (first_name);
                 CREATE INDEX IF NOT EXISTS person_last_name_idx ON person (last_name);",
            )
            .await
            .map_err(|e| map_schema_error(map_pg_error(e)))?;

        tracing::info!(table = PERSON_TABLE, "Person schema recreated");
        Ok(())
    }

    async fn find_by_login(&self, login: &str) -> RosterResult<Option<Person>> {
        let session = self.sessions.open_read_session().await?;
        let sql = format!("{} WHERE login = $1", SELECT_COLUMNS);
        let row = session
            .query_opt(sql.as_str(), &[&login])
            .await
            .map_err(map_pg_error)?;
        row.as_ref().map(row_to_person).transpose()
    }

    async fn find_all(&self) -> RosterResult<PersonStream> {
        let session = self.sessions.open_read_session().await?;
        let sql = format!("{} ORDER BY login", SELECT_COLUMNS);
        Ok(stream_rows(session, sql, Vec::new()).boxed())
    }

    async fn search(&self, filter: &NameFilter) -> RosterResult<PersonStream> {
        let session = self.sessions.open_read_session().await?;
        let sql = format!(
            "{} WHERE first_name ILIKE $1 AND last_name ILIKE $2 ORDER BY login",
            SELECT_COLUMNS
        );
        let params = vec![filter.first_name_pattern(), filter.last_name_pattern()];
        Ok(stream_rows(session, sql, params).boxed())
    }

    async fn insert(&self, person: &Person) -> RosterResult<()> {
        let session = self.sessions.open_write_session().await?;
        session
            .execute(
                "INSERT INTO person (login, first_name, last_name, age) VALUES ($1, $2, $3, $4)",
                &[
                    &person.login,
                    &person.first_name,
                    &person.last_name,
                    &person.age,
                ],
            )
            .await
            .map_err(|e| map_insert_error(e, &person.login))?;
        Ok(())
    }

    async fn delete(&self, login: &str) -> RosterResult<bool> {
        let session = self.sessions.open_write_session().await?;
        let deleted = session
            .execute("DELETE FROM person WHERE login = $1", &[&login])
            .await
            .map_err(map_pg_error)?;
        Ok(deleted > 0)
    }
}
