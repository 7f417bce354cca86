use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatelog_model::{
    AttendanceLog, LogFilter, NewLog, NewUser, User, UserRole, UserUpdate,
};
use sqlx::{
    PgPool, Postgres, QueryBuilder,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LOG_LIST_LIMIT, RecordStore, StoreBackend};
use crate::error::{CoreError, Result};

const USER_COLUMNS: &str = "id, name, id_number, role, date_created, \
     password_hash, created_at, updated_at";
const LOG_COLUMNS: &str = "id, time_in, time_out, user_name, user_id_number, \
     rfid_scanner_id, created_at, updated_at";

/// How often the health monitor pings the database.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Durable store on PostgreSQL. `users` and `logs` tables, see
/// `migrations/`.
///
/// Connectivity is tracked from query outcomes: a connection-level failure
/// marks the store unavailable until a later query or health check
/// succeeds.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
    connected: Arc<AtomicBool>,
}

impl fmt::Debug for PostgresRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresRecordStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("closed", &self.pool.is_closed())
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl PostgresRecordStore {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(1);

        let connect_options: PgConnectOptions =
            connection_string.parse().map_err(|e| {
                CoreError::StoreUnavailable(format!(
                    "invalid database url: {e}"
                ))
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .max_lifetime(Duration::from_secs(1800))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                CoreError::StoreUnavailable(format!(
                    "Database connection failed: {e}"
                ))
            })?;

        info!(
            max_connections,
            min_connections, "database pool initialized"
        );

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool, assumed reachable until a query says
    /// otherwise.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Ping the database and update the connectivity flag.
    pub async fn check_health(&self) -> bool {
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        match self.observe(result) {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "database health check failed");
                self.mark_connected(false);
                false
            }
        }
    }

    /// Re-check connectivity every `interval` until `shutdown` fires.
    pub fn spawn_health_monitor(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("database health monitor stopped");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {
                        self.check_health().await;
                    }
                }
            }
        })
    }

    /// Record the connectivity implied by a query result.
    fn observe<T>(
        &self,
        result: std::result::Result<T, sqlx::Error>,
    ) -> std::result::Result<T, sqlx::Error> {
        match &result {
            Ok(_) => self.mark_connected(true),
            Err(err) if is_connectivity_error(err) => {
                self.mark_connected(false)
            }
            Err(_) => {}
        }
        result
    }

    fn mark_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was && !connected {
            warn!("database connection lost");
        } else if !was && connected {
            info!("database connection restored");
        }
    }

    fn fresh_id() -> String {
        Uuid::now_v7().to_string()
    }
}

/// Errors that say nothing about the query and everything about the link.
fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Durable
    }

    fn is_available(&self) -> bool {
        !self.pool.is_closed() && self.connected.load(Ordering::Relaxed)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = self.observe(
            sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY date_created DESC"
            ))
            .fetch_all(&self.pool)
            .await,
        )?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.observe(
            sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await,
        )?
        .map(User::try_from)
        .transpose()
    }

    async fn get_user_by_badge(&self, badge: &str) -> Result<Option<User>> {
        self.observe(
            sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE lower(id_number) = lower($1) LIMIT 1"
            ))
            .bind(badge.trim())
            .fetch_optional(&self.pool)
            .await,
        )?
        .map(User::try_from)
        .transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = self
            .observe(
                sqlx::query_as::<_, UserRow>(&format!(
                    "INSERT INTO users (id, name, id_number, role) \
                     VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
                ))
                .bind(Self::fresh_id())
                .bind(&user.name)
                .bind(&user.id_number)
                .bind(user.role.as_str())
                .fetch_one(&self.pool)
                .await,
            )
            .map_err(|err| {
                if let sqlx::Error::Database(db) = &err
                    && db.is_unique_violation()
                {
                    return CoreError::DuplicateBadge(user.id_number.clone());
                }
                CoreError::from(err)
            })?;

        User::try_from(row)
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>> {
        self.observe(
            sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users SET \
                    name = COALESCE($2, name), \
                    role = COALESCE($3, role), \
                    password_hash = COALESCE($4, password_hash), \
                    updated_at = NOW() \
                 WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .bind(id)
            .bind(update.name)
            .bind(update.role.map(|r| r.as_str()))
            .bind(update.password_hash)
            .fetch_optional(&self.pool)
            .await,
        )?
        .map(User::try_from)
        .transpose()
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>> {
        self.observe(
            sqlx::query_as::<_, UserRow>(&format!(
                "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await,
        )?
        .map(User::try_from)
        .transpose()
    }

    async fn list_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<AttendanceLog>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE TRUE"
        ));

        if let Some(badge) = &filter.user_id_number {
            builder.push(" AND lower(user_id_number) = lower(");
            builder.push_bind(badge.trim().to_string());
            builder.push(")");
        }
        if let Some(scanner) = &filter.rfid_scanner_id {
            builder.push(" AND rfid_scanner_id = ");
            builder.push_bind(scanner.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND time_in >= ");
            builder.push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND time_in <= ");
            builder.push_bind(to);
        }

        builder.push(" ORDER BY time_in DESC LIMIT ");
        builder.push_bind(LOG_LIST_LIMIT as i64);

        let rows = self.observe(
            builder
                .build_query_as::<LogRow>()
                .fetch_all(&self.pool)
                .await,
        )?;

        Ok(rows.into_iter().map(AttendanceLog::from).collect())
    }

    async fn get_log_by_id(&self, id: &str) -> Result<Option<AttendanceLog>> {
        let row = self.observe(
            sqlx::query_as::<_, LogRow>(&format!(
                "SELECT {LOG_COLUMNS} FROM logs WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await,
        )?;

        Ok(row.map(AttendanceLog::from))
    }

    async fn create_log(&self, log: NewLog) -> Result<AttendanceLog> {
        let row = self.observe(
            sqlx::query_as::<_, LogRow>(&format!(
                "INSERT INTO logs \
                    (id, time_in, time_out, user_name, user_id_number, \
                     rfid_scanner_id) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {LOG_COLUMNS}"
            ))
            .bind(Self::fresh_id())
            .bind(log.time_in)
            .bind(log.time_out)
            .bind(&log.user_name)
            .bind(&log.user_id_number)
            .bind(&log.rfid_scanner_id)
            .fetch_one(&self.pool)
            .await,
        )?;

        Ok(row.into())
    }

    async fn find_open_log(
        &self,
        badge: &str,
        scanner: &str,
    ) -> Result<Option<AttendanceLog>> {
        let row = self.observe(
            sqlx::query_as::<_, LogRow>(&format!(
                "SELECT {LOG_COLUMNS} FROM logs \
                 WHERE lower(user_id_number) = lower($1) \
                   AND rfid_scanner_id = $2 \
                   AND time_out IS NULL \
                 ORDER BY time_in DESC LIMIT 1"
            ))
            .bind(badge.trim())
            .bind(scanner)
            .fetch_optional(&self.pool)
            .await,
        )?;

        Ok(row.map(AttendanceLog::from))
    }

    async fn save_log(&self, log: &AttendanceLog) -> Result<AttendanceLog> {
        let row = self
            .observe(
                sqlx::query_as::<_, LogRow>(&format!(
                    "UPDATE logs SET \
                        time_in = $2, \
                        time_out = $3, \
                        user_name = $4, \
                        user_id_number = $5, \
                        rfid_scanner_id = $6, \
                        updated_at = NOW() \
                     WHERE id = $1 RETURNING {LOG_COLUMNS}"
                ))
                .bind(&log.id)
                .bind(log.time_in)
                .bind(log.time_out)
                .bind(&log.user_name)
                .bind(&log.user_id_number)
                .bind(&log.rfid_scanner_id)
                .fetch_optional(&self.pool)
                .await,
            )?
            .ok_or_else(|| CoreError::NotFound(format!("log {}", log.id)))?;

        Ok(row.into())
    }

    async fn close_open_logs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = self.observe(
            sqlx::query(
                "UPDATE logs SET time_out = $1, updated_at = NOW() \
                 WHERE time_out IS NULL",
            )
            .bind(cutoff)
            .execute(&self.pool)
            .await,
        )?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    id_number: String,
    role: String,
    date_created: DateTime<Utc>,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row.role.parse::<UserRole>().map_err(|e| {
            CoreError::StoreUnavailable(format!(
                "corrupt user row {}: {e}",
                row.id
            ))
        })?;

        Ok(User {
            id: row.id,
            name: row.name,
            id_number: row.id_number,
            role,
            date_created: row.date_created,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: String,
    time_in: DateTime<Utc>,
    time_out: Option<DateTime<Utc>>,
    user_name: String,
    user_id_number: String,
    rfid_scanner_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LogRow> for AttendanceLog {
    fn from(row: LogRow) -> Self {
        AttendanceLog {
            id: row.id,
            time_in: row.time_in,
            time_out: row.time_out,
            user_name: row.user_name,
            user_id_number: row.user_id_number,
            rfid_scanner_id: row.rfid_scanner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
