//! Record store port and its backends.
//!
//! [`RecordStore`] is the single capability surface the resolver and the
//! reset scheduler are written against. Two concrete variants exist:
//!
//! - [`PostgresRecordStore`]: durable, backed by a connected `sqlx` pool.
//! - [`VolatileRecordStore`]: in-process, seeded with fixtures so the server
//!   runs with zero configuration.
//!
//! [`DualRecordStore`] picks between them on every call by probing whether
//! the durable backend is attached and reachable. Business logic never
//! branches on which variant is active.

mod dual;
mod postgres;
mod volatile;

pub use dual::DualRecordStore;
pub use postgres::{HEALTH_CHECK_INTERVAL, PostgresRecordStore};
pub use volatile::VolatileRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatelog_model::{
    AttendanceLog, LogFilter, NewLog, NewUser, User, UserUpdate,
};

use crate::error::Result;

/// Maximum number of logs a listing returns.
pub const LOG_LIST_LIMIT: usize = 500;

/// Which backend served (or would serve) a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackend {
    Durable,
    Volatile,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Durable => "durable",
            StoreBackend::Volatile => "volatile",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to users and attendance logs.
///
/// Both variants satisfy identical pre/postconditions:
/// users list newest-created first, logs list newest `time_in` first and
/// are capped at [`LOG_LIST_LIMIT`], badge lookups ignore case.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Which variant this is.
    fn backend(&self) -> StoreBackend;

    /// Availability check. `false` means calls are expected to fail.
    fn is_available(&self) -> bool {
        true
    }

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn get_user_by_badge(&self, badge: &str) -> Result<Option<User>>;

    /// Assigns a fresh id and creation timestamp. Fails with
    /// `DuplicateBadge` if the badge is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>>;

    /// Returns the removed record.
    async fn delete_user(&self, id: &str) -> Result<Option<User>>;

    async fn list_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<AttendanceLog>>;

    async fn get_log_by_id(&self, id: &str) -> Result<Option<AttendanceLog>>;

    async fn create_log(&self, log: NewLog) -> Result<AttendanceLog>;

    /// Open session for the pair; most recent `time_in` wins if several exist.
    async fn find_open_log(
        &self,
        badge: &str,
        scanner: &str,
    ) -> Result<Option<AttendanceLog>>;

    /// Persist mutations made to a previously fetched log.
    async fn save_log(&self, log: &AttendanceLog) -> Result<AttendanceLog>;

    /// Set `time_out = cutoff` on every open log. Returns how many closed.
    async fn close_open_logs(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
