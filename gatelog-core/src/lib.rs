//! Core of the gatelog RFID access-log server.
//!
//! A badge tap arrives as a (badge, scanner) pair and is resolved by
//! [`ScanResolver`] into one of four outcomes: unknown badge, duplicate tap
//! inside the cooldown window, time-out of an open session, or time-in of a
//! new one. Sessions are persisted through the [`RecordStore`] port, which
//! routes to Postgres when it is reachable and to an in-process store
//! otherwise. [`DailyResetScheduler`] closes whatever is still open after
//! midnight.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod clock;
pub mod cooldown;
pub mod credentials;
pub mod error;
pub mod resolver;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
pub use credentials::{CredentialHasher, MIN_PASSWORD_LEN};
pub use error::{CoreError, Result};
pub use resolver::{ScanAction, ScanOutcome, ScanResolver};
pub use scheduler::DailyResetScheduler;
pub use store::{
    DualRecordStore, HEALTH_CHECK_INTERVAL, LOG_LIST_LIMIT,
    PostgresRecordStore, RecordStore, StoreBackend, VolatileRecordStore,
};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
#[cfg(any(test, feature = "test-utils"))]
pub use store::MockRecordStore;

/// Embedded schema migrations for the durable store.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
