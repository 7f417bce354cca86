//! Scan resolution state machine.
//!
//! Each scan resolves to exactly one [`ScanOutcome`]:
//!
//! 1. badge unknown → [`ScanOutcome::UnknownUser`], nothing written;
//! 2. badge inside its cooldown window → [`ScanOutcome::DuplicateIgnored`],
//!    nothing written and the debounce anchor is left untouched;
//! 3. an open session exists for (badge, scanner) → it is closed at `now`;
//! 4. otherwise a new session is opened at `now`.
//!
//! At most one store write happens per call and it is always the last
//! store interaction, so a failure leaves no partial state behind.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gatelog_model::{AttendanceLog, NewLog, UserSummary, badge_key};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::cooldown::CooldownTracker;
use crate::error::{CoreError, Result};
use crate::store::RecordStore;

/// What a scan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    UnknownUser,
    DuplicateIgnored {
        user: UserSummary,
    },
    SessionClosed {
        user: UserSummary,
        log: AttendanceLog,
    },
    SessionOpened {
        user: UserSummary,
        log: AttendanceLog,
    },
}

/// Wire-level name of a resolved action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanAction {
    TimeIn,
    TimeOut,
    Ignored,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::TimeIn => "timeIn",
            ScanAction::TimeOut => "timeOut",
            ScanAction::Ignored => "ignored",
        }
    }
}

impl ScanOutcome {
    pub fn user_found(&self) -> bool {
        !matches!(self, ScanOutcome::UnknownUser)
    }

    pub fn action(&self) -> Option<ScanAction> {
        match self {
            ScanOutcome::UnknownUser => None,
            ScanOutcome::DuplicateIgnored { .. } => Some(ScanAction::Ignored),
            ScanOutcome::SessionClosed { .. } => Some(ScanAction::TimeOut),
            ScanOutcome::SessionOpened { .. } => Some(ScanAction::TimeIn),
        }
    }

    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            ScanOutcome::UnknownUser => None,
            ScanOutcome::DuplicateIgnored { user }
            | ScanOutcome::SessionClosed { user, .. }
            | ScanOutcome::SessionOpened { user, .. } => Some(user),
        }
    }

    pub fn log(&self) -> Option<&AttendanceLog> {
        match self {
            ScanOutcome::SessionClosed { log, .. }
            | ScanOutcome::SessionOpened { log, .. } => Some(log),
            _ => None,
        }
    }
}

type SessionKey = (String, String);

pub struct ScanResolver {
    store: Arc<dyn RecordStore>,
    cooldown: Arc<CooldownTracker>,
    /// Present only when per-(badge, scanner) serialization is enabled.
    session_locks: Option<DashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl fmt::Debug for ScanResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanResolver")
            .field("backend", &self.store.backend())
            .field("cooldown", &self.cooldown)
            .field("serialize_sessions", &self.session_locks.is_some())
            .finish()
    }
}

impl ScanResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cooldown: Arc<CooldownTracker>,
    ) -> Self {
        Self {
            store,
            cooldown,
            session_locks: None,
        }
    }

    /// Serialize the open/close decision per (badge, scanner) pair. Off by
    /// default: two concurrent first taps for the same pair may otherwise
    /// both open a session.
    pub fn with_serialized_sessions(mut self, enabled: bool) -> Self {
        self.session_locks = enabled.then(DashMap::new);
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn cooldown(&self) -> &Arc<CooldownTracker> {
        &self.cooldown
    }

    pub async fn resolve_scan(
        &self,
        badge: &str,
        scanner: &str,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome> {
        let badge = badge.trim();
        let scanner = scanner.trim();
        if badge.is_empty() {
            return Err(CoreError::InvalidInput(
                "userIdNumber is required".into(),
            ));
        }
        if scanner.is_empty() {
            return Err(CoreError::InvalidInput(
                "rfidScannerId is required".into(),
            ));
        }

        let Some(user) = self
            .store
            .get_user_by_badge(badge)
            .await
            .map_err(store_failure)?
        else {
            debug!(badge, scanner, "scan for unknown badge");
            return Ok(ScanOutcome::UnknownUser);
        };

        if self.cooldown.is_cooling_down(badge, now) {
            debug!(badge, scanner, "duplicate tap ignored");
            return Ok(ScanOutcome::DuplicateIgnored {
                user: user.summary(),
            });
        }

        let session_guard = self.lock_session(badge, scanner).await;
        if session_guard.is_some() && self.cooldown.is_cooling_down(badge, now)
        {
            debug!(badge, scanner, "duplicate tap ignored after wait");
            return Ok(ScanOutcome::DuplicateIgnored {
                user: user.summary(),
            });
        }

        let open = self
            .store
            .find_open_log(&user.id_number, scanner)
            .await
            .map_err(store_failure)?;

        if let Some(mut log) = open {
            log.close(now);
            let log = self.store.save_log(&log).await.map_err(store_failure)?;
            self.cooldown.record_accepted(badge, now);
            info!(badge, scanner, log_id = %log.id, "time out recorded");
            return Ok(ScanOutcome::SessionClosed {
                user: user.summary(),
                log,
            });
        }

        let log = self
            .store
            .create_log(NewLog::open(
                now,
                user.name.clone(),
                user.id_number.clone(),
                scanner,
            ))
            .await
            .map_err(store_failure)?;
        self.cooldown.record_accepted(badge, now);
        info!(badge, scanner, log_id = %log.id, "time in recorded");

        Ok(ScanOutcome::SessionOpened {
            user: user.summary(),
            log,
        })
    }

    async fn lock_session(
        &self,
        badge: &str,
        scanner: &str,
    ) -> Option<OwnedMutexGuard<()>> {
        let locks = self.session_locks.as_ref()?;
        let lock = locks
            .entry((badge_key(badge), scanner.to_string()))
            .or_default()
            .clone();
        Some(lock.lock_owned().await)
    }
}

fn store_failure(err: CoreError) -> CoreError {
    match err {
        CoreError::StoreUnavailable(_) => err,
        other => CoreError::StoreUnavailable(other.to_string()),
    }
}
