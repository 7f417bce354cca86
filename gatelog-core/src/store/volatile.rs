use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gatelog_model::{
    AttendanceLog, LogFilter, NewLog, NewUser, User, UserRole, UserUpdate,
};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{LOG_LIST_LIMIT, RecordStore, StoreBackend};
use crate::error::{CoreError, Result};

/// In-process store. Records are kept newest-first, mirroring insertion at
/// the front of the collection.
#[derive(Debug, Default)]
pub struct VolatileRecordStore {
    state: RwLock<VolatileState>,
}

#[derive(Debug, Default)]
struct VolatileState {
    users: VecDeque<User>,
    logs: VecDeque<AttendanceLog>,
}

impl VolatileRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the demo directory and a handful of logs,
    /// timestamped relative to `now`.
    pub fn with_fixtures(now: DateTime<Utc>) -> Self {
        let user = |id: &str, name: &str, badge: &str, role, age_days| {
            let created = now - Duration::days(age_days);
            User {
                id: id.to_string(),
                name: name.to_string(),
                id_number: badge.to_string(),
                role,
                date_created: created,
                password_hash: None,
                created_at: created,
                updated_at: created,
            }
        };
        let log = |id: &str,
                   name: &str,
                   badge: &str,
                   scanner: &str,
                   in_hours: i64,
                   out_hours: Option<i64>| {
            let time_in = now - Duration::hours(in_hours);
            let time_out = out_hours.map(|h| now - Duration::hours(h));
            AttendanceLog {
                id: id.to_string(),
                time_in,
                time_out,
                user_name: name.to_string(),
                user_id_number: badge.to_string(),
                rfid_scanner_id: scanner.to_string(),
                created_at: time_in,
                updated_at: time_out.unwrap_or(time_in),
            }
        };

        let state = VolatileState {
            users: VecDeque::from(vec![
                user("u1", "Alice Johnson", "A1001", UserRole::User, 10),
                user("u2", "Bob Santos", "B2002", UserRole::Staff, 5),
                user("u3", "Guard Maria", "G3003", UserRole::Guard, 2),
            ]),
            logs: VecDeque::from(vec![
                log("l1", "Alice Johnson", "A1001", "SCANNER-1", 5, Some(2)),
                log("l2", "Bob Santos", "B2002", "SCANNER-1", 26, Some(20)),
                log("l3", "Guard Maria", "G3003", "SCANNER-2", 1, None),
            ]),
        };

        Self {
            state: RwLock::new(state),
        }
    }

    pub fn user_count(&self) -> usize {
        self.state.read().users.len()
    }

    pub fn log_count(&self) -> usize {
        self.state.read().logs.len()
    }

    fn fresh_id() -> String {
        Uuid::now_v7().to_string()
    }
}

#[async_trait]
impl RecordStore for VolatileRecordStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Volatile
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> =
            self.state.read().users.iter().cloned().collect();
        users.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(users)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.state.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_badge(&self, badge: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .read()
            .users
            .iter()
            .find(|u| u.has_badge(badge))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write();
        if state.users.iter().any(|u| u.has_badge(&user.id_number)) {
            return Err(CoreError::DuplicateBadge(user.id_number));
        }

        let now = Utc::now();
        let record = User {
            id: Self::fresh_id(),
            name: user.name,
            id_number: user.id_number,
            role: user.role,
            date_created: now,
            password_hash: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push_front(record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>> {
        let mut state = self.state.write();
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.apply(&update, Utc::now());
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>> {
        let mut state = self.state.write();
        let index = state.users.iter().position(|u| u.id == id);
        Ok(index.and_then(|i| state.users.remove(i)))
    }

    async fn list_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<AttendanceLog>> {
        let mut logs: Vec<AttendanceLog> = self
            .state
            .read()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.time_in.cmp(&a.time_in));
        logs.truncate(LOG_LIST_LIMIT);
        Ok(logs)
    }

    async fn get_log_by_id(&self, id: &str) -> Result<Option<AttendanceLog>> {
        Ok(self.state.read().logs.iter().find(|l| l.id == id).cloned())
    }

    async fn create_log(&self, log: NewLog) -> Result<AttendanceLog> {
        let record = AttendanceLog {
            id: Self::fresh_id(),
            time_in: log.time_in,
            time_out: log.time_out,
            user_name: log.user_name,
            user_id_number: log.user_id_number,
            rfid_scanner_id: log.rfid_scanner_id,
            created_at: log.time_in,
            updated_at: log.time_in,
        };
        self.state.write().logs.push_front(record.clone());
        Ok(record)
    }

    async fn find_open_log(
        &self,
        badge: &str,
        scanner: &str,
    ) -> Result<Option<AttendanceLog>> {
        Ok(self
            .state
            .read()
            .logs
            .iter()
            .filter(|l| l.is_open() && l.belongs_to(badge, scanner))
            .max_by_key(|l| l.time_in)
            .cloned())
    }

    async fn save_log(&self, log: &AttendanceLog) -> Result<AttendanceLog> {
        let mut state = self.state.write();
        let stored = state
            .logs
            .iter_mut()
            .find(|l| l.id == log.id)
            .ok_or_else(|| CoreError::NotFound(format!("log {}", log.id)))?;
        *stored = log.clone();
        Ok(stored.clone())
    }

    async fn close_open_logs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut closed = 0;
        for log in self.state.write().logs.iter_mut().filter(|l| l.is_open()) {
            log.close(cutoff);
            closed += 1;
        }
        Ok(closed)
    }
}
