use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatelog_model::{
    AttendanceLog, LogFilter, NewLog, NewUser, User, UserUpdate,
};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{RecordStore, StoreBackend, VolatileRecordStore};
use crate::error::Result;

/// Routes every call to the durable store when one is attached and
/// reachable, otherwise to the always-present volatile store.
pub struct DualRecordStore {
    volatile: Arc<VolatileRecordStore>,
    durable: RwLock<Option<Arc<dyn RecordStore>>>,
    /// Last routing decision, used to log transitions once.
    on_durable: AtomicBool,
}

impl fmt::Debug for DualRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualRecordStore")
            .field("durable_attached", &self.durable.read().is_some())
            .field("active", &self.backend())
            .finish_non_exhaustive()
    }
}

impl DualRecordStore {
    pub fn new(volatile: Arc<VolatileRecordStore>) -> Self {
        Self {
            volatile,
            durable: RwLock::new(None),
            on_durable: AtomicBool::new(false),
        }
    }

    pub fn with_durable(
        volatile: Arc<VolatileRecordStore>,
        durable: Arc<dyn RecordStore>,
    ) -> Self {
        let store = Self::new(volatile);
        store.attach_durable(durable);
        store
    }

    pub fn attach_durable(&self, durable: Arc<dyn RecordStore>) {
        *self.durable.write() = Some(durable);
        info!("durable record store attached");
    }

    pub fn detach_durable(&self) -> Option<Arc<dyn RecordStore>> {
        let previous = self.durable.write().take();
        if previous.is_some() {
            info!("durable record store detached");
        }
        previous
    }

    /// Availability check, evaluated per call.
    fn active(&self) -> Arc<dyn RecordStore> {
        let durable = self
            .durable
            .read()
            .as_ref()
            .filter(|store| store.is_available())
            .cloned();

        let use_durable = durable.is_some();
        let was_durable = self.on_durable.swap(use_durable, Ordering::Relaxed);
        if was_durable != use_durable {
            if use_durable {
                info!(backend = "durable", "record store routing changed");
            } else {
                warn!(backend = "volatile", "record store routing changed");
            }
        }

        match durable {
            Some(store) => store,
            None => self.volatile.clone(),
        }
    }
}

#[async_trait]
impl RecordStore for DualRecordStore {
    fn backend(&self) -> StoreBackend {
        match self.durable.read().as_ref() {
            Some(store) if store.is_available() => StoreBackend::Durable,
            _ => StoreBackend::Volatile,
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.active().list_users().await
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.active().get_user_by_id(id).await
    }

    async fn get_user_by_badge(&self, badge: &str) -> Result<Option<User>> {
        self.active().get_user_by_badge(badge).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.active().create_user(user).await
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>> {
        self.active().update_user(id, update).await
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>> {
        self.active().delete_user(id).await
    }

    async fn list_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<AttendanceLog>> {
        self.active().list_logs(filter).await
    }

    async fn get_log_by_id(&self, id: &str) -> Result<Option<AttendanceLog>> {
        self.active().get_log_by_id(id).await
    }

    async fn create_log(&self, log: NewLog) -> Result<AttendanceLog> {
        self.active().create_log(log).await
    }

    async fn find_open_log(
        &self,
        badge: &str,
        scanner: &str,
    ) -> Result<Option<AttendanceLog>> {
        self.active().find_open_log(badge, scanner).await
    }

    async fn save_log(&self, log: &AttendanceLog) -> Result<AttendanceLog> {
        self.active().save_log(log).await
    }

    async fn close_open_logs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.active().close_open_logs(cutoff).await
    }
}
