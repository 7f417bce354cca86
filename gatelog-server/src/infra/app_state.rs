use std::{fmt, sync::Arc};

use gatelog_core::{
    Clock, CooldownTracker, CredentialHasher, DualRecordStore, Result,
    ScanResolver,
};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<DualRecordStore>,
    pub resolver: Arc<ScanResolver>,
    pub credentials: Arc<CredentialHasher>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("backend", &gatelog_core::RecordStore::backend(&*self.store))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the resolver and credential hasher from `config`.
    pub fn new(
        config: Arc<Config>,
        store: Arc<DualRecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self::with_credentials(
            config,
            store,
            clock,
            CredentialHasher::new()?,
        ))
    }

    pub fn with_credentials(
        config: Arc<Config>,
        store: Arc<DualRecordStore>,
        clock: Arc<dyn Clock>,
        credentials: CredentialHasher,
    ) -> Self {
        let cooldown = Arc::new(CooldownTracker::new(config.scan.cooldown));
        let resolver = ScanResolver::new(store.clone(), cooldown)
            .with_serialized_sessions(config.scan.serialize_sessions);
        Self {
            config,
            store,
            resolver: Arc::new(resolver),
            credentials: Arc::new(credentials),
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
