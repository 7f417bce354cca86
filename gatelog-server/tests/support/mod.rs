use std::sync::Arc;

use anyhow::{Result, anyhow};
use argon2::Params;
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use gatelog_core::{
    CredentialHasher, DualRecordStore, ManualClock, VolatileRecordStore,
};
use gatelog_server::{
    AppState, create_app,
    infra::config::{Config, Environment},
};

/// Fixed "now" the volatile fixtures are seeded relative to.
#[allow(unused)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

#[allow(unused)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

#[allow(unused)]
pub fn build_test_app() -> Result<TestApp> {
    build_test_app_with(
        Config::default(),
        Arc::new(DualRecordStore::new(Arc::new(
            VolatileRecordStore::with_fixtures(t0()),
        ))),
    )
}

#[allow(unused)]
pub fn build_production_app(store: Arc<DualRecordStore>) -> Result<TestApp> {
    let config = Config {
        environment: Environment::Production,
        ..Config::default()
    };
    build_test_app_with(config, store)
}

pub fn build_test_app_with(
    config: Config,
    store: Arc<DualRecordStore>,
) -> Result<TestApp> {
    let clock = Arc::new(ManualClock::new(t0()));
    // Cheap parameters keep password tests fast.
    let params = Params::new(8 * 1024, 1, 1, Some(32))
        .map_err(|err| anyhow!(err.to_string()))?;
    let state = AppState::with_credentials(
        Arc::new(config),
        store,
        clock.clone(),
        CredentialHasher::with_params(params),
    );
    let server = TestServer::new(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        clock,
    })
}
