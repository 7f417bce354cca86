//! HTTP surface of the gatelog RFID access-log server.
//!
//! Scanners post badge taps to `/api/logs/scan`; operators manage the user
//! directory under `/api/users` and read attendance under `/api/logs`.

pub mod app;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use app::create_app;
pub use infra::app_state::AppState;
