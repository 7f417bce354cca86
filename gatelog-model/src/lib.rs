//! Record types shared across gatelog crates.
//!
//! Everything here is plain data: the user directory entry, the attendance
//! log session record and the request/filter shapes that flow into the
//! record store. Wire names follow the JSON the RFID gates and dashboards
//! already speak (`_id`, `idNumber`, `rfidScannerId`, ...) when the `serde`
//! feature is enabled.
#![allow(missing_docs)]

pub mod badge;
pub mod error;
pub mod log;
pub mod role;
pub mod user;

pub use badge::{badge_key, badges_match};
pub use error::{ModelError, Result as ModelResult};
pub use log::{AttendanceLog, LogFilter, NewLog};
pub use role::UserRole;
pub use user::{NewUser, User, UserSummary, UserUpdate};
