use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::badge::badges_match;

/// One badge session on one scanner.
///
/// `user_name` is a snapshot taken when the session opened; renaming the
/// user later does not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AttendanceLog {
    #[cfg_attr(feature = "serde", serde(rename = "_id"))]
    pub id: String,
    pub time_in: DateTime<Utc>,
    /// `None` while the session is open.
    pub time_out: Option<DateTime<Utc>>,
    pub user_name: String,
    pub user_id_number: String,
    pub rfid_scanner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceLog {
    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }

    pub fn belongs_to(&self, badge: &str, scanner: &str) -> bool {
        badges_match(&self.user_id_number, badge)
            && self.rfid_scanner_id == scanner
    }

    pub fn close(&mut self, at: DateTime<Utc>) {
        self.time_out = Some(at);
        self.updated_at = at;
    }
}

/// Fields for a freshly opened session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLog {
    pub time_in: DateTime<Utc>,
    pub time_out: Option<DateTime<Utc>>,
    pub user_name: String,
    pub user_id_number: String,
    pub rfid_scanner_id: String,
}

impl NewLog {
    pub fn open(
        time_in: DateTime<Utc>,
        user_name: impl Into<String>,
        user_id_number: impl Into<String>,
        rfid_scanner_id: impl Into<String>,
    ) -> Self {
        Self {
            time_in,
            time_out: None,
            user_name: user_name.into(),
            user_id_number: user_id_number.into(),
            rfid_scanner_id: rfid_scanner_id.into(),
        }
    }
}

/// Listing filter. Every present field must match; `from`/`to` bound
/// `time_in` inclusively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub user_id_number: Option<String>,
    pub rfid_scanner_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.user_id_number = Some(badge.into());
        self
    }

    pub fn scanner(mut self, scanner: impl Into<String>) -> Self {
        self.rfid_scanner_id = Some(scanner.into());
        self
    }

    pub fn between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, log: &AttendanceLog) -> bool {
        if let Some(badge) = &self.user_id_number
            && !badges_match(&log.user_id_number, badge)
        {
            return false;
        }
        if let Some(scanner) = &self.rfid_scanner_id
            && &log.rfid_scanner_id != scanner
        {
            return false;
        }
        if let Some(from) = self.from
            && log.time_in < from
        {
            return false;
        }
        if let Some(to) = self.to
            && log.time_in > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn log_at(time_in: DateTime<Utc>) -> AttendanceLog {
        AttendanceLog {
            id: "l1".into(),
            time_in,
            time_out: None,
            user_name: "Alice Johnson".into(),
            user_id_number: "A1001".into(),
            rfid_scanner_id: "SCANNER-1".into(),
            created_at: time_in,
            updated_at: time_in,
        }
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let log = log_at(t0);

        assert!(LogFilter::default().between(Some(t0), Some(t0)).matches(&log));
        assert!(
            !LogFilter::default()
                .between(Some(t0 + Duration::milliseconds(1)), None)
                .matches(&log)
        );
        assert!(
            !LogFilter::default()
                .between(None, Some(t0 - Duration::milliseconds(1)))
                .matches(&log)
        );
    }

    #[test]
    fn scanner_is_exact_but_badge_is_not() {
        let log = log_at(Utc::now());
        assert!(LogFilter::default().badge("a1001").matches(&log));
        assert!(!LogFilter::default().scanner("scanner-1").matches(&log));
    }

    #[test]
    fn close_sets_time_out() {
        let mut log = log_at(Utc::now());
        let out = log.time_in + Duration::seconds(5);
        log.close(out);
        assert!(!log.is_open());
        assert_eq!(log.time_out, Some(out));
    }
}
