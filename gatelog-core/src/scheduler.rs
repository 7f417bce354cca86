//! End-of-day sweep that force-closes sessions left open.
//!
//! Fires once a day shortly after local midnight. Each firing closes every
//! open log with a time-out of 23:59:59.999 on the local day that just
//! ended. A firing missed while the process was down is not caught up.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::RecordStore;

/// Local wall-clock time of the daily firing.
pub const DEFAULT_FIRE_TIME: NaiveTime =
    match NaiveTime::from_hms_opt(0, 0, 5) {
        Some(time) => time,
        None => panic!("invalid fire time"),
    };

const END_OF_DAY: NaiveTime =
    match NaiveTime::from_hms_milli_opt(23, 59, 59, 999) {
        Some(time) => time,
        None => panic!("invalid end of day"),
    };

pub struct DailyResetScheduler {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    fire_time: NaiveTime,
}

impl fmt::Debug for DailyResetScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyResetScheduler")
            .field("backend", &self.store.backend())
            .field("clock", &self.clock)
            .field("fire_time", &self.fire_time)
            .finish()
    }
}

impl DailyResetScheduler {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            fire_time: DEFAULT_FIRE_TIME,
        }
    }

    /// The next local firing strictly after `now`. A day whose firing time
    /// does not exist locally (DST gap) is skipped.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&Local);
        let mut day = local_now.date_naive();
        for _ in 0..3 {
            if let Some(at) = Local
                .from_local_datetime(&day.and_time(self.fire_time))
                .earliest()
                && at > local_now
            {
                return at.with_timezone(&Utc);
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        now + Duration::days(1)
    }

    /// Time-out stamped on sessions closed by the firing at `fired_at`:
    /// the last millisecond of the previous local day.
    pub fn sweep_cutoff(fired_at: DateTime<Utc>) -> DateTime<Utc> {
        let local = fired_at.with_timezone(&Local);
        local
            .date_naive()
            .pred_opt()
            .and_then(|day| {
                Local.from_local_datetime(&day.and_time(END_OF_DAY)).latest()
            })
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or(fired_at)
    }

    /// Close every open log as of the firing at `fired_at`.
    pub async fn run_sweep(&self, fired_at: DateTime<Utc>) -> Result<u64> {
        let cutoff = Self::sweep_cutoff(fired_at);
        let closed = self.store.close_open_logs(cutoff).await?;
        info!(
            closed,
            cutoff = %cutoff,
            backend = %self.store.backend(),
            "daily reset closed open sessions"
        );
        Ok(closed)
    }

    /// Run the daily loop until `shutdown` is cancelled.
    pub fn spawn(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Utc>> = None;
            loop {
                let now = self.clock.now();
                let after = last_fired.map_or(now, |fired| fired.max(now));
                let fire_at = self.next_fire_after(after);
                let wait = (fire_at - now).to_std().unwrap_or_default();
                debug!(next_fire = %fire_at, "daily reset armed");

                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("daily reset scheduler stopped");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                if let Err(err) = self.run_sweep(fire_at).await {
                    error!(error = %err, "daily reset sweep failed");
                }
                last_fired = Some(fire_at);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use crate::store::{MockRecordStore, VolatileRecordStore};
    use chrono::NaiveDate;
    use gatelog_model::NewLog;

    fn local(
        y: i32,
        m: u32,
        d: u32,
        h: u32,
        min: u32,
        s: u32,
    ) -> DateTime<Utc> {
        Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, min, s)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn scheduler(
        store: Arc<dyn RecordStore>,
        now: DateTime<Utc>,
    ) -> DailyResetScheduler {
        DailyResetScheduler::new(store, Arc::new(ManualClock::new(now)))
    }

    #[test]
    fn fires_shortly_after_next_midnight() {
        let sched = scheduler(
            Arc::new(VolatileRecordStore::new()),
            local(2026, 3, 2, 14, 0, 0),
        );

        assert_eq!(
            sched.next_fire_after(local(2026, 3, 2, 14, 0, 0)),
            local(2026, 3, 3, 0, 0, 5)
        );
        // Between midnight and the firing time, today's firing is still ahead.
        assert_eq!(
            sched.next_fire_after(local(2026, 3, 3, 0, 0, 1)),
            local(2026, 3, 3, 0, 0, 5)
        );
        // Strictly after: a firing instant arms the following day.
        assert_eq!(
            sched.next_fire_after(local(2026, 3, 3, 0, 0, 5)),
            local(2026, 3, 4, 0, 0, 5)
        );
    }

    #[test]
    fn cutoff_is_end_of_previous_local_day() {
        let fired = local(2026, 3, 3, 0, 0, 5);
        let expected =
            local(2026, 3, 2, 23, 59, 59) + Duration::milliseconds(999);
        assert_eq!(DailyResetScheduler::sweep_cutoff(fired), expected);
    }

    #[tokio::test]
    async fn sweep_closes_stale_sessions_at_cutoff() {
        let store = Arc::new(VolatileRecordStore::new());
        let time_in = local(2026, 3, 2, 9, 0, 0);
        let log = store
            .create_log(NewLog::open(
                time_in,
                "Alice Johnson",
                "A1001",
                "SCANNER-1",
            ))
            .await
            .unwrap();

        let fired = local(2026, 3, 3, 0, 0, 5);
        let sched = scheduler(store.clone(), fired);
        assert_eq!(sched.run_sweep(fired).await.unwrap(), 1);

        let swept = store.get_log_by_id(&log.id).await.unwrap().unwrap();
        assert_eq!(swept.time_in, time_in);
        assert_eq!(
            swept.time_out,
            Some(local(2026, 3, 2, 23, 59, 59) + Duration::milliseconds(999))
        );
        assert_eq!(sched.run_sweep(fired).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_failure_is_reported() {
        let mut mock = MockRecordStore::new();
        mock.expect_backend()
            .returning(|| crate::store::StoreBackend::Durable);
        mock.expect_close_open_logs()
            .times(1)
            .returning(|_| Err(CoreError::StoreUnavailable("down".into())));

        let fired = local(2026, 3, 3, 0, 0, 5);
        let sched = scheduler(Arc::new(mock), fired);
        assert!(matches!(
            sched.run_sweep(fired).await,
            Err(CoreError::StoreUnavailable(_))
        ));
    }

    /// Wall clock that follows tokio's paused virtual time.
    #[derive(Debug)]
    struct VirtualClock {
        base: DateTime<Utc>,
        started: tokio::time::Instant,
    }

    impl Clock for VirtualClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = tokio::time::Instant::now() - self.started;
            self.base + Duration::from_std(elapsed).unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_fires_at_midnight_and_stops_on_cancel() {
        let store = Arc::new(VolatileRecordStore::new());
        let time_in = local(2026, 3, 2, 9, 0, 0);
        let log = store
            .create_log(NewLog::open(
                time_in,
                "Bob Smith",
                "B2002",
                "SCANNER-2",
            ))
            .await
            .unwrap();

        let clock = Arc::new(VirtualClock {
            base: local(2026, 3, 2, 23, 59, 0),
            started: tokio::time::Instant::now(),
        });
        let sched = Arc::new(DailyResetScheduler::new(store.clone(), clock));
        let shutdown = CancellationToken::new();
        let handle = sched.spawn(shutdown.clone());

        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        let before = store.get_log_by_id(&log.id).await.unwrap().unwrap();
        assert!(before.is_open());

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        let after = store.get_log_by_id(&log.id).await.unwrap().unwrap();
        assert_eq!(
            after.time_out,
            Some(local(2026, 3, 2, 23, 59, 59) + Duration::milliseconds(999))
        );

        shutdown.cancel();
        handle.await.unwrap();
    }
}
