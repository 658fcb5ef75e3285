//! Pause-aware session clock. There is no background timer: expiry is
//! detected lazily, on the next interaction with the session.

use chrono::{DateTime, Utc};

use crate::models::session::SessionStatus;

/// Effective elapsed active time in seconds:
/// `(now − start_time) − total_pause_duration`, additionally subtracting the
/// currently open pause interval when the session is paused. Zero before the
/// session has started; never negative.
pub fn effective_elapsed_seconds(
    now: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    total_pause_seconds: i64,
) -> i64 {
    let Some(started) = started_at else {
        return 0;
    };
    let mut elapsed = (now - started).num_seconds() - total_pause_seconds;
    if let Some(paused) = paused_at {
        elapsed -= (now - paused).num_seconds();
    }
    elapsed.max(0)
}

pub fn is_expired(elapsed_seconds: i64, time_limit_seconds: Option<i32>) -> bool {
    matches!(time_limit_seconds, Some(limit) if elapsed_seconds >= i64::from(limit))
}

pub fn remaining_seconds(elapsed_seconds: i64, time_limit_seconds: Option<i32>) -> Option<i64> {
    time_limit_seconds.map(|limit| (i64::from(limit) - elapsed_seconds).max(0))
}

/// Whether a session must be forced to `expired` right now. Only running
/// sessions carry a clock: `created` has not started and terminal states
/// stay put.
pub fn expiry_due(
    status: SessionStatus,
    now: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    total_pause_seconds: i64,
    time_limit_seconds: Option<i32>,
) -> bool {
    if status.is_terminal() || status == SessionStatus::Created {
        return false;
    }
    is_expired(
        effective_elapsed_seconds(now, started_at, paused_at, total_pause_seconds),
        time_limit_seconds,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2026-01-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn zero_before_start() {
        assert_eq!(effective_elapsed_seconds(t0(), None, None, 0), 0);
    }

    #[test]
    fn wall_clock_minus_pauses() {
        let started = t0();
        let now = started + Duration::seconds(300);
        assert_eq!(effective_elapsed_seconds(now, Some(started), None, 0), 300);
        assert_eq!(effective_elapsed_seconds(now, Some(started), None, 120), 180);
    }

    #[test]
    fn open_pause_interval_is_excluded() {
        let started = t0();
        let paused = started + Duration::seconds(60);
        let now = started + Duration::seconds(600);
        // 600s wall clock, paused for the last 540s: only 60s were active.
        assert_eq!(
            effective_elapsed_seconds(now, Some(started), Some(paused), 0),
            60
        );
    }

    #[test]
    fn monotone_while_active() {
        let started = t0();
        let mut prev = 0;
        for secs in [1, 5, 30, 300, 3600] {
            let now = started + Duration::seconds(secs);
            let elapsed = effective_elapsed_seconds(now, Some(started), None, 45);
            assert!(elapsed >= prev);
            prev = elapsed;
        }
    }

    #[test]
    fn pause_defers_expiry() {
        // 60s limit, paused 30s in for 100s, resumed: at wall-clock +130s only
        // 30s of active time has accrued.
        let started = t0();
        let now = started + Duration::seconds(130);
        let elapsed = effective_elapsed_seconds(now, Some(started), None, 100);
        assert_eq!(elapsed, 30);
        assert!(!is_expired(elapsed, Some(60)));
        assert_eq!(remaining_seconds(elapsed, Some(60)), Some(30));
    }

    #[test]
    fn idle_wall_clock_expires_on_next_check() {
        use crate::models::session::SessionStatus::*;

        // 60s limit, no interaction for 5 minutes: the next check must force
        // expiry for a running session.
        let started = t0();
        let now = started + Duration::seconds(300);
        assert!(expiry_due(Active, now, Some(started), None, 0, Some(60)));
        // Pauses defer it: 250s of the 300 were spent paused.
        assert!(!expiry_due(Active, now, Some(started), None, 250, Some(60)));
        // An open pause also holds the clock at 30s of active time.
        assert!(!expiry_due(
            Paused,
            now,
            Some(started),
            Some(started + Duration::seconds(30)),
            0,
            Some(60)
        ));
        // A paused session whose limit was already spent before pausing is due.
        assert!(expiry_due(
            Paused,
            now,
            Some(started),
            Some(started + Duration::seconds(90)),
            0,
            Some(60)
        ));
    }

    #[test]
    fn only_running_sessions_expire() {
        use crate::models::session::SessionStatus::*;

        let started = t0();
        let now = started + Duration::seconds(10_000);
        for status in [Created, Completed, Abandoned, Expired] {
            assert!(!expiry_due(status, now, Some(started), None, 0, Some(60)));
        }
        // No limit, no expiry.
        assert!(!expiry_due(Active, now, Some(started), None, 0, None));
    }

    #[test]
    fn expiry_at_exact_limit() {
        assert!(is_expired(60, Some(60)));
        assert!(!is_expired(59, Some(60)));
        assert!(!is_expired(10_000, None));
        assert_eq!(remaining_seconds(70, Some(60)), Some(0));
        assert_eq!(remaining_seconds(70, None), None);
    }
}
