//! `PREFIX-<unix-millis>` record ids.

use chrono::{DateTime, SubsecRound, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Returns a fresh id such as `DSR-1721462400000`.
///
/// The millisecond part is strictly increasing across the process, so two
/// calls within the same millisecond still yield distinct ids.
pub fn next_id(prefix: &str) -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_MILLIS.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return format!("{}-{}", prefix, candidate),
            Err(actual) => last = actual,
        }
    }
}

/// Current time truncated to milliseconds, the precision stored on records.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
