use chrono::{Local, NaiveDate, NaiveTime, Utc};

/// Gating decisions use wall-clock local time, re-derived on every call.
/// Countdown timers on clients are display-only and never authoritative.
pub(crate) fn local_now() -> (NaiveDate, NaiveTime) {
    let now = Local::now();
    (now.date_naive(), now.time())
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
