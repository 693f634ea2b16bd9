use chrono::{DateTime, Utc};
use rounds_core::ServiceDate;

/// Date/time capability injected into the engine so tests can simulate
/// day rollover instead of reading the wall clock.
pub trait Clock: Send + Sync {
    fn today(&self) -> ServiceDate;
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> ServiceDate {
        ServiceDate::from_naive(Utc::now().date_naive())
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wire form for status-change timestamps: UTC `YYYY-MM-DD HH:MM:SS`.
pub fn status_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}
