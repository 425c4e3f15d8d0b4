use chrono::{Local, NaiveTime};

/// Source of the local wall-clock time of day.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveTime;
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}
