use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Supplies the timestamp stamped onto stored and published readings.
pub trait TimeSource: Send + Sync {
    fn timestamp(&self) -> String;
}

/// Wall clock rendered in a fixed timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

impl TimeSource for SystemClock {
    fn timestamp(&self) -> String {
        self.format(Utc::now())
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub &'static str);

#[cfg(test)]
impl TimeSource for FixedClock {
    fn timestamp(&self) -> String {
        self.0.to_string()
    }
}
