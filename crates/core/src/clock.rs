use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::CoreError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Wall-clock source in the deployment's fixed timezone.
pub trait Clock: Send + Sync {
    fn local_now(&self) -> NaiveDateTime;

    /// `last_update` cell format.
    fn stamp(&self) -> String {
        self.local_now().format(TIMESTAMP_FORMAT).to_string()
    }

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| CoreError::UnknownTimezone(name.to_string()))?;
        Ok(Self { tz })
    }
}

impl Clock for ZonedClock {
    fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Strict `YYYY-MM-DD`. Anything else, including unpadded fields, is rejected.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let shaped = value.len() == 10
        && value.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
