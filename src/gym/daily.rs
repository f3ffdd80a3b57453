//! Day-boundary helpers shared by every read path and by the scheduled jobs.
//!
//! A counter stamped with a date older than "today" is stale and reads as zero. The
//! scheduled reset writes zeros once per day; readers never duplicate the date logic,
//! they go through [`is_stale`] / [`DailyCounter::value_on`].

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::gym::errors::GymError;

/// True when a record stamped `stamp` belongs to a day before `today`.
pub fn is_stale(stamp: Option<NaiveDate>, today: NaiveDate) -> bool {
    match stamp {
        Some(day) => day < today,
        None => true,
    }
}

/// A per-player counter that belongs to one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    pub day: Option<NaiveDate>,
    pub count: u32,
}

impl DailyCounter {
    pub fn value_on(&self, today: NaiveDate) -> u32 {
        if is_stale(self.day, today) {
            0
        } else {
            self.count
        }
    }

    pub fn add(&mut self, today: NaiveDate, n: u32) {
        let current = self.value_on(today);
        self.count = current.saturating_add(n);
        if is_stale(self.day, today) {
            self.day = Some(today);
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        self.count = 0;
        self.day = Some(today);
    }
}

/// Fixed-offset "local" calendar. All day boundaries in the game use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

impl LocalCalendar {
    pub fn new(utc_offset_minutes: i32) -> Result<Self, GymError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            GymError::Invalid(format!("utc offset out of range: {} minutes", utc_offset_minutes))
        })?;
        Ok(Self { offset })
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Next instant strictly after `now` whose local wall clock reads midnight plus
    /// `minutes_after_midnight`.
    pub fn next_daily(&self, now: DateTime<Utc>, minutes_after_midnight: u32) -> DateTime<Utc> {
        let local_offset = Duration::seconds(self.offset.local_minus_utc() as i64);
        let wall = Duration::minutes((minutes_after_midnight % (24 * 60)) as i64);
        let mut day = self.today(now);
        loop {
            let local_target = day.and_time(NaiveTime::default()) + wall;
            let target = Utc.from_utc_datetime(&(local_target - local_offset));
            if target > now {
                return target;
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => return target,
            };
        }
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}
