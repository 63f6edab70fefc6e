//! Current-time matching and the periodic highlight refresh.
//!
//! All times are local wall-clock times with no timezone handling.

use chrono::{Datelike, Duration as DateDuration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TimetableError};
use crate::parser;
use crate::types::{Day, TimeRange, TimeSlot};

/// How often the highlight is recomputed
pub const REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local device time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stuck at one instant
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

fn minute_of_day(now: &NaiveDateTime) -> u16 {
    (now.hour() * 60 + now.minute()) as u16
}

/// Week index of `now`: Monday = 0 .. Saturday = 5, Sunday = 6
pub fn week_index(now: &NaiveDateTime) -> usize {
    now.weekday().num_days_from_monday() as usize
}

/// Today's teaching day, or `None` at the weekend
pub fn today(now: &NaiveDateTime) -> Option<Day> {
    Day::from_index(week_index(now))
}

/// True if `now` falls within `range`, both bounds included.
///
/// At a boundary minute such as 9:40 both the slot ending and the slot
/// starting at that minute are current.
pub fn is_current_time(now: &NaiveDateTime, range: &TimeRange) -> bool {
    range.contains_minute(minute_of_day(now))
}

/// True if `day` is today and `now` falls within `range`
pub fn is_current_class(now: &NaiveDateTime, day: Day, range: &TimeRange) -> bool {
    week_index(now) == day.index() && is_current_time(now, range)
}

/// Label-based form of [`is_current_time`]; malformed labels are an error
pub fn slot_is_current(now: &NaiveDateTime, label: &str) -> Result<bool> {
    let range = parser::parse_time_range(label)?;
    Ok(is_current_time(now, &range))
}

/// Which slots and day are "now"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub at: NaiveDateTime,
    /// Indices into the slot sequence of every current slot
    pub slots: Vec<usize>,
    /// Today's column, if today is a teaching day
    pub day: Option<Day>,
}

impl Highlight {
    pub fn compute(now: NaiveDateTime, slots: &[TimeSlot]) -> Self {
        let current = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| is_current_time(&now, &slot.range))
            .map(|(idx, _)| idx)
            .collect();

        Self {
            at: now,
            slots: current,
            day: today(&now),
        }
    }

    pub fn is_current_slot(&self, slot_idx: usize) -> bool {
        self.slots.contains(&slot_idx)
    }

    pub fn is_current_cell(&self, slot_idx: usize, day: Day) -> bool {
        self.day == Some(day) && self.is_current_slot(slot_idx)
    }
}

/// The Monday-Friday window shown by week navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekWindow {
    /// Weeks away from the current one
    pub offset: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    /// On Sunday the current week is the one starting the next day.
    /// Offsets that leave the representable calendar are `InvalidWeek`.
    pub fn new(today: NaiveDate, offset: i32) -> Result<Self> {
        let invalid = || TimetableError::InvalidWeek(offset);
        let since_sunday = today.weekday().num_days_from_sunday() as i64;

        let start = DateDuration::try_weeks(offset as i64)
            .and_then(|shift| shift.checked_add(&DateDuration::days(1 - since_sunday)))
            .and_then(|shift| today.checked_add_signed(shift))
            .ok_or_else(invalid)?;
        let end = start
            .checked_add_signed(DateDuration::days(4))
            .ok_or_else(invalid)?;

        Ok(Self { offset, start, end })
    }

    pub fn title(&self) -> String {
        format!("Week {}", self.offset + 1)
    }

    pub fn dates(&self) -> String {
        format!("{} - {}", self.start.format("%d/%m/%Y"), self.end.format("%d/%m/%Y"))
    }
}

/// Background task recomputing the highlight on a fixed period.
///
/// The task is aborted by [`HighlightRefresher::shutdown`] or on drop, so a
/// torn-down view never leaves a repeating timer behind.
pub struct HighlightRefresher {
    rx: watch::Receiver<Highlight>,
    handle: Option<JoinHandle<()>>,
}

impl HighlightRefresher {
    /// Spawn the refresh task on the current tokio runtime
    pub fn spawn(clock: Arc<dyn Clock>, slots: Vec<TimeSlot>, period: Duration) -> Self {
        let initial = Highlight::compute(clock.now(), &slots);
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let highlight = Highlight::compute(clock.now(), &slots);
                debug!(slots = ?highlight.slots, day = ?highlight.day, "Highlight refreshed");
                if tx.send(highlight).is_err() {
                    warn!("Highlight receiver dropped, stopping refresh");
                    break;
                }
            }
        });

        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Latest computed highlight
    pub fn current(&self) -> Highlight {
        self.rx.borrow().clone()
    }

    /// Subscribe to highlight changes
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<Highlight> {
        self.rx.clone()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stop the refresh task
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Highlight refresh stopped");
        }
    }
}

impl Drop for HighlightRefresher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
