use chrono::{NaiveDateTime, Timelike};

use crate::user::UserId;

pub type ReminderId = i64;

/// How often a reminder fires. `OneOff` reminders are dismissed permanently
/// on acknowledgment; `Daily` reminders roll their due instant forward by a
/// day instead and never become dismissed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReminderFiringPeriod {
    OneOff,
    Daily,
}

/// Local wall-clock instant a reminder becomes due, normalized to whole
/// seconds so equality checks against stored values are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderDueTime(NaiveDateTime);

impl ReminderDueTime {
    pub fn new(inner: NaiveDateTime) -> Self {
        let normalized = inner.with_nanosecond(0).expect("Will never fail.");
        Self(normalized)
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub message: String,
    pub due_at: ReminderDueTime,
    pub recurrence: ReminderFiringPeriod,
    pub acknowledged: bool,
    pub user_id: UserId,
}

impl Reminder {
    /// A reminder is due once its instant has arrived and it has not been
    /// acknowledged. Acknowledged `Daily` reminders never exist: rollover
    /// keeps `acknowledged` false and only moves `due_at`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        !self.acknowledged && self.due_at.instant() <= now
    }
}
