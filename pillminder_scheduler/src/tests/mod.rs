
use chrono::{Local, NaiveDateTime, TimeDelta};

use pillminder_models::reminder::{Reminder, ReminderDueTime, ReminderFiringPeriod, ReminderId};
use pillminder_models::user::UserId;

pub(crate) const TEST_USER: UserId = 1;

pub(crate) fn reminder_due_at(
    id: ReminderId,
    due_at: NaiveDateTime,
    recurrence: ReminderFiringPeriod,
) -> Reminder {
    Reminder {
        id,
        title: format!("Medication: test-{id}"),
        message: "Take your dose (1 0 1).".to_owned(),
        due_at: ReminderDueTime::new(due_at),
        recurrence,
        acknowledged: false,
        user_id: TEST_USER,
    }
}

/// Wall-clock instant a few minutes in the past, so the reminder is already
/// due no matter how the paused tokio clock moves.
pub(crate) fn minutes_ago(minutes: i64) -> NaiveDateTime {
    Local::now().naive_local() - TimeDelta::minutes(minutes)
}
