use pillminder_models::reminder::{ReminderDueTime, ReminderFiringPeriod};
use pillminder_models::user::UserId;

/// A reminder before the store has assigned it an id. New reminders always
/// start unacknowledged.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub due_at: ReminderDueTime,
    pub recurrence: ReminderFiringPeriod,
    pub user_id: UserId,
}

/// Partial-field update applied atomically by `ReminderStorage::update`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateReminder {
    pub title: Option<String>,
    pub message: Option<String>,
    pub due_at: Option<ReminderDueTime>,
    pub recurrence: Option<ReminderFiringPeriod>,
    pub acknowledged: Option<bool>,
}
