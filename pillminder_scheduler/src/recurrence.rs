use chrono::TimeDelta;

use pillminder_models::reminder::{Reminder, ReminderDueTime, ReminderFiringPeriod};
use pillminder_storage::{ReminderStorage, StoreError, UpdateReminder};

/// Field updates acknowledging one due occurrence. `OneOff` reminders are
/// dismissed for good; `Daily` reminders keep `acknowledged` false forever
/// and move the due instant exactly one day, so the same wall-clock time
/// comes due again tomorrow.
pub fn resolve_acknowledgment(reminder: &Reminder) -> UpdateReminder {
    match reminder.recurrence {
        ReminderFiringPeriod::OneOff => UpdateReminder {
            acknowledged: Some(true),
            ..Default::default()
        },
        ReminderFiringPeriod::Daily => {
            let next = reminder
                .due_at
                .instant()
                .checked_add_signed(TimeDelta::hours(24))
                .expect("Not realistic to overflow");
            UpdateReminder {
                due_at: Some(ReminderDueTime::new(next)),
                ..Default::default()
            }
        }
    }
}

/// Applies the acknowledgment as one atomic store update. On failure the
/// reminder is left untouched everywhere: local state is never mutated ahead
/// of the store, the subscription push is the sole source of truth.
pub async fn acknowledge(
    storage: &dyn ReminderStorage,
    reminder: &Reminder,
) -> Result<Reminder, StoreError> {
    let fields = resolve_acknowledgment(reminder);
    let updated = storage.update(reminder.id, fields).await?;
    log::info!(
        "Acknowledged reminder. [reminder_id = {}, next_due_at = {:?}]",
        updated.id,
        (!updated.acknowledged).then(|| updated.due_at.instant())
    );
    Ok(updated)
}
