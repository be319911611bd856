use chrono::NaiveDateTime;

use pillminder_models::dosage::{DosageCode, DosageParseError};
use pillminder_models::reminder::{ReminderDueTime, ReminderFiringPeriod};
use pillminder_models::user::UserId;
use pillminder_storage::NewReminder;

use super::extraction::DosageEntry;

/// Entry whose dosage code could not be parsed. Reported to the caller
/// rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub medicine_name: String,
    pub error: DosageParseError,
}

#[derive(Debug, Default)]
pub struct FactoryReport {
    pub reminders: Vec<NewReminder>,
    pub skipped: Vec<SkippedEntry>,
}

/// Turns extracted prescription entries into unsaved daily reminders, one
/// per marked dose slot. Malformed entries are skipped and reported; the
/// rest of the batch still goes through. Persistence is the caller's job,
/// one store insert per produced reminder.
pub fn build_reminders(
    entries: &[DosageEntry],
    reference: NaiveDateTime,
    user_id: UserId,
) -> FactoryReport {
    let mut report = FactoryReport::default();

    for entry in entries {
        let code: DosageCode = match entry.dosage_code.parse() {
            Ok(code) => code,
            Err(error) => {
                log::warn!(
                    "Skipping entry with malformed dosage code. [medicine = {}, code = {:?}, error = {}]",
                    entry.medicine_name,
                    entry.dosage_code,
                    error
                );
                report.skipped.push(SkippedEntry {
                    medicine_name: entry.medicine_name.clone(),
                    error,
                });
                continue;
            }
        };

        for dose in code.resolve(reference) {
            report.reminders.push(NewReminder {
                title: format!("Medication: {}", entry.medicine_name),
                message: format!("Take your dose ({code})."),
                due_at: ReminderDueTime::new(dose.at),
                recurrence: ReminderFiringPeriod::Daily,
                user_id,
            });
        }
    }

    report
}
