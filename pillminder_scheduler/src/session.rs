use std::collections::HashSet;

use chrono::NaiveDateTime;

use pillminder_models::reminder::{Reminder, ReminderDueTime, ReminderId};

/// One concrete due cycle of a reminder. Keyed by id *and* due instant:
/// after a daily reminder rolls forward, the same id with a new `due_at` is
/// a fresh occurrence and may alert again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub id: ReminderId,
    pub due_at: ReminderDueTime,
}

impl Occurrence {
    pub fn of(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            due_at: reminder.due_at,
        }
    }
}

/// Engine-internal record of which single reminder, if any, is currently
/// being alerted, plus the dedup table of occurrences already notified.
/// Owned exclusively by the engine task; nothing outside the evaluation
/// path mutates it.
#[derive(Debug, Default)]
pub struct NotificationSession {
    alerting: Option<Reminder>,
    notified: HashSet<Occurrence>,
}

impl NotificationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reminder whose alert is currently live, as it looked when the
    /// alert started.
    pub fn alerting(&self) -> Option<&Reminder> {
        self.alerting.as_ref()
    }

    pub fn has_notified(&self, occurrence: Occurrence) -> bool {
        self.notified.contains(&occurrence)
    }

    pub(crate) fn mark_started(&mut self, reminder: Reminder) {
        self.notified.insert(Occurrence::of(&reminder));
        self.alerting = Some(reminder);
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.alerting = None;
    }

    /// Drops dedup entries whose occurrence no longer exists in the set
    /// (deleted reminders and rolled-forward due instants), keeping the
    /// table bounded by the number of live reminders.
    pub(crate) fn prune(&mut self, reminders: &[Reminder]) {
        let live: HashSet<Occurrence> = reminders.iter().map(Occurrence::of).collect();
        self.notified.retain(|occurrence| live.contains(occurrence));
    }
}

/// What a single evaluation pass decided. At most one alert transition
/// happens per pass; when an alert stops while other reminders are already
/// due, the next pass picks the successor.
#[derive(Debug, Clone)]
pub enum SessionAction {
    StartAlert(Reminder),
    StopAlert(Reminder),
    Keep,
}

/// The one evaluation function behind both the polling tick and the store
/// push. Pure: inspects the current set and session, decides, mutates
/// nothing.
pub fn evaluate(
    reminders: &[Reminder],
    now: NaiveDateTime,
    session: &NotificationSession,
) -> SessionAction {
    if let Some(active) = session.alerting() {
        let occurrence = Occurrence::of(active);
        let still_due = reminders
            .iter()
            .any(|r| Occurrence::of(r) == occurrence && r.is_due(now));

        if still_due {
            return SessionAction::Keep;
        }
        // Deleted, acknowledged, or rolled forward: the occurrence is gone.
        return SessionAction::StopAlert(active.clone());
    }

    let candidate = reminders
        .iter()
        .filter(|r| r.is_due(now))
        .filter(|r| !session.has_notified(Occurrence::of(r)))
        .min_by_key(|r| r.due_at);

    match candidate {
        Some(reminder) => SessionAction::StartAlert(reminder.clone()),
        None => SessionAction::Keep,
    }
}
