use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, watch};

use pillminder_models::reminder::{Reminder, ReminderId};
use pillminder_models::user::UserId;

use super::model::{NewReminder, UpdateReminder};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reminder {0} does not exist")]
    NotFound(ReminderId),

    #[error("reminder store unavailable: {0}")]
    Unavailable(String),
}

/// One user's ordered reminder collection. Every mutation pushes the full
/// ordered set (due instant ascending, insertion order on ties) to that
/// user's subscribers; the push is the sole source of truth for derived
/// state, so callers must not mutate local copies optimistically.
#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StoreError>;
    async fn update(&self, id: ReminderId, fields: UpdateReminder) -> Result<Reminder, StoreError>;
    async fn delete(&self, id: ReminderId) -> Result<(), StoreError>;
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StoreError>;
    async fn get_all_user_reminders(&self, user_id: UserId) -> Result<Vec<Reminder>, StoreError>;

    /// Live subscription delivering the current snapshot immediately and a
    /// fresh one after every change. Unsubscribing is dropping the receiver.
    async fn subscribe(&self, user_id: UserId) -> watch::Receiver<Vec<Reminder>>;
}

struct InMemoryStore {
    current_id: ReminderId,
    reminders: HashMap<ReminderId, Reminder>,
    watchers: HashMap<UserId, watch::Sender<Vec<Reminder>>>,
}

impl InMemoryStore {
    fn snapshot(&self, user_id: UserId) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self
            .reminders
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        // Ids are assigned in insertion order, so (due_at, id) gives the
        // ordering the subscription contract promises.
        reminders.sort_by_key(|r| (r.due_at, r.id));
        reminders
    }

    fn notify(&mut self, user_id: UserId) {
        self.watchers
            .retain(|_, sender| sender.receiver_count() > 0);
        if let Some(sender) = self.watchers.get(&user_id) {
            sender.send_replace(self.snapshot(user_id));
        }
    }
}

pub struct InMemoryReminderStorage {
    store: RwLock<InMemoryStore>,
}

impl InMemoryReminderStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(InMemoryStore {
                current_id: 0,
                reminders: HashMap::new(),
                watchers: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryReminderStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStorage for InMemoryReminderStorage {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let mut store = self.store.write().await;
        let id = store.current_id;
        store.current_id += 1;

        let inserted = Reminder {
            id,
            title: reminder.title,
            message: reminder.message,
            due_at: reminder.due_at,
            recurrence: reminder.recurrence,
            acknowledged: false,
            user_id: reminder.user_id,
        };
        store.reminders.insert(id, inserted.clone());
        log::info!(
            "Inserted reminder. [reminder_id = {}, user_id = {}]",
            id,
            inserted.user_id
        );

        store.notify(inserted.user_id);
        Ok(inserted)
    }

    async fn update(&self, id: ReminderId, fields: UpdateReminder) -> Result<Reminder, StoreError> {
        let mut store = self.store.write().await;
        let reminder = store
            .reminders
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;

        if let Some(title) = fields.title {
            reminder.title = title;
        }
        if let Some(message) = fields.message {
            reminder.message = message;
        }
        if let Some(due_at) = fields.due_at {
            reminder.due_at = due_at;
        }
        if let Some(recurrence) = fields.recurrence {
            reminder.recurrence = recurrence;
        }
        if let Some(acknowledged) = fields.acknowledged {
            reminder.acknowledged = acknowledged;
        }

        let updated = reminder.clone();
        store.notify(updated.user_id);
        Ok(updated)
    }

    async fn delete(&self, id: ReminderId) -> Result<(), StoreError> {
        let mut store = self.store.write().await;
        let removed = store
            .reminders
            .remove(&id)
            .ok_or(StoreError::NotFound(id))?;
        log::info!(
            "Deleted reminder. [reminder_id = {}, user_id = {}]",
            id,
            removed.user_id
        );

        store.notify(removed.user_id);
        Ok(())
    }

    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StoreError> {
        let store = self.store.read().await;
        Ok(store.reminders.get(&id).cloned())
    }

    async fn get_all_user_reminders(&self, user_id: UserId) -> Result<Vec<Reminder>, StoreError> {
        let store = self.store.read().await;
        Ok(store.snapshot(user_id))
    }

    async fn subscribe(&self, user_id: UserId) -> watch::Receiver<Vec<Reminder>> {
        let mut store = self.store.write().await;
        let snapshot = store.snapshot(user_id);
        store
            .watchers
            .entry(user_id)
            .or_insert_with(|| watch::channel(snapshot).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pillminder_models::reminder::{ReminderDueTime, ReminderFiringPeriod};

    use super::*;

    const USER: UserId = 7;

    fn new_reminder(day: u32, title: &str) -> NewReminder {
        NewReminder {
            title: title.to_owned(),
            message: "Take your pills".to_owned(),
            due_at: ReminderDueTime::new(
                NaiveDate::from_ymd_opt(2025, 6, day)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            recurrence: ReminderFiringPeriod::Daily,
            user_id: USER,
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_starts_unacknowledged() {
        let storage = InMemoryReminderStorage::new();

        let first = storage.insert(new_reminder(1, "a")).await.unwrap();
        let second = storage.insert(new_reminder(2, "b")).await.unwrap();

        assert!(second.id > first.id);
        assert!(!first.acknowledged);
        assert!(!second.acknowledged);
    }

    #[tokio::test]
    async fn snapshot_is_ordered_by_due_instant() {
        let storage = InMemoryReminderStorage::new();

        storage.insert(new_reminder(3, "late")).await.unwrap();
        storage.insert(new_reminder(1, "early")).await.unwrap();
        storage.insert(new_reminder(2, "middle")).await.unwrap();

        let all = storage.get_all_user_reminders(USER).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn update_applies_only_provided_fields() {
        let storage = InMemoryReminderStorage::new();
        let created = storage.insert(new_reminder(1, "a")).await.unwrap();

        let updated = storage
            .update(
                created.id,
                UpdateReminder {
                    acknowledged: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.acknowledged);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.due_at, created.due_at);
    }

    #[tokio::test]
    async fn update_of_missing_reminder_fails() {
        let storage = InMemoryReminderStorage::new();
        let result = storage.update(42, UpdateReminder::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound(42))));
    }

    #[tokio::test]
    async fn subscription_delivers_initial_snapshot_and_changes() {
        let storage = InMemoryReminderStorage::new();
        storage.insert(new_reminder(1, "existing")).await.unwrap();

        let mut receiver = storage.subscribe(USER).await;
        assert_eq!(receiver.borrow().len(), 1);

        let created = storage.insert(new_reminder(2, "fresh")).await.unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().len(), 2);

        storage.delete(created.id).await.unwrap();
        receiver.changed().await.unwrap();
        let snapshot = receiver.borrow().clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "existing");
    }

    #[tokio::test]
    async fn subscription_is_scoped_to_one_user() {
        let storage = InMemoryReminderStorage::new();
        let receiver = storage.subscribe(USER).await;

        let mut other = new_reminder(1, "not yours");
        other.user_id = USER + 1;
        storage.insert(other).await.unwrap();

        assert!(receiver.borrow().is_empty());
        assert!(!receiver.has_changed().unwrap());
    }
}
