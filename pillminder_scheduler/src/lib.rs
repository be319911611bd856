mod delivery;
mod engine;
mod recurrence;
mod session;

pub use delivery::{AlertSignal, LogNotificationChannel, NotificationChannel};
pub use engine::ReminderEngine;
pub use recurrence::{acknowledge, resolve_acknowledgment};
pub use session::{NotificationSession, Occurrence, SessionAction, evaluate};

#[cfg(test)]
mod tests;
