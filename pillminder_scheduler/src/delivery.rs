use async_trait::async_trait;

use pillminder_models::reminder::Reminder;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AlertSignal {
    /// Begin the audio/visual notification loop for this reminder.
    Started,
    /// Stop the notification loop previously started for this reminder.
    Stopped,
}

/// Side-effect seam between the scheduler and whatever surfaces the alert.
/// The engine guarantees `Started` and `Stopped` arrive strictly paired and
/// that at most one alert is live at any instant.
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn send_alert_signal(&self, reminder: &Reminder, signal: AlertSignal)
    -> anyhow::Result<()>;
}

/// Channel that only writes to the log. Stands in for a real audio/visual
/// surface in the binary and in examples.
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    async fn send_alert_signal(
        &self,
        reminder: &Reminder,
        signal: AlertSignal,
    ) -> anyhow::Result<()> {
        match signal {
            AlertSignal::Started => log::info!(
                "🔔 {}: {} [reminder_id = {}]",
                reminder.title,
                reminder.message,
                reminder.id
            ),
            AlertSignal::Stopped => {
                log::info!("🔕 Alert resolved. [reminder_id = {}]", reminder.id)
            }
        }
        Ok(())
    }
}
