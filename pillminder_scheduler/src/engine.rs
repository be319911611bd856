use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use pillminder_models::reminder::Reminder;
use pillminder_models::user::UserId;
use pillminder_storage::ReminderStorage;

use super::delivery::{AlertSignal, NotificationChannel};
use super::session::{NotificationSession, SessionAction, evaluate};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling notification engine for one user session. Owns the
/// `NotificationSession` and a single task that re-evaluates the due set on
/// a fixed interval and on every store push, through the same evaluation
/// function. Dropping into `stop` cancels the timer, the subscription, and
/// any live alert as one scoped teardown.
pub struct ReminderEngine {
    cancellation_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

impl ReminderEngine {
    pub fn start(
        storage: Arc<dyn ReminderStorage>,
        channel: Arc<dyn NotificationChannel>,
        user_id: UserId,
        poll_interval: Duration,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.child_token();
        let task_handle = tokio::spawn(async move {
            run_session(storage, channel, user_id, poll_interval, task_token).await;
        });

        Self {
            cancellation_token,
            task_handle,
        }
    }

    /// Cancels the engine task and waits for its teardown (bounded) so no
    /// timer or alert outlives the session.
    pub async fn stop(self) {
        self.cancellation_token.cancel();
        let _ = time::timeout(SHUTDOWN_TIMEOUT, self.task_handle).await;
    }
}

async fn run_session(
    storage: Arc<dyn ReminderStorage>,
    channel: Arc<dyn NotificationChannel>,
    user_id: UserId,
    poll_interval: Duration,
    cancellation_token: CancellationToken,
) {
    let mut receiver = storage.subscribe(user_id).await;
    let mut reminders: Vec<Reminder> = receiver.borrow().clone();
    let mut session = NotificationSession::new();

    let mut ticker = time::interval(poll_interval);
    // A pass stalled on a slow channel must not be followed by a burst of
    // catch-up ticks; evaluation passes stay strictly sequential.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!("Reminder engine started. [user_id = {user_id}]");

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
            changed = receiver.changed() => {
                if changed.is_err() {
                    log::warn!("Reminder store subscription closed, stopping engine. [user_id = {user_id}]");
                    break;
                }
                reminders = receiver.borrow().clone();
            }
        }

        run_pass(&mut session, &reminders, channel.as_ref()).await;
    }

    // The subscription receiver drops here; stop whatever is still alerting
    // so no alert survives logout.
    if let Some(active) = session.alerting().cloned() {
        send_signal(channel.as_ref(), &active, AlertSignal::Stopped).await;
    }
    log::info!("Reminder engine stopped. [user_id = {user_id}]");
}

async fn run_pass(
    session: &mut NotificationSession,
    reminders: &[Reminder],
    channel: &dyn NotificationChannel,
) {
    let now = Local::now().naive_local();
    session.prune(reminders);

    match evaluate(reminders, now, session) {
        SessionAction::StartAlert(reminder) => {
            log::info!(
                "Starting alert. [reminder_id = {}, due_at = {}]",
                reminder.id,
                reminder.due_at.instant()
            );
            session.mark_started(reminder.clone());
            send_signal(channel, &reminder, AlertSignal::Started).await;
        }
        SessionAction::StopAlert(reminder) => {
            log::info!("Stopping alert. [reminder_id = {}]", reminder.id);
            session.mark_stopped();
            send_signal(channel, &reminder, AlertSignal::Stopped).await;
        }
        SessionAction::Keep => {}
    }
}

async fn send_signal(channel: &dyn NotificationChannel, reminder: &Reminder, signal: AlertSignal) {
    // A broken notification surface must never take the polling loop down;
    // the next pass simply runs against the same session state.
    if let Err(error) = channel.send_alert_signal(reminder, signal).await {
        log::warn!(
            "Notification channel failed. [reminder_id = {}, signal = {:?}, error = {}]",
            reminder.id,
            signal,
            error
        );
    }
}
