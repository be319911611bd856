mod appsettings;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use pillminder_models::reminder::{ReminderDueTime, ReminderFiringPeriod, ReminderId};
use pillminder_models::user::UserId;
use pillminder_pipeline::auth::StaticTokenSource;
use pillminder_pipeline::{PrescriptionPipeline, ServiceEndpoints};
use pillminder_scheduler::{LogNotificationChannel, ReminderEngine, acknowledge};
use pillminder_storage::{InMemoryReminderStorage, NewReminder, ReminderStorage};

// Single-session binary: one local user owns every reminder.
const LOCAL_USER: UserId = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = appsettings::get();
    log::info!(
        "Pillminder starting. [poll_interval_secs = {}]",
        settings.scheduler.poll_interval_secs
    );

    let storage = Arc::new(InMemoryReminderStorage::new());
    let auth = Arc::new(StaticTokenSource::new(settings.services.api_token.clone()));
    let pipeline = PrescriptionPipeline::new(
        ServiceEndpoints {
            ocr_url: settings.services.ocr_url.clone(),
            extractor_url: settings.services.extractor_url.clone(),
            pharmacy_url: settings.services.pharmacy_url.clone(),
        },
        auth,
        storage.clone(),
    );

    let engine = ReminderEngine::start(
        storage.clone(),
        Arc::new(LogNotificationChannel),
        LOCAL_USER,
        Duration::from_secs(settings.scheduler.poll_interval_secs),
    );

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_command(line.trim(), &pipeline, storage.as_ref()).await {
                        break;
                    }
                }
                None => break,
            }
        }
    }

    // Timer, subscription and any live alert go down together.
    engine.stop().await;
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  text <prescription text>       derive daily reminders from text");
    println!("  add <YYYY-MM-DDTHH:MM> <oneoff|daily> <message>");
    println!("  list                           show all reminders");
    println!("  ack <id>                       dismiss a due reminder");
    println!("  del <id>                       delete a reminder");
    println!("  pharmacy <prescription text>   search nearby pharmacies");
    println!("  quit");
}

async fn handle_command(
    line: &str,
    pipeline: &PrescriptionPipeline,
    storage: &dyn ReminderStorage,
) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => print_help(),
        "quit" | "exit" => return false,
        "text" => match pipeline.create_reminders_from_text(rest, LOCAL_USER).await {
            Ok(report) => println!(
                "Created {} reminders ({} failed, {} entries skipped).",
                report.created, report.failed, report.skipped_entries
            ),
            Err(error) => println!("Could not create reminders: {error}"),
        },
        "add" => add_reminder(rest, storage).await,
        "list" => list_reminders(storage).await,
        "ack" => acknowledge_reminder(rest, storage).await,
        "del" => delete_reminder(rest, storage).await,
        "pharmacy" => search_pharmacies(rest, pipeline).await,
        other => println!("Unknown command {other:?}, try 'help'."),
    }

    true
}

async fn add_reminder(args: &str, storage: &dyn ReminderStorage) {
    let mut parts = args.splitn(3, ' ');
    let (Some(when), Some(period), Some(message)) = (parts.next(), parts.next(), parts.next())
    else {
        println!("Usage: add <YYYY-MM-DDTHH:MM> <oneoff|daily> <message>");
        return;
    };

    let Ok(due) = chrono::NaiveDateTime::parse_from_str(when, "%Y-%m-%dT%H:%M") else {
        println!("Could not parse {when:?} as YYYY-MM-DDTHH:MM.");
        return;
    };
    let recurrence = match period {
        "daily" => ReminderFiringPeriod::Daily,
        "oneoff" => ReminderFiringPeriod::OneOff,
        other => {
            println!("Unknown recurrence {other:?}, expected 'oneoff' or 'daily'.");
            return;
        }
    };

    let reminder = NewReminder {
        title: "Reminder".to_owned(),
        message: message.to_owned(),
        due_at: ReminderDueTime::new(due),
        recurrence,
        user_id: LOCAL_USER,
    };
    match storage.insert(reminder).await {
        Ok(created) => println!(
            "Reminder {} set for {}.",
            created.id,
            created.due_at.instant()
        ),
        Err(error) => println!("Could not save reminder: {error}"),
    }
}

async fn list_reminders(storage: &dyn ReminderStorage) {
    match storage.get_all_user_reminders(LOCAL_USER).await {
        Ok(reminders) if reminders.is_empty() => println!("No reminders."),
        Ok(reminders) => {
            for reminder in reminders {
                let recurrence = match reminder.recurrence {
                    ReminderFiringPeriod::Daily => " (daily)",
                    ReminderFiringPeriod::OneOff => "",
                };
                let state = if reminder.acknowledged {
                    " [dismissed]"
                } else {
                    ""
                };
                println!(
                    "#{} {} at {}{}{}: {}",
                    reminder.id,
                    reminder.title,
                    reminder.due_at.instant(),
                    recurrence,
                    state,
                    reminder.message
                );
            }
        }
        Err(error) => println!("Could not list reminders: {error}"),
    }
}

async fn acknowledge_reminder(args: &str, storage: &dyn ReminderStorage) {
    let Ok(id) = args.parse::<ReminderId>() else {
        println!("Usage: ack <id>");
        return;
    };

    match storage.get(id).await {
        Ok(Some(reminder)) => match acknowledge(storage, &reminder).await {
            Ok(updated) if updated.acknowledged => println!("Reminder {id} dismissed."),
            Ok(updated) => println!(
                "Reminder {id} dismissed for today, next due {}.",
                updated.due_at.instant()
            ),
            Err(error) => println!("Could not acknowledge reminder {id}: {error}"),
        },
        Ok(None) => println!("No reminder {id}."),
        Err(error) => println!("Could not look up reminder {id}: {error}"),
    }
}

async fn delete_reminder(args: &str, storage: &dyn ReminderStorage) {
    let Ok(id) = args.parse::<ReminderId>() else {
        println!("Usage: del <id>");
        return;
    };

    match storage.delete(id).await {
        Ok(()) => println!("Reminder {id} deleted."),
        Err(error) => println!("Could not delete reminder {id}: {error}"),
    }
}

async fn search_pharmacies(args: &str, pipeline: &PrescriptionPipeline) {
    if args.is_empty() {
        println!("Usage: pharmacy <prescription text>");
        return;
    }

    match pipeline.search_pharmacies(args, None, None).await {
        Ok(results) if results.medicines.is_empty() => println!("No medicines recognized."),
        Ok(results) => {
            for (medicine, matches) in &results.medicines {
                println!("{medicine}:");
                if matches.is_empty() {
                    println!("  no pharmacies stock this medicine");
                }
                for found in matches {
                    let distance = found
                        .distance_meters
                        .map(|d| format!("{d:.0} m"))
                        .unwrap_or_else(|| "N/A".to_owned());
                    let quantity = found
                        .inventory
                        .as_ref()
                        .and_then(|i| i.quantity)
                        .map(|q| q.to_string())
                        .unwrap_or_else(|| "-".to_owned());
                    println!(
                        "  {} ({}), {distance}, qty {quantity}",
                        found.pharmacy_name, found.address
                    );
                }
            }
        }
        Err(error) => println!("Search failed: {error}"),
    }
}
