use chrono::Local;

use modcal::{
    app::{App, SyncStatus},
    notify::{Notifier, ReminderTicker, ReminderWatch},
    storage::{Config, DismissedFile},
};

/// Watch mode: keeps the store in sync and raises reminders until Ctrl-C.
pub async fn run_watch(config: &Config) -> anyhow::Result<()> {
    let mut app = App::new(config)?;
    app.auto_sync(&config.sync);

    let mut watch = ReminderWatch::new(
        DismissedFile::new(config.storage.dismissed_file.clone()),
        Notifier::from_config(&config.notifications),
    );
    let mut ticker = ReminderTicker::spawn(
        config.notifications.warmup(),
        config.notifications.check_interval(),
    );

    println!(
        "Watching {} local events for reminders. Press Ctrl-C to stop.",
        app.store().local_len()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = app.next_sync_event() => {
                let before = app.sync_status.clone();
                app.handle_sync_event(event);
                report_status_change(&before, &app.sync_status);
            }
            Some(_) = ticker.tick() => {
                // Other modcal invocations write the same events file.
                app.refresh_local();
                watch.on_tick(&app.reminder_snapshot(), Local::now().naive_local());
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    ticker.cancel();
    app.shutdown();
    tracing::info!("Watch mode stopped");
    Ok(())
}

fn report_status_change(before: &SyncStatus, after: &SyncStatus) {
    if before == after {
        return;
    }
    match after {
        SyncStatus::Synced => println!("Synced with server"),
        SyncStatus::Offline => println!("Working offline"),
        SyncStatus::Error(message) => eprintln!("Sync failed: {}", message),
        SyncStatus::Syncing => {}
    }
}
