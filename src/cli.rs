use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    process::{Command, Stdio},
};

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::session::run_watch;

use modcal::{
    app::{App, SyncStatus},
    calendar::{Event, EventDraft},
    storage::{Config, DismissedFile},
};

pub const USAGE: &str = "Usage: modcal [--agenda [YYYY/MM/DD]] [--sync] [--push] \
[--add TITLE YYYY-MM-DDTHH:MM [MINUTES]] [--delete ID] [--dismiss ID] \
[--import PATH] [--export PATH]";

const DEFAULT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum CliMode {
    Watch,
    Agenda(NaiveDate),
    Sync,
    Push,
    Add {
        title: String,
        start: NaiveDateTime,
        minutes: i64,
    },
    Delete(String),
    Dismiss(String),
    Import(PathBuf),
    Export(PathBuf),
    Help,
}

pub fn parse_cli_mode(args: impl IntoIterator<Item = String>) -> Result<CliMode, String> {
    let mut args = args.into_iter().peekable();
    let Some(arg) = args.next() else {
        return Ok(CliMode::Watch);
    };

    let mode = match arg.as_str() {
        "--agenda" => {
            let date = match args.next_if(|next| !next.starts_with("--")) {
                Some(date_str) => NaiveDate::parse_from_str(&date_str, "%Y/%m/%d")
                    .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", date_str))?,
                None => Local::now().date_naive(),
            };
            CliMode::Agenda(date)
        }
        "--sync" => CliMode::Sync,
        "--push" => CliMode::Push,
        "--add" => {
            let title = args.next().ok_or("--add needs a title")?;
            let start_str = args.next().ok_or("--add needs a start time")?;
            let start = NaiveDateTime::parse_from_str(&start_str, "%Y-%m-%dT%H:%M")
                .map_err(|_| format!("Invalid start '{}'. Use YYYY-MM-DDTHH:MM.", start_str))?;
            let minutes = match args.next_if(|next| !next.starts_with("--")) {
                Some(raw) => raw
                    .parse::<i64>()
                    .ok()
                    .filter(|m| *m > 0)
                    .ok_or_else(|| format!("Invalid duration '{}'", raw))?,
                None => DEFAULT_DURATION_MINUTES,
            };
            CliMode::Add { title, start, minutes }
        }
        "--delete" => CliMode::Delete(args.next().ok_or("--delete needs an event id")?),
        "--dismiss" => CliMode::Dismiss(args.next().ok_or("--dismiss needs an event id")?),
        "--import" => CliMode::Import(args.next().ok_or("--import needs a path")?.into()),
        "--export" => CliMode::Export(args.next().ok_or("--export needs a path")?.into()),
        "--help" => CliMode::Help,
        _ => return Err(format!("Unknown argument: {}", arg)),
    };

    match args.next() {
        Some(extra) => Err(format!("Unexpected argument: {}", extra)),
        None => Ok(mode),
    }
}

pub fn cli_mode_from_env() -> Result<CliMode, String> {
    parse_cli_mode(env::args().skip(1))
}

pub async fn run(mode: CliMode, config: &Config) -> anyhow::Result<()> {
    match mode {
        CliMode::Watch => run_watch(config).await?,
        CliMode::Help => println!("{}", USAGE),
        CliMode::Agenda(date) => {
            let mut app = App::new(config)?;
            if app.start_sync() {
                app.settle().await;
            }
            if !app.is_connected() {
                eprintln!("{}", status_line(&app));
            }
            let agenda = format_agenda_text(date, &app.events_on(date));
            display_with_pager(&agenda)?;
        }
        CliMode::Sync => {
            let mut app = App::new(config)?;
            if app.start_sync() {
                app.settle().await;
            }
            println!("{}", status_line(&app));
            println!(
                "{} local, {} server events",
                app.store().local_len(),
                app.store().server_len()
            );
        }
        CliMode::Push => {
            let mut app = App::new(config)?;
            let sent = app.push_local()?;
            app.settle().await;
            println!("Sent {} local events. {}", sent, status_line(&app));
        }
        CliMode::Add { title, start, minutes } => {
            let mut app = connected_app(config).await?;
            let draft = EventDraft::new(title, start, start + Duration::minutes(minutes));
            let event = app.create_event(draft)?;
            app.settle().await;
            let id = app.resolve_id(event.id());
            let saved_as = app.get(id).map_or(event.source, |e| e.source);
            println!("Created {} event {}", saved_as.label(), id);
        }
        CliMode::Delete(id) => {
            let mut app = connected_app(config).await?;
            let removed = app.delete_event(&id)?;
            app.settle().await;
            println!("Deleted '{}'", removed.title);
        }
        CliMode::Dismiss(id) => {
            let dismissed = DismissedFile::new(config.storage.dismissed_file.clone());
            dismissed
                .record(&id, Local::now().naive_local())
                .with_context(|| format!("Failed to record dismissal in {}", dismissed.path().display()))?;
            println!("Reminders for {} dismissed for 24 hours", id);
        }
        CliMode::Import(path) => {
            let mut app = App::new(config)?;
            let count = app
                .import_from(&path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!("Imported {} events", count);
        }
        CliMode::Export(path) => {
            let mut app = connected_app(config).await?;
            let count = app
                .export_to(&path)
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            println!("Exported {} events", count);
        }
    }
    Ok(())
}

async fn connected_app(config: &Config) -> anyhow::Result<App> {
    let mut app = App::new(config)?;
    if app.auto_sync(&config.sync) {
        app.settle().await;
    }
    Ok(app)
}

fn status_line(app: &App) -> String {
    match &app.sync_status {
        SyncStatus::Synced => "Synced with server".to_string(),
        SyncStatus::Syncing => "Sync in progress".to_string(),
        SyncStatus::Offline => "Working offline".to_string(),
        SyncStatus::Error(message) => format!("Sync failed: {}", message),
    }
}

fn format_agenda_text(date: NaiveDate, events: &[&Event]) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Agenda - {}", date.format("%A, %B %d, %Y")));
    lines.push(String::new());

    if events.is_empty() {
        lines.push("No events scheduled.".to_string());
    } else {
        for event in events {
            lines.push(format!("- {}", build_agenda_line(event)));
        }
    }

    lines.join("\n")
}

fn build_agenda_line(event: &Event) -> String {
    let time_label = format!("{}-{}", event.start.format("%H:%M"), event.end.format("%H:%M"));
    let mut line = format!("{:<13} {} [{}]", time_label, event.title, event.source.label());
    if !event.description.is_empty() {
        line.push_str(&format!(" - {}", event.description));
    }
    line
}

fn display_with_pager(text: &str) -> Result<(), io::Error> {
    let pager_value = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager_value.split_whitespace();
    let Some(cmd) = parts.next() else {
        println!("{text}");
        return Ok(());
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd).args(&args).stdin(Stdio::piped()).spawn() {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(text.as_bytes())?;
            }
            drop(child.stdin.take());
            let _ = child.wait();
        }
        Err(_) => println!("{text}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcal::calendar::EventSource;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_watch() {
        assert_eq!(parse_cli_mode(args(&[])), Ok(CliMode::Watch));
    }

    #[test]
    fn agenda_accepts_explicit_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert_eq!(
            parse_cli_mode(args(&["--agenda", "2025/01/10"])),
            Ok(CliMode::Agenda(expected))
        );
    }

    #[test]
    fn agenda_defaults_to_today() {
        assert_eq!(
            parse_cli_mode(args(&["--agenda"])),
            Ok(CliMode::Agenda(Local::now().date_naive()))
        );
    }

    #[test]
    fn agenda_rejects_bad_date() {
        assert!(parse_cli_mode(args(&["--agenda", "10.01.2025"])).is_err());
    }

    #[test]
    fn add_parses_title_start_and_duration() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            parse_cli_mode(args(&["--add", "Standup", "2025-01-10T09:30", "15"])),
            Ok(CliMode::Add {
                title: "Standup".to_string(),
                start,
                minutes: 15
            })
        );
    }

    #[test]
    fn add_defaults_to_an_hour() {
        let Ok(CliMode::Add { minutes, .. }) =
            parse_cli_mode(args(&["--add", "Standup", "2025-01-10T09:30"]))
        else {
            panic!("expected add mode");
        };
        assert_eq!(minutes, 60);
    }

    #[test]
    fn add_rejects_non_positive_duration() {
        assert!(parse_cli_mode(args(&["--add", "Standup", "2025-01-10T09:30", "0"])).is_err());
    }

    #[test]
    fn missing_values_are_errors() {
        assert!(parse_cli_mode(args(&["--delete"])).is_err());
        assert!(parse_cli_mode(args(&["--import"])).is_err());
        assert!(parse_cli_mode(args(&["--add", "Standup"])).is_err());
    }

    #[test]
    fn unknown_and_extra_arguments_are_errors() {
        assert_eq!(
            parse_cli_mode(args(&["--frobnicate"])),
            Err("Unknown argument: --frobnicate".to_string())
        );
        assert!(parse_cli_mode(args(&["--sync", "--push"])).is_err());
    }

    #[test]
    fn agenda_lists_events_with_source() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let start = date.and_hms_opt(9, 0, 0).unwrap();
        let local = Event::with_id("l1", "Dentist", start, start + Duration::minutes(30))
            .with_description("Bring card");
        let server = Event::with_id("s1", "Review", start + Duration::hours(2), start + Duration::hours(3))
            .with_source(EventSource::Server);

        let text = format_agenda_text(date, &[&local, &server]);

        assert!(text.starts_with("Agenda - Friday, January 10, 2025"));
        assert!(text.contains("- 09:00-09:30   Dentist [local] - Bring card"));
        assert!(text.contains("- 11:00-12:00   Review [server]"));
    }

    #[test]
    fn empty_agenda_says_so() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(format_agenda_text(date, &[]).ends_with("No events scheduled."));
    }
}
