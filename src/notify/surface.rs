use std::io::Write;

use thiserror::Error;

use crate::notify::reminder::Reminder;
use crate::storage::config::NotificationConfig;

pub const REMINDER_SUMMARY: &str = "Calendar - Reminder";
const DESKTOP_TIMEOUT_MS: u32 = 15_000;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Desktop notification failed: {0}")]
    Desktop(String),
    #[error("Console output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationSurface: Send {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    fn show(&self, summary: &str, body: &str) -> Result<(), NotifyError>;
}

pub struct DesktopSurface {
    enabled: bool,
}

impl DesktopSurface {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl NotificationSurface for DesktopSurface {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn show(&self, summary: &str, body: &str) -> Result<(), NotifyError> {
        notify_rust::Notification::new()
            .summary(summary)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(DESKTOP_TIMEOUT_MS))
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::Desktop(e.to_string()))
    }
}

/// Fallback surface: prints the reminder to the terminal.
pub struct ConsoleSurface;

impl NotificationSurface for ConsoleSurface {
    fn name(&self) -> &'static str {
        "console"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn show(&self, summary: &str, body: &str) -> Result<(), NotifyError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\n=== {} ===\n{}\n", summary, body)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Tries each available surface in order until one accepts the reminder.
pub struct Notifier {
    surfaces: Vec<Box<dyn NotificationSurface>>,
    sound: bool,
}

impl Notifier {
    pub fn new(surfaces: Vec<Box<dyn NotificationSurface>>, sound: bool) -> Self {
        Self { surfaces, sound }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        let surfaces: Vec<Box<dyn NotificationSurface>> = vec![
            Box::new(DesktopSurface::new(config.desktop)),
            Box::new(ConsoleSurface),
        ];
        Self::new(surfaces, config.sound)
    }

    pub fn deliver(&self, reminder: &Reminder) -> bool {
        for surface in self.surfaces.iter().filter(|s| s.is_available()) {
            match surface.show(REMINDER_SUMMARY, &reminder.message) {
                Ok(()) => {
                    tracing::info!("Reminder {} shown on {}", reminder.id, surface.name());
                    if self.sound {
                        beep();
                    }
                    return true;
                }
                Err(e) => {
                    tracing::warn!("{} surface could not show {}: {}", surface.name(), reminder.id, e);
                }
            }
        }

        tracing::debug!("No surface available for reminder {}", reminder.id);
        false
    }
}

fn beep() {
    let mut stdout = std::io::stdout().lock();
    if stdout.write_all(b"\x07").and_then(|_| stdout.flush()).is_err() {
        tracing::debug!("Terminal bell unavailable");
    }
}
