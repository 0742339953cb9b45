use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Periodic reminder clock: one tick after `warmup`, then one every `period`
/// until cancelled or dropped.
pub struct ReminderTicker {
    ticks: mpsc::Receiver<Instant>,
    task: JoinHandle<()>,
}

impl ReminderTicker {
    pub fn spawn(warmup: Duration, period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + warmup, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let at = interval.tick().await;
                if tx.send(at).await.is_err() {
                    break;
                }
            }
        });

        tracing::debug!("Reminder ticker started: warmup {:?}, period {:?}", warmup, period);
        Self { ticks, task }
    }

    pub async fn tick(&mut self) -> Option<Instant> {
        self.ticks.recv().await
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ReminderTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
