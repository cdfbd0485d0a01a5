//! DeadlineScheduler processor.
//!
//! Owns one delayed task per scheduled entity deadline (auction end,
//! trivia close). When a deadline elapses the scheduler emits a
//! [`DeadlineElapsed`] command; the server wires that channel to the
//! auction system and trivia engine, which perform the actual close.
//! Cancellation is best-effort: aborting a task that already fired is a
//! no-op, and the downstream close operations are idempotent.
//!
//! Deadlines live in the database (`end_time` columns); at startup the
//! managers re-schedule every still-active deadline, so restarts lose
//! nothing.

use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Which entity family a deadline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineKind {
    Auction,
    Trivia,
}

/// Emitted when a scheduled deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineElapsed {
    pub kind: DeadlineKind,
    pub id: Uuid,
}

enum Command {
    Schedule {
        kind: DeadlineKind,
        id: Uuid,
        end_time: time::OffsetDateTime,
    },
    Cancel {
        id: Uuid,
    },
}

/// Cloneable handle for scheduling and cancelling deadlines.
#[derive(Clone)]
pub struct DeadlineHandle {
    tx: mpsc::Sender<Command>,
}

impl DeadlineHandle {
    /// Schedule (or reschedule) a deadline. Past deadlines fire
    /// immediately.
    pub async fn schedule(&self, kind: DeadlineKind, id: Uuid, end_time: time::OffsetDateTime) {
        if self
            .tx
            .send(Command::Schedule { kind, id, end_time })
            .await
            .is_err()
        {
            debug!(%id, "Deadline scheduler gone, schedule ignored");
        }
    }

    /// Cancel a scheduled deadline. A deadline that already fired is
    /// silently ignored.
    pub async fn cancel(&self, id: Uuid) {
        if self.tx.send(Command::Cancel { id }).await.is_err() {
            debug!(%id, "Deadline scheduler gone, cancel ignored");
        }
    }
}

pub struct DeadlineScheduler;

impl DeadlineScheduler {
    /// Spawn the scheduler task. Returns the command handle and the
    /// elapsed-deadline stream the server dispatches on.
    pub fn spawn(
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (DeadlineHandle, mpsc::Receiver<DeadlineElapsed>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
        let (elapsed_tx, elapsed_rx) = mpsc::channel::<DeadlineElapsed>(256);

        tokio::spawn(async move {
            let mut tasks: HashMap<Uuid, JoinHandle<()>> = HashMap::new();
            info!("DeadlineScheduler started");

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("DeadlineScheduler received shutdown signal");
                            break;
                        }
                    }

                    Some(command) = cmd_rx.recv() => {
                        tasks.retain(|_, handle| !handle.is_finished());
                        match command {
                            Command::Schedule { kind, id, end_time } => {
                                if let Some(old) = tasks.remove(&id) {
                                    old.abort();
                                }
                                let delay = delay_until(end_time);
                                debug!(%id, ?kind, ?delay, "Deadline scheduled");
                                let elapsed_tx = elapsed_tx.clone();
                                tasks.insert(id, tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    let _ = elapsed_tx
                                        .send(DeadlineElapsed { kind, id })
                                        .await;
                                }));
                            }
                            Command::Cancel { id } => {
                                if let Some(handle) = tasks.remove(&id) {
                                    handle.abort();
                                    debug!(%id, "Deadline cancelled");
                                }
                            }
                        }
                    }

                    else => {
                        info!("Deadline command channel closed");
                        break;
                    }
                }
            }

            for (_, handle) in tasks {
                handle.abort();
            }
            info!("DeadlineScheduler shutdown complete");
        });

        (DeadlineHandle { tx: cmd_tx }, elapsed_rx)
    }
}

fn delay_until(end_time: time::OffsetDateTime) -> std::time::Duration {
    let remaining = end_time - time::OffsetDateTime::now_utc();
    remaining.try_into().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_emitted() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut elapsed_rx) = DeadlineScheduler::spawn(shutdown_rx);

        let id = Uuid::new_v4();
        let end = time::OffsetDateTime::now_utc() + time::Duration::seconds(30);
        handle.schedule(DeadlineKind::Auction, id, end).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        let fired = elapsed_rx.recv().await;
        assert_eq!(
            fired,
            Some(DeadlineElapsed {
                kind: DeadlineKind::Auction,
                id
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_deadline_never_fires() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut elapsed_rx) = DeadlineScheduler::spawn(shutdown_rx);

        let id = Uuid::new_v4();
        let end = time::OffsetDateTime::now_utc() + time::Duration::seconds(30);
        handle.schedule(DeadlineKind::Trivia, id, end).await;
        handle.cancel(id).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(elapsed_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_fires_immediately() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut elapsed_rx) = DeadlineScheduler::spawn(shutdown_rx);

        let id = Uuid::new_v4();
        let end = time::OffsetDateTime::now_utc() - time::Duration::seconds(5);
        handle.schedule(DeadlineKind::Auction, id, end).await;

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(elapsed_rx.recv().await.is_some());
    }
}
