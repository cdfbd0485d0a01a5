//! ExpirySweeper processor.
//!
//! Periodic reconciliation loop for state that can expire while nobody is
//! looking: missions past their deadline and subscriptions past their end
//! date. Push events alone are not enough (downstream consumers may miss
//! them), so this sweep is the authoritative cleanup path.
//!
//! The interval is read from a [`ConfigStore`] on every pass, so a SIGHUP
//! reload takes effect without restarting the loop.

use crate::config::{ConfigStore, ConfigWatcher, SweeperConfig};
use crate::missions::MissionManager;
use crate::subscriptions::SubscriptionManager;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// ExpirySweeper drives mission and subscription expiry on a schedule.
pub struct ExpirySweeper {
    missions: Arc<MissionManager>,
    subscriptions: Arc<SubscriptionManager>,
    config: ConfigStore<SweeperConfig>,
}

impl ExpirySweeper {
    pub fn new(
        missions: Arc<MissionManager>,
        subscriptions: Arc<SubscriptionManager>,
        config: ConfigStore<SweeperConfig>,
    ) -> Self {
        Self {
            missions,
            subscriptions,
            config,
        }
    }

    /// Run the sweeper until shutdown.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut config_watcher: ConfigWatcher,
    ) {
        info!("ExpirySweeper started");

        loop {
            let interval = self.config.snapshot().await.interval();

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ExpirySweeper received shutdown signal");
                        break;
                    }
                }

                // Interval changed: restart the sleep with the new value.
                Ok(()) = config_watcher.changed() => {
                    info!("ExpirySweeper reloaded sweep interval");
                }

                _ = tokio::time::sleep(interval) => {
                    self.sweep_once().await;
                }
            }
        }

        info!("ExpirySweeper shutdown complete");
    }

    /// One reconciliation pass. Public so the server can force a sweep.
    pub async fn sweep_once(&self) {
        match self.missions.expire_missions().await {
            Ok(expired) if expired > 0 => info!(expired, "Expired overdue missions"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Mission expiry sweep failed"),
        }
        match self.subscriptions.process_expiration().await {
            Ok(expired) if expired > 0 => info!(expired, "Expired overdue subscriptions"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Subscription expiry sweep failed"),
        }
    }
}
