//! Background maintenance: expiry-based deletion of completed and stale
//! active missions, plus a store health check. Runs on an interval and
//! tolerates partial failure; everything here logs and continues.

use super::Api;
use crate::mission::Mission;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

impl Api {
    /// Ask the store for its health and log the outcome. A `MemoryUsage`
    /// error means the store is over its configured budget.
    pub async fn health_check(&self) {
        info!("checking the health of the database");
        if let Err(e) = self.store.health().await {
            error!(error = %e, "store health check failed");
        }
    }

    /// Walk each key's completed list, then each plan's active list, deleting
    /// missions older than the configured expiry. Both lists are
    /// chronological, so each walk stops at the first mission that is still
    /// fresh.
    pub async fn delete_expired_missions(&self) {
        let keys = match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "janitor could not list keys");
                return;
            }
        };
        debug!(keys = keys.len(), "janitor pass starting");

        for key in keys {
            let mut deleted = 0usize;

            for mission_id in self.completed_missions(&key).await {
                if self.mission_can_be_deleted(&key, &mission_id).await {
                    if let Err(e) = self.delete_mission(&key, &mission_id).await {
                        error!(key = %key, mission_id = %mission_id, error = %e, "janitor failed to delete mission");
                        continue;
                    }
                    deleted += 1;
                } else {
                    break;
                }
            }

            let plans = self.list_plans(&key).await.unwrap_or_default();
            for plan in plans {
                for mission_id in self.active_missions(&key, &plan).await {
                    if self.mission_can_be_deleted(&key, &mission_id).await {
                        if let Err(e) = self.delete_mission(&key, &mission_id).await {
                            error!(key = %key, mission_id = %mission_id, error = %e, "janitor failed to delete mission");
                            continue;
                        }
                        deleted += 1;
                    } else {
                        break;
                    }
                }
            }

            if deleted > 0 {
                info!(key = %key, deleted, "janitor removed expired missions");
            }
        }
    }

    /// A mission is deletable when it is older than the expiry, or when it is
    /// invalid: unreadable, unparseable, or missing a start timestamp.
    async fn mission_can_be_deleted(&self, key: &str, mission_id: &str) -> bool {
        let Some(mission_json) = self.store.get(key, mission_id).await else {
            debug!(key, mission_id, "deleting mission that cannot be read");
            return true;
        };
        let Ok(mission) = Mission::from_json(&mission_json) else {
            debug!(key, mission_id, "deleting mission that cannot be parsed");
            return true;
        };
        let Some(start) = mission.start else {
            debug!(key, mission_id, "deleting mission with no start time");
            return true;
        };

        let expiry = chrono::Duration::from_std(self.config.mission_expiry)
            .unwrap_or_else(|_| chrono::Duration::hours(168));
        let cutoff = chrono::Utc::now() - expiry;

        if let Some(end) = mission.end {
            if end < cutoff {
                return true;
            }
        }
        start < cutoff
    }
}

/// Run the janitor until the shutdown signal flips. The first pass runs
/// immediately; later passes follow the configured interval.
pub fn spawn_janitor(api: Arc<Api>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = api.config.monitor_interval;
        loop {
            api.delete_expired_missions().await;
            api.health_check().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }
    })
}
