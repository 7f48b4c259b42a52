//! Background sweeper that purges expired sessions and tokens.
//!
//! Expired credentials already fail authentication the moment their expiry
//! passes; this worker only reclaims storage. A long cadence is fine.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use super::handlers::auth::storage::AuthStore;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone, Copy, Debug)]
pub struct SweeperConfig {
    interval: Duration,
}

impl SweeperConfig {
    /// Default config: one sweep per hour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let interval = if self.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.interval
        };
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that periodically purges expired credentials.
pub(crate) fn spawn_expiry_sweeper(
    store: Arc<dyn AuthStore>,
    config: SweeperConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let interval = config.interval();

        loop {
            if let Err(err) = sweep_once(store.as_ref()).await {
                error!("Expiry sweep failed: {err}");
            }
            sleep(interval).await;
        }
    })
}

async fn sweep_once(store: &dyn AuthStore) -> Result<()> {
    let sessions = store.purge_expired_sessions().await?;
    let tokens = store.purge_expired_tokens().await?;
    if sessions > 0 || tokens > 0 {
        info!(sessions, tokens, "Purged expired credentials");
    }
    Ok(())
}
