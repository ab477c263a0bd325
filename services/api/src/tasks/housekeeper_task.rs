//! services/api/src/tasks/housekeeper_task.rs
//!
//! Periodically sweeps expired sessions out of the token cache.

use gophermart_core::token_cache::TokenCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs `TokenCache::house_keeper` every `sweep_interval` until cancelled.
pub async fn housekeeper_process(
    tokens: Arc<TokenCache>,
    sweep_interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval = ?sweep_interval, "Session housekeeper started.");

    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing can be stale yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                info!("Session housekeeper stopped.");
                return;
            }
            _ = ticker.tick() => {}
        }

        let removed = tokens.house_keeper();
        if removed > 0 {
            info!(removed, remaining = tokens.len(), "Expired sessions swept.");
        } else {
            debug!(remaining = tokens.len(), "No expired sessions.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gophermart_core::token_cache::TokenLookup;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_schedule_and_stops_on_cancel() {
        let tokens = Arc::new(TokenCache::new(Duration::from_secs(300)));
        tokens.store_token("alice", "abc");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(housekeeper_process(
            tokens.clone(),
            Duration::from_secs(310),
            cancel.clone(),
        ));

        // The paused clock jumps straight to each pending timer.
        sleep(Duration::from_secs(301)).await;
        assert_eq!(tokens.get_token_user("abc"), TokenLookup::Expired);
        assert_eq!(tokens.len(), 1);

        // Crossing the 310s tick lets the housekeeper run.
        sleep(Duration::from_secs(10)).await;
        assert_eq!(tokens.get_token_user("abc"), TokenLookup::NotFound);

        cancel.cancel();
        handle.await.unwrap();
    }
}
