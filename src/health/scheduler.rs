use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::HealthProber;

/// Re-run `probe_all` every `interval` for the life of the process. The
/// first round starts one interval after boot; a round is awaited before the
/// next tick so batches never overlap.
pub fn spawn_health_scheduler(prober: HealthProber, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "Health check scheduler started");
        loop {
            ticker.tick().await;
            match prober.probe_all().await {
                Ok(batch) => {
                    let results = batch.join().await;
                    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                    tracing::info!(
                        probed = results.len(),
                        failed,
                        "Scheduled health check finished"
                    );
                }
                Err(e) => tracing::error!("Scheduled health check could not start: {}", e),
            }
        }
    })
}
