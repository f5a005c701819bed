//! Periodic background loops.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_PERIOD: Duration = Duration::from_millis(100);

/// Run `tick` every `period` until `shutdown` flips to true. A failed tick
/// is logged and followed by a `backoff` pause; the loop itself never ends on
/// error. The first tick fires immediately.
pub fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<usize>> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        tracing::info!("Started {} loop (every {:?})", name, period);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    match tick().await {
                        Ok(updated) => tracing::debug!("{} tick updated {} twins", name, updated),
                        Err(e) => {
                            tracing::error!("Error in {} loop: {:#}", name, e);
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = shutdown.changed() => break,
                            }
                        }
                    }
                }
            }
        }
        tracing::info!("Stopped {} loop", name);
    })
}
