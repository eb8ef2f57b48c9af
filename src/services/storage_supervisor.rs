use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dao::room_store::RoomStore;

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Ping the room store and keep `degraded` in sync with its availability.
///
/// Healthy stores are pinged every `poll_interval`; failing ones are retried
/// with an exponential backoff until they answer again.
pub async fn run(
    store: Arc<dyn RoomStore>,
    degraded: watch::Sender<bool>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0u32;

    loop {
        let wait = match store.ping().await {
            Ok(()) => {
                if *degraded.borrow() {
                    info!("storage reachable; leaving degraded mode");
                    degraded.send_replace(false);
                }
                attempt = 0;
                delay = INITIAL_DELAY;
                poll_interval
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(error = %err, "storage ping failed; entering degraded mode");
                    degraded.send_replace(true);
                } else {
                    warn!(attempt, error = %err, "storage still unavailable");
                }
                attempt += 1;
                let wait = delay;
                delay = (delay * 2).min(MAX_DELAY);
                wait
            }
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::storage::{StorageError, StorageResult},
        state::room::RoomSnapshot,
    };

    #[derive(Default)]
    struct Flaky {
        down: AtomicBool,
    }

    impl RoomStore for Flaky {
        fn get_room(&self, _room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomSnapshot>>> {
            Box::pin(async { Ok(None) })
        }

        fn set_room(
            &self,
            _room_id: &str,
            _snapshot: RoomSnapshot,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn del_room(&self, _room_id: &str) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
            let down = self.down.load(Ordering::SeqCst);
            Box::pin(async move {
                if down {
                    Err(StorageError::unavailable(
                        "down".into(),
                        std::io::Error::other("connection refused"),
                    ))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_flag_follows_store_health() {
        let store = Arc::new(Flaky::default());
        let (tx, mut rx) = watch::channel(true);
        let shutdown = CancellationToken::new();
        tokio::spawn(run(
            store.clone(),
            tx,
            Duration::from_secs(5),
            shutdown.clone(),
        ));

        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());

        store.down.store(true, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        store.down.store(false, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        shutdown.cancel();
    }
}
