use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::ErrorReporting;
use crate::executor::CommandRunner;
use crate::reconciler::Reconciler;
use crate::sway_ipc::{Event, EventSource, TreeSource};

/// Runs the blocking subscription on its own thread, forwarding events until
/// the receiving side goes away. A broken subscription is re-established after
/// `retry_delay`.
pub fn spawn_subscription<E: EventSource>(
    source: E,
    retry_delay: Duration,
    events: mpsc::UnboundedSender<Event>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match source.subscribe() {
            Ok(stream) => {
                log::info!("Listening...");
                for event in stream {
                    match event {
                        Ok(event) => {
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            e.log_error("Window manager event stream broke");
                            break;
                        }
                    }
                }
            }
            Err(e) => e.log_error("Could not subscribe to window manager events"),
        }

        if events.is_closed() {
            return;
        }
        thread::sleep(retry_delay);
    })
}

/// Reconciles once, then again for every relevant event until the channel closes.
/// Tree queries block, so they run on the blocking pool.
pub async fn run<T, R>(
    trees: Arc<Mutex<T>>,
    reconciler: &mut Reconciler<R>,
    mut events: mpsc::UnboundedReceiver<Event>,
) where
    T: TreeSource + Send + 'static,
    R: CommandRunner,
{
    reconcile_current_tree(&trees, reconciler).await;

    while let Some(event) = events.recv().await {
        if !event.triggers_reconcile() {
            log::debug!("Ignoring {:?}", event);
            continue;
        }

        // One snapshot covers everything already queued.
        let mut coalesced = 0;
        while events.try_recv().is_ok() {
            coalesced += 1;
        }
        if coalesced > 0 {
            log::debug!("Coalesced {} queued events", coalesced);
        }

        reconcile_current_tree(&trees, reconciler).await;
    }
}

async fn reconcile_current_tree<T, R>(trees: &Arc<Mutex<T>>, reconciler: &mut Reconciler<R>)
where
    T: TreeSource + Send + 'static,
    R: CommandRunner,
{
    let trees = Arc::clone(trees);
    let snapshot = tokio::task::spawn_blocking(move || {
        let tree = trees.lock().unwrap_or_else(PoisonError::into_inner).tree();
        tree
    })
    .await;

    match snapshot {
        Ok(Ok(tree)) => reconciler.reconcile(&tree),
        Ok(Err(e)) => e.log_error("Skipping reconciliation, tree query failed"),
        Err(e) => log::error!("Skipping reconciliation, tree query panicked: {}", e),
    }
}
