//! Continuous background replication.

use crate::applier::SyncApplier;
use crate::replicator::Replicator;
use crate::transport::SyncTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Events emitted by a running continuous replicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationEvent {
    /// A cycle completed and changed something locally or remotely.
    Changed {
        /// Operations pulled.
        pulled: u64,
        /// Operations pushed.
        pushed: u64,
    },
    /// A cycle failed; replication continues on the next tick.
    Error(String),
}

/// A background thread running sync cycles on an interval.
///
/// Errors are reported through the event channel and do not stop the
/// loop; the next tick retries from scratch.
pub struct ContinuousReplicator {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ContinuousReplicator {
    /// Starts replication on the replicator's configured interval.
    ///
    /// Returns the running handle and the event receiver.
    pub fn start<T, A>(replicator: Arc<Replicator<T, A>>) -> (Self, Receiver<ReplicationEvent>)
    where
        T: SyncTransport + 'static,
        A: SyncApplier + 'static,
    {
        let (events, receiver) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let interval = replicator.config().sync_interval;

        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            run_loop(&replicator, &thread_stop, interval, &events);
        });

        (
            Self {
                stop,
                handle: Some(handle),
            },
            receiver,
        )
    }

    /// Returns true while the background thread is running.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    /// Stops the loop and joins the thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ContinuousReplicator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<T, A>(
    replicator: &Replicator<T, A>,
    stop: &AtomicBool,
    interval: Duration,
    events: &Sender<ReplicationEvent>,
) where
    T: SyncTransport,
    A: SyncApplier,
{
    while !stop.load(Ordering::SeqCst) {
        match replicator.sync_with_retry() {
            Ok(result) => {
                if result.pulled > 0 || result.pushed > 0 {
                    let _ = events.send(ReplicationEvent::Changed {
                        pulled: result.pulled,
                        pushed: result.pushed,
                    });
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "continuous sync cycle failed");
                let _ = events.send(ReplicationEvent::Error(err.to_string()));
            }
        }

        // Sleep in short slices so stop() is honored promptly.
        let mut remaining = interval;
        while !stop.load(Ordering::SeqCst) && remaining > Duration::ZERO {
            let slice = remaining.min(Duration::from_millis(25));
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}
