//! Tokio-backed delayed-action scheduler.
//!
//! One task per (order, job kind); re-scheduling a key aborts and replaces
//! the pending task, cancelling an absent key is a no-op. Fired jobs run the
//! bound handler on the blocking pool since it does Diesel work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::errors::DomainError;
use crate::domain::ports::JobScheduler;
use crate::domain::state_machine::JobKind;

/// Receiver of fired jobs. Bound after construction because the fulfillment
/// service and the scheduler reference each other.
pub trait JobHandler: Send + Sync + 'static {
    fn run(&self, order_id: i64, kind: JobKind);
}

pub struct TokioJobScheduler {
    runtime: tokio::runtime::Handle,
    jobs: Arc<Mutex<HashMap<(i64, JobKind), JoinHandle<()>>>>,
    handler: Arc<OnceLock<Arc<dyn JobHandler>>>,
}

impl TokioJobScheduler {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self {
            runtime: tokio::runtime::Handle::current(),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            handler: Arc::new(OnceLock::new()),
        }
    }

    pub fn bind_handler(&self, handler: Arc<dyn JobHandler>) {
        if self.handler.set(handler).is_err() {
            log::warn!("job handler already bound, ignoring rebind");
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.jobs.lock().expect("scheduler lock poisoned").len()
    }
}

impl JobScheduler for TokioJobScheduler {
    fn schedule(&self, order_id: i64, kind: JobKind, delay: Duration) -> Result<(), DomainError> {
        let key = (order_id, kind);
        let jobs = Arc::clone(&self.jobs);
        let handler = Arc::clone(&self.handler);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Remove the key before running so a re-schedule issued by the
            // handler itself is not clobbered afterwards.
            jobs.lock().expect("scheduler lock poisoned").remove(&key);
            match handler.get() {
                Some(handler) => {
                    let handler = Arc::clone(handler);
                    let join = tokio::task::spawn_blocking(move || handler.run(order_id, kind));
                    if let Err(e) = join.await {
                        log::error!("delayed job {kind:?} for order {order_id} panicked: {e}");
                    }
                }
                None => log::error!(
                    "delayed job {kind:?} for order {order_id} fired with no handler bound"
                ),
            }
        });

        let mut jobs = self.jobs.lock().expect("scheduler lock poisoned");
        if let Some(previous) = jobs.insert(key, task) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self, order_id: i64, kind: JobKind) -> Result<(), DomainError> {
        let mut jobs = self.jobs.lock().expect("scheduler lock poisoned");
        if let Some(task) = jobs.remove(&(order_id, kind)) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingHandler {
        fired: Mutex<Vec<(i64, JobKind)>>,
    }

    impl JobHandler for RecordingHandler {
        fn run(&self, order_id: i64, kind: JobKind) {
            self.fired
                .lock()
                .unwrap()
                .push((order_id, kind));
        }
    }

    fn fired(handler: &RecordingHandler) -> Vec<(i64, JobKind)> {
        handler.fired.lock().unwrap().clone()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fires_after_the_delay() {
        let scheduler = TokioJobScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.bind_handler(handler.clone());

        scheduler
            .schedule(1, JobKind::AutoCancel, Duration::from_millis(20))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(fired(&handler), vec![(1, JobKind::AutoCancel)]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rescheduling_replaces_the_pending_job() {
        let scheduler = TokioJobScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.bind_handler(handler.clone());

        scheduler
            .schedule(1, JobKind::AutoCancel, Duration::from_millis(30))
            .unwrap();
        scheduler
            .schedule(1, JobKind::AutoCancel, Duration::from_millis(30))
            .unwrap();
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired(&handler).len(), 1, "collapsed to a single firing");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_prevents_firing() {
        let scheduler = TokioJobScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.bind_handler(handler.clone());

        scheduler
            .schedule(1, JobKind::AutoConfirm, Duration::from_millis(50))
            .unwrap();
        scheduler.cancel(1, JobKind::AutoConfirm).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired(&handler).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelling_an_absent_job_is_fine() {
        let scheduler = TokioJobScheduler::new();
        assert!(scheduler.cancel(404, JobKind::AutoCancel).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn job_kinds_are_independent_keys() {
        let scheduler = TokioJobScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.bind_handler(handler.clone());

        scheduler
            .schedule(1, JobKind::AutoCancel, Duration::from_millis(20))
            .unwrap();
        scheduler
            .schedule(1, JobKind::AutoConfirm, Duration::from_millis(20))
            .unwrap();
        assert_eq!(scheduler.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let mut kinds = fired(&handler);
        kinds.sort_by_key(|(_, k)| format!("{k:?}"));
        assert_eq!(kinds.len(), 2);
    }
}
