//! # Sequential Task Guard
//!
//! Serializes asynchronous jobs submitted from any number of tasks. A single
//! worker task owns a chained value `T`, pulls jobs off an unbounded queue in
//! submission order, and hands each job the value produced by the previous
//! successful job.
//!
//! ## Guarantees
//!
//! - Jobs run in the order [`SequentialGuard::submit`] was *called*, not the
//!   order the returned futures are first polled. Enqueueing happens before
//!   `submit` returns.
//! - At most one job runs at a time.
//! - A job returning `Err` or panicking leaves the chained value at what it
//!   was before the job started. The next job still runs.
//!
//! Jobs must not submit to, and then await, the guard they are running on.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A submitted job produced no result.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    /// The worker task is gone. Only happens during runtime shutdown.
    #[error("sequential guard closed before the job completed")]
    Closed,

    /// The job panicked. The worker keeps running with the previous value.
    #[error("guarded job panicked")]
    Panicked,
}

type Job<T> = Box<dyn FnOnce(T) -> BoxFuture<'static, T> + Send>;

/// Handle to a single-worker job queue. Cloning shares the same worker.
pub struct SequentialGuard<T> {
    jobs: mpsc::UnboundedSender<Job<T>>,
}

impl<T> Clone for SequentialGuard<T> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SequentialGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialGuard")
            .field("closed", &self.jobs.is_closed())
            .finish()
    }
}

impl<T: Clone + Send + 'static> SequentialGuard<T> {
    /// Start the worker with `initial` as the chained value.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(initial: T) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job<T>>();
        tokio::spawn(async move {
            let mut value = initial;
            while let Some(job) = queue.recv().await {
                value = job(value).await;
            }
        });
        Self { jobs }
    }

    /// Enqueue `f` and return a future resolving to its result.
    ///
    /// `f` receives the current chained value and returns the next one
    /// alongside its result. Dropping the returned future does not cancel
    /// the job.
    pub fn submit<F, Fut, R, E>(&self, f: F) -> impl Future<Output = Result<R, E>> + Send + 'static
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(T, R), E>> + Send + 'static,
        R: Send + 'static,
        E: From<GuardError> + Send + 'static,
    {
        let (done, result) = oneshot::channel::<Result<R, E>>();
        let job: Job<T> = Box::new(move |previous: T| {
            async move {
                let input = previous.clone();
                let outcome = AssertUnwindSafe(async move { f(input).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok((next, value))) => {
                        let _ = done.send(Ok(value));
                        next
                    }
                    Ok(Err(e)) => {
                        let _ = done.send(Err(e));
                        previous
                    }
                    Err(_) => {
                        tracing::error!("guarded job panicked, keeping previous value");
                        let _ = done.send(Err(E::from(GuardError::Panicked)));
                        previous
                    }
                }
            }
            .boxed()
        });
        let enqueued = self.jobs.send(job).map_err(|_| GuardError::Closed);

        async move {
            enqueued.map_err(E::from)?;
            result.await.map_err(|_| E::from(GuardError::Closed))?
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Guard(GuardError),
        Rejected,
    }

    impl From<GuardError> for TestError {
        fn from(e: GuardError) -> Self {
            Self::Guard(e)
        }
    }

    // ── Ordering ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_runs_in_submission_order_not_poll_order() {
        let guard = SequentialGuard::new(Vec::<u32>::new());
        // The first job sleeps longest; later jobs must still wait for it.
        let futures: Vec<_> = (0..5u32)
            .map(|i| {
                guard.submit(move |mut seen: Vec<u32>| async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(5 - i) * 5)).await;
                    seen.push(i);
                    Ok::<_, TestError>((seen.clone(), seen))
                })
            })
            .collect();
        // Poll in reverse.
        let mut results: Vec<Vec<u32>> = Vec::new();
        for fut in futures.into_iter().rev() {
            results.push(fut.await.unwrap());
        }
        // The last submitted job saw every earlier one.
        assert_eq!(results[0], vec![0, 1, 2, 3, 4]);
        assert_eq!(results[4], vec![0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let guard = SequentialGuard::new(());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                let fut = guard.submit(move |()| async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, TestError>(((), ()))
                });
                tokio::spawn(fut)
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    // ── Failure isolation ────────────────────────────────────────────

    #[tokio::test]
    async fn test_error_keeps_previous_value_and_chain_continues() {
        let guard = SequentialGuard::new(10u32);
        let failed = guard.submit(|v: u32| async move {
            let _ = v;
            Err::<(u32, ()), _>(TestError::Rejected)
        });
        let read = guard.submit(|v: u32| async move { Ok::<_, TestError>((v, v)) });
        assert_eq!(failed.await, Err(TestError::Rejected));
        assert_eq!(read.await, Ok(10));
    }

    #[tokio::test]
    async fn test_panic_keeps_previous_value() {
        let guard = SequentialGuard::new(3u32);
        let panicked = guard.submit(|_: u32| async move {
            if true {
                panic!("job failed hard");
            }
            Ok::<(u32, ()), TestError>((0, ()))
        });
        let read = guard.submit(|v: u32| async move { Ok::<_, TestError>((v, v)) });
        assert_eq!(panicked.await, Err(TestError::Guard(GuardError::Panicked)));
        assert_eq!(read.await, Ok(3));
    }

    #[test]
    fn test_submit_after_runtime_shutdown_reports_closed() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let guard = runtime.block_on(async { SequentialGuard::new(0u32) });
        drop(runtime);
        let read = guard.submit(|v: u32| async move { Ok::<_, TestError>((v, v)) });
        let outcome = futures::executor::block_on(read);
        assert_eq!(outcome, Err(TestError::Guard(GuardError::Closed)));
    }

    #[tokio::test]
    async fn test_chained_value_is_visible_to_next_job() {
        let guard = SequentialGuard::new(0u32);
        let log = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let log = Arc::clone(&log);
            guard
                .submit(move |v: u32| async move {
                    log.lock().push(v);
                    Ok::<_, TestError>((v + 1, ()))
                })
                .await
                .unwrap();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_dropped_future_still_runs() {
        let guard = SequentialGuard::new(0u32);
        drop(guard.submit(|v: u32| async move { Ok::<_, TestError>((v + 5, ())) }));
        let read = guard.submit(|v: u32| async move { Ok::<_, TestError>((v, v)) });
        assert_eq!(read.await, Ok(5));
    }
}
