//! This module provides the bounded worker pool driving batch downloads.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{self, Future, FutureExt};
use tokio::sync::{mpsc, Mutex};

type Job = future::BoxFuture<'static, ()>;

/// A fixed-size pool of asynchronous workers draining a shared job queue.
///
/// Every worker pulls the next pending job from the queue as soon as it is done with the previous one, so that at most `size`
/// jobs are running at any time, whatever the number of queued jobs.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use imgbatch::task::Pool;
/// let mut pool = Pool::default();
/// pool.start(3.try_into().unwrap());
///
/// for i in 0..=5 {
///     pool.submit(async move { println!("Hello from job #{i}!") });
/// }
///
/// pool.close().await;
/// # })
/// ```
#[derive(Debug, Default)]
pub struct Pool {
    /// The pool of workers.
    workers: Vec<Worker>,
    /// The sending part of the job queue.
    ///
    /// The next idle worker waits for a job to be received through the channel.
    sender: Option<mpsc::UnboundedSender<Job>>,
}

impl Pool {
    /// Start a pool with `size` workers.
    ///
    /// # Panics
    /// This method panics if the pool is already running, ie. when called more than once without stopping the pool in between.
    pub fn start(&mut self, size: NonZeroUsize) {
        assert!(self.sender.is_none() && self.workers.is_empty());

        let (sender, receiver) = mpsc::unbounded_channel();

        let receiver = Arc::new(Mutex::new(receiver));

        static WORKER_ID: AtomicUsize = AtomicUsize::new(0);
        let size = size.get();
        let id = WORKER_ID.fetch_add(size, Ordering::Relaxed);

        self.workers = (0..size).map(|i| Worker::new(id.wrapping_add(i), Arc::clone(&receiver))).collect();
        self.sender = Some(sender);
    }

    /// Number of running workers.
    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job.
    ///
    /// Returns `false` when the pool is not running, in which case the job is dropped without being polled.
    pub fn submit(&self, future: impl Future<Output = ()> + Send + 'static) -> bool {
        match self.sender {
            Some(ref sender) => sender.send(future.boxed()).is_ok(),
            None => false,
        }
    }

    /// Stop the pool, waiting for every queued job to complete.
    ///
    /// Once stopped, the pool can be started again with any number of workers.
    pub async fn stop(&mut self) {
        drop(self.sender.take());
        let workers = std::mem::take(&mut self.workers);

        let results = future::join_all(workers.into_iter().inspect(|worker| {
            tracing::debug!("Stopping worker {}...", worker.id);
        }))
        .await;

        for err in results.into_iter().filter_map(Result::err) {
            tracing::error!("Worker stopped abnormally: {err}");
        }
    }

    /// Close the pool, waiting for every queued job to complete.
    pub async fn close(mut self) {
        self.stop().await
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>) -> Worker {
        tracing::debug!("Starting worker {id}...");

        Worker {
            id,
            handle: tokio::spawn(async move {
                loop {
                    // the lock is released as soon as a job is received, before polling it
                    let job = receiver.lock().await.recv().await;

                    match job {
                        Some(job) => job.await,
                        None => {
                            tracing::debug!("Job queue drained, shutting down worker {id}.");
                            break;
                        }
                    }
                }
            }),
        }
    }
}

impl Future for Worker {
    type Output = Result<(), tokio::task::JoinError>;

    #[inline]
    fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        self.handle.poll_unpin(cx)
    }
}
