//! Job intake and worker lifecycle

use super::hash::HashPrimitive;
use super::interface::{MinerInterface, ReportSender, WorkerControl};
use super::thread_priority;
use super::worker::{SearchOutcome, Worker, WorkerState};
use super::{MinerConfig, MinerError};
use crate::prelude::*;
use crate::stratum::Job;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The terminal outcome of one job's search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    pub outcome: SearchOutcome,
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.outcome {
            SearchOutcome::Found(result) => write!(
                f,
                "Job {}: valid hash found! Nonce: {}, Hash: {}",
                self.job_id,
                result.nonce,
                hex::encode(result.digest)
            ),
            SearchOutcome::Cancelled { hashes } => {
                write!(f, "Job {}: stopped after {} hashes", self.job_id, hashes)
            }
            SearchOutcome::Exhausted { hashes } => write!(
                f,
                "Job {}: nonce space exhausted after {} hashes, waiting for new work",
                self.job_id, hashes
            ),
        }
    }
}

/// A running search, owned by the dispatcher
pub struct WorkerHandle {
    job_id: String,
    control: WorkerControl,
    thread: JoinHandle<SearchOutcome>,
}

impl WorkerHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Wait for the worker thread to reach a terminal state.
    pub fn join(self) -> JobOutcome {
        let WorkerHandle { job_id, thread, .. } = self;

        let outcome = thread.join().unwrap_or_else(|_| {
            error!("Worker for job {} panicked", job_id);
            SearchOutcome::Cancelled { hashes: 0 }
        });

        JobOutcome { job_id, outcome }
    }
}

/// Runs at most one worker at a time, replacing it whenever new work arrives.
pub struct JobDispatcher<H> {
    config: MinerConfig,
    primitive: H,
    reports: ReportSender,
    current: Option<WorkerHandle>,
    /// Outcome of a replaced worker whose successor failed to start
    unreported: Option<JobOutcome>,
    running: Arc<AtomicUsize>,
}

impl<H> JobDispatcher<H>
where
    H: HashPrimitive + Clone + Send + 'static,
{
    pub fn new(config: MinerConfig, primitive: H, reports: ReportSender) -> Self {
        Self {
            config,
            primitive,
            reports,
            current: None,
            unreported: None,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start searching `job`, first cancelling and joining any current worker.
    ///
    /// Invalid jobs are rejected before the current worker is touched. Returns
    /// the outcome of the worker that was replaced, if there was one.
    pub fn submit(&mut self, job: Job) -> Result<Option<JobOutcome>, MinerError> {
        let target = self.config.target_for(&job)?;
        let worker = Worker::new(job, target, self.primitive.clone())?
            .starting_at(self.config.start_nonce)
            .with_rate_interval(self.config.rate_interval);

        let replaced = self.stop_current();
        let spawned = self.spawn(worker);
        self.install(replaced, spawned)
    }

    /// Make a freshly spawned worker current. If spawning failed, the replaced
    /// worker's outcome is held for the next [`reap`](Self::reap).
    fn install(
        &mut self,
        replaced: Option<JobOutcome>,
        spawned: Result<WorkerHandle, MinerError>,
    ) -> Result<Option<JobOutcome>, MinerError> {
        match spawned {
            Ok(handle) => {
                self.current = Some(handle);
                Ok(replaced)
            }
            Err(e) => {
                self.unreported = replaced;
                Err(e)
            }
        }
    }

    /// Collect the current worker if it finished on its own.
    pub fn reap(&mut self) -> Option<JobOutcome> {
        if let Some(outcome) = self.unreported.take() {
            return Some(outcome);
        }

        match &self.current {
            Some(handle) if handle.is_finished() => self.current.take().map(WorkerHandle::join),
            _ => None,
        }
    }

    /// Cancel and join the current worker, if any.
    pub fn shutdown(&mut self) -> Option<JobOutcome> {
        self.stop_current().or_else(|| self.unreported.take())
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&WorkerHandle> {
        self.current.as_ref()
    }

    /// Number of worker threads currently inside their search loop
    #[cfg(test)]
    pub fn running_workers(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    fn stop_current(&mut self) -> Option<JobOutcome> {
        let handle = self.current.take()?;

        if !handle.state().is_terminal() {
            debug!("Cancelling worker for job {}", handle.job_id());
            handle.cancel();
        }

        Some(handle.join())
    }

    fn spawn(&self, worker: Worker<H>) -> Result<WorkerHandle, MinerError> {
        let interface = MinerInterface::new(self.reports.clone());
        let control = interface.control();
        let job_id = worker.job().id().to_string();
        let running = self.running.clone();
        let lower_priority = !self.config.keep_thread_priority;

        let thread = thread::Builder::new()
            .name("miner worker".to_string())
            .spawn(move || {
                running.fetch_add(1, Ordering::SeqCst);
                if lower_priority {
                    thread_priority::set_low_priority();
                }

                let outcome = worker.start(&interface);
                running.fetch_sub(1, Ordering::SeqCst);
                outcome
            })
            .map_err(MinerError::Spawn)?;

        Ok(WorkerHandle {
            job_id,
            control,
            thread,
        })
    }
}

impl<H> Drop for JobDispatcher<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
            handle.join();
        }
    }
}

/// Submits jobs to a dispatcher running on its own thread.
///
/// Holds at most one job that hasn't been applied yet; a newer submission
/// replaces it. Dropping the queue stops the dispatcher and its worker.
pub struct JobQueue {
    slot: Arc<AtomicCell<Option<Job>>>,
    wake: Sender<()>,
}

/// The dispatcher's end of a [`JobQueue`]
struct PendingJob {
    slot: Arc<AtomicCell<Option<Job>>>,
    wake: Receiver<()>,
}

fn job_queue() -> (JobQueue, PendingJob) {
    let slot = Arc::new(AtomicCell::new(None));
    let (tx, rx) = bounded(1);

    (
        JobQueue {
            slot: slot.clone(),
            wake: tx,
        },
        PendingJob { slot, wake: rx },
    )
}

impl JobQueue {
    /// How often the dispatcher checks whether its worker finished on its own
    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Move `dispatcher` onto a new thread. Terminal outcomes of its workers
    /// are sent to the returned receiver.
    pub fn spawn<H>(
        mut dispatcher: JobDispatcher<H>,
    ) -> Result<(JobQueue, Receiver<JobOutcome>, JoinHandle<()>), MinerError>
    where
        H: HashPrimitive + Clone + Send + 'static,
    {
        let (queue, pending) = job_queue();
        let (outcome_tx, outcome_rx) = unbounded();

        let thread = thread::Builder::new()
            .name("job dispatcher".to_string())
            .spawn(move || {
                let report = |outcome: JobOutcome| {
                    match outcome.outcome {
                        SearchOutcome::Found(_) => info!("{}", outcome),
                        SearchOutcome::Exhausted { .. } => warn!("{}", outcome),
                        SearchOutcome::Cancelled { .. } => debug!("{}", outcome),
                    }
                    // nobody listening is fine
                    let _ = outcome_tx.send(outcome);
                };

                loop {
                    match pending.wait(Self::POLL_INTERVAL) {
                        Ok(Some(job)) => {
                            let id = job.id().to_string();
                            match dispatcher.submit(job) {
                                Ok(replaced) => {
                                    if let Some(outcome) = replaced {
                                        report(outcome);
                                    }
                                    info!("Mining job {}", id);
                                }
                                Err(e) => warn!("Rejected job {}: {}", id, e),
                            }
                        }
                        Ok(None) => {}
                        Err(_) => break,
                    }

                    if let Some(outcome) = dispatcher.reap() {
                        report(outcome);
                    }
                }

                if let Some(outcome) = dispatcher.shutdown() {
                    report(outcome);
                }
                debug!("Job dispatcher stopped");
            })
            .map_err(MinerError::Spawn)?;

        Ok((queue, outcome_rx, thread))
    }

    /// Hand a job to the dispatcher, replacing any job it hasn't applied yet.
    pub fn submit(&self, job: Job) -> Result<(), MinerError> {
        if let Some(skipped) = self.slot.swap(Some(job)) {
            debug!("Job {} superseded before it was applied", skipped.id());
        }

        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(MinerError::DispatcherGone),
        }
    }
}

impl PendingJob {
    /// Wait up to `timeout` for a submission, taking the latest pending job.
    fn wait(&self, timeout: Duration) -> Result<Option<Job>, RecvTimeoutError> {
        match self.wake.recv_timeout(timeout) {
            Ok(()) => Ok(self.slot.take()),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
