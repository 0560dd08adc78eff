use super::hash::Digest;
use super::worker::WorkerState;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The sink has gone away, so there is no point in mining further
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopMining;

/// One hashed nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningResult {
    pub nonce: u32,
    pub digest: Digest,
}

/// Telemetry flowing from a worker to the result sink.
///
/// Every report names its job, since the `Started` marker is dropped like any
/// other report when the channel is full.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// A worker began searching a job
    Started { job_id: Arc<str> },

    /// A nonce was hashed
    Candidate {
        job_id: Arc<str>,
        result: MiningResult,
    },

    /// Periodic hash rate sample, averaged since the worker started
    HashRate {
        job_id: Arc<str>,
        hashes: u64,
        per_second: f64,
    },
}

impl Report {
    pub fn job_id(&self) -> &Arc<str> {
        match self {
            Report::Started { job_id }
            | Report::Candidate { job_id, .. }
            | Report::HashRate { job_id, .. } => job_id,
        }
    }
}

/// Sending half of the report channel.
///
/// Sends never block: when the channel is full the report is discarded and
/// counted, so a slow sink can't stall hashing.
#[derive(Debug, Clone)]
pub struct ReportSender {
    tx: Sender<Report>,
    dropped: Arc<AtomicU64>,
}

impl ReportSender {
    pub(super) fn new(tx: Sender<Report>, dropped: Arc<AtomicU64>) -> Self {
        Self { tx, dropped }
    }

    pub fn emit(&self, report: Report) -> Result<(), StopMining> {
        match self.tx.try_send(report) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(StopMining),
        }
    }

    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }
}

/// The parts of a worker shared with whoever supervises it
#[derive(Debug, Clone)]
pub struct WorkerControl {
    cancelled: Arc<AtomicBool>,
    state: Arc<AtomicCell<WorkerState>>,
}

impl WorkerControl {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicCell::new(WorkerState::Idle)),
        }
    }

    /// Ask the worker to stop at its next loop boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        self.state.load()
    }
}

/// Everything a worker needs to talk to the rest of the miner
pub struct MinerInterface {
    reports: ReportSender,
    control: WorkerControl,
}

impl MinerInterface {
    pub fn new(reports: ReportSender) -> Self {
        Self {
            reports,
            control: WorkerControl::new(),
        }
    }

    pub fn control(&self) -> WorkerControl {
        self.control.clone()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    pub fn set_state(&self, state: WorkerState) {
        self.control.state.store(state);
    }

    pub fn report_start(&self, job_id: &Arc<str>) -> Result<(), StopMining> {
        self.reports.emit(Report::Started {
            job_id: job_id.clone(),
        })
    }

    /// Report a hashed nonce
    #[inline]
    pub fn report_result(&self, job_id: &Arc<str>, result: MiningResult) -> Result<(), StopMining> {
        self.reports.emit(Report::Candidate {
            job_id: job_id.clone(),
            result,
        })
    }

    pub fn report_speed(
        &self,
        job_id: &Arc<str>,
        hashes: u64,
        elapsed: Duration,
    ) -> Result<(), StopMining> {
        let secs = elapsed.as_secs_f64();
        let per_second = if secs > 0. { hashes as f64 / secs } else { 0. };

        self.reports.emit(Report::HashRate {
            job_id: job_id.clone(),
            hashes,
            per_second,
        })
    }
}
