//! The nonce search loop

use super::hash::{DoubleHash, HashPrimitive};
use super::interface::{MinerInterface, MiningResult};
use crate::prelude::*;
use crate::stratum::{BlockHeader, Job, JobError, Target};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a worker. `Found`, `Cancelled` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Searching,
    Found,
    Cancelled,
    Exhausted,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerState::Idle | WorkerState::Searching)
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The digest of this nonce meets the target
    Found(MiningResult),

    /// Stopped on request, or because nobody is listening for results
    Cancelled { hashes: u64 },

    /// Every nonce up to `u32::MAX` was tried without success
    Exhausted { hashes: u64 },
}

impl SearchOutcome {
    pub fn state(&self) -> WorkerState {
        match self {
            SearchOutcome::Found(_) => WorkerState::Found,
            SearchOutcome::Cancelled { .. } => WorkerState::Cancelled,
            SearchOutcome::Exhausted { .. } => WorkerState::Exhausted,
        }
    }
}

/// Hashes between hash rate reports, unless configured otherwise
pub const DEFAULT_RATE_INTERVAL: u64 = 100;

/// Searches the nonce space of a single job.
pub struct Worker<H> {
    job: Job,
    job_id: Arc<str>,
    header: BlockHeader,
    target: Target,
    hasher: DoubleHash<H>,
    start_nonce: u32,
    rate_interval: u64,
}

impl<H: HashPrimitive> Worker<H> {
    /// Prepare a search, rejecting jobs whose fields can't form a header.
    pub fn new(job: Job, target: Target, primitive: H) -> Result<Self, JobError> {
        let header = BlockHeader::build(&job, 0)?;

        Ok(Self {
            job_id: job.id().into(),
            job,
            header,
            target,
            hasher: DoubleHash(primitive),
            start_nonce: 0,
            rate_interval: DEFAULT_RATE_INTERVAL,
        })
    }

    /// Begin at `nonce` instead of zero. The search still ends at `u32::MAX`.
    pub fn starting_at(mut self, nonce: u32) -> Self {
        self.start_nonce = nonce;
        self
    }

    /// Report the hash rate every `interval` hashes.
    pub fn with_rate_interval(mut self, interval: u64) -> Self {
        self.rate_interval = interval.max(1);
        self
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Run the search to a terminal state, blocking the thread.
    pub fn start(mut self, interface: &MinerInterface) -> SearchOutcome {
        interface.set_state(WorkerState::Searching);
        debug!("Worker for job {} is searching", self.job.id());

        let outcome = self.search(interface);

        interface.set_state(outcome.state());
        debug!("Worker for job {} finished: {:?}", self.job.id(), outcome);
        outcome
    }

    fn search(&mut self, interface: &MinerInterface) -> SearchOutcome {
        if interface.report_start(&self.job_id).is_err() {
            return SearchOutcome::Cancelled { hashes: 0 };
        }

        let started = Instant::now();
        let mut nonce = self.start_nonce;
        let mut hashes = 0u64;

        loop {
            if interface.is_cancelled() {
                return SearchOutcome::Cancelled { hashes };
            }

            self.header.set_nonce(nonce);
            let digest = self.hasher.digest(self.header.as_bytes());
            hashes += 1;

            let result = MiningResult { nonce, digest };
            trace!("nonce {} -> {}", nonce, hex::encode(digest));

            if interface.report_result(&self.job_id, result).is_err() {
                warn!("Result sink disconnected, stopping job {}", self.job.id());
                return SearchOutcome::Cancelled { hashes };
            }

            if self.target.is_met_by(&digest) {
                info!(
                    "Valid hash found for job {}! Nonce: {}, Hash: {}",
                    self.job.id(),
                    nonce,
                    hex::encode(digest)
                );
                return SearchOutcome::Found(result);
            }

            if hashes % self.rate_interval == 0
                && interface
                    .report_speed(&self.job_id, hashes, started.elapsed())
                    .is_err()
            {
                return SearchOutcome::Cancelled { hashes };
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    warn!("Nonce space exhausted for job {}", self.job.id());
                    return SearchOutcome::Exhausted { hashes };
                }
            };
        }
    }
}
