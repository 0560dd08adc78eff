pub mod dispatcher;
pub mod hash;
pub mod interface;
pub mod sink;
pub mod thread_priority;
pub mod worker;

use crate::stratum::{Job, JobError, Target};
use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
pub struct MinerConfig {
    /// Fixed difficulty target, as 64 hex digits. A digest meets it when it is
    /// numerically less than or equal to it.
    #[structopt(long, conflicts_with = "target-from-bits")]
    pub target: Option<Target>,

    /// Derive each job's target from its compact `bits` field.
    #[structopt(long)]
    pub target_from_bits: bool,

    /// Maximum number of undelivered reports. Reports beyond this are dropped.
    #[structopt(long, default_value = "10")]
    pub channel_capacity: usize,

    /// Nonce to start each search at. Searches end at the largest nonce.
    #[structopt(long, default_value = "0")]
    pub start_nonce: u32,

    /// Number of hashes between hash rate reports.
    #[structopt(long, default_value = "100")]
    pub rate_interval: u64,

    /// Don't lower the priority of mining threads.
    #[structopt(long)]
    pub keep_thread_priority: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            target: None,
            target_from_bits: false,
            channel_capacity: 10,
            start_nonce: 0,
            rate_interval: worker::DEFAULT_RATE_INTERVAL,
            keep_thread_priority: false,
        }
    }
}

impl MinerConfig {
    /// The target a worker on `job` should search for.
    pub fn target_for(&self, job: &Job) -> Result<Target, JobError> {
        if self.target_from_bits {
            Target::from_job_bits(job)
        } else {
            Ok(self.target.unwrap_or_default())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    #[error("invalid job: {0}")]
    Job(#[from] JobError),

    #[error("couldn't spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("the job dispatcher has stopped")]
    DispatcherGone,
}
