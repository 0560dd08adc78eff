//! Stratum work templates and the data derived from them

pub mod codec;
pub mod header;
pub mod job;
pub mod target;

pub use header::BlockHeader;
pub use job::{Job, JobError};
pub use target::Target;
