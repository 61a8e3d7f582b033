pub mod job;

pub use job::{Job, JobResult, JobStatus, JobTimings};
