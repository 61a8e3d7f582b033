//! Asynchronous job engine: FIFO backlog, bounded worker pool, and webhook
//! dispatch on terminal transitions.

mod queue;
mod webhook;

pub use queue::{JobQueue, JobQueueConfig, SubmitReceipt};
pub use webhook::{WebhookConfig, WebhookDispatcher};
