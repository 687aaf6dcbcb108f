mod abort;
mod executor;
#[cfg(test)]
pub mod fake;
mod job;

pub use abort::{AbortHandle, AbortSignal, abort_signal};
pub use executor::{ExecutorError, run};
pub use job::{JobSettings, JobTask, run_job};
