use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPool, ThreadPoolBuilder,
};
use tracing::info;

use crate::{
    error::SliceError,
    job::{SliceJob, SliceOutput},
};

/// Fixed size worker pool running independent slice jobs. The stages of a
/// job parallelize on the same workers.
pub struct JobPool {
    pool: ThreadPool,
}

impl JobPool {
    /// Creates a pool with the given number of workers, zero picks one per
    /// core.
    pub fn new(threads: usize) -> Result<Self, SliceError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("slice-worker-{i}"))
            .build()
            .map_err(|err| SliceError::Pool(err.to_string()))?;

        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs the jobs concurrently. Results are in the order of the jobs.
    pub fn run(&self, jobs: &[SliceJob]) -> Vec<Result<SliceOutput, SliceError>> {
        info!(jobs = jobs.len(), threads = self.threads(), "Running slice jobs");
        self.pool.install(|| jobs.par_iter().map(SliceJob::run).collect())
    }
}
