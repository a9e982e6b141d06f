// Worker pool
// Fork-join execution of per-example tasks with input-ordered results

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Thread count for a parallelism setting: -1 means all available cores
pub fn resolve_n_jobs(n_jobs: i32) -> usize {
    if n_jobs == -1 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        n_jobs.max(1) as usize
    }
}

/// Per-experiment pool running one stage's batch at a time
pub struct WorkerPool {
    pool: ThreadPool,
    n_jobs: i32,
}

impl WorkerPool {
    pub fn new(n_jobs: i32) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(resolve_n_jobs(n_jobs))
            .thread_name(|i| format!("brainfeatures-worker-{}", i))
            .build()?;

        Ok(WorkerPool { pool, n_jobs })
    }

    /// Configured parallelism setting
    pub fn n_jobs(&self) -> i32 {
        self.n_jobs
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task(index, item)` for every item and block until all finish
    /// Results are in input order regardless of completion order.
    pub fn map_ordered<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Send + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(index, item)| task(index, item))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_resolve_n_jobs() {
        assert_eq!(resolve_n_jobs(1), 1);
        assert_eq!(resolve_n_jobs(4), 4);
        assert!(resolve_n_jobs(-1) >= 1);
    }

    #[test]
    fn test_pool_thread_count() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.n_jobs(), 3);
    }

    #[test]
    fn test_output_order_matches_input_order() {
        let pool = WorkerPool::new(5).unwrap();
        let completion = Mutex::new(Vec::new());
        let delays_ms = [80u64, 60, 40, 0, 20];

        let results = pool.map_ordered(&delays_ms, |index, delay| {
            std::thread::sleep(Duration::from_millis(*delay));
            completion.lock().unwrap().push(index);
            index
        });

        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert_eq!(completion.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_single_job_pool() {
        let pool = WorkerPool::new(1).unwrap();
        let squares = pool.map_ordered(&[1, 2, 3], |_, x| x * x);
        assert_eq!(squares, vec![1, 4, 9]);
    }
}
