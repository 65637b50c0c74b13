use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt::Debug;
use std::sync::OnceLock;
use tracing::warn;

/// Fan-out of independent, pure per-index work. Queries over a tube evaluate the same
/// function (of the query point and the immutable tube parameters) at every point, so
/// the caller only hands the executor an index range and a function of the index; how
/// the work is scheduled is left entirely to the implementor.
pub trait Executor
    where Self : Debug + Send + Sync
{

    /// Evaluates f at 0..n, returning the results in index order.
    fn map<T, F>(&self, n : usize, f : F) -> Vec<T>
    where
        T : Send,
        F : Fn(usize) -> T + Sync + Send;

}

fn query_pool() -> Option<&'static ThreadPool> {
    static POOL : OnceLock<Option<ThreadPool>> = OnceLock::new();
    POOL.get_or_init(|| {
        let threads = std::thread::available_parallelism().map_or(1, |n| n.get() );
        match ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "could not build query thread pool; using the global pool");
                None
            }
        }
    }).as_ref()
}

/// Fixed-size worker pool, sized to the available hardware concurrency and shared by
/// every tube in the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool;

impl Executor for WorkerPool {

    fn map<T, F>(&self, n : usize, f : F) -> Vec<T>
    where
        T : Send,
        F : Fn(usize) -> T + Sync + Send
    {
        match query_pool() {
            Some(pool) => pool.install(|| (0..n).into_par_iter().map(&f).collect() ),
            None => (0..n).into_par_iter().map(&f).collect()
        }
    }

}

/// Runs every evaluation inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Executor for Sequential {

    fn map<T, F>(&self, n : usize, f : F) -> Vec<T>
    where
        T : Send,
        F : Fn(usize) -> T + Sync + Send
    {
        (0..n).map(f).collect()
    }

}
