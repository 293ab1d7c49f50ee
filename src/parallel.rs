//! Parallel/sequential execution helpers
//!
//! Estimators that can work in parallel (forest tree growth, per-feature bin
//! fitting) go through these helpers. The `cfg(feature = "rayon")` logic lives
//! here in one place so call sites stay clean.
//!
//! Output order always matches input order, so results never depend on the
//! number of worker threads.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::Result;

/// Worker-thread request for an estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workers {
    /// Use every available core (the global rayon pool)
    #[default]
    All,
    /// Run on the calling thread only
    Sequential,
    /// Use a dedicated pool with this many threads
    Fixed(usize),
}

/// Map `f` over `0..n`, potentially in parallel.
///
/// # Errors
/// Returns error if a dedicated thread pool cannot be created
pub fn map_range<F, R>(n: usize, f: F, workers: Workers) -> Result<Vec<R>>
where
    F: Fn(usize) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "rayon")]
    {
        match workers {
            Workers::Sequential => Ok((0..n).map(f).collect()),
            Workers::All => Ok((0..n).into_par_iter().map(f).collect()),
            Workers::Fixed(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| crate::Error::InvalidInput(format!("thread pool: {e}")))?;
                Ok(pool.install(|| (0..n).into_par_iter().map(f).collect()))
            }
        }
    }

    #[cfg(not(feature = "rayon"))]
    {
        let _ = workers;
        Ok((0..n).map(f).collect())
    }
}

/// Map `f` over a slice, potentially on the global pool.
#[inline]
pub fn map_slice<T, F, R>(slice: &[T], f: F) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "rayon")]
    {
        slice.par_iter().map(f).collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        slice.iter().map(f).collect()
    }
}
