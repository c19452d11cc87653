//! Abstraction layer for parallel iteration.
//!
//! With the `parallel` feature enabled this module re-exports Rayon's primitives and runs
//! work inside a dedicated, size-limited thread pool. Without it, serial shims mimic the
//! subset of the parallel API used by the matching pipeline so internal code is written once.

use crate::error::{Error, Result};

/// Stack size for pool workers; the subgraph traversal recurses once per matched layer.
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[cfg(feature = "parallel")]
pub use rayon::prelude::{
    IndexedParallelIterator, IntoParallelIterator, IntoParallelRefMutIterator, ParallelIterator,
};

#[cfg(not(feature = "parallel"))]
pub use self::fallback::*;

/// Runs `op` inside a pool of at most `threads` workers.
///
/// # Errors
///
/// Returns [`Error::ThreadPool`] when the operating system refuses to spawn the workers.
#[cfg(feature = "parallel")]
pub fn install<R, OP>(threads: usize, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .stack_size(WORKER_STACK_SIZE)
        .thread_name(|index| format!("bio-match-{index}"))
        .build()
        .map_err(|err| Error::thread_pool(err.to_string()))?;
    Ok(pool.install(op))
}

/// Serial counterpart of the pooled runner; the thread limit is ignored.
#[cfg(not(feature = "parallel"))]
pub fn install<R, OP>(_threads: usize, op: OP) -> Result<R>
where
    OP: FnOnce() -> R,
{
    Ok::<R, Error>(op())
}

#[cfg(not(feature = "parallel"))]
mod fallback {
    pub use std::iter::Iterator as ParallelIterator;
    pub use std::iter::Iterator as IndexedParallelIterator;

    /// Shim trait to allow `into_par_iter()` on types that implement `IntoIterator`.
    pub trait IntoParallelIterator {
        type Item;
        type Iter: Iterator<Item = Self::Item>;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Item = I::Item;
        type Iter = I::IntoIter;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }

    /// Shim trait to allow `par_iter_mut()` on types that implement `IntoIterator` for `&mut T`.
    pub trait IntoParallelRefMutIterator<'data> {
        type Item;
        type Iter: Iterator<Item = Self::Item>;
        fn par_iter_mut(&'data mut self) -> Self::Iter;
    }

    impl<'data, I: 'data + ?Sized> IntoParallelRefMutIterator<'data> for I
    where
        &'data mut I: IntoIterator,
    {
        type Item = <&'data mut I as IntoIterator>::Item;
        type Iter = <&'data mut I as IntoIterator>::IntoIter;
        fn par_iter_mut(&'data mut self) -> Self::Iter {
            self.into_iter()
        }
    }

    /// Shim for Rayon's `map_init`: a single worker state shared by the whole serial run.
    pub trait MapInit: Iterator + Sized {
        fn map_init<S, R, INIT, F>(self, init: INIT, map_op: F) -> impl Iterator<Item = R>
        where
            INIT: Fn() -> S,
            F: Fn(&mut S, Self::Item) -> R,
        {
            let mut state = init();
            self.map(move |item| map_op(&mut state, item))
        }
    }

    impl<I: Iterator> MapInit for I {}
}
