//! Parallelism switch shared by the bulk extraction paths.

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// When `Parallel`, bulk operations use `rayon` parallel iterators on the
/// current pool; when `Sequential`, they iterate on the calling thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Call `f(chunk_index, chunk)` for every `chunk_len`-sized chunk of `data`.
    ///
    /// `chunk_len` must be non-zero.
    #[inline]
    pub fn maybe_par_chunks_mut<T, F>(self, data: &mut [T], chunk_len: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if self.is_parallel() {
            data.par_chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        } else {
            data.chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        }
    }

    /// Fill `data[i] = f(&mut state, i)` with per-worker scratch state.
    ///
    /// `init` runs once per rayon work split in parallel mode and once in
    /// sequential mode.
    #[inline]
    pub fn maybe_par_fill_init<T, S, INIT, F>(self, data: &mut [T], init: INIT, f: F)
    where
        T: Send,
        INIT: Fn() -> S + Sync + Send,
        F: Fn(&mut S, usize) -> T + Sync + Send,
    {
        if self.is_parallel() {
            data.par_iter_mut()
                .enumerate()
                .for_each_init(&init, |state, (i, slot)| *slot = f(state, i));
        } else {
            let mut state = init();
            for (i, slot) in data.iter_mut().enumerate() {
                *slot = f(&mut state, i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallelism_from_threads() {
        assert!(!Parallelism::from_threads(1).is_parallel());
        assert!(Parallelism::from_threads(2).is_parallel());
        assert!(Parallelism::from_threads(8).is_parallel());
    }

    #[test]
    fn test_chunks_cover_input() {
        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let mut data = vec![0usize; 12];
            parallelism.maybe_par_chunks_mut(&mut data, 4, |i, chunk| chunk.fill(i + 1));
            assert_eq!(data, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
        }
    }

    #[test]
    fn test_fill_with_scratch() {
        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let mut data = vec![0usize; 100];
            parallelism.maybe_par_fill_init(&mut data, Vec::<usize>::new, |scratch, i| {
                scratch.push(i);
                i * 2
            });
            assert!(data.iter().enumerate().all(|(i, &v)| v == i * 2));
        }
    }
}
