//! Weighted exemplar sampling.
//!
//! Without a weight feature every exemplar is equally likely and a draw is a
//! uniform variate scaled to the exemplar count. With a weight feature the
//! sampler keeps a cumulative-weight table, built once on the first weighted
//! draw and reused until it is explicitly invalidated, and inverts it with an
//! interpolation-guided binary search.
//!
//! # Search
//!
//! [`biased_search`] returns the smallest `i` with `cum[i] >= pos`. Instead of
//! halving the interval it probes where `pos` would fall if the weights inside
//! the interval were equal, which needs far fewer probes when weights are
//! similar in magnitude.

use tracing::trace;

use crate::rng::Philox4x32;

// =============================================================================
// CumulativeWeights
// =============================================================================

/// Running sums of per-exemplar weights.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeWeights {
    cum: Vec<f32>,
}

impl CumulativeWeights {
    /// Accumulate `weights` in order.
    ///
    /// Negative and NaN weights count as zero so the table stays
    /// non-decreasing. Sums are carried in `f64`.
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut sum = 0.0f64;
        let cum = weights
            .into_iter()
            .map(|w| {
                sum += f64::from(w.max(0.0));
                sum as f32
            })
            .collect();
        Self { cum }
    }

    /// Wrap a precomputed non-decreasing table.
    pub fn from_cumulative(cum: Vec<f32>) -> Self {
        debug_assert!(
            cum.windows(2).all(|w| w[0] <= w[1]),
            "cumulative weights must be non-decreasing"
        );
        Self { cum }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.cum
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cum.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cum.is_empty()
    }

    /// Sum of all weights.
    #[inline]
    pub fn total(&self) -> f32 {
        self.cum.last().copied().unwrap_or(0.0)
    }

    /// Index selected by the uniform variate `u` in `[0, 1)`.
    ///
    /// Returns `None` for an empty table.
    #[inline]
    pub fn sample(&self, u: f64) -> Option<usize> {
        if self.cum.is_empty() {
            return None;
        }
        let pos = (u * f64::from(self.total())) as f32;
        Some(biased_search(&self.cum, pos))
    }
}

/// Smallest index `i` with `cum[i] >= pos`, found by interpolation search.
///
/// When no entry reaches `pos` the last index is returned. A table whose
/// interval has no spread resolves to its low end.
///
/// # Panics
///
/// Panics if `cum` is empty.
pub fn biased_search(cum: &[f32], pos: f32) -> usize {
    assert!(!cum.is_empty(), "cannot search an empty table");
    let mut low = 0;
    let mut high = cum.len() - 1;

    if cum[high] < pos {
        return high;
    }

    // Invariant past the early exit: cum[low] < pos <= cum[high].
    while low < high {
        let wc_low = cum[low];
        if wc_low >= pos {
            return low;
        }
        if high - low == 1 {
            return high;
        }

        let wc_high = cum[high];
        let t = (pos - wc_low) / (wc_high - wc_low);
        let guess = low + ((high - low) as f32 * t) as usize;
        let split = guess.clamp(low + 1, high - 1);

        if cum[split] >= pos {
            high = split;
        } else {
            low = split;
        }
    }
    low
}

// =============================================================================
// WeightedSampler
// =============================================================================

/// Draws exemplar indices from counter-based random variates.
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    rng: Philox4x32,
    cache: Option<CumulativeWeights>,
}

impl WeightedSampler {
    pub fn new(rng: Philox4x32) -> Self {
        Self { rng, cache: None }
    }

    #[inline]
    pub fn rng(&self) -> &Philox4x32 {
        &self.rng
    }

    /// The cached table, if built.
    #[inline]
    pub fn cumulative(&self) -> Option<&CumulativeWeights> {
        self.cache.as_ref()
    }

    /// Drop the cached table.
    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            trace!("cumulative weight cache invalidated");
        }
    }

    /// The cached table, building it with `build` if absent.
    pub fn cumulative_or_build<F>(&mut self, build: F) -> &CumulativeWeights
    where
        F: FnOnce() -> CumulativeWeights,
    {
        self.cache.get_or_insert_with(|| {
            let table = build();
            trace!(exemplars = table.len(), total = table.total(), "cumulative weight cache built");
            table
        })
    }

    /// Uniform draw over `exemplars` indices.
    ///
    /// The variate carries 53 bits, so every index stays reachable well past
    /// `2^24` exemplars.
    pub fn draw_uniform(&self, key: [u32; 4], exemplars: usize) -> Option<usize> {
        if exemplars == 0 {
            return None;
        }
        let u = self.rng.uniform_f64(key);
        let index = (u * exemplars as f64) as usize;
        Some(index.min(exemplars - 1))
    }

    /// Weighted draw using the cached table.
    pub fn draw_weighted<F>(&mut self, key: [u32; 4], build: F) -> Option<usize>
    where
        F: FnOnce() -> CumulativeWeights,
    {
        let u = self.rng.uniform_f64(key);
        self.cumulative_or_build(build).sample(u)
    }
}
