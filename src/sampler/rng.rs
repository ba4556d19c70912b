use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};

use crate::utils::errors::{ChainError, ChainResult};

/// The one logical RNG state a chain owns, per spec.md §5: all random draws
/// (categorical, normal, uniform, gamma) consume from this single stream in
/// the order the driver loop dictates, so that two chains built from an
/// identical seed, K, β and inputs produce bit-for-bit identical traces.
pub struct ChainRng {
    inner: StdRng,
}

impl ChainRng {
    pub fn new(seed: u64) -> ChainRng {
        ChainRng {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    pub fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        let dist = Normal::new(mean, sd).expect("standard deviation must be finite and >= 0");
        dist.sample(&mut self.inner)
    }

    /// Draws from `Gamma(shape, rate = 1)`.
    pub fn gamma(&mut self, shape: f64) -> f64 {
        let dist = Gamma::new(shape, 1.0).expect("gamma shape must be positive");
        dist.sample(&mut self.inner)
    }

    /// Draws an index uniformly from `0..n`, used only for the initial
    /// random assignment at chain reset (spec.md §4.1).
    pub fn uniform_index(&mut self, n: usize) -> usize {
        self.inner.gen_range(0..n)
    }

    /// Exposes the underlying `StdRng` for callers (e.g. [`crate::utils::dirichlet::Dirichlet`])
    /// that need a generic `Rng` rather than this type's curated draw methods. Still the same
    /// single logical stream: no separate generator is created.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.inner
    }

    /// Draws a category in `0..weights.len()` from an unnormalized,
    /// non-negative weight vector using the canonical cumulative-sum
    /// sampler `u * sum(weights)` from spec.md §4.2: draw `u ~ Uniform(0,1)`,
    /// scale by the total weight, then walk the cumulative sum until it
    /// exceeds the scaled draw.
    ///
    /// Returns `Err(ChainError::Numeric(..))` when the weights sum to
    /// (approximately) zero, rather than panicking — spec.md §7 treats this
    /// as an event that aborts the *chain*, not the process, so sibling
    /// chains run through `sampler::driver::run_many` must keep going.
    pub fn categorical(&mut self, weights: &[f64]) -> ChainResult<usize> {
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(ChainError::Numeric(
                "categorical draw requires a strictly positive weight sum".to_string(),
            ));
        }
        let target = self.uniform() * total;
        let mut cumulative = 0.0;
        for (k, w) in weights.iter().enumerate() {
            cumulative += w;
            if cumulative > target {
                return Ok(k);
            }
        }
        // Floating point rounding can leave `cumulative` a hair below
        // `target`; fall back to the last category rather than panic.
        Ok(weights.len() - 1)
    }
}
