use crate::utils::errors::{ChainError, ChainResult};

/// Per-chain output toggles, mirrored from spec.md §6 ("External Interfaces
/// — Input — inference configuration"). These gate whether the driver
/// writes to the injected output streams and whether it accumulates the
/// corresponding summaries at all; they never change the sampler's
/// numerics.
#[derive(Debug, Clone, Copy)]
pub struct OutputToggles {
    pub q_matrix_gene: bool,
    pub q_matrix_ind: bool,
    pub q_matrix_pop: bool,
    pub likelihood: bool,
    pub posterior_grouping: bool,
    pub log: bool,
}

impl Default for OutputToggles {
    fn default() -> Self {
        OutputToggles {
            q_matrix_gene: true,
            q_matrix_ind: true,
            q_matrix_pop: true,
            likelihood: true,
            posterior_grouping: false,
            log: false,
        }
    }
}

/// The full set of knobs a single chain is constructed from. One instance
/// exists per (K, β, replicate) per spec.md §2/§5; nothing here is mutated
/// after `validate()` succeeds except `alpha` itself, which the sampler
/// mutates in place when `fix_alpha` is false (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub k: usize,
    pub lambda: f64,
    pub alpha: f64,
    pub alpha_prop_sd: f64,
    pub fix_alpha: bool,
    pub beta: f64,
    pub burnin: usize,
    pub samples: usize,
    pub thinning: usize,
    pub fix_labels: bool,
    pub draw_freqs: bool,
    pub seed: u64,
    pub use_log_table: bool,
    pub output: OutputToggles,
}

impl ChainConfig {
    pub const ALPHA_MAX: f64 = 10.0;
    pub const ALPHA_FLOOR: f64 = 1e-300;

    /// Configuration-error checks from spec.md §7, run once before the
    /// chain's statistics are allocated.
    pub fn validate(&self) -> ChainResult<()> {
        if self.k == 0 {
            return Err(ChainError::Configuration(
                "K must be at least 1".to_string(),
            ));
        }
        if !(self.lambda > 0.0) {
            return Err(ChainError::Configuration(
                "lambda must be strictly positive".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha <= Self::ALPHA_MAX) {
            return Err(ChainError::Configuration(format!(
                "alpha must lie in (0, {}], got {}",
                Self::ALPHA_MAX,
                self.alpha
            )));
        }
        if !self.fix_alpha && !(self.alpha_prop_sd > 0.0) {
            return Err(ChainError::Configuration(
                "alpha_prop_sd must be strictly positive when alpha is mutable".to_string(),
            ));
        }
        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(ChainError::Configuration(
                "beta must lie in (0, 1]".to_string(),
            ));
        }
        if self.thinning == 0 {
            return Err(ChainError::Configuration(
                "thinning must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
