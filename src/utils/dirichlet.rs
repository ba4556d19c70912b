use rand::Rng;
use rand_distr::{Distribution, Gamma};
use statrs::function::gamma::digamma;

use crate::utils::math_utils::MathUtils;

/// A Dirichlet distribution over a finite set of categories, parameterized by
/// its concentration vector `alpha`.
///
/// Used by the accumulator (spec.md §4.6) to draw posterior allele
/// frequencies and admixture proportions: `alleleFreqs[k][l][*]` has shape
/// `alleleCounts[k][l][j] + lambda` and `admixFreqs[i][*]` has shape
/// `admixCounts[i][k] + alpha`.
pub struct Dirichlet<'a> {
    alpha: &'a [f64],
}

impl<'a> Dirichlet<'a> {
    pub fn new(alpha: &'a [f64]) -> Dirichlet<'a> {
        Dirichlet { alpha }
    }

    /// Mean of the distribution, i.e. the normalized concentration vector.
    pub fn mean_weights(&self) -> Vec<f64> {
        let sum = self.alpha.iter().sum::<f64>();
        self.alpha.iter().map(|a| a / sum).collect()
    }

    /// `exp(E[log weight])` under the Dirichlet, i.e. the effective-weights
    /// trick standard in variational Bayes: these do not sum to 1.
    pub fn effective_weights(&self) -> Vec<f64> {
        let digamma_of_sum = digamma(self.alpha.iter().sum::<f64>());
        self.alpha
            .iter()
            .map(|a| (digamma(*a) - digamma_of_sum).exp())
            .collect()
    }

    /// Draws one sample from the distribution via the standard
    /// gamma-then-normalize construction: draw `x_k ~ Gamma(alpha_k, 1)`
    /// independently, then normalize `x` to sum to 1.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let draws: Vec<f64> = self
            .alpha
            .iter()
            .map(|a| {
                let shape = if *a > 0.0 { *a } else { 1e-300 };
                Gamma::new(shape, 1.0)
                    .expect("gamma shape must be positive")
                    .sample(rng)
            })
            .collect();
        MathUtils::normalize_sum_to_one(draws)
    }

    pub fn size(&self) -> usize {
        self.alpha.len()
    }
}
