use lazy_static::lazy_static;
use ordered_float::OrderedFloat;
use statrs::function::gamma::ln_gamma;

lazy_static! {
    /// Jacobian-logarithm correction table: for `a - b` up to `MAX_TOLERANCE`,
    /// stores `log(1 + exp(-(a - b)))` at `TABLE_STEP` resolution.
    static ref JACOBIAN_CACHE: Vec<f64> = (0..=((JacobianLogTable::MAX_TOLERANCE
        / JacobianLogTable::TABLE_STEP) as usize))
        .map(|k| (1.0 + (-(k as f64) * JacobianLogTable::TABLE_STEP).exp()).ln())
        .collect::<Vec<f64>>();
}

/// Namespace for the small set of numerically-stable log-space primitives the
/// sampler kernel leans on in its inner loop. Everything here operates in
/// natural-log space; the sampler never touches log10.
pub struct MathUtils {}

impl MathUtils {
    /// `log(exp(a) + exp(b))`, computed without overflowing when `a` or `b`
    /// is large, and without losing precision to cancellation when they are
    /// close. This is `logSum` from spec.md §2/§4.5/§4.6.
    pub fn log_sum(a: f64, b: f64) -> f64 {
        if a == f64::NEG_INFINITY {
            return b;
        }
        if b == f64::NEG_INFINITY {
            return a;
        }
        if a > b {
            a + (1.0 + (b - a).exp()).ln()
        } else {
            b + (1.0 + (a - b).exp()).ln()
        }
    }

    /// Approximate form of [`log_sum`] backed by [`JacobianLogTable`]. Used
    /// where the running reference is updated on every sweep and the table
    /// lookup is worth the approximation error (bounded to 1 part in 1e8 for
    /// the default tolerance).
    pub fn approximate_log_sum(a: f64, b: f64) -> f64 {
        if a == f64::NEG_INFINITY {
            return b;
        }
        if b == f64::NEG_INFINITY {
            return a;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let diff = hi - lo;
        hi + if diff < JacobianLogTable::MAX_TOLERANCE {
            JacobianLogTable::get(diff)
        } else {
            0.0
        }
    }

    /// `log(sum(exp(values)))`, stable against overflow/underflow.
    pub fn log_sum_exp(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NEG_INFINITY;
        }
        let max_value = Self::max_finite(values);
        if max_value == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        let sum: f64 = values
            .iter()
            .map(|v| {
                if *v == f64::NEG_INFINITY {
                    0.0
                } else {
                    (*v - max_value).exp()
                }
            })
            .sum();
        max_value + sum.ln()
    }

    fn max_finite(values: &[f64]) -> f64 {
        *values
            .iter()
            .max_by_key(|v| OrderedFloat(**v))
            .unwrap_or(&f64::NEG_INFINITY)
    }

    /// Natural-log gamma function, `ln(Γ(x))`.
    pub fn log_gamma(x: f64) -> f64 {
        ln_gamma(x)
    }

    /// Subtracts the maximum element from every entry so the largest value
    /// in log-space is zero, equivalent to dividing by the maximum in real
    /// space. Guards the categorical weight vector against overflow when the
    /// allele-frequency factor is raised to a large inverse temperature.
    pub fn scale_for_stability(values: &[f64]) -> Vec<f64> {
        let max_value = Self::max_finite(values);
        values.iter().map(|v| v - max_value).collect()
    }

    /// Normalizes a strictly-positive real-space weight vector to sum to 1.
    pub fn normalize_sum_to_one(mut values: Vec<f64>) -> Vec<f64> {
        let sum: f64 = values.iter().sum();
        assert!(sum > 0.0, "weight vector must sum to a positive number");
        values.iter_mut().for_each(|v| *v /= sum);
        values
    }

    pub fn well_formed(value: f64) -> bool {
        !value.is_nan() && !value.is_infinite()
    }
}

/// Running mean/variance accumulator (Welford's algorithm).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningAverage {
    mean: f64,
    s: f64,
    obs_count: usize,
}

impl RunningAverage {
    pub fn new() -> RunningAverage {
        RunningAverage {
            mean: 0.0,
            s: 0.0,
            obs_count: 0,
        }
    }

    pub fn add(&mut self, obs: f64) {
        self.obs_count += 1;
        let old_mean = self.mean;
        self.mean += (obs - self.mean) / self.obs_count as f64;
        self.s += (obs - old_mean) * (obs - self.mean);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.obs_count < 2 {
            0.0
        } else {
            self.s / (self.obs_count - 1) as f64
        }
    }

    pub fn obs_count(&self) -> usize {
        self.obs_count
    }
}

/// Second term of the Jacobian-log identity, cached for differences up to
/// `MAX_TOLERANCE`. See spec.md §9 — this is strictly a micro-optimization
/// over [`MathUtils::log_sum`]; callers must get identical results either
/// way up to the approximation tolerance.
struct JacobianLogTable {}

impl JacobianLogTable {
    pub const MAX_TOLERANCE: f64 = 8.0;
    pub const TABLE_STEP: f64 = 0.0001;
    pub const INV_STEP: f64 = 1.0 / JacobianLogTable::TABLE_STEP;

    pub fn get(difference: f64) -> f64 {
        let index = (difference * JacobianLogTable::INV_STEP).round() as usize;
        JACOBIAN_CACHE[index]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn log_sum_matches_direct_computation() {
        let a = -2.3_f64;
        let b = -5.1_f64;
        let expected = (a.exp() + b.exp()).ln();
        assert_relative_eq!(MathUtils::log_sum(a, b), expected, epsilon = 1e-12);
    }

    #[test]
    fn log_sum_handles_neg_infinity() {
        assert_eq!(MathUtils::log_sum(f64::NEG_INFINITY, -1.0), -1.0);
        assert_eq!(MathUtils::log_sum(-1.0, f64::NEG_INFINITY), -1.0);
    }

    #[test]
    fn log_sum_exp_matches_pairwise_log_sum() {
        let values = vec![-1.0, -2.0, -0.5, -10.0];
        let pairwise = values
            .iter()
            .fold(f64::NEG_INFINITY, |acc, v| MathUtils::log_sum(acc, *v));
        assert_relative_eq!(MathUtils::log_sum_exp(&values), pairwise, epsilon = 1e-12);
    }

    #[test]
    fn normalize_sum_to_one_sums_to_one() {
        let v = MathUtils::normalize_sum_to_one(vec![1.0, 2.0, 3.0]);
        let sum: f64 = v.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn running_average_matches_naive_mean_and_variance() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut ra = RunningAverage::new();
        data.iter().for_each(|x| ra.add(*x));
        let naive_mean: f64 = data.iter().sum::<f64>() / data.len() as f64;
        let naive_var: f64 = data.iter().map(|x| (x - naive_mean).powi(2)).sum::<f64>()
            / (data.len() - 1) as f64;
        assert_relative_eq!(ra.mean(), naive_mean, epsilon = 1e-9);
        assert_relative_eq!(ra.variance(), naive_var, epsilon = 1e-9);
    }
}
