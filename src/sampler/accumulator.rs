use crate::data::GenotypeData;
use crate::sampler::qbuffers::QBuffers;
use crate::sampler::rng::ChainRng;
use crate::sampler::stats::SufficientStats;
use crate::utils::dirichlet::Dirichlet;
use crate::utils::math_utils::{MathUtils, RunningAverage};

/// Dirichlet-multinomial collapsed marginal log-likelihood of the observed
/// alleles given the current deme assignment, spec.md §4.6:
/// `sum_{k,l} [ lgamma(J[l]*lambda) - lgamma(alleleCountsTotal[k][l] +
/// J[l]*lambda) + sum_j (lgamma(alleleCounts[k][l][j] + lambda) -
/// lgamma(lambda)) ]`.
pub fn log_like_group(stats: &SufficientStats, data: &GenotypeData, lambda: f64) -> f64 {
    let mut total = 0.0;
    for k in 0..stats.k() {
        for l in 0..data.n_loci() {
            let j_l = data.n_alleles(l);
            let total_count = stats.allele_count_total(k, l) as f64;
            total += MathUtils::log_gamma(j_l as f64 * lambda) - MathUtils::log_gamma(total_count + j_l as f64 * lambda);
            for j in 0..j_l {
                let count = stats.allele_count(k, l, j) as f64;
                total += MathUtils::log_gamma(count + lambda) - MathUtils::log_gamma(lambda);
            }
        }
    }
    total
}

/// Joint log-likelihood given a drawn set of allele/admixture frequencies,
/// spec.md §4.6: `sum_{i,l,p: data != 0} log( sum_k admixFreqs[i][k] *
/// alleleFreqs[k][l][data[i][l][p]] )`. Only meaningful when `draw_freqs`
/// is enabled; `admix_freqs`/`allele_freqs` come from
/// [`sample_admix_freqs`]/[`sample_allele_freqs`] for the same draw.
pub fn log_like_joint(data: &GenotypeData, admix_freqs: &[Vec<f64>], allele_freqs: &[Vec<Vec<f64>>]) -> f64 {
    let k_total = allele_freqs.len();
    let mut total = 0.0;
    for g in 0..data.n_gene_copies() {
        if data.is_missing(g) {
            continue;
        }
        let r = data.gene_copy(g);
        let a = (data.allele_at(g) - 1) as usize;
        let mix: f64 = (0..k_total)
            .map(|k| admix_freqs[r.individual][k] * allele_freqs[k][r.locus][a])
            .sum();
        total += mix.ln();
    }
    total
}

/// Post-burn-in bookkeeping for one chain, spec.md §4.6: the harmonic-mean
/// evidence estimator accumulated in log space, and a running mean/variance
/// of the joint log-likelihood trace for convergence monitoring.
#[derive(Debug, Clone)]
pub struct Accumulator {
    /// Running `logSumExp` of `-logLikeGroup` across recorded samples; the
    /// harmonic mean of the likelihoods is `n / sum(1/L)`, so this is the
    /// log of `sum(1/L)`.
    neg_log_like_sum: f64,
    n_samples: usize,
    joint_log_like: RunningAverage,
}

impl Accumulator {
    pub fn new() -> Accumulator {
        Accumulator {
            neg_log_like_sum: f64::NEG_INFINITY,
            n_samples: 0,
            joint_log_like: RunningAverage::new(),
        }
    }

    /// Folds one post-burn-in sample's joint log-likelihood into both the
    /// harmonic-mean accumulator and the running trace statistics.
    pub fn record(&mut self, log_like: f64) {
        self.neg_log_like_sum = MathUtils::log_sum(self.neg_log_like_sum, -log_like);
        self.n_samples += 1;
        self.joint_log_like.add(log_like);
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// `log(evidence)` under the harmonic-mean estimator. `NaN` if nothing
    /// has been recorded yet (caller's responsibility to guard on
    /// `n_samples() > 0`).
    pub fn harmonic_mean_log_evidence(&self) -> f64 {
        (self.n_samples as f64).ln() - self.neg_log_like_sum
    }

    pub fn mean_log_like(&self) -> f64 {
        self.joint_log_like.mean()
    }

    pub fn log_like_variance(&self) -> f64 {
        self.joint_log_like.variance()
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds the iteration's β=1 Q-row into the post-burn-in running sum
/// (spec.md §4.6): `logQaccum[g][k] <- logSum(logQaccum[g][k], logQnew[g][k])`,
/// so the eventual mean is `exp(logQaccum - ln(nSamples))`.
pub fn accumulate_q(qbuf: &mut QBuffers) {
    for g in 0..qbuf.n_gene_copies() {
        for k in 0..qbuf.k() {
            let updated = MathUtils::log_sum(qbuf.log_q_accum(g, k), qbuf.log_q_new(g, k));
            qbuf.set_log_q_accum(g, k, updated);
        }
    }
}

/// Final posterior mean Q-row for gene copy `g`, spec.md §4.6/§4.7.
pub fn mean_q_row(qbuf: &QBuffers, g: usize, n_samples: usize) -> Vec<f64> {
    let log_n = (n_samples as f64).ln();
    (0..qbuf.k()).map(|k| (qbuf.log_q_accum(g, k) - log_n).exp()).collect()
}

/// Draws a Dirichlet sample of allele frequencies per deme/locus from the
/// current counts, spec.md §4.6 ("draw_freqs"): `Dirichlet(alleleCounts[k][l]
/// + lambda)`. Only meaningful when `ChainConfig::draw_freqs` is set.
pub fn sample_allele_freqs(stats: &SufficientStats, data: &GenotypeData, lambda: f64, rng: &mut ChainRng) -> Vec<Vec<Vec<f64>>> {
    (0..stats.k())
        .map(|k| {
            (0..data.n_loci())
                .map(|l| {
                    let alpha: Vec<f64> = (0..data.n_alleles(l))
                        .map(|j| stats.allele_count(k, l, j) as f64 + lambda)
                        .collect();
                    Dirichlet::new(&alpha).sample(rng.inner_mut())
                })
                .collect()
        })
        .collect()
}

/// Draws a Dirichlet sample of admixture proportions per individual,
/// spec.md §4.6: `Dirichlet(admixCounts[i] + alpha)`.
pub fn sample_admix_freqs(stats: &SufficientStats, data: &GenotypeData, alpha: f64, rng: &mut ChainRng) -> Vec<Vec<f64>> {
    (0..data.n_individuals())
        .map(|i| {
            let a: Vec<f64> = (0..stats.k()).map(|k| stats.admix_count(i, k) as f64 + alpha).collect();
            Dirichlet::new(&a).sample(rng.inner_mut())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data() -> GenotypeData {
        GenotypeData::new(
            vec![1, 1, 1, 1],
            vec![2],
            vec![
                vec![vec![1]],
                vec![vec![2]],
                vec![vec![1]],
                vec![vec![2]],
            ],
            vec![0, 0, 0, 0],
            vec!["pop0".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn log_like_group_is_finite_and_well_formed() {
        let data = toy_data();
        let mut stats = SufficientStats::allocate(&data, 2);
        let mut rng = ChainRng::new(1);
        stats.reset(&data, &mut rng);
        let ll = log_like_group(&stats, &data, 1.0);
        assert!(MathUtils::well_formed(ll));
    }

    #[test]
    fn harmonic_mean_evidence_is_between_min_and_max_log_like() {
        let mut acc = Accumulator::new();
        let samples = [-10.0, -8.0, -12.0, -9.0];
        for &s in &samples {
            acc.record(s);
        }
        let evidence = acc.harmonic_mean_log_evidence();
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(evidence <= max + 1e-9);
        assert!(evidence >= min - 1e-9);
    }

    #[test]
    fn accumulate_q_then_mean_q_row_sums_to_one() {
        let data = toy_data();
        let mut qbuf = QBuffers::allocate(data.n_gene_copies(), 2);
        qbuf.reset(2);
        let mut n = 0;
        for _ in 0..5 {
            for g in 0..data.n_gene_copies() {
                qbuf.set_log_q_new(g, 0, (0.4_f64).ln());
                qbuf.set_log_q_new(g, 1, (0.6_f64).ln());
            }
            accumulate_q(&mut qbuf);
            n += 1;
        }
        for g in 0..data.n_gene_copies() {
            let row = mean_q_row(&qbuf, g, n);
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sampled_allele_freqs_are_proper_distributions() {
        let data = toy_data();
        let mut stats = SufficientStats::allocate(&data, 2);
        let mut rng = ChainRng::new(2);
        stats.reset(&data, &mut rng);
        let freqs = sample_allele_freqs(&stats, &data, 1.0, &mut rng);
        for k_row in &freqs {
            for l_row in k_row {
                let sum: f64 = l_row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn log_like_joint_skips_missing_gene_copies() {
        let data = GenotypeData::new(
            vec![1, 1],
            vec![2],
            vec![vec![vec![1]], vec![vec![0]]],
            vec![0, 0],
            vec!["pop0".to_string()],
        )
        .unwrap();
        let admix_freqs = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let allele_freqs = vec![vec![vec![0.5, 0.5]], vec![vec![0.5, 0.5]]];
        let ll = log_like_joint(&data, &admix_freqs, &allele_freqs);
        // Only individual 0's single non-missing gene copy contributes:
        // sum_k 0.5*0.5 = 0.5, log(0.5).
        assert!((ll - (0.5_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn sampled_admix_freqs_are_proper_distributions() {
        let data = toy_data();
        let mut stats = SufficientStats::allocate(&data, 2);
        let mut rng = ChainRng::new(3);
        stats.reset(&data, &mut rng);
        let freqs = sample_admix_freqs(&stats, &data, 1.0, &mut rng);
        for row in &freqs {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}
