use log::info;
use rayon::prelude::*;

use crate::config::ChainConfig;
use crate::data::GenotypeData;
use crate::output::ChainObserver;
use crate::sampler::accumulator::{self, Accumulator};
use crate::sampler::kernel;
use crate::sampler::label_alignment;
use crate::sampler::qbuffers::QBuffers;
use crate::sampler::rng::ChainRng;
use crate::sampler::stats::{LogTable, SufficientStats};
use crate::utils::errors::ChainResult;

/// Posterior summary handed back once a chain finishes its run, spec.md
/// §4.7: mean Q at every aggregation level the inputs support (all-zero
/// rows when `fixLabels` was off, since the Q matrix is then never
/// produced at all), the harmonic-mean evidence estimate, joint-likelihood
/// trace statistics, and the final α (meaningful even when α was fixed, so
/// callers don't need to special-case it).
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub mean_q_gene: Vec<Vec<f64>>,
    pub mean_q_individual: Vec<Vec<f64>>,
    pub mean_q_population: Vec<Vec<f64>>,
    pub harmonic_mean_log_evidence: f64,
    pub mean_log_like: f64,
    pub log_like_variance: f64,
    pub final_alpha: f64,
}

/// One MCMC chain over a fixed (K, β) pair, spec.md §2/§5. Owns no mutable
/// state between `run()` calls; everything it needs is either borrowed from
/// the caller or allocated fresh each run.
pub struct Driver<'a> {
    data: &'a GenotypeData,
    config: &'a ChainConfig,
}

impl<'a> Driver<'a> {
    pub fn new(data: &'a GenotypeData, config: &'a ChainConfig) -> Driver<'a> {
        Driver { data, config }
    }

    /// Runs the chain to completion following spec.md §4.7's loop exactly:
    /// `burnin + samples` outer repetitions, each doing `thinSwitch` inner
    /// Gibbs sweeps (`thinSwitch` is 1 during burn-in and `thinning`
    /// thereafter — thinning stretches the gap between *recorded* samples,
    /// it never skips recording one). Q-matrix production and label
    /// alignment happen only when `fixLabels` is set; the collapsed
    /// log-likelihood and its harmonic-mean accumulation happen every
    /// outer rep once `rep >= burnin`, independent of `fixLabels`.
    /// `observer` receives the optional per-sample output side effects
    /// (spec.md §6); pass `None` to run silently.
    pub fn run(&self, observer: Option<&mut dyn ChainObserver>) -> ChainResult<ChainOutcome> {
        self.config.validate()?;

        let mut rng = ChainRng::new(self.config.seed);
        let mut stats = SufficientStats::allocate(self.data, self.config.k);
        stats.reset(self.data, &mut rng);

        let mut qbuf = QBuffers::allocate(self.data.n_gene_copies(), self.config.k);
        qbuf.reset(self.config.k);

        info!(
            "chain reset: k={} n_gene_copies={} burnin={} samples={} seed={}",
            self.config.k,
            self.data.n_gene_copies(),
            self.config.burnin,
            self.config.samples,
            self.config.seed
        );

        let log_table = if self.config.use_log_table {
            let max_j = (0..self.data.n_loci())
                .map(|l| self.data.n_alleles(l))
                .max()
                .unwrap_or(0);
            Some(LogTable::build(self.config.lambda, max_j))
        } else {
            None
        };

        let mut alpha = self.config.alpha;
        let mut accum = Accumulator::new();
        let mut observer = observer;
        let mut thin_switch = 1usize;

        let total_reps = self.config.burnin + self.config.samples;
        for rep in 0..total_reps {
            for _ in 0..thin_switch {
                kernel::group_update(
                    &mut stats,
                    self.data,
                    log_table.as_ref(),
                    self.config.lambda,
                    alpha,
                    self.config.beta,
                    &mut rng,
                )?;
                if !self.config.fix_alpha {
                    alpha = kernel::alpha_update(&stats, self.data, alpha, self.config.alpha_prop_sd, &mut rng);
                }
            }
            if rep == self.config.burnin {
                thin_switch = self.config.thinning;
                info!("chain k={} finished burn-in at rep {}", self.config.k, rep);
            }

            let post_burnin = rep >= self.config.burnin;

            if self.config.fix_labels {
                kernel::produce_q_matrix(
                    &stats,
                    self.data,
                    log_table.as_ref(),
                    self.config.lambda,
                    alpha,
                    &mut qbuf,
                );
                label_alignment::align(&mut stats, &mut qbuf)?;
                if post_burnin {
                    accumulator::accumulate_q(&mut qbuf);
                }
            }

            let log_like_group = accumulator::log_like_group(&stats, self.data, self.config.lambda);
            let log_like_joint = if self.config.draw_freqs {
                let allele_freqs = accumulator::sample_allele_freqs(&stats, self.data, self.config.lambda, &mut rng);
                let admix_freqs = accumulator::sample_admix_freqs(&stats, self.data, alpha, &mut rng);
                Some(accumulator::log_like_joint(self.data, &admix_freqs, &allele_freqs))
            } else {
                None
            };

            if post_burnin {
                accum.record(log_like_group);

                if let Some(obs) = observer.as_deref_mut() {
                    let sample_rep = rep - self.config.burnin + 1;
                    if self.config.output.likelihood {
                        obs.on_likelihood_sample(self.config.k, sample_rep, log_like_group, log_like_joint, alpha)?;
                    }
                    if self.config.output.posterior_grouping {
                        obs.on_posterior_grouping_sample(self.config.k, sample_rep, stats.group())?;
                    }
                }
            }
        }

        let n_samples = accum.n_samples().max(1);
        let mean_q_gene: Vec<Vec<f64>> = (0..self.data.n_gene_copies())
            .map(|g| accumulator::mean_q_row(&qbuf, g, n_samples))
            .collect();
        let mean_q_individual = aggregate_by_individual(self.data, &mean_q_gene, self.config.k);
        let mean_q_population = aggregate_by_population(self.data, &mean_q_individual, self.config.k);

        info!(
            "chain k={} finished: {} post-burnin samples, harmonic-mean log evidence={:.4}, final alpha={:.4}",
            self.config.k,
            accum.n_samples(),
            accum.harmonic_mean_log_evidence(),
            alpha
        );

        Ok(ChainOutcome {
            mean_q_gene,
            mean_q_individual,
            mean_q_population,
            harmonic_mean_log_evidence: accum.harmonic_mean_log_evidence(),
            mean_log_like: accum.mean_log_like(),
            log_like_variance: accum.log_like_variance(),
            final_alpha: alpha,
        })
    }
}

/// Runs a batch of independent chains (distinct K, β, or replicate seed)
/// concurrently, spec.md §5: "chains are embarrassingly parallel — nothing
/// about one chain's state is visible to another." Each chain runs
/// silently (no [`ChainObserver`]); a caller that needs per-chain CSV
/// output should drive chains individually with [`Driver::run`] instead.
pub fn run_many(data: &GenotypeData, configs: &[ChainConfig]) -> Vec<ChainResult<ChainOutcome>> {
    configs
        .par_iter()
        .map(|config| Driver::new(data, config).run(None))
        .collect()
}

/// Averages gene-copy-level Q rows over each individual's gene copies
/// (spec.md §4.6: "Individual-level mean Q averages gene-copy rows over
/// that individual's ploidy[i]*L copies").
fn aggregate_by_individual(data: &GenotypeData, mean_q_gene: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    (0..data.n_individuals())
        .map(|i| {
            let range = data.individual_gene_copy_range(i);
            let count = range.len() as f64;
            let mut row = vec![0.0; k];
            for g in range.clone() {
                for kk in 0..k {
                    row[kk] += mean_q_gene[g][kk];
                }
            }
            if count > 0.0 {
                row.iter_mut().for_each(|v| *v /= count);
            }
            row
        })
        .collect()
}

/// Averages individual-level Q rows within each declared population, in
/// the order [`GenotypeData::unique_pops`] lists them (spec.md §4.6:
/// "Population-level mean Q averages individual rows within each declared
/// population").
fn aggregate_by_population(data: &GenotypeData, mean_q_individual: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let pops = data.unique_pops();
    let mut sums = vec![vec![0.0; k]; pops.len()];
    let mut counts = vec![0.0; pops.len()];
    for i in 0..data.n_individuals() {
        let p = data.pop_index(i);
        counts[p] += 1.0;
        for kk in 0..k {
            sums[p][kk] += mean_q_individual[i][kk];
        }
    }
    for (row, count) in sums.iter_mut().zip(counts.iter()) {
        if *count > 0.0 {
            row.iter_mut().for_each(|v| *v /= count);
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputToggles;

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
            vec![0, 0, 1, 1],
            vec!["popA".to_string(), "popB".to_string()],
        )
        .unwrap()
    }

    fn toy_config() -> ChainConfig {
        ChainConfig {
            k: 2,
            lambda: 1.0,
            alpha: 1.0,
            alpha_prop_sd: 0.25,
            fix_alpha: false,
            beta: 1.0,
            burnin: 5,
            samples: 10,
            thinning: 1,
            fix_labels: true,
            draw_freqs: false,
            seed: 42,
            use_log_table: false,
            output: OutputToggles::default(),
        }
    }

    #[test]
    fn run_produces_well_formed_q_rows() {
        let data = toy_data();
        let config = toy_config();
        let driver = Driver::new(&data, &config);
        let outcome = driver.run(None).unwrap();
        assert_eq!(outcome.mean_q_gene.len(), data.n_gene_copies());
        for row in &outcome.mean_q_gene {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        assert_eq!(outcome.mean_q_population.len(), 2);
    }

    #[test]
    fn two_runs_with_identical_seed_are_bit_for_bit_identical() {
        let data = toy_data();
        let config = toy_config();
        let a = Driver::new(&data, &config).run(None).unwrap();
        let b = Driver::new(&data, &config).run(None).unwrap();
        assert_eq!(a.mean_q_gene, b.mean_q_gene);
        assert_eq!(a.final_alpha, b.final_alpha);
        assert_eq!(a.harmonic_mean_log_evidence, b.harmonic_mean_log_evidence);
    }

    #[test]
    fn fix_alpha_leaves_alpha_untouched() {
        let data = toy_data();
        let mut config = toy_config();
        config.fix_alpha = true;
        config.alpha = 2.5;
        let outcome = Driver::new(&data, &config).run(None).unwrap();
        assert_eq!(outcome.final_alpha, 2.5);
    }

    #[test]
    fn disabling_label_alignment_yields_no_q_matrix() {
        // produceQmatrix/label-alignment/accumulation are all gated on
        // fixLabels per spec.md §4.7 — with it off, logQaccum never moves
        // off its NEG_INFINITY initial value, so the mean Q rows are all
        // zero rather than summing to one. The chain still completes and
        // still reports a valid harmonic-mean evidence.
        let data = toy_data();
        let mut config = toy_config();
        config.fix_labels = false;
        let outcome = Driver::new(&data, &config).run(None).unwrap();
        for row in &outcome.mean_q_gene {
            let sum: f64 = row.iter().sum();
            assert!(sum.abs() < 1e-12);
        }
        assert!(outcome.harmonic_mean_log_evidence.is_finite());
    }

    #[test]
    fn draw_freqs_runs_without_error() {
        let data = toy_data();
        let mut config = toy_config();
        config.draw_freqs = true;
        let outcome = Driver::new(&data, &config).run(None).unwrap();
        assert!(outcome.mean_log_like.is_finite());
    }

    #[test]
    fn run_many_runs_every_config_independently() {
        let data = toy_data();
        let mut config_k3 = toy_config();
        config_k3.k = 3;
        let configs = vec![toy_config(), config_k3];
        let outcomes = run_many(&data, &configs);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].as_ref().unwrap().mean_q_gene[0].len() == 2);
        assert!(outcomes[1].as_ref().unwrap().mean_q_gene[0].len() == 3);
    }

    #[test]
    fn rejects_invalid_config_before_allocating_anything() {
        let data = toy_data();
        let mut config = toy_config();
        config.k = 0;
        let result = Driver::new(&data, &config).run(None);
        assert!(result.is_err());
    }
}
