use itertools::Itertools;
use log::{debug, warn};

use crate::config::ChainConfig;
use crate::data::GenotypeData;
use crate::sampler::qbuffers::QBuffers;
use crate::sampler::rng::ChainRng;
use crate::sampler::stats::{LogTable, SufficientStats};
use crate::utils::errors::ChainResult;
use crate::utils::math_utils::MathUtils;

/// Log of the allele-frequency factor `(alleleCounts[k][l][a] + lambda) /
/// (alleleCountsTotal[k][l] + J[l]*lambda)` for deme `k`, optionally backed
/// by the log-table cache (spec.md §4.1/§4.2/§9): both branches must agree
/// up to floating-point rounding.
fn log_allele_factor(
    stats: &SufficientStats,
    log_table: Option<&LogTable>,
    k: usize,
    l: usize,
    a: usize,
    lambda: f64,
    j_l: usize,
) -> f64 {
    let count = stats.allele_count(k, l, a);
    let total = stats.allele_count_total(k, l);
    let log_num = match log_table {
        Some(table) => table.get(count as usize, 1),
        None => (count as f64 + lambda).ln(),
    };
    let log_denom = match log_table {
        Some(table) => table.get(total as usize, j_l),
        None => (total as f64 + j_l as f64 * lambda).ln(),
    };
    log_num - log_denom
}

/// Builds the unnormalized log-weight vector over demes for gene copy `g`,
/// optionally raising the allele-frequency factor to `beta` (spec.md §4.2
/// step 2, §4.4, §9 — "β multiplies only the log of the allele-frequency
/// factor, not the admixture factor").
fn log_weights(
    stats: &SufficientStats,
    data: &GenotypeData,
    log_table: Option<&LogTable>,
    g: usize,
    lambda: f64,
    alpha: f64,
    beta: f64,
) -> Vec<f64> {
    let r = data.gene_copy(g);
    let k_total = stats.k();
    if data.is_missing(g) {
        (0..k_total)
            .map(|k| (stats.admix_count(r.individual, k) as f64 + alpha).ln())
            .collect_vec()
    } else {
        let a = (data.allele_at(g) - 1) as usize;
        let j_l = data.n_alleles(r.locus);
        (0..k_total)
            .map(|k| {
                let log_admix = (stats.admix_count(r.individual, k) as f64 + alpha).ln();
                let log_allele = log_allele_factor(stats, log_table, k, r.locus, a, lambda, j_l);
                log_admix + beta * log_allele
            })
            .collect_vec()
    }
}

/// Gene-copy resample sweep, spec.md §4.2: resamples every gene copy's
/// ancestral assignment in canonical order, mutating the count tensors
/// through [`SufficientStats::detach`]/[`SufficientStats::attach`] so (I1)-
/// (I3) hold again as soon as this call returns.
pub fn group_update(
    stats: &mut SufficientStats,
    data: &GenotypeData,
    log_table: Option<&LogTable>,
    lambda: f64,
    alpha: f64,
    beta: f64,
    rng: &mut ChainRng,
) -> ChainResult<()> {
    for g in 0..data.n_gene_copies() {
        stats.detach(g, data);
        let log_w = log_weights(stats, data, log_table, g, lambda, alpha, beta);
        let w: Vec<f64> = log_w.iter().map(|v| v.exp()).collect();
        let k_new = rng.categorical(&w)?;
        stats.attach(g, k_new, data);
    }
    Ok(())
}

/// Metropolis update of the admixture concentration hyperparameter α,
/// spec.md §4.3. No-op (and not called) when `fixAlpha` is set — the caller
/// owns that decision.
pub fn alpha_update(stats: &SufficientStats, data: &GenotypeData, alpha: f64, prop_sd: f64, rng: &mut ChainRng) -> f64 {
    let proposal = reflect(alpha + rng.normal(0.0, prop_sd));
    let current_log_p = log_p_alpha(stats, data, alpha);
    let proposal_log_p = log_p_alpha(stats, data, proposal);
    let log_ratio = proposal_log_p - current_log_p;
    let accept = log_ratio >= 0.0 || rng.uniform() < log_ratio.exp();
    debug!(
        "alpha metropolis step: current={current:.6} proposal={proposal:.6} log_ratio={log_ratio:.6} accept={accept}",
        current = alpha
    );
    if accept {
        proposal
    } else {
        alpha
    }
}

/// The two-step reflection procedure from spec.md §4.3: wrap into
/// `[-10, 20]` by repeated +/-20, then fold the two overflow bands back
/// into `[0, 10]` by negation / `20 - x`. An exact zero is replaced by the
/// numeric floor `1e-300` (I4).
fn reflect(mut x: f64) -> f64 {
    while x < -10.0 {
        x += 20.0;
    }
    while x > 20.0 {
        x -= 20.0;
    }
    if x < 0.0 {
        x = -x;
    } else if x > 10.0 {
        x = 20.0 - x;
    }
    if x == 0.0 {
        warn!(
            "alpha reflected to exactly 0.0, clamping to the numeric floor {}",
            ChainConfig::ALPHA_FLOOR
        );
        ChainConfig::ALPHA_FLOOR
    } else {
        x
    }
}

/// Dirichlet-multinomial marginal over admixture assignments only, spec.md
/// §4.3: `sum_i [ lgamma(K*alpha) - lgamma(admixCountsTotal[i] + K*alpha) +
/// sum_k (lgamma(admixCounts[i][k] + alpha) - lgamma(alpha)) ]`.
fn log_p_alpha(stats: &SufficientStats, data: &GenotypeData, alpha: f64) -> f64 {
    let k = stats.k() as f64;
    (0..data.n_individuals())
        .map(|i| {
            let total = stats.admix_count_total(i) as f64;
            let mut term = MathUtils::log_gamma(k * alpha) - MathUtils::log_gamma(total + k * alpha);
            for kk in 0..stats.k() {
                let count = stats.admix_count(i, kk) as f64;
                term += MathUtils::log_gamma(count + alpha) - MathUtils::log_gamma(alpha);
            }
            term
        })
        .sum()
}

/// Produces the iteration's β=1 Q-matrix row for every gene copy (spec.md
/// §4.4), using the *current* (already-resampled) counts without any
/// detach step — this is a read of the posterior snapshot, not a
/// resampling pass.
pub fn produce_q_matrix(
    stats: &SufficientStats,
    data: &GenotypeData,
    log_table: Option<&LogTable>,
    lambda: f64,
    alpha: f64,
    qbuf: &mut QBuffers,
) {
    for g in 0..data.n_gene_copies() {
        let log_w = log_weights(stats, data, log_table, g, lambda, alpha, 1.0);
        let log_norm = MathUtils::log_sum_exp(&log_w);
        for (k, lw) in log_w.into_iter().enumerate() {
            let log_q = lw - log_norm;
            qbuf.set_log_q_new(g, k, log_q);
            qbuf.set_q_new(g, k, log_q.exp());
        }
    }
}
