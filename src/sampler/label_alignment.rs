use log::debug;

use crate::sampler::hungarian;
use crate::sampler::qbuffers::QBuffers;
use crate::sampler::stats::SufficientStats;
use crate::utils::errors::ChainResult;
use crate::utils::math_utils::MathUtils;

/// Builds the Stephens (2000) relabeling cost matrix exactly as spec.md
/// §4.5 states it: `C[k1][k2] = sum_g Qnew[g][k1] * (logQnew[g][k1] -
/// logQrunning[g][k2])`. Row `k1` is a *current* deme label, column `k2` a
/// *running-reference* label — the matrix is not symmetric in general, and
/// the asymmetry is intentional (§9: "`logQrunning` unnormalized, a running
/// sum of logs, not mean" — this is an ordering criterion, not a true KL).
fn cost_matrix(qbuf: &QBuffers) -> Vec<Vec<f64>> {
    let k = qbuf.k();
    let g = qbuf.n_gene_copies();
    let mut cost = vec![vec![0.0; k]; k];
    for k1 in 0..k {
        for k2 in 0..k {
            let mut acc = 0.0;
            for gc in 0..g {
                let q = qbuf.q_new(gc, k1);
                if q > 0.0 {
                    acc += q * (qbuf.log_q_new(gc, k1) - qbuf.log_q_running(gc, k2));
                }
            }
            cost[k1][k2] = acc;
        }
    }
    cost
}

/// Inverts a permutation: `inv[perm[k]] = k` for every `k`.
fn invert(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (k, &dst) in perm.iter().enumerate() {
        inv[dst] = k;
    }
    inv
}

/// One label-alignment step (spec.md §4.5).
///
/// Solves the Stephens assignment problem to find `pi`, the permutation
/// minimizing `sum_k1 C[k1][pi(k1)]` (current label `k1` -> reference label
/// `pi(k1)`), relabels `group` through `pi` directly, and relabels every
/// count tensor and `logQnew` through `order = pi^-1` (new reference-aligned
/// row `k` pulls from old current-labeled row `order[k]`). Finally folds the
/// now-aligned `logQnew` into the running reference in log-space — *not* a
/// replacement, an accumulation, per spec.md §4.5: `logQrunning[g][k] <-
/// logSum(logQrunning[g][k], logQnew[g][k])`. Returns `pi`.
///
/// Only called when `fixLabels` is enabled; the driver skips this entirely
/// otherwise and demes carry whatever label the sampler happened to draw.
///
/// Fails with `ChainError::Hungarian` if the assignment solver ever returns
/// something other than a genuine permutation (spec.md §7) — this aborts
/// just the owning chain, not its siblings.
pub fn align(stats: &mut SufficientStats, qbuf: &mut QBuffers) -> ChainResult<Vec<usize>> {
    let cost = cost_matrix(qbuf);
    let pi = hungarian::solve_checked(&cost)?;
    let order = invert(&pi);

    let is_identity = pi.iter().enumerate().all(|(k, &p)| p == k);
    if !is_identity {
        debug!("label alignment relabeled demes via permutation {pi:?}");
        stats.apply_permutation(&pi, &order);
        qbuf.permute_log_q_new_columns(&order);
    }

    for g in 0..qbuf.n_gene_copies() {
        for k in 0..qbuf.k() {
            let updated = MathUtils::log_sum(qbuf.log_q_running(g, k), qbuf.log_q_new(g, k));
            qbuf.set_log_q_running(g, k, updated);
        }
    }

    Ok(pi)
}
