use ndarray::Array2;

use crate::data::GenotypeData;
use crate::sampler::rng::ChainRng;

/// Co-maintained count tensors for one chain (spec.md §3). All mutation
/// funnels through [`SufficientStats::detach`]/[`SufficientStats::attach`]
/// so invariants (I1)-(I3) are enforced in exactly one place, per the
/// redesign note in spec.md §9.
#[derive(Debug, Clone)]
pub struct SufficientStats {
    k: usize,
    /// `group[g] in 0..K`, the current deme assignment of gene copy `g`.
    group: Vec<usize>,
    /// `allele_counts[k][l][j]`, `j` indexing the `J[l]` non-missing allele
    /// values 0-based (observed allele code `a` maps to `a - 1`).
    allele_counts: Vec<Vec<Vec<u32>>>,
    /// `allele_counts_total[k][l] = sum_j allele_counts[k][l][j]`.
    allele_counts_total: Vec<Vec<u32>>,
    /// `admix_counts[i][k]`.
    admix_counts: Vec<Vec<u32>>,
    /// `admix_counts_total[i] = sum_k admix_counts[i][k]`.
    admix_counts_total: Vec<u32>,
}

impl SufficientStats {
    /// Allocates all tensors sized by (N, L, J\[l\], K, G) with every count
    /// zeroed and every gene copy unassigned (group index `usize::MAX` is
    /// never read before [`Self::reset`] populates it).
    pub fn allocate(data: &GenotypeData, k: usize) -> SufficientStats {
        let n = data.n_individuals();
        let l = data.n_loci();
        let g = data.n_gene_copies();

        SufficientStats {
            k,
            group: vec![0; g],
            allele_counts: (0..k)
                .map(|_| (0..l).map(|locus| vec![0u32; data.n_alleles(locus)]).collect())
                .collect(),
            allele_counts_total: vec![vec![0u32; l]; k],
            admix_counts: vec![vec![0u32; k]; n],
            admix_counts_total: vec![0u32; n],
        }
    }

    /// Zeros every count tensor and draws a fresh, independent uniform
    /// assignment for every gene copy (spec.md §4.1). Does *not* touch the
    /// Q-buffers or accumulators — those are owned by
    /// [`crate::sampler::accumulator::Accumulator`].
    pub fn reset(&mut self, data: &GenotypeData, rng: &mut ChainRng) {
        for counts in self.allele_counts.iter_mut() {
            for locus in counts.iter_mut() {
                locus.iter_mut().for_each(|c| *c = 0);
            }
        }
        self.allele_counts_total
            .iter_mut()
            .for_each(|row| row.iter_mut().for_each(|c| *c = 0));
        self.admix_counts
            .iter_mut()
            .for_each(|row| row.iter_mut().for_each(|c| *c = 0));
        self.admix_counts_total.iter_mut().for_each(|c| *c = 0);

        for g in 0..self.group.len() {
            let k = rng.uniform_index(self.k);
            self.attach(g, k, data);
        }
    }

    /// Removes gene copy `g` from the count tensors at its *current*
    /// assignment, skipping the decrement when the observation is missing
    /// (spec.md §4.2 step 1). Does not change `group[g]` itself.
    pub fn detach(&mut self, g: usize, data: &GenotypeData) {
        if data.is_missing(g) {
            return;
        }
        let r = data.gene_copy(g);
        let k = self.group[g];
        let a = (data.allele_at(g) - 1) as usize;
        self.allele_counts[k][r.locus][a] -= 1;
        self.allele_counts_total[k][r.locus] -= 1;
        self.admix_counts[r.individual][k] -= 1;
        self.admix_counts_total[r.individual] -= 1;
    }

    /// Assigns gene copy `g` to deme `k` and increments the count tensors,
    /// again skipping the increment when the observation is missing
    /// (spec.md §4.2 step 4).
    pub fn attach(&mut self, g: usize, k: usize, data: &GenotypeData) {
        self.group[g] = k;
        if data.is_missing(g) {
            return;
        }
        let r = data.gene_copy(g);
        let a = (data.allele_at(g) - 1) as usize;
        self.allele_counts[k][r.locus][a] += 1;
        self.allele_counts_total[k][r.locus] += 1;
        self.admix_counts[r.individual][k] += 1;
        self.admix_counts_total[r.individual] += 1;
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn group(&self) -> &[usize] {
        &self.group
    }

    pub fn allele_count(&self, k: usize, l: usize, j: usize) -> u32 {
        self.allele_counts[k][l][j]
    }

    pub fn allele_count_total(&self, k: usize, l: usize) -> u32 {
        self.allele_counts_total[k][l]
    }

    pub fn admix_count(&self, i: usize, k: usize) -> u32 {
        self.admix_counts[i][k]
    }

    pub fn admix_count_total(&self, i: usize) -> u32 {
        self.admix_counts_total[i]
    }

    pub fn n_alleles(&self, l: usize) -> usize {
        self.allele_counts[0][l].len()
    }

    /// Applies permutation `order` so that deme `k`'s new rows come from old
    /// deme `order[k]`'s rows, used by label alignment (spec.md §4.5). Also
    /// remaps `group` under `pi` (the inverse of `order`).
    pub fn apply_permutation(&mut self, pi: &[usize], order: &[usize]) {
        for g in self.group.iter_mut() {
            *g = pi[*g];
        }
        self.allele_counts = order.iter().map(|&src| self.allele_counts[src].clone()).collect();
        self.allele_counts_total = order
            .iter()
            .map(|&src| self.allele_counts_total[src].clone())
            .collect();
        for row in self.admix_counts.iter_mut() {
            *row = order.iter().map(|&src| row[src]).collect();
        }
    }

    /// Checks (P1): `sum_j allele_counts[k][l][j] == allele_counts_total[k][l]`
    /// for all k, l.
    pub fn check_allele_count_invariant(&self) -> bool {
        for k in 0..self.k {
            for l in 0..self.allele_counts_total[k].len() {
                let sum: u32 = self.allele_counts[k][l].iter().sum();
                if sum != self.allele_counts_total[k][l] {
                    return false;
                }
            }
        }
        true
    }

    /// Checks (P2): `sum_k admix_counts[i][k] == admix_counts_total[i]`.
    pub fn check_admix_count_invariant(&self) -> bool {
        for i in 0..self.admix_counts.len() {
            let sum: u32 = self.admix_counts[i].iter().sum();
            if sum != self.admix_counts_total[i] {
                return false;
            }
        }
        true
    }
}

/// Lookup table `log(i + j*lambda)` for small non-negative integers, a
/// micro-optimization substitute for calling `ln()` in the sampler's inner
/// loop (spec.md §4.1, §9). Purely an optimization: any caller must get the
/// same result whether or not the cache is consulted, so out-of-range
/// lookups fall back to `ln()` directly.
pub struct LogTable {
    table: Array2<f64>,
    max_i: usize,
    max_j: usize,
    lambda: f64,
}

impl LogTable {
    pub const DEFAULT_MAX_I: usize = 1000;

    pub fn build(lambda: f64, max_j: usize) -> LogTable {
        let max_i = Self::DEFAULT_MAX_I;
        let mut table = Array2::zeros((max_i, max_j + 1));
        for i in 0..max_i {
            for j in 0..=max_j {
                table[[i, j]] = (i as f64 + j as f64 * lambda).ln();
            }
        }
        LogTable {
            table,
            max_i,
            max_j,
            lambda,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < self.max_i && j <= self.max_j {
            self.table[[i, j]]
        } else {
            (i as f64 + j as f64 * self.lambda).ln()
        }
    }
}
