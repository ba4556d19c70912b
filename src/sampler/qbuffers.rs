use ndarray::Array2;

/// The Q-matrix working buffers from spec.md §3: `logQrunning` is the
/// Stephens-alignment reference, `logQnew`/`Qnew` hold the current
/// iteration's row (β=1, from [`crate::sampler::kernel::produce_q_matrix`]),
/// and `logQaccum` is the post-burn-in running sum used to form the final
/// mean Q. All three are `G x K`.
pub struct QBuffers {
    log_q_running: Array2<f64>,
    log_q_new: Array2<f64>,
    q_new: Array2<f64>,
    log_q_accum: Array2<f64>,
}

impl QBuffers {
    pub fn allocate(g: usize, k: usize) -> QBuffers {
        QBuffers {
            log_q_running: Array2::zeros((g, k)),
            log_q_new: Array2::zeros((g, k)),
            q_new: Array2::zeros((g, k)),
            log_q_accum: Array2::from_elem((g, k), f64::NEG_INFINITY),
        }
    }

    /// Resets `logQrunning` to uniform (`-ln K`) so a flat Q is the initial
    /// alignment reference, and zeros `logQaccum` back to `log 0`
    /// (spec.md §4.1). `logQnew`/`Qnew` are transient and do not need
    /// resetting; they are fully overwritten every iteration.
    pub fn reset(&mut self, k: usize) {
        let uniform = -(k as f64).ln();
        self.log_q_running.fill(uniform);
        self.log_q_accum.fill(f64::NEG_INFINITY);
    }

    pub fn log_q_running(&self, g: usize, k: usize) -> f64 {
        self.log_q_running[[g, k]]
    }

    pub fn set_log_q_running(&mut self, g: usize, k: usize, value: f64) {
        self.log_q_running[[g, k]] = value;
    }

    pub fn log_q_new(&self, g: usize, k: usize) -> f64 {
        self.log_q_new[[g, k]]
    }

    pub fn set_log_q_new(&mut self, g: usize, k: usize, value: f64) {
        self.log_q_new[[g, k]] = value;
    }

    pub fn q_new(&self, g: usize, k: usize) -> f64 {
        self.q_new[[g, k]]
    }

    pub fn set_q_new(&mut self, g: usize, k: usize, value: f64) {
        self.q_new[[g, k]] = value;
    }

    pub fn log_q_accum(&self, g: usize, k: usize) -> f64 {
        self.log_q_accum[[g, k]]
    }

    pub fn set_log_q_accum(&mut self, g: usize, k: usize, value: f64) {
        self.log_q_accum[[g, k]] = value;
    }

    pub fn n_gene_copies(&self) -> usize {
        self.log_q_new.nrows()
    }

    pub fn k(&self) -> usize {
        self.log_q_new.ncols()
    }

    /// Row `g` of `Qnew`, i.e. the current iteration's posterior over demes
    /// for gene copy `g`. Used to check (P4).
    pub fn q_new_row(&self, g: usize) -> Vec<f64> {
        self.q_new.row(g).to_vec()
    }

    /// Replaces `logQnew` wholesale with a permuted copy of itself, where
    /// column `k` is taken from old column `order[k]` (spec.md §4.5:
    /// "`logQnew[g][k] <- oldLogQnew[g][order[k]]`").
    pub fn permute_log_q_new_columns(&mut self, order: &[usize]) {
        let old = self.log_q_new.clone();
        for g in 0..old.nrows() {
            for k in 0..old.ncols() {
                self.log_q_new[[g, k]] = old[[g, order[k]]];
            }
        }
    }
}
