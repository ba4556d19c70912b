use std::io::Write;

use csv::Writer;

use crate::utils::errors::ChainResult;

/// Per-iteration joint log-likelihood trace (spec.md §6): one CSV row per
/// recorded sample, columns `k, rep, log_like_group, log_like_joint, alpha`
/// (`log_like_joint` is empty when `draw_freqs` is off). `mainRep`, the
/// outer replicate index across the (out-of-scope, per spec.md §1) K-sweep
/// driver, is the caller's to prepend if it stitches several chains'
/// streams together. Flushed after every row so a killed chain leaves a
/// readable partial trace.
pub struct LikelihoodSink<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> LikelihoodSink<W> {
    pub fn new(inner: W) -> ChainResult<LikelihoodSink<W>> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(["k", "rep", "log_like_group", "log_like_joint", "alpha"])?;
        writer.flush()?;
        Ok(LikelihoodSink { writer })
    }

    pub fn write_sample(
        &mut self,
        k: usize,
        rep: usize,
        log_like_group: f64,
        log_like_joint: Option<f64>,
        alpha: f64,
    ) -> ChainResult<()> {
        self.writer.write_record(&[
            k.to_string(),
            rep.to_string(),
            log_like_group.to_string(),
            log_like_joint.map(|v| v.to_string()).unwrap_or_default(),
            alpha.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Per-iteration posterior grouping trace (spec.md §6, off by default): one
/// CSV row per recorded sample, columns `k, rep, group[0], group[1], ...,
/// group[G-1]` in canonical gene-copy order. `G` is fixed at construction
/// so the header can name every trailing column up front.
pub struct PosteriorGroupingSink<W: Write> {
    writer: Writer<W>,
    n_gene_copies: usize,
}

impl<W: Write> PosteriorGroupingSink<W> {
    pub fn new(inner: W, n_gene_copies: usize) -> ChainResult<PosteriorGroupingSink<W>> {
        let mut writer = Writer::from_writer(inner);
        let mut header = vec!["k".to_string(), "rep".to_string()];
        header.extend((0..n_gene_copies).map(|g| format!("group_{g}")));
        writer.write_record(&header)?;
        writer.flush()?;
        Ok(PosteriorGroupingSink {
            writer,
            n_gene_copies,
        })
    }

    pub fn write_sample(&mut self, k: usize, rep: usize, group: &[usize]) -> ChainResult<()> {
        debug_assert_eq!(group.len(), self.n_gene_copies);
        let mut record = vec![k.to_string(), rep.to_string()];
        record.extend(group.iter().map(|assigned| assigned.to_string()));
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Injection point for the driver's post-burn-in output side effects
/// (spec.md §6), so [`crate::sampler::driver::Driver`] never knows whether
/// it's writing to a file, a buffer, or nowhere at all. Both methods
/// default to a no-op so a caller that only wants one stream need not
/// implement the other. `rep` is `iteration - burnin + 1`, matching
/// spec.md §6's `rep-burnin+1` column.
pub trait ChainObserver {
    fn on_likelihood_sample(
        &mut self,
        _k: usize,
        _rep: usize,
        _log_like_group: f64,
        _log_like_joint: Option<f64>,
        _alpha: f64,
    ) -> ChainResult<()> {
        Ok(())
    }

    fn on_posterior_grouping_sample(&mut self, _k: usize, _rep: usize, _group: &[usize]) -> ChainResult<()> {
        Ok(())
    }
}

/// A [`ChainObserver`] that forwards to a pair of CSV sinks, constructed
/// from whatever `dyn Write` the caller provides (a file, a `Vec<u8>`
/// buffer for tests, a socket).
pub struct CsvObserver<W1: Write, W2: Write> {
    likelihood: Option<LikelihoodSink<W1>>,
    posterior_grouping: Option<PosteriorGroupingSink<W2>>,
}

impl<W1: Write, W2: Write> CsvObserver<W1, W2> {
    pub fn new(
        likelihood: Option<LikelihoodSink<W1>>,
        posterior_grouping: Option<PosteriorGroupingSink<W2>>,
    ) -> CsvObserver<W1, W2> {
        CsvObserver {
            likelihood,
            posterior_grouping,
        }
    }
}

impl<W1: Write, W2: Write> ChainObserver for CsvObserver<W1, W2> {
    fn on_likelihood_sample(
        &mut self,
        k: usize,
        rep: usize,
        log_like_group: f64,
        log_like_joint: Option<f64>,
        alpha: f64,
    ) -> ChainResult<()> {
        if let Some(sink) = self.likelihood.as_mut() {
            sink.write_sample(k, rep, log_like_group, log_like_joint, alpha)?;
        }
        Ok(())
    }

    fn on_posterior_grouping_sample(&mut self, k: usize, rep: usize, group: &[usize]) -> ChainResult<()> {
        if let Some(sink) = self.posterior_grouping.as_mut() {
            sink.write_sample(k, rep, group)?;
        }
        Ok(())
    }
}
