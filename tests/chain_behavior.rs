use popstruct::config::{ChainConfig, OutputToggles};
use popstruct::data::GenotypeData;
use popstruct::sampler::driver::{run_many, Driver};

fn base_config() -> ChainConfig {
    ChainConfig {
        k: 2,
        lambda: 1.0,
        alpha: 1.0,
        alpha_prop_sd: 0.25,
        fix_alpha: false,
        beta: 1.0,
        burnin: 20,
        samples: 40,
        thinning: 1,
        fix_labels: true,
        draw_freqs: false,
        seed: 7,
        use_log_table: false,
        output: OutputToggles::default(),
    }
}

fn three_pop_dataset() -> GenotypeData {
    GenotypeData::new(
        vec![2, 2, 2, 2, 2, 2],
        vec![3, 2],
        vec![
            vec![vec![1, 2], vec![1, 1]],
            vec![vec![1, 1], vec![1, 2]],
            vec![vec![2, 3], vec![2, 2]],
            vec![vec![3, 3], vec![1, 2]],
            vec![vec![1, 3], vec![2, 2]],
            vec![vec![2, 2], vec![1, 1]],
        ],
        vec![0, 0, 1, 1, 2, 2],
        vec!["A".to_string(), "B".to_string(), "C".to_string()],
    )
    .unwrap()
}

/// S1-equivalent: a single sweep from a fixed seed is fully determined, and
/// repeating it from the same seed reproduces the identical Q-matrix and
/// final alpha (spec.md §5 reproducibility requirement).
#[test]
fn deterministic_single_chain_is_reproducible() {
    let data = three_pop_dataset();
    let config = base_config();
    let a = Driver::new(&data, &config).run(None).unwrap();
    let b = Driver::new(&data, &config).run(None).unwrap();
    assert_eq!(a.mean_q_gene, b.mean_q_gene);
    assert_eq!(a.final_alpha, b.final_alpha);
    assert_eq!(a.harmonic_mean_log_evidence, b.harmonic_mean_log_evidence);
}

/// S2-equivalent: a dataset where every gene copy is missing still runs to
/// completion and produces a well-formed (uniform, since no data informs
/// the posterior) Q-matrix, rather than panicking on an empty categorical
/// weight vector.
#[test]
fn all_missing_dataset_still_produces_uniform_q() {
    let data = GenotypeData::new(
        vec![2, 2],
        vec![3],
        vec![vec![vec![0, 0]], vec![vec![0, 0]]],
        vec![0, 0],
        vec!["only".to_string()],
    )
    .unwrap();
    let config = base_config();
    let outcome = Driver::new(&data, &config).run(None).unwrap();
    for row in &outcome.mean_q_gene {
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        for &q in row {
            assert!((q - 0.5).abs() < 0.3, "expected near-uniform Q with no data, got {q}");
        }
    }
}

/// S3-equivalent: a higher-ploidy individual still satisfies the
/// sufficient-statistics invariants after many sweeps — this is checked at
/// the unit level in `sampler::kernel`, but exercised here end-to-end
/// through a full chain run with tetraploid individuals.
#[test]
fn tetraploid_individuals_run_without_invariant_violation() {
    let data = GenotypeData::new(
        vec![4, 4, 4, 4],
        vec![3],
        vec![
            vec![vec![1, 2, 1, 3]],
            vec![vec![1, 1, 2, 2]],
            vec![vec![2, 3, 3, 3]],
            vec![vec![3, 1, 2, 1]],
        ],
        vec![0, 0, 1, 1],
        vec!["X".to_string(), "Y".to_string()],
    )
    .unwrap();
    let mut config = base_config();
    config.k = 2;
    let outcome = Driver::new(&data, &config).run(None).unwrap();
    assert_eq!(outcome.mean_q_gene.len(), data.n_gene_copies());
    assert_eq!(outcome.mean_q_individual.len(), 4);
}

/// S5-equivalent: two independently-seeded chains replay deterministically
/// when run again from the same seeds, whether executed sequentially or
/// through the parallel [`run_many`] helper — chains must not leak any
/// shared mutable state into each other (spec.md §5).
#[test]
fn replaying_a_batch_of_chains_is_deterministic() {
    let data = three_pop_dataset();
    let mut config_a = base_config();
    config_a.seed = 11;
    let mut config_b = base_config();
    config_b.seed = 12;
    config_b.k = 3;

    let configs = vec![config_a.clone(), config_b.clone()];
    let first_pass = run_many(&data, &configs);
    let second_pass = run_many(&data, &configs);

    for (first, second) in first_pass.iter().zip(second_pass.iter()) {
        let first = first.as_ref().unwrap();
        let second = second.as_ref().unwrap();
        assert_eq!(first.mean_q_gene, second.mean_q_gene);
        assert_eq!(first.final_alpha, second.final_alpha);
    }
}

/// S6-equivalent: thermodynamic integration support — running the same
/// chain at decreasing beta (flattening the allele-frequency likelihood
/// contribution toward the prior) should not change the Q-matrix's validity
/// (each row still sums to one) even as beta departs from 1.
#[test]
fn beta_below_one_still_produces_valid_q_rows() {
    let data = three_pop_dataset();
    let mut config = base_config();
    config.beta = 0.3;
    let outcome = Driver::new(&data, &config).run(None).unwrap();
    for row in &outcome.mean_q_gene {
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}

/// Exercises `fix_labels = false`: produceQmatrix/alignment/accumulation
/// are all gated on `fixLabels`, so with it off the chain still runs to
/// completion and still reports a finite harmonic-mean evidence and final
/// alpha, but the Q matrix is never produced or accumulated — mean_q_gene
/// rows stay at zero rather than summing to one.
#[test]
fn disabling_label_alignment_skips_q_accumulation() {
    let data = three_pop_dataset();
    let mut config = base_config();
    config.fix_labels = false;
    let outcome = Driver::new(&data, &config).run(None).unwrap();
    for row in &outcome.mean_q_gene {
        let sum: f64 = row.iter().sum();
        assert!(sum.abs() < 1e-12);
    }
    assert!(outcome.harmonic_mean_log_evidence.is_finite());
}

/// A configuration error (here, alpha outside its bound) must be caught
/// before any sampling work happens, and must not poison other chains in
/// the same batch (spec.md §7: "these abort the chain they occur in").
#[test]
fn invalid_chain_in_a_batch_does_not_affect_its_siblings() {
    let data = three_pop_dataset();
    let good = base_config();
    let mut bad = base_config();
    bad.alpha = 20.0;
    let configs = vec![good, bad];
    let outcomes = run_many(&data, &configs);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[1].is_err());
}
