use anyhow::Context;
use log::info;

use popstruct::config::{ChainConfig, OutputToggles};
use popstruct::data::GenotypeData;
use popstruct::sampler::driver::Driver;

/// Small in-process demonstration dataset: two putative populations of
/// diploid individuals genotyped at three loci, with one missing gene copy
/// to exercise that code path. There is no file-format reader in this
/// crate (spec.md Non-goals) — a real caller constructs [`GenotypeData`]
/// from whatever input it already has in memory.
fn demo_dataset() -> anyhow::Result<GenotypeData> {
    let ploidy = vec![2, 2, 2, 2, 2, 2];
    let n_alleles = vec![3, 2, 4];
    let observations = vec![
        vec![vec![1, 2], vec![1, 1], vec![3, 4]],
        vec![vec![1, 1], vec![1, 2], vec![2, 4]],
        vec![vec![2, 3], vec![2, 2], vec![1, 2]],
        vec![vec![3, 3], vec![1, 2], vec![0, 2]], // one missing gene copy
        vec![vec![1, 3], vec![2, 2], vec![1, 3]],
        vec![vec![2, 2], vec![1, 1], vec![4, 4]],
    ];
    let pop_index = vec![0, 0, 0, 1, 1, 1];
    let unique_pops = vec!["north".to_string(), "south".to_string()];
    GenotypeData::new(ploidy, n_alleles, observations, pop_index, unique_pops)
        .context("failed to build demo genotype dataset")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let data = demo_dataset()?;
    info!(
        "loaded {} individuals, {} loci, {} gene copies",
        data.n_individuals(),
        data.n_loci(),
        data.n_gene_copies()
    );

    let config = ChainConfig {
        k: 2,
        lambda: 1.0,
        alpha: 1.0,
        alpha_prop_sd: 0.25,
        fix_alpha: false,
        beta: 1.0,
        burnin: 500,
        samples: 1000,
        thinning: 2,
        fix_labels: true,
        draw_freqs: false,
        seed: 1,
        use_log_table: true,
        output: OutputToggles::default(),
    };

    let outcome = Driver::new(&data, &config)
        .run(None)
        .context("chain failed")?;

    info!("final alpha = {:.4}", outcome.final_alpha);
    info!(
        "harmonic-mean log evidence = {:.4}",
        outcome.harmonic_mean_log_evidence
    );
    info!(
        "mean joint log-likelihood = {:.4} (variance {:.4})",
        outcome.mean_log_like, outcome.log_like_variance
    );

    for (i, row) in outcome.mean_q_individual.iter().enumerate() {
        println!(
            "individual {i} ({}): {:?}",
            data.unique_pops()[data.pop_index(i)],
            row
        );
    }
    for (p, row) in outcome.mean_q_population.iter().enumerate() {
        println!("population {}: {:?}", data.unique_pops()[p], row);
    }

    Ok(())
}
