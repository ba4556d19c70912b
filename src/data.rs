use crate::utils::errors::{ChainError, ChainResult};

/// Coordinates of a single gene copy in the canonical linear order: the
/// individual it belongs to, the locus it was observed at, and its ploidy
/// slot within that individual/locus.
///
/// spec.md §3: "a canonical linear order indexes gene copies by scanning
/// individuals in order, then loci in order, then ploidy slots in order.
/// This order is fixed for the life of a chain."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneCopyRef {
    pub individual: usize,
    pub locus: usize,
    pub slot: usize,
}

/// The fixed, read-only inputs to a chain: genotype observations, ploidy,
/// per-locus allele cardinality, and the population labeling used only for
/// the final population-level Q-matrix summary.
///
/// `0` in `observations` denotes a missing gene copy throughout, per
/// spec.md §3.
#[derive(Debug, Clone)]
pub struct GenotypeData {
    n_individuals: usize,
    n_loci: usize,
    ploidy: Vec<usize>,
    n_alleles: Vec<usize>,
    /// `observations[i][l][p]`, `p` in `0..ploidy[i]`.
    observations: Vec<Vec<Vec<u32>>>,
    pop_index: Vec<usize>,
    unique_pops: Vec<String>,
    /// Precomputed `g -> (individual, locus, slot)` mapping (spec.md §9:
    /// "represent it explicitly as a precomputed mapping ... rather than
    /// recomputed with a nested counter").
    gene_copy_index: Vec<GeneCopyRef>,
    /// `[i]` -> first gene-copy index belonging to individual `i`, plus one
    /// trailing sentinel equal to the total gene copy count, so that
    /// individual `i`'s gene copies are `individual_offsets[i]..individual_offsets[i+1]`.
    individual_offsets: Vec<usize>,
}

impl GenotypeData {
    pub fn new(
        ploidy: Vec<usize>,
        n_alleles: Vec<usize>,
        observations: Vec<Vec<Vec<u32>>>,
        pop_index: Vec<usize>,
        unique_pops: Vec<String>,
    ) -> ChainResult<GenotypeData> {
        let n_individuals = ploidy.len();
        let n_loci = n_alleles.len();

        if n_individuals == 0 || n_loci == 0 {
            return Err(ChainError::Configuration(
                "genotype data must have at least one individual and one locus".to_string(),
            ));
        }
        if ploidy.iter().any(|p| *p == 0) {
            return Err(ChainError::Configuration(
                "every individual must have ploidy >= 1".to_string(),
            ));
        }
        if n_alleles.iter().any(|j| *j == 0) {
            return Err(ChainError::Configuration(
                "every locus must have at least one allele value".to_string(),
            ));
        }
        if observations.len() != n_individuals {
            return Err(ChainError::Configuration(format!(
                "expected {} individuals in observations, got {}",
                n_individuals,
                observations.len()
            )));
        }
        for (i, individual) in observations.iter().enumerate() {
            if individual.len() != n_loci {
                return Err(ChainError::Configuration(format!(
                    "individual {} has {} loci, expected {}",
                    i,
                    individual.len(),
                    n_loci
                )));
            }
            for (l, locus) in individual.iter().enumerate() {
                if locus.len() != ploidy[i] {
                    return Err(ChainError::Configuration(format!(
                        "individual {} locus {} has {} gene copies, expected ploidy {}",
                        i,
                        l,
                        locus.len(),
                        ploidy[i]
                    )));
                }
                for allele in locus {
                    if *allele as usize > n_alleles[l] {
                        return Err(ChainError::Configuration(format!(
                            "individual {} locus {} carries allele {} but J[{}] = {}",
                            i, l, allele, l, n_alleles[l]
                        )));
                    }
                }
            }
        }
        if pop_index.len() != n_individuals {
            return Err(ChainError::Configuration(
                "pop_index must have one entry per individual".to_string(),
            ));
        }
        if pop_index.iter().any(|p| *p >= unique_pops.len()) {
            return Err(ChainError::Configuration(
                "pop_index references a population outside unique_pops".to_string(),
            ));
        }

        let mut gene_copy_index = Vec::new();
        let mut individual_offsets = Vec::with_capacity(n_individuals + 1);
        for i in 0..n_individuals {
            individual_offsets.push(gene_copy_index.len());
            for l in 0..n_loci {
                for p in 0..ploidy[i] {
                    gene_copy_index.push(GeneCopyRef {
                        individual: i,
                        locus: l,
                        slot: p,
                    });
                }
            }
        }
        individual_offsets.push(gene_copy_index.len());

        Ok(GenotypeData {
            n_individuals,
            n_loci,
            ploidy,
            n_alleles,
            observations,
            pop_index,
            unique_pops,
            gene_copy_index,
            individual_offsets,
        })
    }

    pub fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    pub fn n_loci(&self) -> usize {
        self.n_loci
    }

    pub fn ploidy(&self, individual: usize) -> usize {
        self.ploidy[individual]
    }

    pub fn n_alleles(&self, locus: usize) -> usize {
        self.n_alleles[locus]
    }

    /// Total number of gene copies, `G = sum_i ploidy[i] * L`.
    pub fn n_gene_copies(&self) -> usize {
        self.gene_copy_index.len()
    }

    pub fn gene_copy(&self, g: usize) -> GeneCopyRef {
        self.gene_copy_index[g]
    }

    pub fn gene_copy_refs(&self) -> &[GeneCopyRef] {
        &self.gene_copy_index
    }

    /// Allele observed at this gene copy, `0` meaning missing.
    pub fn allele_at(&self, g: usize) -> u32 {
        let r = self.gene_copy_index[g];
        self.observations[r.individual][r.locus][r.slot]
    }

    pub fn is_missing(&self, g: usize) -> bool {
        self.allele_at(g) == 0
    }

    /// Half-open range of gene-copy indices belonging to `individual`.
    pub fn individual_gene_copy_range(&self, individual: usize) -> std::ops::Range<usize> {
        self.individual_offsets[individual]..self.individual_offsets[individual + 1]
    }

    pub fn pop_index(&self, individual: usize) -> usize {
        self.pop_index[individual]
    }

    pub fn unique_pops(&self) -> &[String] {
        &self.unique_pops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> GenotypeData {
        // N=2, L=1, ploidy=[1,1], J=[2], data = [[[1]], [[2]]]
        GenotypeData::new(
            vec![1, 1],
            vec![2],
            vec![vec![vec![1]], vec![vec![2]]],
            vec![0, 0],
            vec!["pop0".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn canonical_order_scans_individual_then_locus_then_slot() {
        let data = GenotypeData::new(
            vec![2, 1],
            vec![2, 3],
            vec![
                vec![vec![1, 2], vec![1]],
                vec![vec![2], vec![2]],
            ],
            vec![0, 0],
            vec!["pop0".to_string()],
        )
        .unwrap();
        assert_eq!(data.n_gene_copies(), 3);
        assert_eq!(
            data.gene_copy(0),
            GeneCopyRef {
                individual: 0,
                locus: 0,
                slot: 0
            }
        );
        assert_eq!(
            data.gene_copy(1),
            GeneCopyRef {
                individual: 0,
                locus: 0,
                slot: 1
            }
        );
        assert_eq!(
            data.gene_copy(2),
            GeneCopyRef {
                individual: 0,
                locus: 1,
                slot: 0
            }
        );
        assert_eq!(data.individual_gene_copy_range(1), 3..4);
    }

    #[test]
    fn rejects_allele_exceeding_locus_cardinality() {
        let err = GenotypeData::new(
            vec![1],
            vec![2],
            vec![vec![vec![3]]],
            vec![0],
            vec!["pop0".to_string()],
        );
        assert!(err.is_err());
    }

    #[test]
    fn toy_dataset_has_two_gene_copies() {
        assert_eq!(toy().n_gene_copies(), 2);
    }
}
