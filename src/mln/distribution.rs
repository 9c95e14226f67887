//! Vocabulary size distributions over contemporary and ancestral
//! populations.
//!
//! The contemporary distribution counts, per taxon, the inferred characters
//! it attests; the ancestral distribution counts, per interior node, the
//! characters whose projected state is present. Comparable distributions
//! are a sanity check on a reconstruction: a mode that inflates ancestral
//! vocabularies far beyond the contemporary ones is overfitting origins.

use crate::mln::pap::PapIndex;
use crate::mln::{GlsSet, Mln};
use statrs::distribution::{ContinuousCDF, Normal};

/// Vocabulary size per taxon, in canonical taxon order. Singletons are
/// excluded, matching what the solvers see.
pub fn contemporary_sizes(paps: &PapIndex) -> Vec<usize> {
    let mut sizes = vec![0; paps.taxa.len()];
    for &cog in &paps.cogs {
        for (taxon, &p) in paps.pap(cog).iter().enumerate() {
            if p >= 1 {
                sizes[taxon] += 1;
            }
        }
    }
    sizes
}

/// Vocabulary size per interior node, in the order of
/// [`Mln::ancestral_nodes`].
pub fn ancestral_sizes(mln: &Mln, set: &GlsSet) -> Vec<usize> {
    let mut sizes = vec![0; mln.ancestral_nodes().len()];
    for gls in set.scenarios.values() {
        for (node, state) in mln.ancestral_states(gls).iter().enumerate() {
            if *state == 1 {
                sizes[node] += 1;
            }
        }
    }
    sizes
}

/// Two-sample Mann-Whitney comparison: the smaller U statistic, the
/// tie-corrected normal approximation z, and the one-sided p-value.
#[derive(Clone, Copy, Debug)]
pub struct MannWhitney {
    pub u: f64,
    pub z: f64,
    pub p: f64,
}

pub fn mann_whitney(first: &[usize], second: &[usize]) -> MannWhitney {
    let n1 = first.len() as f64;
    let n2 = second.len() as f64;
    let mut pooled: Vec<(usize, bool)> = first
        .iter()
        .map(|&v| (v, true))
        .chain(second.iter().map(|&v| (v, false)))
        .collect();
    pooled.sort_by_key(|&(v, _)| v);

    // midranks for ties, and the tie correction term
    let n = pooled.len();
    let mut ranks = vec![0.0; n];
    let mut ties = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && pooled[j].0 == pooled[i].0 {
            j += 1;
        }
        let rank = (i + 1 + j) as f64 / 2.0;
        for r in ranks.iter_mut().take(j).skip(i) {
            *r = rank;
        }
        let t = (j - i) as f64;
        ties += t * t * t - t;
        i = j;
    }

    let r1: f64 = pooled
        .iter()
        .zip(&ranks)
        .filter(|(entry, _)| entry.1)
        .map(|(_, &rank)| rank)
        .sum();
    let u1 = n1 * n2 + n1 * (n1 + 1.0) / 2.0 - r1;
    let u2 = n1 * n2 - u1;
    let total = n1 + n2;
    let correction = 1.0 - ties / (total * total * total - total);
    let sd = (correction * n1 * n2 * (total + 1.0) / 12.0).sqrt();
    let z = if sd > 0.0 {
        ((u1.max(u2) - n1 * n2 / 2.0) / sd).abs()
    } else {
        0.0
    };
    let p = if sd > 0.0 {
        Normal::new(0.0, 1.0)
            .map(|normal| 1.0 - normal.cdf(z))
            .unwrap_or(1.0)
    } else {
        1.0
    };
    MannWhitney {
        u: u1.min(u2),
        z,
        p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mln::pap::Wordlist;
    use crate::mln::tree::Tree;
    use crate::mln::Mode;

    #[test]
    fn test_separated_samples() {
        let m = mann_whitney(&[1, 2, 3], &[4, 5, 6]);
        assert!((m.u - 0.0).abs() < 1e-9);
        assert!((m.z - 1.9640).abs() < 1e-3);
        assert!((m.p - 0.0248).abs() < 1e-3);
    }

    #[test]
    fn test_identical_samples() {
        let m = mann_whitney(&[1, 1], &[1, 1]);
        assert!((m.z - 0.0).abs() < 1e-9);
        assert!((m.p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_vocabulary_sizes() {
        let tree: Tree = "((a,b),(c,d));".parse().unwrap();
        let wordlist: Wordlist = "\
ID\tConcept\tCogID\tTaxon
1\thand\t1\ta
2\thand\t1\tb
3\thand\t2\tc
4\tfoot\t3\ta
5\tfoot\t3\td
"
        .parse()
        .unwrap();
        let paps = PapIndex::new(&wordlist);
        let mln = Mln::new(tree, paps).unwrap();
        // singleton "2:hand" does not count towards c's vocabulary
        assert_eq!(contemporary_sizes(mln.paps()), vec![2, 1, 0, 1]);

        let set = mln.gls_set(&Mode::Weighted { gain: 1, loss: 1 });
        // "1:hand" lives at edge.0 only; "3:foot" originates at the tips a
        // and d, so no interior node carries it
        assert_eq!(ancestral_sizes(&mln, &set), vec![0, 1, 0]);
    }
}
