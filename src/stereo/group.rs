use lazy_static::lazy_static;
use std::collections::BTreeSet;

/// A finite group of slot permutations, closed under composition.
///
/// Applying `perm` to an arrangement `a` gives `[a[perm[0]], a[perm[1]], ..]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationGroup {
    pub size: usize,
    pub perms: Vec<Vec<usize>>,
}

impl PermutationGroup {
    /// Closure of the generators under composition, identity first and the
    /// rest in lexicographic order.
    pub fn generate(size: usize, generators: &[&[usize]]) -> Self {
        let identity: Vec<usize> = (0..size).collect();
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        seen.insert(identity.clone());
        let mut frontier = vec![identity.clone()];

        while let Some(perm) = frontier.pop() {
            for gen in generators {
                let next: Vec<usize> = gen.iter().map(|&g| perm[g]).collect();
                if seen.insert(next.clone()) {
                    frontier.push(next);
                }
            }
        }

        let mut perms = vec![identity.clone()];
        perms.extend(seen.into_iter().filter(|p| *p != identity));
        Self { size, perms }
    }

    pub fn apply<T: Copy>(perm: &[usize], items: &[T]) -> Vec<T> {
        perm.iter().map(|&i| items[i]).collect()
    }

    /// The smallest rearrangement of `items` the group allows, together with
    /// the permutation that produced it. Ties keep the earliest permutation.
    pub fn minimise<T: Copy + Ord>(&self, items: &[T]) -> (Vec<T>, &[usize]) {
        let mut best: Option<(Vec<T>, &[usize])> = None;
        for perm in &self.perms {
            let candidate = Self::apply(perm, items);
            let better = best.as_ref().map_or(true, |(current, _)| candidate < *current);
            if better {
                best = Some((candidate, perm.as_slice()));
            }
        }
        // the group always holds the identity
        best.unwrap_or_else(|| (items.to_vec(), &[][..]))
    }
}

lazy_static! {
    pub static ref TETRAHEDRAL: PermutationGroup =
        PermutationGroup::generate(4, &[&[1, 2, 0, 3], &[1, 0, 3, 2]]);
    pub static ref SQUARE_PLANAR: PermutationGroup =
        PermutationGroup::generate(4, &[&[1, 2, 3, 0], &[0, 3, 2, 1]]);
    pub static ref TRIGONAL_BIPYRAMIDAL: PermutationGroup =
        PermutationGroup::generate(5, &[&[1, 2, 0, 3, 4], &[0, 2, 1, 4, 3]]);
    pub static ref OCTAHEDRAL: PermutationGroup =
        PermutationGroup::generate(6, &[&[1, 2, 3, 0, 4, 5], &[0, 5, 2, 4, 1, 3]]);
    pub static ref BOND_SIDES: PermutationGroup =
        PermutationGroup::generate(4, &[&[1, 0, 3, 2], &[2, 3, 0, 1]]);
}

/// Parity of a permutation of `0..n`: 0 when even, 1 when odd.
pub fn permutation_parity(perm: &[usize]) -> usize {
    let mut inversions = 0;
    for i in 0..perm.len() {
        for j in i + 1..perm.len() {
            if perm[i] > perm[j] {
                inversions += 1;
            }
        }
    }
    inversions % 2
}

/// Indices that sort `values` ascending; equal values keep their order.
pub fn argsort<T: Ord>(values: &[T]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].cmp(&values[b]));
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_orders() {
        assert_eq!(TETRAHEDRAL.perms.len(), 12);
        assert_eq!(SQUARE_PLANAR.perms.len(), 8);
        assert_eq!(TRIGONAL_BIPYRAMIDAL.perms.len(), 6);
        assert_eq!(OCTAHEDRAL.perms.len(), 24);
        assert_eq!(BOND_SIDES.perms.len(), 4);
        for group in [&*TETRAHEDRAL, &*SQUARE_PLANAR, &*TRIGONAL_BIPYRAMIDAL, &*OCTAHEDRAL, &*BOND_SIDES] {
            assert_eq!(group.perms[0], (0..group.size).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_tetrahedral_is_proper() {
        // every rotation of a tetrahedron is an even permutation
        for perm in &TETRAHEDRAL.perms {
            assert_eq!(permutation_parity(perm), 0);
        }
    }

    #[test]
    fn test_octahedral_keeps_trans_pairs() {
        // slots 0/2, 1/3 and 4/5 are trans; rotations map pairs onto pairs
        let pairs = [(0, 2), (1, 3), (4, 5)];
        let is_pair = |a: usize, b: usize| pairs.iter().any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b));
        for perm in &OCTAHEDRAL.perms {
            for &(a, b) in &pairs {
                assert!(is_pair(perm[a], perm[b]), "{perm:?}");
            }
        }
    }

    #[test]
    fn test_bipyramid_keeps_axis() {
        for perm in &TRIGONAL_BIPYRAMIDAL.perms {
            let mut axial = [perm[3], perm[4]];
            axial.sort();
            assert_eq!(axial, [3, 4]);
        }
    }

    #[test]
    fn test_minimise() {
        let (best, perm) = TETRAHEDRAL.minimise(&[3, 1, 2, 4]);
        assert_eq!(best[0], 1);
        assert_eq!(PermutationGroup::apply(perm, &[3, 1, 2, 4]), best);
        // mirror images cannot be rotated onto each other
        let (mirror, _) = TETRAHEDRAL.minimise(&[1, 3, 2, 4]);
        assert_ne!(best, mirror);
    }

    #[test]
    fn test_argsort_and_parity() {
        assert_eq!(argsort(&[5, 1, 3, 1]), vec![1, 3, 2, 0]);
        assert_eq!(permutation_parity(&[0, 1, 2, 3]), 0);
        assert_eq!(permutation_parity(&[1, 0, 2, 3]), 1);
        assert_eq!(permutation_parity(&[1, 2, 0]), 0);
    }
}
