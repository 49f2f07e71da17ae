use crate::stereo::{group::BOND_SIDES, RubricSet};
use crate::{BondClass, DotPath, HashError, Molecule, RingBlocks};
use tracing::*;

/// The outcome of priority refinement.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Final rank per atom, a permutation of `1..=N`.
    pub priority: Vec<usize>,
    /// Ranks as they stood when refinement first stalled (or at convergence);
    /// atoms that share a value are symmetry equivalent.
    pub equivalence: Vec<usize>,
    pub iterations: usize,
    pub bumps: usize,
    /// The rubrics that survived deactivation.
    pub rubrics: RubricSet,
}

/// Assigns dense 1-based ranks to a list of signatures: equal signatures
/// share a rank, and smaller signatures get smaller ranks.
pub fn assign_priority<T: Ord>(signatures: &[T]) -> Vec<usize> {
    let mut sorted: Vec<&T> = signatures.iter().collect();
    sorted.sort();
    sorted.dedup();
    signatures
        .iter()
        .map(|sig| sorted.binary_search(&sig).map_or(0, |i| i + 1))
        .collect()
}

pub fn distinct(priority: &[usize]) -> usize {
    let mut values = priority.to_vec();
    values.sort_unstable();
    values.dedup();
    values.len()
}

/// A breadth-first walk outward from one atom: each shell lists the
/// `(bond class, rank)` pairs of the bonds that first reach it, sorted.
pub type Walk = Vec<Vec<(usize, usize)>>;

/// Iterative refinement of atom priorities.
///
/// Ranks start at `(atomic number, hydrogens, charge numerator, charge
/// denominator)` and are refined from neighbour ranks until every atom is
/// distinct. When refinement stalls on a genuine symmetry, the equivalence
/// classes are frozen, degenerate rubrics are switched off, and the lowest
/// tied group is broken by its breadth-first walks.
pub struct PriorityEngine<'a> {
    mol: &'a Molecule,
    dot: &'a DotPath,
    rings: &'a RingBlocks,
    rubrics: RubricSet,
    /// `(neighbour, bond class key)` per atom
    adjacency: Vec<Vec<(usize, usize)>>,
    /// bonds with a bond-sides rubric touching each atom
    sided: Vec<Vec<usize>>,
}

impl<'a> PriorityEngine<'a> {
    pub fn new(mol: &'a Molecule, dot: &'a DotPath, rings: &'a RingBlocks, rubrics: RubricSet) -> Self {
        let adjacency = (0..mol.atom_count())
            .map(|n| {
                mol.atom_bonds(n)
                    .into_iter()
                    .map(|b| (mol.bond_other(b, n), class_key(dot.bond_class(b))))
                    .collect()
            })
            .collect();
        let mut sided = vec![vec![]; mol.atom_count()];
        for b in (0..mol.bond_count()).filter(|&b| rubrics.bond(b).is_some()) {
            let (a1, a2) = mol.bond_endpoints(b);
            sided[a1].push(b);
            sided[a2].push(b);
        }
        Self { mol, dot, rings, rubrics, adjacency, sided }
    }

    pub fn seed(&self) -> Vec<usize> {
        let seeds: Vec<(u32, u32, i32, i32)> = (0..self.mol.atom_count())
            .map(|n| {
                let atom = self.mol.atom(n);
                let (numer, denom) = self.dot.charge(n);
                (atom.atomic_number(), atom.hydrogens, numer, denom)
            })
            .collect();
        assign_priority(&seeds)
    }

    /// Runs refinement to completion.
    ///
    /// # Returns
    /// The final ranking, or [`HashError::NonTermination`] if the pass budget
    /// of `N + 1` is exhausted.
    pub fn run(mut self) -> Result<Ranking, HashError> {
        let n = self.mol.atom_count();
        let limit = n + 1;
        let mut priority = self.seed();
        let mut equivalence: Option<Vec<usize>> = None;
        let mut iterations = 0;
        let mut bumps = 0;

        loop {
            iterations += 1;
            if iterations > limit {
                return Err(HashError::NonTermination(limit));
            }

            let before = distinct(&priority);
            priority = self.refine(&priority, equivalence.is_some());
            let after = distinct(&priority);
            trace!("pass {iterations}: {before} -> {after} distinct of {n}");

            if after == n {
                break;
            }
            if after > before {
                continue;
            }
            if equivalence.is_none() {
                self.rubrics.deactivate(self.mol, self.rings, &priority);
                debug!(
                    "froze equivalence with {after} classes, {} rubrics active",
                    self.rubrics.active_count()
                );
                equivalence = Some(priority.clone());
                continue;
            }
            self.bump(&mut priority);
            bumps += 1;
        }

        let equivalence = match equivalence {
            Some(eqv) => eqv,
            None => {
                self.rubrics.deactivate(self.mol, self.rings, &priority);
                priority.clone()
            }
        };
        debug!("converged after {iterations} passes and {bumps} bumps");

        Ok(Ranking {
            priority,
            equivalence,
            iterations,
            bumps,
            rubrics: self.rubrics,
        })
    }

    fn refine(&self, priority: &[usize], stereo: bool) -> Vec<usize> {
        let signatures: Vec<Vec<usize>> = (0..priority.len())
            .map(|n| self.signature(n, priority, stereo))
            .collect();
        assign_priority(&signatures)
    }

    /// `[rank, degree, (class, rank)...]`, where the neighbour pairs are
    /// sorted, or laid out in the smallest arrangement the atom's rubric
    /// allows when stereochemistry is in play.
    fn signature(&self, atom: usize, priority: &[usize], stereo: bool) -> Vec<usize> {
        let adjacency = &self.adjacency[atom];
        let mut sig = vec![priority[atom], adjacency.len()];

        let rubric = if stereo { self.rubrics.atom(atom) } else { None };
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(adjacency.len() + 1);
        let mut free: Vec<(usize, usize)> = Vec::new();
        match rubric {
            Some(rubric) => {
                let slots: Vec<(usize, usize)> = rubric
                    .ligands()
                    .iter()
                    .map(|l| match l {
                        Some(nbr) => {
                            let class = adjacency.iter().find(|(a, _)| a == nbr).map_or(0, |(_, c)| *c);
                            (class, priority[*nbr])
                        }
                        None => (0, 0),
                    })
                    .collect();
                pairs.extend(rubric.group().minimise(&slots).0);
                let listed = rubric.ligands();
                free.extend(
                    adjacency
                        .iter()
                        .filter(|(a, _)| !listed.contains(&Some(*a)))
                        .map(|&(a, c)| (c, priority[a])),
                );
            }
            None => free.extend(adjacency.iter().map(|&(a, c)| (c, priority[a]))),
        }
        free.sort_unstable();
        pairs.extend(free);
        for (class, rank) in pairs {
            sig.push(class);
            sig.push(rank);
        }

        if stereo {
            let mut sides: Vec<Vec<usize>> = self.sided[atom]
                .iter()
                .filter_map(|&b| self.rubrics.bond(b))
                .map(|rubric| {
                    let ranks: Vec<usize> = rubric.ligands().iter().map(|l| l.map_or(0, |a| priority[a])).collect();
                    BOND_SIDES.minimise(&ranks).0
                })
                .collect();
            sides.sort();
            for side in sides {
                sig.extend(side);
            }
        }
        sig
    }

    /// Breaks the lowest tie: the candidate with the smallest walk keeps its
    /// rank, and every other atom at or above the tied rank moves up by one.
    fn bump(&self, priority: &mut [usize]) {
        let mut order: Vec<usize> = (0..priority.len()).collect();
        order.sort_by_key(|&i| priority[i]);

        let Some(start) = (0..order.len().saturating_sub(1)).find(|&i| priority[order[i]] == priority[order[i + 1]])
        else {
            return;
        };
        let rank = priority[order[start]];
        let group: Vec<usize> = order[start..].iter().copied().take_while(|&a| priority[a] == rank).collect();

        let mut winner = group[0];
        let mut best = self.walk(winner, priority);
        for &candidate in &group[1..] {
            let walk = self.walk(candidate, priority);
            if walk < best {
                winner = candidate;
                best = walk;
            }
        }
        trace!("bumping {} atoms tied at rank {rank}, atom {winner} stays", group.len());

        for &a in &order[start..] {
            if a != winner {
                priority[a] += 1;
            }
        }
    }

    pub fn walk(&self, atom: usize, priority: &[usize]) -> Walk {
        let mut seen = vec![false; priority.len()];
        seen[atom] = true;
        let mut frontier = vec![atom];
        let mut walk: Walk = Vec::new();

        while !frontier.is_empty() {
            let mut shell = Vec::new();
            let mut next = Vec::new();
            for &a in &frontier {
                for &(nbr, class) in &self.adjacency[a] {
                    if seen[nbr] {
                        continue;
                    }
                    shell.push((class, priority[nbr]));
                    next.push(nbr);
                }
            }
            for &nbr in &next {
                seen[nbr] = true;
            }
            next.sort_unstable();
            next.dedup();
            if shell.is_empty() {
                break;
            }
            shell.sort_unstable();
            walk.push(shell);
            frontier = next;
        }
        walk
    }
}

/// Bond class as a signature key; 0 is reserved for phantom ligands.
pub fn class_key(class: BondClass) -> usize {
    class.ordinal() + 1
}
