//! Serialisation of a finished ranking into the hash string.
//!
//! The string has two halves separated by `;`. The first lists atom labels
//! in priority order, run-length collapsed (`3*Cl`). The second is a set of
//! walks that together cover every bond exactly once, written with 1-based
//! positions from the first half and a bond class symbol between each pair.

use crate::canon::Ranking;
use crate::stereo::{argsort, chelate_groups, permutation_parity, Geometry, Ligand, PermutationGroup, Rubric};
use crate::{DotPath, HashError, Molecule, RingBlocks};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use tracing::*;

type Score = (usize, usize, usize);

pub struct Composer<'a> {
    mol: &'a Molecule,
    dot: &'a DotPath,
    rings: &'a RingBlocks,
    ranking: &'a Ranking,
    /// ring-block labels propagated outward from stereocentres already encoded
    walkouts: Vec<Vec<usize>>,
}

impl<'a> Composer<'a> {
    pub fn new(mol: &'a Molecule, dot: &'a DotPath, rings: &'a RingBlocks, ranking: &'a Ranking) -> Self {
        Self { mol, dot, rings, ranking, walkouts: vec![] }
    }

    pub fn compose(mut self) -> Result<String, HashError> {
        let na = self.mol.atom_count();
        let order = argsort(&self.ranking.priority);
        let mut position = vec![0; na];
        for (i, &atom) in order.iter().enumerate() {
            position[atom] = i + 1;
        }

        let parities = self.parities(&order)?;
        let labels: Vec<String> = (0..na).map(|n| self.atom_label(n, &parities[n])).collect();

        let mut runs: Vec<String> = Vec::new();
        let mut i = 0;
        while i < order.len() {
            let label = &labels[order[i]];
            let mut len = 1;
            while i + len < order.len() && labels[order[i + len]] == *label {
                len += 1;
            }
            runs.push(if len > 1 { format!("{len}*{label}") } else { label.clone() });
            i += len;
        }

        let walks: Vec<String> = self
            .walk_paths()?
            .iter()
            .map(|path| {
                let mut text = position[path[0]].to_string();
                for step in path[1..].chunks(2) {
                    text.push_str(self.dot.bond_class(step[0]).symbol());
                    text.push_str(&position[step[1]].to_string());
                }
                text
            })
            .collect();

        Ok(format!("{};{}", runs.join(","), walks.join(",")))
    }

    fn atom_label(&self, atom: usize, parity: &str) -> String {
        let a = self.mol.atom(atom);
        let mut label = a.symbol.clone();
        if a.hydrogens > 0 {
            label.push('H');
        }
        if a.hydrogens > 1 {
            label.push_str(&a.hydrogens.to_string());
        }
        let (numer, denom) = self.dot.charge(atom);
        if numer != 0 {
            label.push_str(&format!("+{numer}"));
            if denom != 1 {
                label.push_str(&format!(":{denom}"));
            }
        }
        if !parity.is_empty() {
            label.push('!');
            label.push_str(parity);
        }
        label
    }

    /// Parity tags per atom. Centres are visited in priority order so that
    /// ring-block walkouts accumulate the same way under any numbering; a
    /// bond's tag goes on its lower-priority end.
    fn parities(&mut self, order: &[usize]) -> Result<Vec<String>, HashError> {
        let ranking = self.ranking;
        let priority = &ranking.priority;
        let rubrics = &ranking.rubrics;
        let mut tags = vec![String::new(); self.mol.atom_count()];

        for &atom in order {
            if let Some(rubric) = rubrics.atom(atom) {
                let tag = self.parity(atom, rubric, true)?;
                tags[atom].push_str(&tag);
            }

            let mut bonds: Vec<(usize, usize)> = self
                .mol
                .atom_bonds(atom)
                .into_iter()
                .filter(|&b| rubrics.bond(b).is_some())
                .map(|b| (priority[self.mol.bond_other(b, atom)], b))
                .filter(|&(other, _)| other > priority[atom])
                .collect();
            bonds.sort_unstable();
            for (_, b) in bonds {
                if let Some(rubric) = rubrics.bond(b) {
                    let tag = self.parity(atom, rubric, false)?;
                    tags[atom].push_str(&tag);
                }
            }
        }
        Ok(tags)
    }

    /// Picks the lowest scoring arrangement of `rubric` and encodes where its
    /// slots fall in score order.
    fn parity(&mut self, centre: usize, rubric: &Rubric, chelated: bool) -> Result<String, HashError> {
        let ranking = self.ranking;
        let eqv = &ranking.equivalence;
        let na = self.mol.atom_count();
        let geometry = rubric.geometry();

        let chelate = if chelated {
            chelate_groups(self.mol, self.rings, centre)
        } else {
            vec![0; na]
        };
        // chelate ids renumbered by first appearance in priority order
        let mut group_of: HashMap<usize, usize> = HashMap::new();
        for atom in argsort(&ranking.priority) {
            if chelate[atom] > 0 {
                let next = group_of.len() + 1;
                group_of.entry(chelate[atom]).or_insert(next);
            }
        }
        let mut previous = vec![0; na];
        for walkout in &self.walkouts {
            for (p, w) in previous.iter_mut().zip(walkout) {
                *p += w;
            }
        }

        let score = |l: &Ligand| -> Score {
            match l {
                Some(a) => (eqv[*a], previous[*a], group_of.get(&chelate[*a]).copied().unwrap_or(0)),
                None => (0, 0, 0),
            }
        };

        let mut best: Option<(Vec<Score>, Vec<Ligand>)> = None;
        for perm in &geometry.group().perms {
            let arrangement = PermutationGroup::apply(perm, rubric.ligands());
            let scores: Vec<Score> = geometry.score_order().iter().map(|&i| score(&arrangement[i])).collect();
            if best.as_ref().map_or(true, |(s, _)| scores < *s) {
                best = Some((scores, arrangement));
            }
        }
        let Some((scores, arrangement)) = best else {
            return Ok(String::new());
        };
        self.walk_stereo_outward(centre, &arrangement);

        let parity = argsort(&scores);
        trace!("{} parity at atom {centre}: {parity:?} from {scores:?}", geometry.name());
        let tag = match geometry {
            Geometry::Tetrahedral => format!("t{}", permutation_parity(&parity)),
            Geometry::BondSides => format!("s{}", permutation_parity(&parity)),
            Geometry::SquarePlanar => match parity.as_slice() {
                [0, 2, 1, 3] => "q0".to_string(),
                [0, 1, 2, 3] => "q1".to_string(),
                [0, 1, 3, 2] => "q2".to_string(),
                _ => return Err(HashError::InvalidParity { geometry: geometry.name(), parity: parity.clone() }),
            },
            Geometry::TrigonalBipyramidal => {
                // scores run axis first; rank every rubric slot instead
                let mut slot_scores = vec![(0, 0, 0); scores.len()];
                for (&slot, &s) in geometry.score_order().iter().zip(&scores) {
                    slot_scores[slot] = s;
                }
                let mut rank = vec![0; slot_scores.len()];
                for (r, slot) in argsort(&slot_scores).into_iter().enumerate() {
                    rank[slot] = r;
                }
                format!("b{}{}{}", rank[3], rank[4], permutation_parity(&rank[0..3]))
            }
            Geometry::Octahedral => {
                // the smallest score always lands in slot 0
                let digits: String = parity[1..].iter().map(|p| p.to_string()).collect();
                format!("o{digits}")
            }
        };
        Ok(tag)
    }

    /// When a stereocentre shares its ring block with exactly one other atom
    /// of the same equivalence class, labels the block breadth-first from the
    /// chosen arrangement so the second centre is encoded relative to it.
    fn walk_stereo_outward(&mut self, centre: usize, arrangement: &[Ligand]) {
        let block = self.rings.block(centre);
        if block == 0 {
            return;
        }
        let ranking = self.ranking;
        let eqv = &ranking.equivalence;
        let na = self.mol.atom_count();
        let twins = (0..na)
            .filter(|&n| self.rings.block(n) == block && eqv[n] == eqv[centre])
            .count();
        if twins != 2 {
            return;
        }

        let mut labels = vec![0; na];
        let mut visited = vec![false; na];
        visited[centre] = true;
        for (slot, ligand) in arrangement.iter().enumerate() {
            if let Some(a) = *ligand {
                if self.rings.block(a) == block {
                    labels[a] = slot + 1;
                    visited[a] = true;
                }
            }
        }

        loop {
            let mut reached = visited.clone();
            let mut modified = false;
            for b in 0..self.mol.bond_count() {
                let (a1, a2) = self.mol.bond_endpoints(b);
                let (from, to) = match (visited[a1], visited[a2]) {
                    (true, false) => (a1, a2),
                    (false, true) => (a2, a1),
                    _ => continue,
                };
                if self.rings.block(to) != block {
                    continue;
                }
                labels[to] += labels[from];
                reached[to] = true;
                modified = true;
            }
            if !modified {
                break;
            }
            visited = reached;
        }
        self.walkouts.push(labels);
    }

    /// Decomposes the bond graph into walks, each `[atom, bond, atom, ...]`.
    pub fn walk_paths(&self) -> Result<Vec<Vec<usize>>, HashError> {
        let na = self.mol.atom_count();
        let priority = &self.ranking.priority;
        let mut remaining: Vec<Vec<usize>> = (0..na).map(|n| self.mol.neighbours(n)).collect();
        let mut covered = 0;
        let mut paths = Vec::new();

        while let Some(seed) = self.pick_seed(&remaining) {
            let mut path = vec![seed];
            let mut head = seed;
            while !remaining[head].is_empty() {
                let options = &remaining[head];
                let next = if options.len() == 1 {
                    options[0]
                } else {
                    let sizes = component_sizes(&remaining, head);
                    let largest = options.iter().map(|&o| sizes[o]).max().unwrap_or(0);
                    options
                        .iter()
                        .copied()
                        .filter(|&o| sizes[o] == largest)
                        .min_by_key(|&o| priority[o])
                        .unwrap_or(options[0])
                };
                let Some(bond) = self.mol.find_bond(head, next) else {
                    break;
                };
                path.push(bond);
                path.push(next);
                remaining[head].retain(|&x| x != next);
                remaining[next].retain(|&x| x != head);
                covered += 1;
                head = next;
            }
            paths.push(path);
        }

        let missing = self.mol.bond_count() - covered;
        if missing > 0 {
            return Err(HashError::IncompleteWalk(missing));
        }
        Ok(paths)
    }

    /// Next walk start: atoms already on a walk come first, then those with
    /// the fewest bonds left, then the lowest priority.
    fn pick_seed(&self, remaining: &[Vec<usize>]) -> Option<usize> {
        let priority = &self.ranking.priority;
        let open: Vec<usize> = (0..remaining.len()).filter(|&n| !remaining[n].is_empty()).collect();
        let used: Vec<usize> = open
            .iter()
            .copied()
            .filter(|&n| remaining[n].len() < self.mol.degree(n))
            .collect();
        let pool = if used.is_empty() { open } else { used };
        pool.into_iter().min_by_key(|&n| (remaining[n].len(), priority[n]))
    }
}

/// Size of the connected piece each atom sits in, counting only unwalked
/// bonds and with `isolate` cut out.
fn component_sizes(remaining: &[Vec<usize>], isolate: usize) -> Vec<usize> {
    let na = remaining.len();
    let mut uf = UnionFind::<usize>::new(na);
    for (a, nbrs) in remaining.iter().enumerate() {
        if a == isolate {
            continue;
        }
        for &b in nbrs.iter().filter(|&&b| b != isolate) {
            uf.union(a, b);
        }
    }
    let roots: Vec<usize> = (0..na).map(|n| uf.find_mut(n)).collect();
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &r in &roots {
        *counts.entry(r).or_default() += 1;
    }
    roots.iter().map(|r| counts[r]).collect()
}
