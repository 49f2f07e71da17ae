//! Delocalisation partitioning.
//!
//! Conjugated systems, resonance forms and charges smeared over them are
//! described by "dot" blocks: each block gets one averaged bond class for all
//! of its bonds and one fractional charge for all of its atoms. Two drawings
//! of the same resonance hybrid therefore look identical to the canonicaliser.

use crate::element::is_metal;
use crate::{HashError, Molecule};
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;
use std::fmt;
use tracing::*;

/// Ordinal bond classes, lowest first. The in-between classes are only ever
/// produced by averaging a delocalised block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondClass {
    O0,
    O01,
    O1,
    O12,
    O2,
    O23,
    O3,
    O3X,
}

impl BondClass {
    pub const ALL: [BondClass; 8] = [
        BondClass::O0,
        BondClass::O01,
        BondClass::O1,
        BondClass::O12,
        BondClass::O2,
        BondClass::O23,
        BondClass::O3,
        BondClass::O3X,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BondClass::O0 => "*",
            BondClass::O01 => "*-",
            BondClass::O1 => "-",
            BondClass::O12 => "-=",
            BondClass::O2 => "=",
            BondClass::O23 => "=#",
            BondClass::O3 => "#",
            BondClass::O3X => "#+",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.symbol() == symbol)
    }

    pub fn from_order(order: u32) -> Self {
        match order {
            0 => BondClass::O0,
            1 => BondClass::O1,
            2 => BondClass::O2,
            3 => BondClass::O3,
            _ => BondClass::O3X,
        }
    }

    /// Averages `half_orders` (sum over the block, in units of 1/2) across
    /// `bonds` bonds.
    pub fn from_half_orders(half_orders: u32, bonds: usize) -> Self {
        let x = half_orders as usize;
        let d = 2 * bonds;
        if x == 0 {
            BondClass::O0
        } else if x < d {
            BondClass::O01
        } else if x == d {
            BondClass::O1
        } else if x < 2 * d {
            BondClass::O12
        } else if x == 2 * d {
            BondClass::O2
        } else if x < 3 * d {
            BondClass::O23
        } else if x == 3 * d {
            BondClass::O3
        } else {
            BondClass::O3X
        }
    }

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BondClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotBlock {
    pub atoms: Vec<usize>,
    pub bonds: Vec<usize>,
    /// Per-atom charge, `numer/denom` in lowest terms.
    pub numer: i32,
    pub denom: i32,
}

#[derive(Debug, Clone)]
pub struct DotPath {
    pub blocks: Vec<DotBlock>,
    bond_class: Vec<BondClass>,
    atom_block: Vec<Option<usize>>,
    charge: Vec<(i32, i32)>,
}

impl DotPath {
    pub fn new(mol: &Molecule) -> Result<Self, HashError> {
        let na = mol.atom_count();
        let nb = mol.bond_count();
        let non_metal = |a: usize| !is_metal(mol.atom(a).atomic_number());

        let mut pi = vec![false; na];
        for b in 0..nb {
            let bond = mol.bond(b);
            if bond.order >= 2 || bond.aromatic {
                let (a1, a2) = mol.bond_endpoints(b);
                pi[a1] |= non_metal(a1);
                pi[a2] |= non_metal(a2);
            }
        }

        let mut member = pi.clone();
        for n in (0..na).filter(|&n| !pi[n] && non_metal(n)) {
            let atom = mol.atom(n);
            if atom.charge == 0 && atom.unpaired == 0 {
                continue;
            }
            member[n] = mol.atom_bonds(n).into_iter().any(|b| {
                let bond = mol.bond(b);
                (bond.order >= 1 || bond.aromatic) && pi[mol.bond_other(b, n)]
            });
        }

        let block_bond: Vec<bool> = (0..nb)
            .map(|b| {
                let bond = mol.bond(b);
                let (a1, a2) = mol.bond_endpoints(b);
                (bond.order >= 1 || bond.aromatic) && member[a1] && member[a2] && (pi[a1] || pi[a2])
            })
            .collect();

        let mut uf = UnionFind::<usize>::new(na);
        let mut linked = vec![false; na];
        for b in (0..nb).filter(|&b| block_bond[b]) {
            let (a1, a2) = mol.bond_endpoints(b);
            uf.union(a1, a2);
            linked[a1] = true;
            linked[a2] = true;
        }

        // blocks are numbered in order of their lowest atom
        let mut by_root: BTreeMap<usize, usize> = BTreeMap::new();
        let mut blocks: Vec<DotBlock> = Vec::new();
        let mut atom_block = vec![None; na];
        for n in (0..na).filter(|&n| linked[n]) {
            let root = uf.find_mut(n);
            let idx = *by_root.entry(root).or_insert_with(|| {
                blocks.push(DotBlock { atoms: vec![], bonds: vec![], numer: 0, denom: 0 });
                blocks.len() - 1
            });
            blocks[idx].atoms.push(n);
            atom_block[n] = Some(idx);
        }
        for b in (0..nb).filter(|&b| block_bond[b]) {
            let (a1, _) = mol.bond_endpoints(b);
            if let Some(idx) = atom_block[a1] {
                blocks[idx].bonds.push(b);
            }
        }

        let mut bond_class: Vec<BondClass> = (0..nb)
            .map(|b| {
                let bond = mol.bond(b);
                if bond.aromatic {
                    BondClass::O12
                } else {
                    BondClass::from_order(bond.order)
                }
            })
            .collect();
        let mut charge: Vec<(i32, i32)> = (0..na).map(|n| (mol.atom(n).charge, 1)).collect();

        for (idx, block) in blocks.iter_mut().enumerate() {
            let half_orders: u32 = block.bonds.iter().map(|&b| mol.bond(b).half_order()).sum();
            let class = BondClass::from_half_orders(half_orders, block.bonds.len());
            for &b in &block.bonds {
                bond_class[b] = class;
            }

            let total: i32 = block.atoms.iter().map(|&a| mol.atom(a).charge).sum();
            let (numer, denom) = reduce_fraction(total, block.atoms.len() as i32);
            if denom <= 0 {
                return Err(HashError::MalformedCharge { block: idx, numer, denom });
            }
            block.numer = numer;
            block.denom = denom;
            for &a in &block.atoms {
                charge[a] = (numer, denom);
            }
            trace!(
                "dot block {idx}: {} atoms, {} bonds, class {class}, charge {numer}/{denom}",
                block.atoms.len(),
                block.bonds.len()
            );
        }

        debug!("partitioned {na} atoms into {} delocalised blocks", blocks.len());
        Ok(Self { blocks, bond_class, atom_block, charge })
    }

    pub fn bond_class(&self, bond: usize) -> BondClass {
        self.bond_class[bond]
    }

    pub fn bond_classes(&self) -> &[BondClass] {
        &self.bond_class
    }

    /// Fractional charge of one atom as `(numer, denom)`.
    pub fn charge(&self, atom: usize) -> (i32, i32) {
        self.charge[atom]
    }

    pub fn block_of(&self, atom: usize) -> Option<usize> {
        self.atom_block.get(atom).copied().flatten()
    }

    pub fn in_block(&self, atom: usize) -> bool {
        self.block_of(atom).is_some()
    }
}

fn gcd(mut u: i32, mut v: i32) -> i32 {
    while v != 0 {
        let t = u % v;
        u = v;
        v = t;
    }
    u.abs()
}

/// Lowest terms with a sign-carrying numerator; zero is always `0/1`.
fn reduce_fraction(numer: i32, denom: i32) -> (i32, i32) {
    if numer == 0 {
        return (0, 1);
    }
    let g = gcd(numer, denom);
    if g == 0 {
        return (numer, denom);
    }
    let (numer, denom) = (numer / g, denom / g);
    if denom < 0 {
        (-numer, -denom)
    } else {
        (numer, denom)
    }
}
