//! Stereochemistry rubrics.
//!
//! A rubric is the ordered list of ligands around a stereocentre (or the four
//! substituents of a double bond), laid out in a fixed convention for its
//! geometry. Rearrangements in the geometry's [`PermutationGroup`] describe
//! the same physical arrangement; anything else is a different stereoisomer.

mod geometry;
pub use geometry::*;

pub mod group;
pub use group::{argsort, permutation_parity, PermutationGroup};

use crate::{DotPath, HashError, IndexMap, Molecule, RingBlocks};
use tracing::*;

/// A ligand slot. `None` is a phantom: a lone pair, a vacant site or a
/// hydrogen that was folded into its parent's count.
pub type Ligand = Option<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geometry {
    Tetrahedral,
    SquarePlanar,
    TrigonalBipyramidal,
    Octahedral,
    BondSides,
}

impl Geometry {
    pub fn name(self) -> &'static str {
        match self {
            Geometry::Tetrahedral => "tetrahedral",
            Geometry::SquarePlanar => "square planar",
            Geometry::TrigonalBipyramidal => "trigonal bipyramidal",
            Geometry::Octahedral => "octahedral",
            Geometry::BondSides => "bond sides",
        }
    }

    pub fn group(self) -> &'static PermutationGroup {
        match self {
            Geometry::Tetrahedral => &group::TETRAHEDRAL,
            Geometry::SquarePlanar => &group::SQUARE_PLANAR,
            Geometry::TrigonalBipyramidal => &group::TRIGONAL_BIPYRAMIDAL,
            Geometry::Octahedral => &group::OCTAHEDRAL,
            Geometry::BondSides => &group::BOND_SIDES,
        }
    }

    /// Order in which slots are compared when scoring an arrangement. The
    /// bipyramid looks at its axis before the equator.
    pub fn score_order(self) -> &'static [usize] {
        match self {
            Geometry::TrigonalBipyramidal => &[3, 4, 0, 1, 2],
            Geometry::Octahedral => &[0, 1, 2, 3, 4, 5],
            _ => &[0, 1, 2, 3],
        }
    }

    /// True when the slot keys show that the centre cannot tell its
    /// arrangements apart.
    pub fn is_degenerate<K: PartialEq>(self, keys: &[K]) -> bool {
        let largest_class = keys
            .iter()
            .map(|k| keys.iter().filter(|other| *other == k).count())
            .max()
            .unwrap_or(0);
        match self {
            Geometry::Tetrahedral => largest_class >= 2,
            Geometry::SquarePlanar => largest_class >= 3,
            Geometry::TrigonalBipyramidal => largest_class >= 5,
            Geometry::Octahedral => largest_class >= 5,
            Geometry::BondSides => keys.len() == 4 && (keys[0] == keys[1] || keys[2] == keys[3]),
        }
    }
}

/// Ligand layouts, one variant per geometry.
///
/// * `Tetrahedral([a, b, c, d])`: `det(b - a, c - a, d - a) > 0` over the bond directions.
/// * `SquarePlanar([a, b, c, d])`: cyclic order, `a` trans to `c`, `b` trans to `d`.
/// * `TrigonalBipyramidal([e0, e1, e2, x0, x1])`: equator then axis.
/// * `Octahedral([e0, e1, e2, e3, x0, x1])`: `e0`/`e2`, `e1`/`e3` and `x0`/`x1` trans.
/// * `BondSides([a1, a2, b1, b2])`: `a*` on one end, `b*` on the other, `a1` cis to `b1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rubric {
    Tetrahedral([Ligand; 4]),
    SquarePlanar([Ligand; 4]),
    TrigonalBipyramidal([Ligand; 5]),
    Octahedral([Ligand; 6]),
    BondSides([Ligand; 4]),
}

impl Rubric {
    pub fn geometry(&self) -> Geometry {
        match self {
            Rubric::Tetrahedral(_) => Geometry::Tetrahedral,
            Rubric::SquarePlanar(_) => Geometry::SquarePlanar,
            Rubric::TrigonalBipyramidal(_) => Geometry::TrigonalBipyramidal,
            Rubric::Octahedral(_) => Geometry::Octahedral,
            Rubric::BondSides(_) => Geometry::BondSides,
        }
    }

    pub fn ligands(&self) -> &[Ligand] {
        match self {
            Rubric::Tetrahedral(l) | Rubric::SquarePlanar(l) | Rubric::BondSides(l) => &l[..],
            Rubric::TrigonalBipyramidal(l) => &l[..],
            Rubric::Octahedral(l) => &l[..],
        }
    }

    fn ligands_mut(&mut self) -> &mut [Ligand] {
        match self {
            Rubric::Tetrahedral(l) | Rubric::SquarePlanar(l) | Rubric::BondSides(l) => &mut l[..],
            Rubric::TrigonalBipyramidal(l) => &mut l[..],
            Rubric::Octahedral(l) => &mut l[..],
        }
    }

    pub fn group(&self) -> &'static PermutationGroup {
        self.geometry().group()
    }

    /// Translates ligand indices through `lookup` (old index to new); ligands
    /// that no longer exist become phantoms.
    pub fn remap(&self, lookup: &[Option<usize>]) -> Rubric {
        let mut rubric = self.clone();
        for slot in rubric.ligands_mut() {
            *slot = slot.and_then(|old| lookup.get(old).copied().flatten());
        }
        rubric
    }
}

/// Rubrics for every atom and bond of one molecule; `None` means no
/// stereochemistry is recorded (or it was switched off).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RubricSet {
    pub atoms: Vec<Option<Rubric>>,
    pub bonds: Vec<Option<Rubric>>,
}

impl RubricSet {
    pub fn empty(mol: &Molecule) -> Self {
        Self {
            atoms: vec![None; mol.atom_count()],
            bonds: vec![None; mol.bond_count()],
        }
    }

    pub fn atom(&self, atom: usize) -> Option<&Rubric> {
        self.atoms.get(atom).and_then(|r| r.as_ref())
    }

    pub fn bond(&self, bond: usize) -> Option<&Rubric> {
        self.bonds.get(bond).and_then(|r| r.as_ref())
    }

    pub fn active_count(&self) -> usize {
        self.atoms.iter().chain(self.bonds.iter()).filter(|r| r.is_some()).count()
    }

    /// Carries the set over to a molecule derived through `map`.
    pub fn remap(&self, map: &IndexMap) -> RubricSet {
        let lookup = map.atom_lookup(self.atoms.len());
        let atoms = map
            .atoms
            .iter()
            .map(|&old| self.atoms.get(old).cloned().flatten().map(|r| r.remap(&lookup)))
            .collect();
        let bonds = map
            .bonds
            .iter()
            .map(|&old| self.bonds.get(old).cloned().flatten().map(|r| r.remap(&lookup)))
            .collect();
        RubricSet { atoms, bonds }
    }

    /// Checks every ligand index against the molecule and pads or trims the
    /// tables to its size.
    pub fn validate(&mut self, mol: &Molecule) -> Result<(), HashError> {
        let count = mol.atom_count();
        self.atoms.resize(count, None);
        self.bonds.resize(mol.bond_count(), None);

        let owners = self
            .atoms
            .iter()
            .enumerate()
            .map(|(i, r)| (format!("atom {i}"), r))
            .chain(self.bonds.iter().enumerate().map(|(i, r)| (format!("bond {i}"), r)));
        for (owner, rubric) in owners {
            let Some(rubric) = rubric else { continue };
            if let Some(atom) = rubric.ligands().iter().flatten().find(|&&a| a >= count) {
                return Err(HashError::RubricOutOfRange { owner, atom: *atom, count });
            }
        }
        Ok(())
    }

    /// Nulls every rubric whose slots are indistinguishable under the frozen
    /// equivalence classes.
    pub fn deactivate(&mut self, mol: &Molecule, rings: &RingBlocks, equivalence: &[usize]) {
        for atom in 0..self.atoms.len() {
            let Some(rubric) = &self.atoms[atom] else { continue };
            let chelate = chelate_groups(mol, rings, atom);
            let keys: Vec<(usize, usize)> = rubric
                .ligands()
                .iter()
                .map(|l| l.map_or((0, 0), |a| (equivalence[a], chelate[a])))
                .collect();
            if rubric.geometry().is_degenerate(&keys) {
                debug!("deactivating {} rubric on atom {atom}: {keys:?}", rubric.geometry().name());
                self.atoms[atom] = None;
            }
        }
        for bond in 0..self.bonds.len() {
            let Some(rubric) = &self.bonds[bond] else { continue };
            let keys: Vec<usize> = rubric.ligands().iter().map(|l| l.map_or(0, |a| equivalence[a])).collect();
            if rubric.geometry().is_degenerate(&keys) {
                debug!("deactivating bond sides rubric on bond {bond}: {keys:?}");
                self.bonds[bond] = None;
            }
        }
    }
}

/// Chelate identity of each neighbour of `centre`: neighbours that share the
/// centre's ring block get a non-zero id, equal only when they belong to the
/// same ligand once the centre is cut out. Everything else is 0.
pub fn chelate_groups(mol: &Molecule, rings: &RingBlocks, centre: usize) -> Vec<usize> {
    let mut groups = vec![0; mol.atom_count()];
    let block = rings.block(centre);
    if block == 0 {
        return groups;
    }
    let components = mol.components_without(Some(centre));
    for nbr in mol.neighbours(centre) {
        if rings.block(nbr) == block {
            groups[nbr] = components[nbr] + 1;
        }
    }
    groups
}

/// Source of stereo rubrics for a molecule.
///
/// Extraction sees the molecule exactly as the caller supplied it, before
/// hydrogens are folded away.
pub trait RubricExtractor {
    fn extract(&self, mol: &Molecule, dot: &DotPath, rings: &RingBlocks) -> RubricSet;
}

/// Rubrics supplied up front by the caller.
#[derive(Debug, Clone, Default)]
pub struct ExplicitRubrics(pub RubricSet);

impl RubricExtractor for ExplicitRubrics {
    fn extract(&self, _mol: &Molecule, _dot: &DotPath, _rings: &RingBlocks) -> RubricSet {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, Bond};

    #[test]
    fn test_degenerate_rules() {
        assert!(Geometry::Tetrahedral.is_degenerate(&[1, 2, 2, 3]));
        assert!(!Geometry::Tetrahedral.is_degenerate(&[0, 1, 2, 3]));

        assert!(!Geometry::SquarePlanar.is_degenerate(&[1, 1, 2, 2]));
        assert!(Geometry::SquarePlanar.is_degenerate(&[1, 1, 1, 2]));

        assert!(!Geometry::TrigonalBipyramidal.is_degenerate(&[1, 1, 1, 1, 2]));
        assert!(Geometry::TrigonalBipyramidal.is_degenerate(&[3, 3, 3, 3, 3]));

        assert!(!Geometry::Octahedral.is_degenerate(&[1, 1, 1, 1, 2, 2]));
        assert!(Geometry::Octahedral.is_degenerate(&[1, 1, 1, 1, 1, 2]));

        assert!(Geometry::BondSides.is_degenerate(&[1, 1, 2, 3]));
        assert!(Geometry::BondSides.is_degenerate(&[1, 2, 3, 3]));
        assert!(!Geometry::BondSides.is_degenerate(&[1, 2, 1, 2]));
    }

    #[test]
    fn test_remap_drops_collapsed_ligands() {
        let rubric = Rubric::Tetrahedral([Some(1), Some(2), Some(3), Some(4)]);
        let lookup = vec![Some(0), Some(1), None, Some(2), Some(3)];
        assert_eq!(rubric.remap(&lookup), Rubric::Tetrahedral([Some(1), None, Some(2), Some(3)]));
    }

    #[test]
    fn test_validate_rejects_stray_ligands() {
        let mut mol = Molecule::new();
        let c = mol.add_atom(Atom::new("C"));
        let o = mol.add_atom(Atom::new("O"));
        mol.add_bond(c, o, Bond::single()).unwrap();

        let mut set = RubricSet::empty(&mol);
        set.atoms[0] = Some(Rubric::Tetrahedral([Some(1), None, None, Some(7)]));
        assert_eq!(
            set.validate(&mol),
            Err(HashError::RubricOutOfRange { owner: "atom 0".into(), atom: 7, count: 2 })
        );

        let mut short = RubricSet::default();
        assert!(short.validate(&mol).is_ok());
        assert_eq!(short.atoms.len(), 2);
        assert_eq!(short.bonds.len(), 1);
    }

    #[test]
    fn test_chelate_groups() {
        // a metal with a two-atom chelate and one plain ligand
        let mut mol = Molecule::new();
        let m = mol.add_atom(Atom::new("Pt"));
        let n1 = mol.add_atom(Atom::new("N"));
        let n2 = mol.add_atom(Atom::new("N"));
        let cl = mol.add_atom(Atom::new("Cl"));
        let c1 = mol.add_atom(Atom::new("C"));
        let c2 = mol.add_atom(Atom::new("C"));
        mol.add_bond(m, n1, Bond::single()).unwrap();
        mol.add_bond(m, n2, Bond::single()).unwrap();
        mol.add_bond(m, cl, Bond::single()).unwrap();
        mol.add_bond(n1, c1, Bond::single()).unwrap();
        mol.add_bond(c1, c2, Bond::single()).unwrap();
        mol.add_bond(c2, n2, Bond::single()).unwrap();

        let rings = RingBlocks::new(&mol);
        let groups = chelate_groups(&mol, &rings, m);
        assert_ne!(groups[n1], 0);
        assert_eq!(groups[n1], groups[n2]);
        assert_eq!(groups[cl], 0);
    }
}
