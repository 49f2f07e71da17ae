use crate::canon::{PriorityEngine, Ranking};
use crate::compose::Composer;
use crate::stereo::{CoordinateRubrics, RubricExtractor, RubricSet};
use crate::{DotPath, HashError, IndexMap, Molecule, RingBlocks};
use tracing::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashOptions {
    /// When false, no rubrics are built and the hash reflects the bond graph
    /// alone.
    pub with_stereo: bool,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self { with_stereo: true }
    }
}

/// Everything a hash computation produced, indexed by the atoms of the
/// hydrogen-collapsed molecule (see `atom_map`).
#[derive(Debug, Clone)]
pub struct HashOutcome {
    pub hash: String,
    pub priority: Vec<usize>,
    pub equivalence: Vec<usize>,
    pub iterations: usize,
    pub bumps: usize,
    pub active_rubrics: usize,
    /// Original index of every atom and bond that survived preprocessing.
    pub atom_map: IndexMap,
}

/// Computes the dot hash of one molecule.
///
/// The caller's molecule is only read. Boring hydrogens are folded into their
/// neighbours on a private copy, and stereo rubrics are extracted before that
/// happens so that explicit and implicit hydrogens end up identical.
pub struct DotHash<'a> {
    mol: &'a Molecule,
    options: HashOptions,
    extractor: Box<dyn RubricExtractor + 'a>,
}

impl<'a> DotHash<'a> {
    pub fn new(mol: &'a Molecule, options: HashOptions) -> Self {
        Self::with_extractor(mol, options, CoordinateRubrics::default())
    }

    pub fn with_extractor(mol: &'a Molecule, options: HashOptions, extractor: impl RubricExtractor + 'a) -> Self {
        Self {
            mol,
            options,
            extractor: Box::new(extractor),
        }
    }

    pub fn calculate(&self) -> Result<String, HashError> {
        Ok(self.compute()?.hash)
    }

    pub fn compute(&self) -> Result<HashOutcome, HashError> {
        let mol = self.mol;
        let dot = DotPath::new(mol)?;

        let extracted = if self.options.with_stereo {
            let rings = RingBlocks::new(mol);
            let mut rubrics = self.extractor.extract(mol, &dot, &rings);
            rubrics.validate(mol)?;
            Some(rubrics)
        } else {
            None
        };

        let protect: Vec<bool> = (0..mol.atom_count()).map(|n| dot.in_block(n)).collect();
        let (collapsed, atom_map) = mol.collapse_hydrogens(&protect);
        debug!(
            "collapsed {} atoms to {} for hashing",
            mol.atom_count(),
            collapsed.atom_count()
        );

        let dot = DotPath::new(&collapsed)?;
        let rings = RingBlocks::new(&collapsed);
        let mut rubrics = match extracted {
            Some(rubrics) => rubrics.remap(&atom_map),
            None => RubricSet::empty(&collapsed),
        };
        rubrics.validate(&collapsed)?;

        let ranking: Ranking = PriorityEngine::new(&collapsed, &dot, &rings, rubrics).run()?;
        let hash = Composer::new(&collapsed, &dot, &rings, &ranking).compose()?;
        debug!("dot hash {hash}");

        Ok(HashOutcome {
            hash,
            active_rubrics: ranking.rubrics.active_count(),
            priority: ranking.priority,
            equivalence: ranking.equivalence,
            iterations: ranking.iterations,
            bumps: ranking.bumps,
            atom_map,
        })
    }
}

/// Hash of `mol`, optionally including stereochemistry read from its atom
/// coordinates.
pub fn calculate(mol: &Molecule, with_stereo: bool) -> Result<String, HashError> {
    DotHash::new(mol, HashOptions { with_stereo }).calculate()
}

/// Two molecules are equivalent exactly when their hashes match.
pub fn are_equivalent(a: &Molecule, b: &Molecule, with_stereo: bool) -> Result<bool, HashError> {
    Ok(calculate(a, with_stereo)? == calculate(b, with_stereo)?)
}

pub trait CanonicalHash {
    fn dot_hash(&self, with_stereo: bool) -> Result<String, HashError>;
}

impl CanonicalHash for Molecule {
    fn dot_hash(&self, with_stereo: bool) -> Result<String, HashError> {
        calculate(self, with_stereo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stereo::{ExplicitRubrics, Rubric};
    use crate::*;

    /// A handful of fixed relabellings plus a few seeded random ones.
    fn shuffles(n: usize) -> Vec<Vec<usize>> {
        let mut orders = vec![(0..n).rev().collect::<Vec<_>>()];
        for step in [1, 2, 3] {
            orders.push((0..n).map(|i| (i + step) % n.max(1)).collect());
        }
        let (even, odd): (Vec<usize>, Vec<usize>) = (0..n).partition(|i| i % 2 == 0);
        orders.push(odd.into_iter().chain(even).collect());

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = |bound: usize| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize % bound
        };
        for _ in 0..12 {
            let mut order: Vec<usize> = (0..n).collect();
            for i in (1..n).rev() {
                order.swap(i, next(i + 1));
            }
            orders.push(order);
        }
        orders
    }

    fn assert_invariant(mol: &Molecule, with_stereo: bool) -> String {
        let hash = calculate(mol, with_stereo).unwrap();
        for order in shuffles(mol.atom_count()) {
            let other = mol.renumber(&order).unwrap();
            assert_eq!(calculate(&other, with_stereo).unwrap(), hash, "order {order:?}");
        }
        hash
    }

    fn chiral_centre(mirror: bool, explicit_h: bool) -> Molecule {
        let z = if mirror { -1.0 } else { 1.0 };
        let mut mol = Molecule::new();
        let c = mol.add_atom(Atom::new("C").with_hydrogens(if explicit_h { 0 } else { 1 }).at(0.0, 0.0, 0.0));
        for (sym, p) in [("F", [1.0, 1.0, 1.0]), ("Cl", [1.0, -1.0, -1.0]), ("Br", [-1.0, 1.0, -1.0])] {
            let n = mol.add_atom(Atom::new(sym).at(p[0], p[1], z * p[2]));
            mol.add_bond(c, n, Bond::single()).unwrap();
        }
        if explicit_h {
            let h = mol.add_atom(Atom::new("H").at(-1.0, -1.0, z));
            mol.add_bond(c, h, Bond::single()).unwrap();
        }
        mol
    }

    fn platinum_en(cis: bool) -> Molecule {
        let mut mol = Molecule::new();
        let pt = mol.add_atom(Atom::new("Pt").at(0.0, 0.0, 0.0));
        let (cl_at, n_at) = if cis {
            ([[2.3, 0.0, 0.0], [0.0, 2.3, 0.0]], [[-2.0, 0.0, 0.0], [0.0, -2.0, 0.0]])
        } else {
            ([[2.3, 0.0, 0.0], [-2.3, 0.0, 0.0]], [[0.0, 2.0, 0.0], [0.0, -2.0, 0.0]])
        };
        for p in cl_at {
            let cl = mol.add_atom(Atom::new("Cl").at(p[0], p[1], p[2]));
            mol.add_bond(pt, cl, Bond::single()).unwrap();
        }
        let mut ns = vec![];
        for p in n_at {
            let n = mol.add_atom(Atom::new("N").with_hydrogens(2).at(p[0], p[1], p[2]));
            mol.add_bond(pt, n, Bond::single()).unwrap();
            let c = mol.add_atom(Atom::new("C").with_hydrogens(2).at(p[0] * 1.5, p[1] * 1.5, 0.5));
            mol.add_bond(n, c, Bond::single()).unwrap();
            ns.push(c);
        }
        mol.add_bond(ns[0], ns[1], Bond::single()).unwrap();
        mol
    }

    fn cobalt_triad(fac: bool) -> Molecule {
        let axes = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        let chlorines = if fac { [0, 2, 4] } else { [0, 1, 2] };
        let mut mol = Molecule::new();
        let co = mol.add_atom(Atom::new("Co").at(0.0, 0.0, 0.0));
        for (i, p) in axes.iter().enumerate() {
            let atom = if chlorines.contains(&i) {
                Atom::new("Cl")
            } else {
                Atom::new("N").with_hydrogens(3)
            };
            let n = mol.add_atom(atom.at(p[0] * 2.0, p[1] * 2.0, p[2] * 2.0));
            mol.add_bond(co, n, Bond::single()).unwrap();
        }
        mol
    }

    /// Phosphorus with ligands `[e0, e1, e2, x0, x1]`, equator then axis.
    fn phosphorane(ligands: [&str; 5]) -> Molecule {
        let s = 3f64.sqrt() / 2.0;
        let at = [[1.0, 0.0, 0.0], [-0.5, s, 0.0], [-0.5, -s, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];
        let mut mol = Molecule::new();
        let p = mol.add_atom(Atom::new("P").at(0.0, 0.0, 0.0));
        for (sym, d) in ligands.iter().zip(at) {
            let n = mol.add_atom(Atom::new(sym).at(d[0] * 1.6, d[1] * 1.6, d[2] * 1.6));
            mol.add_bond(p, n, Bond::single()).unwrap();
        }
        mol
    }

    fn butene(cis: bool) -> Molecule {
        let y = if cis { 1.2 } else { -1.2 };
        let mut mol = Molecule::new();
        let c0 = mol.add_atom(Atom::new("C").with_hydrogens(3).at(-0.7, 1.2, 0.0));
        let c1 = mol.add_atom(Atom::new("C").with_hydrogens(1).at(0.0, 0.0, 0.0));
        let c2 = mol.add_atom(Atom::new("C").with_hydrogens(1).at(1.3, 0.0, 0.0));
        let c3 = mol.add_atom(Atom::new("C").with_hydrogens(3).at(2.0, y, 0.0));
        mol.add_bond(c0, c1, Bond::single()).unwrap();
        mol.add_bond(c1, c2, Bond::double()).unwrap();
        mol.add_bond(c2, c3, Bond::single()).unwrap();
        mol
    }

    #[test]
    fn test_relabelling_invariance() {
        init_logging("trace");
        for smiles in [
            "CCO",
            "CC(C)(C)C(=O)O",
            "c1ccc2ccccc2c1",
            "C12C3C4C1C5C2C3C45",
            "OC(=O)CC(O)(CC(=O)O)C(=O)O",
            "[NH4+].[Cl-]",
            "C1CC2CCC1CC2",
            "[O-]C(=O)c1ccccc1",
        ] {
            let mol = parse_smiles(smiles).unwrap();
            assert_invariant(&mol, true);
            assert_invariant(&mol, false);
        }
    }

    #[test]
    fn test_distinct_structures_differ() {
        let ethanol = parse_smiles("CCO").unwrap();
        let ether = parse_smiles("COC").unwrap();
        assert!(!are_equivalent(&ethanol, &ether, true).unwrap());
        let propanol = parse_smiles("CCCO").unwrap();
        let isopropanol = parse_smiles("CC(O)C").unwrap();
        assert!(!are_equivalent(&propanol, &isopropanol, true).unwrap());
    }

    #[test]
    fn test_enantiomers_differ() {
        init_logging("trace");
        let left = chiral_centre(false, false);
        let right = chiral_centre(true, false);
        let l = assert_invariant(&left, true);
        let r = assert_invariant(&right, true);
        assert_ne!(l, r);
        assert!(l.contains("!t"), "{l}");
        // without stereochemistry the two are the same compound
        assert_eq!(calculate(&left, false).unwrap(), calculate(&right, false).unwrap());
    }

    #[test]
    fn test_explicit_hydrogen_matches_implicit() {
        for mirror in [false, true] {
            let implicit = calculate(&chiral_centre(mirror, false), true).unwrap();
            let explicit = calculate(&chiral_centre(mirror, true), true).unwrap();
            assert_eq!(implicit, explicit);
        }
    }

    #[test]
    fn test_duplicate_ligands_cancel_chirality() {
        let make = |z: f64| {
            let mut mol = Molecule::new();
            let c = mol.add_atom(Atom::new("C").with_hydrogens(1).at(0.0, 0.0, 0.0));
            for (sym, p) in [("F", [1.0, 1.0, 1.0]), ("F", [1.0, -1.0, -1.0]), ("Cl", [-1.0, 1.0, -1.0])] {
                let n = mol.add_atom(Atom::new(sym).at(p[0], p[1], z * p[2]));
                mol.add_bond(c, n, Bond::single()).unwrap();
            }
            mol
        };
        let outcome = DotHash::new(&make(1.0), HashOptions::default()).compute().unwrap();
        assert_eq!(outcome.active_rubrics, 0);
        assert_eq!(outcome.hash, calculate(&make(-1.0), true).unwrap());
        assert!(!outcome.hash.contains('!'));
    }

    #[test]
    fn test_platinum_cis_trans() {
        init_logging("trace");
        let cis = assert_invariant(&platinum_en(true), true);
        let trans = assert_invariant(&platinum_en(false), true);
        assert_ne!(cis, trans);
        assert!(cis.contains("!q"), "{cis}");
        assert_eq!(calculate(&platinum_en(true), false).unwrap(), calculate(&platinum_en(false), false).unwrap());
    }

    #[test]
    fn test_octahedral_fac_mer() {
        let fac = assert_invariant(&cobalt_triad(true), true);
        let mer = assert_invariant(&cobalt_triad(false), true);
        assert_ne!(fac, mer);
        assert!(fac.contains("!o"), "{fac}");
    }

    #[test]
    fn test_bipyramid_axial_or_equatorial() {
        init_logging("trace");
        let axial = assert_invariant(&phosphorane(["Cl", "Cl", "Cl", "F", "Cl"]), true);
        let equatorial = assert_invariant(&phosphorane(["F", "Cl", "Cl", "Cl", "Cl"]), true);
        assert_ne!(axial, equatorial);
        assert!(axial.contains("P!b040"), "{axial}");
        assert!(equatorial.contains("P!b340"), "{equatorial}");
        // a different equatorial slot is the same isomer
        assert_eq!(assert_invariant(&phosphorane(["Cl", "Cl", "F", "Cl", "Cl"]), true), equatorial);
        assert_eq!(assert_invariant(&phosphorane(["Cl", "Cl", "Cl", "Cl", "F"]), true), axial);
    }

    #[test]
    fn test_bipyramid_difluoride_isomers() {
        let hashes = [
            ["Cl", "Cl", "Cl", "F", "F"],
            ["F", "Cl", "Cl", "F", "Cl"],
            ["F", "F", "Cl", "Cl", "Cl"],
        ]
        .map(|ligands| assert_invariant(&phosphorane(ligands), true));
        for hash in &hashes {
            assert!(hash.contains("!b"), "{hash}");
        }
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[0], hashes[2]);
        assert_ne!(hashes[1], hashes[2]);

        let flat: Vec<String> = [["Cl", "Cl", "Cl", "F", "F"], ["F", "F", "Cl", "Cl", "Cl"]]
            .map(|ligands| calculate(&phosphorane(ligands), false).unwrap())
            .to_vec();
        assert_eq!(flat[0], flat[1]);
    }

    #[test]
    fn test_double_bond_geometry() {
        let cis = assert_invariant(&butene(true), true);
        let trans = assert_invariant(&butene(false), true);
        assert_ne!(cis, trans);
        assert!(cis.contains("!s"), "{cis}");
        assert_eq!(calculate(&butene(true), false).unwrap(), calculate(&butene(false), false).unwrap());
    }

    #[test]
    fn test_resonance_forms_agree() {
        let pairs = [
            ("CC(=O)[O-]", "CC([O-])=O"),
            ("C1=CC=CC=C1", "c1ccccc1"),
            ("C=C[CH2+]", "[CH2+]C=C"),
            ("O=[N+]([O-])[O-]", "[O-][N+](=O)[O-]"),
        ];
        for (a, b) in pairs {
            let ma = parse_smiles(a).unwrap();
            let mb = parse_smiles(b).unwrap();
            assert!(are_equivalent(&ma, &mb, true).unwrap(), "{a} vs {b}");
        }
    }

    #[test]
    fn test_every_bond_is_walked() {
        for smiles in ["CC(C)(C)C(=O)O", "c1ccc2ccccc2c1", "C1CC2CCC1CC2", "CCO.O"] {
            let mol = parse_smiles(smiles).unwrap();
            let outcome = DotHash::new(&mol, HashOptions::default()).compute().unwrap();
            let parsed = parse_hash(&outcome.hash).unwrap();
            assert_eq!(parsed.atom_count(), outcome.atom_map.atoms.len(), "{smiles}");
            let mut bonds = parsed.bonds();
            let total = bonds.len();
            bonds.sort();
            bonds.dedup();
            assert_eq!(bonds.len(), total, "{smiles} walks a bond twice");
            assert_eq!(total, outcome.atom_map.bonds.len(), "{smiles}");
        }
    }

    #[test]
    fn test_explicit_rubrics() {
        let mut mol = Molecule::new();
        let c = mol.add_atom(Atom::new("C").with_hydrogens(1));
        let mut ligands = vec![];
        for sym in ["F", "Cl", "Br"] {
            let n = mol.add_atom(Atom::new(sym));
            mol.add_bond(c, n, Bond::single()).unwrap();
            ligands.push(Some(n));
        }
        let rubric = |slots: [Option<usize>; 4]| {
            let mut set = RubricSet::empty(&mol);
            set.atoms[c] = Some(Rubric::Tetrahedral(slots));
            ExplicitRubrics(set)
        };
        let one = DotHash::with_extractor(&mol, HashOptions::default(), rubric([ligands[0], ligands[1], ligands[2], None]))
            .calculate()
            .unwrap();
        let other = DotHash::with_extractor(&mol, HashOptions::default(), rubric([ligands[1], ligands[0], ligands[2], None]))
            .calculate()
            .unwrap();
        let rotated = DotHash::with_extractor(&mol, HashOptions::default(), rubric([ligands[1], ligands[2], ligands[0], None]))
            .calculate()
            .unwrap();
        assert_ne!(one, other);
        assert_eq!(one, rotated);

        let stray = DotHash::with_extractor(&mol, HashOptions::default(), rubric([Some(9), None, None, None])).calculate();
        assert!(matches!(stray, Err(HashError::RubricOutOfRange { .. })));
    }

    #[test]
    fn test_trait_and_outcome() {
        let mol = parse_smiles("Cl[Al](Cl)Cl").unwrap();
        assert_eq!(mol.dot_hash(true).unwrap(), "Al,3*Cl;2-1-3,1-4");
        let outcome = DotHash::new(&mol, HashOptions { with_stereo: false }).compute().unwrap();
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.bumps, 2);
        assert_eq!(outcome.active_rubrics, 0);
    }
}
