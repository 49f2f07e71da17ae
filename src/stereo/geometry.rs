use super::{Ligand, Rubric, RubricExtractor, RubricSet};
use crate::element::{has_stereo_lone_pair, is_metal};
use crate::{BondClass, DotPath, Molecule, Position, RingBlocks};
use tracing::*;

type Vec3 = [f64; 3];

const EPSILON: f64 = 1e-6;

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn unit(a: Vec3) -> Option<Vec3> {
    let len = dot(a, a).sqrt();
    (len > EPSILON).then(|| scale(a, 1.0 / len))
}

fn det(a: Vec3, b: Vec3, c: Vec3) -> f64 {
    dot(cross(a, b), c)
}

/// Builds rubrics from 3-D atom positions.
///
/// Two ligands count as trans when the angle between them, seen from the
/// centre, exceeds `trans_angle` degrees. Centres or double bonds with any
/// missing coordinates are skipped.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateRubrics {
    pub trans_angle: f64,
}

impl Default for CoordinateRubrics {
    fn default() -> Self {
        Self { trans_angle: 150.0 }
    }
}

impl RubricExtractor for CoordinateRubrics {
    fn extract(&self, mol: &Molecule, path: &DotPath, rings: &RingBlocks) -> RubricSet {
        let mut set = RubricSet::empty(mol);
        for atom in 0..mol.atom_count() {
            set.atoms[atom] = self.atom_rubric(mol, path, atom);
            if let Some(rubric) = &set.atoms[atom] {
                trace!("atom {atom}: {rubric:?}");
            }
        }
        for bond in 0..mol.bond_count() {
            set.bonds[bond] = self.bond_rubric(mol, path, rings, bond);
            if let Some(rubric) = &set.bonds[bond] {
                trace!("bond {bond}: {rubric:?}");
            }
        }
        set
    }
}

/// One ligand slot with its direction away from the centre.
#[derive(Debug, Clone, Copy)]
struct Arm {
    ligand: Ligand,
    dir: Vec3,
}

impl CoordinateRubrics {
    fn is_trans(&self, a: Vec3, b: Vec3) -> bool {
        dot(a, b) < self.trans_angle.to_radians().cos()
    }

    /// Splits all arms into trans pairs, or gives up if any arm is trans to
    /// more than one other.
    fn trans_pairs(&self, arms: &[Arm]) -> (Vec<(usize, usize)>, Vec<usize>) {
        let mut pairs = Vec::new();
        let mut single = Vec::new();
        for i in 0..arms.len() {
            let partners: Vec<usize> = (0..arms.len())
                .filter(|&j| j != i && self.is_trans(arms[i].dir, arms[j].dir))
                .collect();
            match partners.as_slice() {
                [] => single.push(i),
                [j] if *j > i => pairs.push((i, *j)),
                [_] => {}
                _ => return (vec![], (0..arms.len()).collect()),
            }
        }
        (pairs, single)
    }

    fn arms(&self, mol: &Molecule, centre: usize) -> Option<(Position, Vec<Arm>)> {
        let c = mol.atom(centre).position?;
        let arms = mol
            .neighbours(centre)
            .into_iter()
            .map(|n| {
                let p = mol.atom(n).position?;
                Some(Arm { ligand: Some(n), dir: unit(sub(p, c))? })
            })
            .collect::<Option<Vec<Arm>>>()?;
        Some((c, arms))
    }

    fn atom_rubric(&self, mol: &Molecule, path: &DotPath, atom: usize) -> Option<Rubric> {
        let degree = mol.degree(atom);
        if !(3..=6).contains(&degree) {
            return None;
        }
        let Some((_, mut arms)) = self.arms(mol, atom) else {
            trace!("atom {atom} has no usable coordinates");
            return None;
        };

        let centre = mol.atom(atom);
        let z = centre.atomic_number();
        let metal = is_metal(z);
        let saturated = mol
            .atom_bonds(atom)
            .into_iter()
            .all(|b| matches!(path.bond_class(b), BondClass::O0 | BondClass::O1));

        let (pairs, single) = self.trans_pairs(&arms);
        match degree {
            3 => {
                let lone = centre.hydrogens == 1 || (centre.hydrogens == 0 && has_stereo_lone_pair(z));
                if metal || !saturated || !lone {
                    return None;
                }
                let sum = arms.iter().fold([0.0; 3], |acc, a| [acc[0] + a.dir[0], acc[1] + a.dir[1], acc[2] + a.dir[2]]);
                arms.push(Arm { ligand: None, dir: unit(scale(sum, -1.0))? });
                tetrahedral(&arms)
            }
            4 if pairs.len() == 2 => {
                let ((a, a2), (b, b2)) = (pairs[0], pairs[1]);
                Some(Rubric::SquarePlanar([arms[a].ligand, arms[b].ligand, arms[a2].ligand, arms[b2].ligand]))
            }
            4 => {
                if centre.hydrogens > 0 || (!metal && !saturated) {
                    return None;
                }
                tetrahedral(&arms)
            }
            5 if pairs.len() == 1 && single.len() == 3 => bipyramid(&arms, pairs[0], &single),
            5 if pairs.len() == 2 && single.len() == 1 => {
                let lone = arms[single[0]].dir;
                arms.push(Arm { ligand: None, dir: scale(lone, -1.0) });
                let mut pairs = pairs;
                pairs.push((single[0], arms.len() - 1));
                octahedral(&arms, &pairs)
            }
            6 if pairs.len() == 3 => octahedral(&arms, &pairs),
            _ => {
                trace!("atom {atom}: no template for degree {degree} with {} trans pairs", pairs.len());
                None
            }
        }
    }

    fn bond_rubric(&self, mol: &Molecule, path: &DotPath, rings: &RingBlocks, bond: usize) -> Option<Rubric> {
        if path.bond_class(bond) != BondClass::O2 || rings.is_ring_bond(bond) {
            return None;
        }
        let (a, b) = mol.bond_endpoints(bond);
        if is_metal(mol.atom(a).atomic_number()) || is_metal(mol.atom(b).atomic_number()) {
            return None;
        }

        let side = |end: usize, other: usize| -> Option<Vec<usize>> {
            let subs: Vec<usize> = mol.neighbours(end).into_iter().filter(|&n| n != other).collect();
            (!subs.is_empty() && subs.len() + mol.atom(end).hydrogens as usize == 2).then_some(subs)
        };
        let subs_a = side(a, b)?;
        let subs_b = side(b, a)?;

        let pa = mol.atom(a).position?;
        let pb = mol.atom(b).position?;
        let axis = unit(sub(pb, pa))?;
        let flat = |from: Position, to: usize| -> Option<Vec3> {
            let v = sub(mol.atom(to).position?, from);
            Some(sub(v, scale(axis, dot(v, axis))))
        };

        let wa = flat(pa, subs_a[0])?;
        let wb = flat(pb, subs_b[0])?;
        let overlap = dot(wa, wb);
        if overlap.abs() < EPSILON {
            trace!("bond {bond}: substituents are perpendicular");
            return None;
        }

        let a_side = [Some(subs_a[0]), subs_a.get(1).copied()];
        let mut b_side = [Some(subs_b[0]), subs_b.get(1).copied()];
        if overlap < 0.0 {
            b_side.swap(0, 1);
        }
        Some(Rubric::BondSides([a_side[0], a_side[1], b_side[0], b_side[1]]))
    }
}

fn tetrahedral(arms: &[Arm]) -> Option<Rubric> {
    let [p0, p1, p2, p3] = [arms[0].dir, arms[1].dir, arms[2].dir, arms[3].dir];
    let volume = det(sub(p1, p0), sub(p2, p0), sub(p3, p0));
    if volume.abs() < EPSILON {
        return None;
    }
    let mut slots = [arms[0].ligand, arms[1].ligand, arms[2].ligand, arms[3].ligand];
    if volume < 0.0 {
        slots.swap(0, 1);
    }
    Some(Rubric::Tetrahedral(slots))
}

fn bipyramid(arms: &[Arm], axis: (usize, usize), equator: &[usize]) -> Option<Rubric> {
    let up = arms[axis.0].dir;
    let e0 = arms[equator[0]].dir;
    // angle of each equatorial arm around the axis, measured from the first
    let angle = |i: usize| {
        let d = arms[i].dir;
        let theta = dot(cross(e0, d), up).atan2(dot(e0, d));
        if theta < 0.0 {
            theta + std::f64::consts::TAU
        } else {
            theta
        }
    };
    let mut around: Vec<(f64, usize)> = equator.iter().map(|&i| (angle(i), i)).collect();
    around.sort_by(|x, y| x.0.total_cmp(&y.0));
    if around.windows(2).any(|w| (w[1].0 - w[0].0).abs() < EPSILON) {
        return None;
    }
    let [e0, e1, e2] = [around[0].1, around[1].1, around[2].1];
    Some(Rubric::TrigonalBipyramidal([
        arms[e0].ligand,
        arms[e1].ligand,
        arms[e2].ligand,
        arms[axis.0].ligand,
        arms[axis.1].ligand,
    ]))
}

fn octahedral(arms: &[Arm], pairs: &[(usize, usize)]) -> Option<Rubric> {
    let [(e0, e2), (e1, e3), (x0, x1)] = [pairs[0], pairs[1], pairs[2]];
    let handed = det(arms[e0].dir, arms[e1].dir, arms[x0].dir);
    if handed.abs() < EPSILON {
        return None;
    }
    let (x0, x1) = if handed > 0.0 { (x0, x1) } else { (x1, x0) };
    Some(Rubric::Octahedral([
        arms[e0].ligand,
        arms[e1].ligand,
        arms[e2].ligand,
        arms[e3].ligand,
        arms[x0].ligand,
        arms[x1].ligand,
    ]))
}
