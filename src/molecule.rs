use crate::element::atomic_number;
use crate::HashError;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

pub type Position = [f64; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub charge: i32,
    pub unpaired: u32,
    /// Implicit and explicit hydrogens that are not nodes in the graph.
    pub hydrogens: u32,
    pub isotope: Option<u32>,
    pub position: Option<Position>,
}

impl Atom {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            charge: 0,
            unpaired: 0,
            hydrogens: 0,
            isotope: None,
            position: None,
        }
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_hydrogens(mut self, hydrogens: u32) -> Self {
        self.hydrogens = hydrogens;
        self
    }

    pub fn with_unpaired(mut self, unpaired: u32) -> Self {
        self.unpaired = unpaired;
        self
    }

    pub fn with_isotope(mut self, isotope: u32) -> Self {
        self.isotope = Some(isotope);
        self
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Some([x, y, z]);
        self
    }

    pub fn atomic_number(&self) -> u32 {
        atomic_number(&self.symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    /// Integer bond order; 0 is a dative or zero-order bond.
    pub order: u32,
    /// Resonance-averaged bond, counted as order 3/2.
    pub aromatic: bool,
}

impl Bond {
    pub fn new(order: u32) -> Self {
        Self { order, aromatic: false }
    }

    pub fn zero() -> Self {
        Self::new(0)
    }

    pub fn single() -> Self {
        Self::new(1)
    }

    pub fn double() -> Self {
        Self::new(2)
    }

    pub fn triple() -> Self {
        Self::new(3)
    }

    pub fn aromatic() -> Self {
        Self { order: 1, aromatic: true }
    }

    /// Bond order in units of one half.
    pub fn half_order(&self) -> u32 {
        if self.aromatic {
            3
        } else {
            2 * self.order
        }
    }
}

pub type MoleculeGraph = UnGraph<Atom, Bond>;

/// Old indices for every atom and bond of a derived molecule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    /// `atoms[new] == old`
    pub atoms: Vec<usize>,
    /// `bonds[new] == old`
    pub bonds: Vec<usize>,
}

impl IndexMap {
    /// Inverse of the atom map: `result[old] == Some(new)` for atoms that survived.
    pub fn atom_lookup(&self, old_count: usize) -> Vec<Option<usize>> {
        let mut lookup = vec![None; old_count];
        for (new, &old) in self.atoms.iter().enumerate() {
            if old < old_count {
                lookup[old] = Some(new);
            }
        }
        lookup
    }
}

/// A molecular graph addressed by plain atom and bond indices.
///
/// Atoms and bonds are never removed in place, so indices stay valid for the
/// life of the value. Derived graphs are built by [`Molecule::subgraph_mask`]
/// and friends, which report how indices moved.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: MoleculeGraph,
}

impl Molecule {
    pub fn new() -> Self {
        Self {
            graph: MoleculeGraph::new_undirected(),
        }
    }

    pub fn from_graph(graph: MoleculeGraph) -> Self {
        Self { graph }
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atom(&self, idx: usize) -> &Atom {
        &self.graph[NodeIndex::new(idx)]
    }

    pub fn atom_mut(&mut self, idx: usize) -> &mut Atom {
        &mut self.graph[NodeIndex::new(idx)]
    }

    pub fn bond(&self, idx: usize) -> &Bond {
        &self.graph[EdgeIndex::new(idx)]
    }

    pub fn bond_mut(&mut self, idx: usize) -> &mut Bond {
        &mut self.graph[EdgeIndex::new(idx)]
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.graph.add_node(atom).index()
    }

    pub fn add_bond(&mut self, a: usize, b: usize, bond: Bond) -> Result<usize, HashError> {
        let count = self.atom_count();
        for idx in [a, b] {
            if idx >= count {
                return Err(HashError::AtomOutOfRange(idx, count));
            }
        }
        if a == b {
            return Err(HashError::SelfBond(a));
        }
        if self.find_bond(a, b).is_some() {
            return Err(HashError::DuplicateBond(a, b));
        }
        Ok(self
            .graph
            .add_edge(NodeIndex::new(a), NodeIndex::new(b), bond)
            .index())
    }

    pub fn bond_endpoints(&self, bond: usize) -> (usize, usize) {
        // Edges are never removed, so every index below bond_count resolves.
        self.graph
            .edge_endpoints(EdgeIndex::new(bond))
            .map(|(a, b)| (a.index(), b.index()))
            .unwrap_or((0, 0))
    }

    pub fn bond_other(&self, bond: usize, atom: usize) -> usize {
        let (a, b) = self.bond_endpoints(bond);
        if a == atom {
            b
        } else {
            a
        }
    }

    pub fn find_bond(&self, a: usize, b: usize) -> Option<usize> {
        self.graph
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .map(|e| e.index())
    }

    /// Neighbouring atoms in ascending index order.
    pub fn neighbours(&self, atom: usize) -> Vec<usize> {
        let mut nbrs: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(atom))
            .map(|n| n.index())
            .collect();
        nbrs.sort_unstable();
        nbrs
    }

    /// Incident bonds, ordered to match [`Molecule::neighbours`].
    pub fn atom_bonds(&self, atom: usize) -> Vec<usize> {
        let mut bonds: Vec<(usize, usize)> = self
            .graph
            .edges(NodeIndex::new(atom))
            .map(|e| (self.bond_other(e.id().index(), atom), e.id().index()))
            .collect();
        bonds.sort_unstable();
        bonds.into_iter().map(|(_, b)| b).collect()
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.graph.neighbors(NodeIndex::new(atom)).count()
    }

    /// A plain hydrogen hanging off one heavy atom by a single bond, which
    /// can be folded into that atom's hydrogen count without losing anything.
    pub fn boring_hydrogen(&self, atom: usize) -> bool {
        let a = self.atom(atom);
        if a.symbol != "H" || a.charge != 0 || a.unpaired != 0 || a.isotope.is_some() || a.hydrogens != 0 {
            return false;
        }
        let bonds = self.atom_bonds(atom);
        if bonds.len() != 1 {
            return false;
        }
        let bond = self.bond(bonds[0]);
        if bond.order != 1 || bond.aromatic {
            return false;
        }
        self.atom(self.bond_other(bonds[0], atom)).symbol != "H"
    }

    /// Keeps only the atoms whose mask entry is true, together with the bonds
    /// between them.
    pub fn subgraph_mask(&self, keep: &[bool]) -> (Molecule, IndexMap) {
        let kept = |idx: usize| keep.get(idx).copied().unwrap_or(false);

        let atoms: Vec<usize> = (0..self.atom_count()).filter(|&i| kept(i)).collect();
        let bonds: Vec<usize> = (0..self.bond_count())
            .filter(|&b| {
                let (a1, a2) = self.bond_endpoints(b);
                kept(a1) && kept(a2)
            })
            .collect();

        // filter_map keeps the survivors in index order, matching the maps above
        let graph = self.graph.filter_map(
            |n, atom| kept(n.index()).then(|| atom.clone()),
            |_, bond| Some(*bond),
        );
        (Molecule::from_graph(graph), IndexMap { atoms, bonds })
    }

    /// Folds boring hydrogens into their neighbour's hydrogen count. Atoms
    /// flagged in `protect` are left in the graph.
    pub fn collapse_hydrogens(&self, protect: &[bool]) -> (Molecule, IndexMap) {
        let mut source = self.clone();
        let mut keep = vec![true; self.atom_count()];
        for n in 0..self.atom_count() {
            if protect.get(n).copied().unwrap_or(false) || !self.boring_hydrogen(n) {
                continue;
            }
            let heavy = self.neighbours(n)[0];
            source.atom_mut(heavy).hydrogens += 1;
            keep[n] = false;
        }
        source.subgraph_mask(&keep)
    }

    /// Rebuilds the molecule with atom `order[i]` placed at index `i`. Bonds
    /// are inserted in reverse, so neighbour and bond order both change.
    pub fn renumber(&self, order: &[usize]) -> Result<Molecule, HashError> {
        let count = self.atom_count();
        let mut position = vec![usize::MAX; count];
        for (new, &old) in order.iter().enumerate() {
            if old >= count {
                return Err(HashError::AtomOutOfRange(old, count));
            }
            position[old] = new;
        }
        if let Some(missing) = position.iter().position(|&p| p == usize::MAX) {
            return Err(HashError::AtomOutOfRange(missing, order.len()));
        }

        let mut mol = Molecule::new();
        for &old in order {
            mol.add_atom(self.atom(old).clone());
        }
        for b in (0..self.bond_count()).rev() {
            let (a1, a2) = self.bond_endpoints(b);
            mol.add_bond(position[a2], position[a1], *self.bond(b))?;
        }
        Ok(mol)
    }

    /// Component id per atom over the full bond graph, with `isolate` cut
    /// out of it.
    pub fn components_without(&self, isolate: Option<usize>) -> Vec<usize> {
        let n = self.atom_count();
        let mut uf = UnionFind::<usize>::new(n);
        for b in 0..self.bond_count() {
            let (a1, a2) = self.bond_endpoints(b);
            if Some(a1) == isolate || Some(a2) == isolate {
                continue;
            }
            uf.union(a1, a2);
        }
        (0..n).map(|i| uf.find_mut(i)).collect()
    }
}

/// Ring membership derived from the bond graph.
///
/// A bond is a ring bond when its endpoints stay connected without it. Ring
/// blocks are the connected pieces of the ring-bond subgraph, numbered from 1
/// in order of their lowest atom; atoms outside every ring are in block 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBlocks {
    pub ring_bond: Vec<bool>,
    pub atom_block: Vec<usize>,
}

impl RingBlocks {
    pub fn new(mol: &Molecule) -> Self {
        let na = mol.atom_count();
        let nb = mol.bond_count();

        let ring_bond: Vec<bool> = (0..nb)
            .map(|skip| {
                let mut uf = UnionFind::<usize>::new(na);
                for b in (0..nb).filter(|&b| b != skip) {
                    let (a1, a2) = mol.bond_endpoints(b);
                    uf.union(a1, a2);
                }
                let (a1, a2) = mol.bond_endpoints(skip);
                uf.equiv(a1, a2)
            })
            .collect();

        let mut uf = UnionFind::<usize>::new(na);
        let mut in_ring = vec![false; na];
        for b in (0..nb).filter(|&b| ring_bond[b]) {
            let (a1, a2) = mol.bond_endpoints(b);
            uf.union(a1, a2);
            in_ring[a1] = true;
            in_ring[a2] = true;
        }

        let mut atom_block = vec![0; na];
        let mut block_of_root = std::collections::HashMap::new();
        for n in (0..na).filter(|&n| in_ring[n]) {
            let next = block_of_root.len() + 1;
            atom_block[n] = *block_of_root.entry(uf.find_mut(n)).or_insert(next);
        }

        Self { ring_bond, atom_block }
    }

    pub fn block(&self, atom: usize) -> usize {
        self.atom_block.get(atom).copied().unwrap_or(0)
    }

    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.ring_bond.get(bond).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethanol_with_hydrogens() -> Molecule {
        let mut mol = Molecule::new();
        let c1 = mol.add_atom(Atom::new("C"));
        let c2 = mol.add_atom(Atom::new("C"));
        let o = mol.add_atom(Atom::new("O"));
        mol.add_bond(c1, c2, Bond::single()).unwrap();
        mol.add_bond(c2, o, Bond::single()).unwrap();
        for heavy in [c1, c1, c1, c2, c2, o] {
            let h = mol.add_atom(Atom::new("H"));
            mol.add_bond(heavy, h, Bond::single()).unwrap();
        }
        mol
    }

    #[test]
    fn test_add_bond_rejects_bad_input() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::new("C"));
        let b = mol.add_atom(Atom::new("O"));
        assert_eq!(mol.add_bond(a, a, Bond::single()), Err(HashError::SelfBond(0)));
        assert_eq!(mol.add_bond(a, 5, Bond::single()), Err(HashError::AtomOutOfRange(5, 2)));
        assert!(mol.add_bond(a, b, Bond::double()).is_ok());
        assert_eq!(mol.add_bond(b, a, Bond::single()), Err(HashError::DuplicateBond(1, 0)));
    }

    #[test]
    fn test_collapse_hydrogens() {
        let mol = ethanol_with_hydrogens();
        assert_eq!(mol.atom_count(), 9);

        let (collapsed, map) = mol.collapse_hydrogens(&[]);
        assert_eq!(collapsed.atom_count(), 3);
        assert_eq!(collapsed.bond_count(), 2);
        assert_eq!(map.atoms, vec![0, 1, 2]);
        assert_eq!(map.bonds, vec![0, 1]);
        assert_eq!(collapsed.atom(0).hydrogens, 3);
        assert_eq!(collapsed.atom(1).hydrogens, 2);
        assert_eq!(collapsed.atom(2).hydrogens, 1);

        // the caller's molecule is untouched
        assert_eq!(mol.atom(0).hydrogens, 0);
    }

    #[test]
    fn test_collapse_respects_protection() {
        let mol = ethanol_with_hydrogens();
        let mut protect = vec![false; mol.atom_count()];
        protect[8] = true;
        let (collapsed, map) = mol.collapse_hydrogens(&protect);
        assert_eq!(collapsed.atom_count(), 4);
        assert_eq!(map.atoms, vec![0, 1, 2, 8]);
        assert_eq!(collapsed.atom(2).hydrogens, 0);
    }

    #[test]
    fn test_dihydrogen_is_not_boring() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(Atom::new("H"));
        let b = mol.add_atom(Atom::new("H"));
        mol.add_bond(a, b, Bond::single()).unwrap();
        assert!(!mol.boring_hydrogen(a));
        assert!(!mol.boring_hydrogen(b));
    }

    #[test]
    fn test_renumber() {
        let mol = ethanol_with_hydrogens();
        let order: Vec<usize> = (0..mol.atom_count()).rev().collect();
        let renumbered = mol.renumber(&order).unwrap();
        assert_eq!(renumbered.atom(8).symbol, "C");
        assert_eq!(renumbered.atom(6).symbol, "O");
        assert!(renumbered.find_bond(8, 7).is_some());
        assert!(renumbered.find_bond(7, 6).is_some());
        assert!(mol.renumber(&[0, 1]).is_err());
    }

    #[test]
    fn test_ring_blocks() {
        // two cyclopropanes joined by a bridging carbon, plus a methyl tail
        let mut mol = Molecule::new();
        for _ in 0..8 {
            mol.add_atom(Atom::new("C"));
        }
        mol.add_bond(0, 1, Bond::single()).unwrap();
        mol.add_bond(1, 2, Bond::single()).unwrap();
        mol.add_bond(2, 0, Bond::single()).unwrap();
        mol.add_bond(2, 3, Bond::single()).unwrap();
        mol.add_bond(3, 4, Bond::single()).unwrap();
        mol.add_bond(4, 5, Bond::single()).unwrap();
        mol.add_bond(5, 6, Bond::single()).unwrap();
        mol.add_bond(6, 4, Bond::single()).unwrap();
        mol.add_bond(6, 7, Bond::single()).unwrap();

        let rings = RingBlocks::new(&mol);
        assert_eq!(
            rings.ring_bond,
            vec![true, true, true, false, false, true, true, true, false]
        );
        assert_eq!(rings.atom_block, vec![1, 1, 1, 0, 2, 2, 2, 0]);
    }

    #[test]
    fn test_components_without() {
        let mol = ethanol_with_hydrogens();
        let cc = mol.components_without(Some(1));
        assert_eq!(cc[0], cc[3]);
        assert_ne!(cc[0], cc[2]);
        assert_eq!(cc[2], cc[8]);
    }
}
