//! Sanity checks on a molecule before it is hashed: valences, metal
//! oxidation states and the molecular formula, plus one automatic fix for
//! metal carbonyls drawn with a zero-order bond.

use crate::Molecule;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::fmt;
use tracing::*;

type Table = BTreeMap<String, Vec<i32>>;

fn table(entries: &[(&str, &[i32])]) -> Table {
    entries.iter().map(|(el, list)| (el.to_string(), list.to_vec())).collect()
}

lazy_static! {
    static ref VALENCES: Table = table(&[
        ("H", &[1]),
        ("C", &[4]),
        ("N", &[3]),
        ("O", &[2]),
        ("Si", &[4]),
        ("P", &[3, 5]),
        ("S", &[2, 4]),
        ("F", &[1]),
        ("Cl", &[1]),
        ("Br", &[1]),
        ("I", &[1]),
        ("B", &[3, 5]),
        ("Ne", &[0]),
        ("Ar", &[0]),
        ("Ge", &[4]),
        ("As", &[3]),
        ("Se", &[6]),
        ("Kr", &[0]),
        ("Te", &[6]),
        ("Xe", &[0]),
        ("Rn", &[0]),
    ]);

    /// Extra valences that are allowed once oxygen or fluorine accounts for
    /// the excess.
    static ref OXIDISED_VALENCES: Table = table(&[
        ("P", &[7]),
        ("S", &[6]),
        ("Cl", &[3, 5, 7]),
        ("Br", &[3, 5, 7]),
        ("I", &[3, 5, 7]),
        ("Se", &[6]),
        ("Te", &[6]),
        ("Xe", &[2, 4, 6]),
    ]);

    /// Usual oxidation states of metals. These are guides; exceptions abound.
    static ref OXIDATION_STATES: Table = table(&[
        ("Li", &[1]), ("Na", &[1]), ("K", &[1]), ("Rb", &[1]), ("Cs", &[1]), ("Fr", &[1]),
        ("Be", &[2]), ("Mg", &[2]), ("Ca", &[2]), ("Sr", &[2]), ("Ba", &[2]), ("Ra", &[2]),
        ("Al", &[3]), ("Ga", &[3]), ("In", &[1, 3]), ("Tl", &[1, 3]),
        ("Sn", &[2, 4]), ("Pb", &[2, 4]), ("Sb", &[3, 5]), ("Bi", &[3, 5]),
        ("Po", &[2]), ("At", &[1]),
        ("Sc", &[3]), ("Y", &[3]), ("Lu", &[3]),
        ("Ti", &[2, 4]), ("Zr", &[4]), ("Hf", &[4]),
        ("V", &[5]), ("Nb", &[5]), ("Ta", &[5]),
        ("Cr", &[2, 3, 6]), ("Mo", &[0, 2, 3, 4, 6]), ("W", &[2, 4, 6]),
        ("Mn", &[1, 2, 3, 5, 7]), ("Tc", &[7]), ("Re", &[1, 3]),
        ("Fe", &[0, 2, 3]), ("Ru", &[0, 2, 3]), ("Os", &[0, 2]),
        ("Co", &[0, 2, 3]), ("Rh", &[1, 3]), ("Ir", &[1, 3]),
        ("Ni", &[0, 2, 3]), ("Pd", &[0, 2]), ("Pt", &[0, 2]),
        ("Cu", &[1, 2]), ("Ag", &[1]), ("Au", &[1, 2]),
        ("Zn", &[2]), ("Cd", &[2]), ("Hg", &[2]),
    ]);
}

/// The tables an [`Analyser`] judges atoms against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValenceRules {
    pub valences: Table,
    pub oxidised_valences: Table,
    pub oxidation_states: Table,
}

impl Default for ValenceRules {
    fn default() -> Self {
        Self {
            valences: VALENCES.clone(),
            oxidised_valences: OXIDISED_VALENCES.clone(),
            oxidation_states: OXIDATION_STATES.clone(),
        }
    }
}

impl ValenceRules {
    pub fn with_valences(mut self, symbol: &str, valences: &[i32]) -> Self {
        self.valences.insert(symbol.to_string(), valences.to_vec());
        self
    }

    pub fn with_oxidation_states(mut self, symbol: &str, states: &[i32]) -> Self {
        self.oxidation_states.insert(symbol.to_string(), states.to_vec());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    /// A carbonyl carbon on a zero-order bond was given its two unpaired
    /// electrons.
    FixCarbonyl,
    NonElement,
    BadValence,
    OddOxState,
    WrongFormula,
}

impl FindingKind {
    pub fn code(self) -> &'static str {
        match self {
            FindingKind::FixCarbonyl => "fixcarbonyl",
            FindingKind::NonElement => "nonelement",
            FindingKind::BadValence => "badvalence",
            FindingKind::OddOxState => "oxstate",
            FindingKind::WrongFormula => "wrongformula",
        }
    }

    pub fn is_fix(self) -> bool {
        self == FindingKind::FixCarbonyl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub atom: Option<usize>,
    pub value: Option<i32>,
    pub text: Option<String>,
}

impl Finding {
    fn on_atom(kind: FindingKind, atom: usize) -> Self {
        Self { kind, atom: Some(atom), value: None, text: None }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.code())?;
        let details: Vec<String> = [
            self.atom.map(|a| format!("atom {}", a + 1)),
            self.value.map(|v| v.to_string()),
            self.text.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            write!(f, "({})", details.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub findings: Vec<Finding>,
    /// The input with every fix applied.
    pub corrected: Molecule,
    /// Molecular formula of the corrected molecule, in Hill order.
    pub formula: String,
}

impl Analysis {
    pub fn problems(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.kind.is_fix())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analyser {
    rules: ValenceRules,
}

impl Analyser {
    pub fn new(rules: ValenceRules) -> Self {
        Self { rules }
    }

    /// Checks `mol`, which is left untouched; fixes land on the returned copy.
    /// `expected_formula`, when given, is compared against the computed one.
    pub fn analyse(&self, mol: &Molecule, expected_formula: Option<&str>) -> Analysis {
        let mut corrected = mol.clone();
        let mut findings = Vec::new();

        for atom in 0..corrected.atom_count() {
            if fix_carbonyl(&mut corrected, atom) {
                debug!("atom {atom} is a carbonyl carbon on a zero-order bond");
                findings.push(Finding::on_atom(FindingKind::FixCarbonyl, atom));
            }
        }
        for atom in 0..corrected.atom_count() {
            findings.extend(self.valence_problems(&corrected, atom));
        }

        let formula = hill_formula(&corrected);
        if let Some(expected) = expected_formula {
            if expected != formula {
                findings.push(Finding {
                    kind: FindingKind::WrongFormula,
                    atom: None,
                    value: None,
                    text: Some(formula.clone()),
                });
            }
        }
        Analysis { findings, corrected, formula }
    }

    fn valence_problems(&self, mol: &Molecule, atom: usize) -> Vec<Finding> {
        let a = mol.atom(atom);
        if a.atomic_number() == 0 {
            return vec![Finding {
                text: Some(a.symbol.clone()),
                ..Finding::on_atom(FindingKind::NonElement, atom)
            }];
        }
        let bonds = mol.atom_bonds(atom);
        // isolated atoms and fractional orders are not judged
        if bonds.is_empty() || bonds.iter().any(|&b| mol.bond(b).aromatic) {
            return vec![];
        }
        let want_valence = self.rules.valences.get(&a.symbol);
        let want_oxstate = self.rules.oxidation_states.get(&a.symbol);
        if want_valence.is_none() && want_oxstate.is_none() {
            return vec![];
        }

        let hydrogens = a.hydrogens as i32;
        let mut valence = -a.charge + a.unpaired as i32 + hydrogens;
        let mut oxstate = a.charge + hydrogens;
        let mut oxy_valence = 0;
        for &b in &bonds {
            let order = mol.bond(b).order as i32;
            valence += order;
            oxstate += order % 2;
            if matches!(mol.atom(mol.bond_other(b, atom)).symbol.as_str(), "O" | "F") {
                oxy_valence += order;
            }
        }

        let mut findings = Vec::new();
        if let Some(want) = want_valence.filter(|want| !want.contains(&valence)) {
            let oxidised = oxy_valence > 0
                && want.contains(&(valence - oxy_valence))
                && self
                    .rules
                    .oxidised_valences
                    .get(&a.symbol)
                    .is_some_and(|options| options.contains(&valence));
            if !oxidised {
                findings.push(Finding {
                    value: Some(valence),
                    ..Finding::on_atom(FindingKind::BadValence, atom)
                });
            }
        }
        if want_oxstate.is_some_and(|want| !want.contains(&oxstate)) {
            findings.push(Finding {
                value: Some(oxstate),
                ..Finding::on_atom(FindingKind::OddOxState, atom)
            });
        }
        findings
    }
}

fn fix_carbonyl(mol: &mut Molecule, atom: usize) -> bool {
    let a = mol.atom(atom);
    if a.symbol != "C" || a.unpaired == 2 || a.hydrogens != 0 {
        return false;
    }
    let bonds = mol.atom_bonds(atom);
    if bonds.len() != 2 {
        return false;
    }
    let mut orders = [mol.bond(bonds[0]).order, mol.bond(bonds[1]).order];
    orders.sort_unstable();
    if orders != [0, 2] {
        return false;
    }
    mol.atom_mut(atom).unpaired = 2;
    true
}

/// Molecular formula in Hill order: carbon, then hydrogen, then the rest
/// alphabetically. Without carbon everything is alphabetical.
pub fn hill_formula(mol: &Molecule) -> String {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for n in 0..mol.atom_count() {
        let atom = mol.atom(n);
        *counts.entry(atom.symbol.clone()).or_default() += 1;
        if atom.hydrogens > 0 {
            *counts.entry("H".to_string()).or_default() += atom.hydrogens;
        }
    }

    let mut order: Vec<String> = Vec::new();
    if counts.contains_key("C") {
        for first in ["C", "H"] {
            if counts.contains_key(first) {
                order.push(first.to_string());
            }
        }
    }
    let rest: Vec<String> = counts.keys().filter(|el| !order.contains(el)).cloned().collect();
    order.extend(rest);

    let mut formula = String::new();
    for el in order {
        let count = counts[&el];
        formula.push_str(&el);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    }
    formula
}
