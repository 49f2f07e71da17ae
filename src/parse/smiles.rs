use crate::{element, Atom, Bond, HashError, Molecule};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum SmilesError {
    #[error("Branch start '(' at position {0} (followed by {1}) without a current atom")]
    BranchNoCurrentAtom(usize, String),
    #[error("Branch end ')' at position {0} (followed by {1}) without a matching '('")]
    BranchEndNoStart(usize, String),
    #[error("Ring closure digit '{0}' at position {1} without a current atom")]
    RingClosureNoCurrentAtom(char, usize),
    #[error("Incomplete ring closure after '%' at position {0}")]
    IncompleteRingClosure(usize),
    #[error("Ring closure {0} was opened but never closed")]
    UnclosedRing(u8),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Cannot read bracket atom '[{1}]' at position {0}")]
    BadBracket(usize, String),
    #[error("Unknown atom '{0}' at position {1}")]
    UnknownAtom(char, usize),
}

/// Parses a SMILES string into a [`Molecule`].
///
/// Atoms outside brackets get implicit hydrogens from their default
/// valences. Chirality marks are accepted and ignored; stereochemistry comes
/// from coordinates, which SMILES does not carry.
///
/// # Arguments
///
/// * `smiles` - The SMILES string to parse.
///
/// # Returns
///
/// * `Result<Molecule>` - The parsed molecule or a description of what went wrong.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_helper(smiles).context(format!("Failed to parse SMILES string {smiles}"))
}

fn parse_smiles_helper(smiles: &str) -> Result<Molecule> {
    let mut mol = Molecule::new();
    // per atom: written in lowercase, written in brackets
    let mut aromatic: Vec<bool> = Vec::new();
    let mut bracketed: Vec<bool> = Vec::new();

    let mut current: Option<usize> = None;
    let mut pending: Option<Bond> = None;
    let mut branch_stack: Vec<usize> = Vec::new();
    let mut ring_map: BTreeMap<u8, (usize, Option<Bond>)> = BTreeMap::new();

    let chars: Vec<char> = smiles.trim().chars().collect();
    let rest = |i: usize| chars[i..].iter().collect::<String>();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current.ok_or_else(|| SmilesError::BranchNoCurrentAtom(i, rest(i)))?;
                branch_stack.push(atom);
                i += 1;
            }
            ')' => {
                current = Some(branch_stack.pop().ok_or_else(|| SmilesError::BranchEndNoStart(i, rest(i)))?);
                pending = None;
                i += 1;
            }
            '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                pending = Some(match c {
                    '=' => Bond::double(),
                    '#' => Bond::triple(),
                    '$' => Bond::new(4),
                    ':' => Bond::aromatic(),
                    // '/' and '\' only mark double bond geometry
                    _ => Bond::single(),
                });
                i += 1;
            }
            '.' => {
                current = None;
                pending = None;
                i += 1;
            }
            '%' | '0'..='9' => {
                let (number, width) = if c == '%' {
                    let digits: String = chars.get(i + 1..i + 3).ok_or(SmilesError::IncompleteRingClosure(i))?.iter().collect();
                    let number: u8 = digits.parse().map_err(|_| SmilesError::IncompleteRingClosure(i))?;
                    (number, 3)
                } else {
                    (c.to_digit(10).map_or(0, |d| d as u8), 1)
                };
                let atom = current.ok_or(SmilesError::RingClosureNoCurrentAtom(c, i))?;
                match ring_map.remove(&number) {
                    Some((start, opened)) => {
                        let bond = pending.take().or(opened).unwrap_or_else(|| default_bond(&aromatic, start, atom));
                        mol.add_bond(start, atom, bond)?;
                    }
                    None => {
                        ring_map.insert(number, (atom, pending.take()));
                    }
                }
                i += width;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|e| i + e)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let (atom, is_aromatic) =
                    parse_bracket(&content).ok_or_else(|| SmilesError::BadBracket(i, content.clone()))?;
                aromatic.push(is_aromatic);
                bracketed.push(true);
                let idx = mol.add_atom(atom);
                attach(&mut mol, &aromatic, current, pending.take(), idx)?;
                current = Some(idx);
                i = end + 1;
            }
            _ => {
                let (symbol, is_aromatic, width) = organic_atom(&chars[i..]).ok_or(SmilesError::UnknownAtom(c, i))?;
                aromatic.push(is_aromatic);
                bracketed.push(false);
                let idx = mol.add_atom(Atom::new(&symbol));
                attach(&mut mol, &aromatic, current, pending.take(), idx)?;
                current = Some(idx);
                i += width;
            }
        }
    }

    if let Some(&number) = ring_map.keys().next() {
        return Err(SmilesError::UnclosedRing(number).into());
    }

    for n in (0..mol.atom_count()).filter(|&n| !bracketed[n]) {
        let hydrogens = implicit_hydrogens(&mol, n, aromatic[n]);
        mol.atom_mut(n).hydrogens = hydrogens;
    }
    trace!("parsed {smiles} into {} atoms and {} bonds", mol.atom_count(), mol.bond_count());
    Ok(mol)
}

fn attach(
    mol: &mut Molecule,
    aromatic: &[bool],
    previous: Option<usize>,
    pending: Option<Bond>,
    atom: usize,
) -> Result<(), HashError> {
    if let Some(prev) = previous {
        let bond = pending.unwrap_or_else(|| default_bond(aromatic, prev, atom));
        mol.add_bond(prev, atom, bond)?;
    }
    Ok(())
}

fn default_bond(aromatic: &[bool], a: usize, b: usize) -> Bond {
    if aromatic[a] && aromatic[b] {
        Bond::aromatic()
    } else {
        Bond::single()
    }
}

/// Reads one atom of the organic subset from the front of `chars`.
fn organic_atom(chars: &[char]) -> Option<(String, bool, usize)> {
    match chars {
        ['C', 'l', ..] => Some(("Cl".into(), false, 2)),
        ['B', 'r', ..] => Some(("Br".into(), false, 2)),
        ['*', ..] => Some(("*".into(), false, 1)),
        [c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I'), ..] => Some((c.to_string(), false, 1)),
        [c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's'), ..] => Some((c.to_ascii_uppercase().to_string(), true, 1)),
        _ => None,
    }
}

/// Parses the inside of a bracket atom: isotope, symbol, chirality, hydrogen
/// count, charge and atom class, in that order.
fn parse_bracket(content: &str) -> Option<(Atom, bool)> {
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    let number = |i: &mut usize| -> Option<u32> {
        let start = *i;
        while *i < chars.len() && chars[*i].is_ascii_digit() {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>().parse().ok()
    };

    let isotope = number(&mut i);

    let (symbol, aromatic) = match chars.get(i..) {
        Some(['*', ..]) => {
            i += 1;
            ("*".to_string(), false)
        }
        Some(['s', 'e', ..]) => {
            i += 2;
            ("Se".to_string(), true)
        }
        Some(['a', 's', ..]) => {
            i += 2;
            ("As".to_string(), true)
        }
        Some([c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's'), ..]) => {
            i += 1;
            (c.to_ascii_uppercase().to_string(), true)
        }
        Some([a, b, ..]) if a.is_ascii_uppercase() && b.is_ascii_lowercase() && element::is_element(&format!("{a}{b}")) => {
            i += 2;
            (format!("{a}{b}"), false)
        }
        Some([a, ..]) if a.is_ascii_uppercase() => {
            i += 1;
            (a.to_string(), false)
        }
        _ => return None,
    };

    while chars.get(i) == Some(&'@') {
        i += 1;
    }

    let mut hydrogens = 0;
    if chars.get(i) == Some(&'H') {
        i += 1;
        hydrogens = number(&mut i).unwrap_or(1);
    }

    let mut charge = 0;
    if let Some(&sign @ ('+' | '-')) = chars.get(i) {
        let unit = if sign == '+' { 1 } else { -1 };
        i += 1;
        match number(&mut i) {
            Some(magnitude) => charge = unit * magnitude as i32,
            None => {
                charge = unit;
                while chars.get(i) == Some(&sign) {
                    charge += unit;
                    i += 1;
                }
            }
        }
    }

    if chars.get(i) == Some(&':') {
        i += 1;
        number(&mut i)?;
    }
    if i != chars.len() {
        return None;
    }

    let mut atom = Atom::new(&symbol).with_charge(charge).with_hydrogens(hydrogens);
    if let Some(isotope) = isotope {
        atom = atom.with_isotope(isotope);
    }
    Some((atom, aromatic))
}

fn default_valences(symbol: &str) -> &'static [u32] {
    match symbol {
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "P" => &[3, 5],
        "S" => &[2, 4, 6],
        "F" | "Cl" | "Br" | "I" => &[1],
        _ => &[],
    }
}

/// Hydrogens needed to bring an organic-subset atom up to its next default
/// valence. Aromatic atoms only ever use their lowest valence, with one unit
/// taken by the ring.
fn implicit_hydrogens(mol: &Molecule, atom: usize, aromatic: bool) -> u32 {
    let valences = default_valences(&mol.atom(atom).symbol);
    let used: u32 = mol
        .atom_bonds(atom)
        .into_iter()
        .map(|b| {
            let bond = mol.bond(b);
            if bond.aromatic {
                1
            } else {
                bond.order
            }
        })
        .sum();
    if aromatic {
        return valences.first().map_or(0, |&v| v.saturating_sub(used + 1));
    }
    valences.iter().find(|&&v| v >= used).map_or(0, |&v| v - used)
}
