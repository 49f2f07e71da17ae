//! Parsing dot hashes back into atom labels and bond walks.

use crate::BondClass;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize},
    error::{convert_error, VerboseError},
    multi::{many0, separated_list0},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use thiserror::Error;

type ParseError<'a> = VerboseError<&'a str>;

type Res<'a, T> = IResult<&'a str, T, ParseError<'a>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Malformed dot hash:\n{0}")]
    Syntax(String),
    #[error("Bond walk refers to atom {0}, but the hash lists {1} atoms")]
    AtomOutOfRange(usize, usize),
}

/// One atom of a hash, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomLabel {
    pub symbol: String,
    pub hydrogens: u32,
    pub numer: i32,
    pub denom: i32,
    pub parity: Option<String>,
}

impl Display for AtomLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.symbol)?;
        match self.hydrogens {
            0 => {}
            1 => write!(f, "H")?,
            h => write!(f, "H{h}")?,
        }
        if self.numer != 0 {
            write!(f, "+{}", self.numer)?;
            if self.denom != 1 {
                write!(f, ":{}", self.denom)?;
            }
        }
        if let Some(parity) = &self.parity {
            write!(f, "!{parity}")?;
        }
        Ok(())
    }
}

/// A walk: a starting atom and the `(bond class, next atom)` steps taken
/// from it. Atoms are 1-based positions in the label list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashWalk {
    pub start: usize,
    pub steps: Vec<(BondClass, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHash {
    /// One label per atom; runs are expanded.
    pub atoms: Vec<AtomLabel>,
    pub walks: Vec<HashWalk>,
}

impl ParsedHash {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Every bond the walks cover as `(lower, higher, class)`, in walk order.
    pub fn bonds(&self) -> Vec<(usize, usize, BondClass)> {
        let mut bonds = Vec::new();
        for walk in &self.walks {
            let mut previous = walk.start;
            for &(class, next) in &walk.steps {
                bonds.push((previous.min(next), previous.max(next), class));
                previous = next;
            }
        }
        bonds
    }
}

impl Display for ParsedHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut i = 0;
        while i < self.atoms.len() {
            let label = &self.atoms[i];
            let len = self.atoms[i..].iter().take_while(|other| *other == label).count();
            if i > 0 {
                write!(f, ",")?;
            }
            if len > 1 {
                write!(f, "{len}*")?;
            }
            write!(f, "{label}")?;
            i += len;
        }
        write!(f, ";")?;
        for (n, walk) in self.walks.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", walk.start)?;
            for (class, next) in &walk.steps {
                write!(f, "{class}{next}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for ParsedHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hash(s)
    }
}

fn number(input: &str) -> Res<usize> {
    map_res(digit1, str::parse)(input)
}

fn symbol(input: &str) -> Res<&str> {
    alt((
        tag("*"),
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase()),
            take_while(|c: char| c.is_ascii_lowercase()),
        )),
    ))(input)
}

fn hydrogens(input: &str) -> Res<u32> {
    preceded(char('H'), map(opt(number), |n| n.map_or(1, |n| n as u32)))(input)
}

/// `+n` or `+n:d`, where `n` may be negative.
fn charge(input: &str) -> Res<(i32, i32)> {
    let signed = map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>);
    let denom = map_res(digit1, str::parse::<i32>);
    map(preceded(char('+'), pair(signed, opt(preceded(char(':'), denom)))), |(n, d)| {
        (n, d.unwrap_or(1))
    })(input)
}

fn atom_label(input: &str) -> Res<AtomLabel> {
    let (input, symbol) = symbol(input)?;
    let (input, hydrogens) = opt(hydrogens)(input)?;
    let (input, charge) = opt(charge)(input)?;
    let (input, parity) = opt(preceded(char('!'), take_while1(|c: char| c.is_ascii_alphanumeric())))(input)?;
    let (numer, denom) = charge.unwrap_or((0, 1));
    Ok((
        input,
        AtomLabel {
            symbol: symbol.to_string(),
            hydrogens: hydrogens.unwrap_or(0),
            numer,
            denom,
            parity: parity.map(str::to_string),
        },
    ))
}

fn run(input: &str) -> Res<Vec<AtomLabel>> {
    map(pair(opt(terminated(number, char('*'))), atom_label), |(count, label)| {
        vec![label; count.unwrap_or(1)]
    })(input)
}

fn bond_class(input: &str) -> Res<BondClass> {
    map_opt(
        alt((
            tag("*-"),
            tag("*"),
            tag("-="),
            tag("-"),
            tag("=#"),
            tag("="),
            tag("#+"),
            tag("#"),
        )),
        BondClass::from_symbol,
    )(input)
}

fn walk(input: &str) -> Res<HashWalk> {
    map(pair(number, many0(pair(bond_class, number))), |(start, steps)| HashWalk { start, steps })(input)
}

fn hash(input: &str) -> Res<ParsedHash> {
    map(
        tuple((separated_list0(char(','), run), char(';'), separated_list0(char(','), walk))),
        |(runs, _, walks)| ParsedHash {
            atoms: runs.into_iter().flatten().collect(),
            walks,
        },
    )(input)
}

/// Parses a hash produced by the composer.
pub fn parse_hash(input: &str) -> Result<ParsedHash, HashParseError> {
    let input = input.trim();
    let parsed = match all_consuming(hash)(input) {
        Ok((_, parsed)) => parsed,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(HashParseError::Syntax(convert_error(input, e))),
        Err(nom::Err::Incomplete(_)) => return Err(HashParseError::Syntax("incomplete".to_string())),
    };

    let count = parsed.atom_count();
    let positions = parsed
        .walks
        .iter()
        .flat_map(|w| std::iter::once(w.start).chain(w.steps.iter().map(|&(_, next)| next)));
    for position in positions {
        if position == 0 || position > count {
            return Err(HashParseError::AtomOutOfRange(position, count));
        }
    }
    Ok(parsed)
}
