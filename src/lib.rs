//! Canonical hashing of molecules, including coordination complexes.
//!
//! A [`Molecule`] is reduced to a string that is identical for any two
//! drawings of the same species: atom order, explicit or implicit hydrogens
//! and resonance forms all wash out, while stereoisomers read from atom
//! coordinates stay distinct.
//!
//! ```ignore
//! let mol = coordhash::parse_smiles("CCO")?;
//! assert_eq!(coordhash::calculate(&mol, true)?, "CH2,CH3,OH;2-1-3");
//! ```

use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

pub mod element;

mod error;
pub use error::*;

mod molecule;
pub use molecule::*;

mod dotpath;
pub use dotpath::*;

pub mod stereo;

pub mod canon;

pub mod compose;

mod dothash;
pub use dothash::*;

mod parse;
pub use parse::*;

pub mod analysis;
pub use analysis::{Analyser, Analysis, Finding, FindingKind, ValenceRules};

/// Installs a formatting subscriber that writes to stderr at `level`
/// ("error", "warn", "info", "debug", "trace" or "off"). Unknown levels fall
/// back to "info". Only the first call has any effect.
pub fn init_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
