use thiserror::Error;

/// Failures that abort a single hash computation.
///
/// None of these are expected chemistry outcomes: symmetric structures and
/// degenerate geometries are resolved inside the engine. An `Err` here means
/// the input broke a precondition or an internal invariant did not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Atom index {0} is out of range for a molecule with {1} atoms")]
    AtomOutOfRange(usize, usize),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Atoms {0} and {1} are already bonded")]
    DuplicateBond(usize, usize),
    #[error("Delocalised block {block} has a malformed charge {numer}/{denom}")]
    MalformedCharge { block: usize, numer: i32, denom: i32 },
    #[error("Stereo rubric on {owner} refers to atom {atom}, not in a molecule of {count} atoms")]
    RubricOutOfRange { owner: String, atom: usize, count: usize },
    #[error("Priority refinement did not converge within {0} passes")]
    NonTermination(usize),
    #[error("Invalid {geometry} parity {parity:?}")]
    InvalidParity { geometry: &'static str, parity: Vec<usize> },
    #[error("Bond walk finished with {0} bonds left unvisited")]
    IncompleteWalk(usize),
}
