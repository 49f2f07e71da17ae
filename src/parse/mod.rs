mod smiles;
pub use smiles::*;

mod hash;
pub use hash::*;
