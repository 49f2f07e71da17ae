use lazy_static::lazy_static;
use std::collections::HashMap;

/// Element symbols indexed by atomic number; slot 0 is the non-element placeholder.
pub const ELEMENTS: [&str; 119] = [
    "",
    "H", "He",
    "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar",
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe",
    "Cs", "Ba",
    "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn",
    "Fr", "Ra",
    "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No",
    "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

lazy_static! {
    static ref ATOMIC_NUMBERS: HashMap<&'static str, u32> = ELEMENTS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(z, sym)| (*sym, z as u32))
        .collect();
}

/// Atomic number for a symbol, or 0 for anything that is not an element.
pub fn atomic_number(symbol: &str) -> u32 {
    ATOMIC_NUMBERS.get(symbol).copied().unwrap_or(0)
}

pub fn is_element(symbol: &str) -> bool {
    atomic_number(symbol) > 0
}

/// Metals and metalloid-adjacent main group elements that coordinate as centres.
pub fn is_metal(z: u32) -> bool {
    matches!(z, 3 | 4 | 11 | 12 | 13 | 19..=31 | 37..=50 | 55..=84 | 87..=118)
}

/// Main group elements that carry a stereogenic lone pair when three-coordinate.
pub fn has_stereo_lone_pair(z: u32) -> bool {
    matches!(z, 15 | 16 | 33 | 34 | 52)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(atomic_number("C"), 6);
        assert_eq!(atomic_number("Pt"), 78);
        assert_eq!(atomic_number("Og"), 118);
        assert_eq!(atomic_number("R"), 0);
        assert!(!is_element("Xx"));
        assert_eq!(ELEMENTS[atomic_number("Cl") as usize], "Cl");
    }

    #[test]
    fn test_metals() {
        assert!(is_metal(atomic_number("Pt")));
        assert!(is_metal(atomic_number("Al")));
        assert!(is_metal(atomic_number("Na")));
        assert!(!is_metal(atomic_number("C")));
        assert!(!is_metal(atomic_number("Si")));
        assert!(!is_metal(atomic_number("Cl")));
    }
}
