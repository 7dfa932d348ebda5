//! Element counts, Hill formulas and the coarse fingerprint used to skip
//! hopeless pattern matches.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::structure::MolecularStructure;
use crate::symbol::Symbol;

fn hydrogen() -> Symbol {
    Symbol::new("H").expect("H is a valid symbol")
}

/// Symbol histogram of a structure, implied hydrogens counted under `H`.
pub fn component_counts(structure: &MolecularStructure) -> BTreeMap<Symbol, usize> {
    let mut counts = BTreeMap::new();
    for idx in structure.atoms() {
        *counts.entry(structure.atom(idx).symbol()).or_default() += 1;
    }
    let h = structure.implied_hydrogen_count();
    if h > 0 {
        *counts.entry(hydrogen()).or_default() += h;
    }
    counts
}

/// Formula in the Hill system: C first, then H, then everything else
/// alphabetically. Without carbon every symbol is alphabetical. Net charge
/// is appended as `+`, `2+`, `-`, ...
pub fn hill_formula(structure: &MolecularStructure) -> String {
    let mut counts: BTreeMap<String, usize> = component_counts(structure)
        .into_iter()
        .map(|(s, n)| (s.as_str().to_string(), n))
        .collect();
    let net_charge: i32 = structure
        .atoms()
        .map(|idx| structure.atom(idx).formal_charge as i32)
        .sum();

    let mut result = String::new();
    if let Some(c) = counts.remove("C") {
        append_element(&mut result, "C", c);
        if let Some(h) = counts.remove("H") {
            append_element(&mut result, "H", h);
        }
    }
    for (sym, count) in &counts {
        append_element(&mut result, sym, *count);
    }

    match net_charge {
        0 => {}
        1 => result.push('+'),
        -1 => result.push('-'),
        c if c > 0 => {
            let _ = write!(result, "{c}+");
        }
        c => {
            let _ = write!(result, "{}-", c.unsigned_abs());
        }
    }
    result
}

fn append_element(buf: &mut String, symbol: &str, count: usize) {
    buf.push_str(symbol);
    if count > 1 {
        let _ = write!(buf, "{count}");
    }
}

/// Heavy-atom counts of a structure. A pattern can only map into a target
/// whose fingerprint covers the pattern's.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    atoms: usize,
    bonds: usize,
    elements: BTreeMap<Symbol, usize>,
}

impl Fingerprint {
    pub fn of(structure: &MolecularStructure) -> Self {
        let mut elements = BTreeMap::new();
        for idx in structure.atoms() {
            let atom = structure.atom(idx);
            if !atom.is_radical() {
                *elements.entry(atom.symbol()).or_default() += 1;
            }
        }
        Self {
            atoms: structure.atom_count(),
            bonds: structure.bond_count(),
            elements,
        }
    }

    /// Necessary condition for `pattern` to have a full mapping into `self`.
    pub fn may_contain(&self, pattern: &Fingerprint) -> bool {
        pattern.atoms <= self.atoms
            && pattern.bonds <= self.bonds
            && pattern
                .elements
                .iter()
                .all(|(sym, n)| self.elements.get(sym).is_some_and(|have| have >= n))
    }

    pub fn atom_count(&self) -> usize {
        self.atoms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;

    fn parse(s: &str) -> MolecularStructure {
        let catalog = AtomCatalog::with_common_elements();
        MolecularStructure::parse(s, &catalog).unwrap()
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    #[test]
    fn ethanol_counts() {
        let counts = component_counts(&parse("CCO"));
        assert_eq!(counts[&sym("C")], 2);
        assert_eq!(counts[&sym("O")], 1);
        assert_eq!(counts[&sym("H")], 6);
    }

    #[test]
    fn hill_order() {
        assert_eq!(hill_formula(&parse("CCO")), "C2H6O");
        assert_eq!(hill_formula(&parse("O")), "H2O");
        assert_eq!(hill_formula(&parse("ClC(Cl)Cl")), "CHCl3");
        assert_eq!(hill_formula(&parse("[Na+].[Cl-]")), "ClNa");
        assert_eq!(hill_formula(&parse("[NH4+]")), "H4N+");
        assert_eq!(hill_formula(&parse("HH")), "H2");
    }

    #[test]
    fn fingerprint_containment() {
        let acid = parse("CC(=O)O").fingerprint();
        assert!(acid.may_contain(&parse("C=O").fingerprint()));
        assert!(acid.may_contain(&parse("RC(=O)O").fingerprint()));
        assert!(!acid.may_contain(&parse("CCC").fingerprint()));
        assert!(!acid.may_contain(&parse("CN").fingerprint()));
        assert_eq!(acid.atom_count(), 4);
    }
}
