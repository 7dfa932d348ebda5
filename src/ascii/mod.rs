//! Text-art rendering of molecular graphs.
//!
//! Atoms sit on a lattice: atom rows alternate with rows holding vertical
//! bonds, and horizontal bonds fill the gaps between atom cells. A bond
//! that cannot be drawn as a line is written as a pair of `%n` markers
//! appended to both atoms, with the bond symbol before the number when it
//! is not single (`%=2`).
//!
//! ```text
//! C=C-C
//! |   "
//! C-C=C
//! ```

mod layout;
mod reader;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bond::BondOrder;
use crate::catalog::AtomCatalog;
use crate::smiles::{atom_token, ParseError};
use crate::structure::{MolecularStructure, ValenceError};

use layout::{key, layout};

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiOptions {
    /// Unroll every ring into a chain closed by markers instead of drawing
    /// it as a loop.
    pub linear_cycle_expansion: bool,
}

/// Errors produced when reading a text-art structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsciiError {
    /// The text holds no atom.
    Empty,
    /// A character that belongs to no atom, bond or marker.
    UnexpectedChar { row: usize, col: usize, ch: char },
    /// An atom cell that is not a single valid SMILES atom.
    InvalidAtom { row: usize, col: usize, source: ParseError },
    /// A bond line with no atom at one of its ends.
    DanglingBond { row: usize, col: usize },
    /// A horizontal gap mixing different bond symbols.
    MixedBond { row: usize, col: usize },
    /// A closure marker without its partner.
    UnpairedMarker { label: u32 },
    /// Both ends of a closure marker disagree on the bond order, or join an
    /// atom to itself.
    InvalidMarker { label: u32 },
    /// The same two atoms are bonded twice.
    DuplicateBond { row: usize, col: usize },
    /// An atom carries more bonds than its valences allow.
    Valence(ValenceError),
}

impl fmt::Display for AsciiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no atoms found"),
            Self::UnexpectedChar { row, col, ch } => {
                write!(f, "unexpected character '{ch}' at {row}:{col}")
            }
            Self::InvalidAtom { row, col, source } => {
                write!(f, "invalid atom at {row}:{col}: {source}")
            }
            Self::DanglingBond { row, col } => write!(f, "dangling bond at {row}:{col}"),
            Self::MixedBond { row, col } => write!(f, "mixed bond symbols at {row}:{col}"),
            Self::UnpairedMarker { label } => write!(f, "unpaired closure marker %{label}"),
            Self::InvalidMarker { label } => write!(f, "invalid closure marker %{label}"),
            Self::DuplicateBond { row, col } => write!(f, "duplicate bond at {row}:{col}"),
            Self::Valence(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AsciiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidAtom { source, .. } => Some(source),
            Self::Valence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValenceError> for AsciiError {
    fn from(e: ValenceError) -> Self {
        Self::Valence(e)
    }
}

fn vertical_symbol(order: BondOrder) -> char {
    match order {
        BondOrder::Single => '|',
        BondOrder::Double => '"',
        other => other.symbol(),
    }
}

pub(crate) fn vertical_order(c: char) -> Option<BondOrder> {
    match c {
        '|' => Some(BondOrder::Single),
        '"' => Some(BondOrder::Double),
        '#' | '$' | ':' => BondOrder::from_symbol(c),
        _ => None,
    }
}

/// Renders `structure` as text art. Molecular hydrogen renders as `HH`.
pub fn to_ascii(structure: &MolecularStructure, options: &AsciiOptions) -> String {
    if structure.is_virtual_hydrogen() {
        return "HH".to_string();
    }
    if structure.atom_count() == 0 {
        return String::new();
    }

    let layout = layout(structure, !options.linear_cycle_expansion);
    let mut cells: Vec<String> = structure.atoms().map(|a| atom_token(structure, a)).collect();

    let mut label = 0u32;
    for bond in structure.bonds() {
        let Some((a, b)) = structure.bond_endpoints(bond) else {
            continue;
        };
        if layout.lines.contains(&key(a, b)) {
            continue;
        }
        label += 1;
        let order = structure.bond(bond).order;
        let marker = match order {
            BondOrder::Single => format!("%{label}"),
            other => format!("%{}{label}", other.symbol()),
        };
        cells[a.index()].push_str(&marker);
        cells[b.index()].push_str(&marker);
    }

    let width = cells.iter().map(String::len).max().unwrap_or(1);
    let min_x = layout.positions.iter().map(|p| p.0).min().unwrap_or(0);
    let min_y = layout.positions.iter().map(|p| p.1).min().unwrap_or(0);
    let max_x = layout.positions.iter().map(|p| p.0).max().unwrap_or(0);
    let max_y = layout.positions.iter().map(|p| p.1).max().unwrap_or(0);
    let column = |x: i32| (x - min_x) as usize * (width + 1);
    let row = |y: i32| (y - min_y) as usize * 2;

    let mut grid = vec![vec![' '; column(max_x) + width]; row(max_y) + 1];
    for (atom, &(x, y)) in layout.positions.iter().enumerate() {
        for (i, c) in cells[atom].chars().enumerate() {
            grid[row(y)][column(x) + i] = c;
        }
    }
    for &(a, b) in &layout.lines {
        let (pa, pb) = (layout.positions[a.index()], layout.positions[b.index()]);
        let order = structure.bond_order_between(a, b).unwrap_or_default();
        if pa.1 == pb.1 {
            let (left, x) = if pa.0 < pb.0 { (a, pa.0) } else { (b, pb.0) };
            let start = column(x) + cells[left.index()].len();
            grid[row(pa.1)][start..column(x + 1)].fill(order.symbol());
        } else {
            grid[row(pa.1.min(pb.1)) + 1][column(pa.0)] = vertical_symbol(order);
        }
    }

    grid.iter()
        .map(|line| line.iter().collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads text art produced by [`to_ascii`] back into a structure.
///
/// Atom order follows the text row by row; hydrogens are recomputed.
pub fn from_ascii(text: &str, catalog: &AtomCatalog) -> Result<MolecularStructure, AsciiError> {
    reader::read(text, catalog)
}

impl MolecularStructure {
    pub fn to_ascii(&self, options: &AsciiOptions) -> String {
        to_ascii(self, options)
    }

    pub fn from_ascii(text: &str, catalog: &AtomCatalog) -> Result<Self, AsciiError> {
        from_ascii(text, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AtomCatalog {
        AtomCatalog::with_common_elements()
    }

    fn mol(s: &str) -> MolecularStructure {
        MolecularStructure::parse(s, &catalog()).unwrap()
    }

    fn round_trip(s: &str, options: &AsciiOptions) {
        let structure = mol(s);
        let text = structure.to_ascii(options);
        let back = MolecularStructure::from_ascii(&text, &catalog())
            .unwrap_or_else(|e| panic!("{s}: {e}\n{text}"));
        assert_eq!(back, structure, "{s}\n{text}");
    }

    #[test]
    fn chain() {
        assert_eq!(mol("CC(=O)O").to_ascii(&AsciiOptions::default()), "C-C=O\n  |\n  O");
    }

    #[test]
    fn closed_ring() {
        let text = mol("C1=CC=CC=C1").to_ascii(&AsciiOptions::default());
        assert_eq!(text, "C=C-C\n|   \"\nC=C-C");
        assert!(!text.contains('%'));
    }

    #[test]
    fn linear_ring() {
        let options = AsciiOptions {
            linear_cycle_expansion: true,
        };
        let text = mol("C1CC1").to_ascii(&options);
        assert_eq!(text.matches("%1").count(), 2);
    }

    #[test]
    fn hydrogen_molecule() {
        assert_eq!(mol("HH").to_ascii(&AsciiOptions::default()), "HH");
        assert!(MolecularStructure::from_ascii("HH", &catalog())
            .unwrap()
            .is_virtual_hydrogen());
    }

    #[test]
    fn round_trips() {
        let linear = AsciiOptions {
            linear_cycle_expansion: true,
        };
        for s in [
            "CCO",
            "CC(C)(C)C(C)(C)C",
            "C1=CC=CC=C1",
            "C1CCCC1",
            "C1CC2CCC1CC2",
            "C1=CC=C2C=CC=CC2=C1",
            "OC(=O)C1=CC=CC=C1",
            "[Na+].[Cl-]",
            "RC(=O)OR",
            "C#N",
            "c1ccccc1",
        ] {
            round_trip(s, &AsciiOptions::default());
            round_trip(s, &linear);
        }
    }
}
