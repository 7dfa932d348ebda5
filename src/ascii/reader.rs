use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::BondOrder;
use crate::catalog::AtomCatalog;
use crate::smiles::ParseError;
use crate::structure::MolecularStructure;

use super::{vertical_order, AsciiError};

struct Cell {
    atom: Atom,
}

struct PendingBond {
    a: usize,
    b: usize,
    order: BondOrder,
    row: usize,
    col: usize,
}

#[derive(Default)]
struct Reader {
    cells: Vec<Cell>,
    /// Cell index by the row and column of its first character.
    starts: BTreeMap<(usize, usize), usize>,
    bonds: Vec<PendingBond>,
    open_markers: BTreeMap<u32, (usize, BondOrder)>,
}

fn is_atom_row(line: &[char]) -> bool {
    line.iter().any(|&c| c.is_ascii_alphabetic() || c == '[' || c == '%')
}

impl Reader {
    fn read_atom_row(
        &mut self,
        row: usize,
        line: &[char],
        catalog: &AtomCatalog,
    ) -> Result<(), AsciiError> {
        let mut previous: Option<usize> = None;
        let mut gap: Vec<(usize, char)> = Vec::new();
        let mut i = 0;

        while i < line.len() {
            let c = line[i];
            if c == ' ' {
                i += 1;
                continue;
            }
            if c != '[' && !c.is_ascii_alphabetic() {
                if BondOrder::from_symbol(c).is_none() {
                    return Err(AsciiError::UnexpectedChar { row, col: i, ch: c });
                }
                gap.push((i, c));
                i += 1;
                continue;
            }

            let start = i;
            i = token_end(line, i);
            let token: String = line[start..i].iter().collect();
            let cell = self.push_cell(row, start, &token, catalog)?;

            if let Some(&(col, symbol)) = gap.first() {
                let Some(left) = previous else {
                    return Err(AsciiError::DanglingBond { row, col });
                };
                if let Some(&(col, _)) = gap.iter().find(|&&(_, other)| other != symbol) {
                    return Err(AsciiError::MixedBond { row, col });
                }
                let order = BondOrder::from_symbol(symbol)
                    .ok_or(AsciiError::UnexpectedChar { row, col, ch: symbol })?;
                self.bonds.push(PendingBond {
                    a: left,
                    b: cell,
                    order,
                    row,
                    col,
                });
                gap.clear();
            }

            while i < line.len() && line[i] == '%' {
                i = self.read_marker(row, line, i, cell)?;
            }
            previous = Some(cell);
        }

        match gap.first() {
            Some(&(col, _)) => Err(AsciiError::DanglingBond { row, col }),
            None => Ok(()),
        }
    }

    fn push_cell(
        &mut self,
        row: usize,
        col: usize,
        token: &str,
        catalog: &AtomCatalog,
    ) -> Result<usize, AsciiError> {
        let invalid = |source| AsciiError::InvalidAtom { row, col, source };
        let parsed = MolecularStructure::parse(token, catalog).map_err(invalid)?;
        if parsed.atom_count() != 1 {
            let ch = token.chars().next().unwrap_or(' ');
            return Err(invalid(ParseError::UnexpectedChar { pos: 0, ch }));
        }
        let atom = parsed.atom(NodeIndex::new(0)).clone();
        self.cells.push(Cell { atom });
        let index = self.cells.len() - 1;
        self.starts.insert((row, col), index);
        Ok(index)
    }

    /// Reads one `%[bond]label` marker at `line[at]` and returns the index
    /// just past it.
    fn read_marker(
        &mut self,
        row: usize,
        line: &[char],
        at: usize,
        cell: usize,
    ) -> Result<usize, AsciiError> {
        let mut i = at + 1;
        let mut order = BondOrder::Single;
        if let Some(parsed) = line.get(i).and_then(|&c| BondOrder::from_symbol(c)) {
            order = parsed;
            i += 1;
        }
        let digits_start = i;
        while i < line.len() && line[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = line[digits_start..i].iter().collect();
        let label: u32 = digits.parse().map_err(|_| AsciiError::UnexpectedChar {
            row,
            col: at,
            ch: '%',
        })?;

        match self.open_markers.remove(&label) {
            None => {
                self.open_markers.insert(label, (cell, order));
            }
            Some((other, other_order)) => {
                if other == cell || other_order != order {
                    return Err(AsciiError::InvalidMarker { label });
                }
                self.bonds.push(PendingBond {
                    a: other,
                    b: cell,
                    order,
                    row,
                    col: at,
                });
            }
        }
        Ok(i)
    }

    fn read_bond_row(&mut self, row: usize, line: &[char]) -> Result<(), AsciiError> {
        for (col, &ch) in line.iter().enumerate() {
            if ch == ' ' {
                continue;
            }
            let order = vertical_order(ch).ok_or(AsciiError::UnexpectedChar { row, col, ch })?;
            let dangling = AsciiError::DanglingBond { row, col };
            let above = row
                .checked_sub(1)
                .and_then(|r| self.starts.get(&(r, col)))
                .copied()
                .ok_or(dangling.clone())?;
            let below = self.starts.get(&(row + 1, col)).copied().ok_or(dangling)?;
            self.bonds.push(PendingBond {
                a: above,
                b: below,
                order,
                row,
                col,
            });
        }
        Ok(())
    }

    fn build(self, catalog: &AtomCatalog) -> Result<MolecularStructure, AsciiError> {
        if let Some(&label) = self.open_markers.keys().next() {
            return Err(AsciiError::UnpairedMarker { label });
        }
        if self.cells.is_empty() {
            return Err(AsciiError::Empty);
        }

        let mut structure = MolecularStructure::new(catalog.hydrogen_weight());
        let nodes: Vec<NodeIndex> = self
            .cells
            .into_iter()
            .map(|cell| structure.add_atom(cell.atom))
            .collect();
        for bond in self.bonds {
            structure
                .add_bond(nodes[bond.a], nodes[bond.b], bond.order)
                .ok_or(AsciiError::DuplicateBond {
                    row: bond.row,
                    col: bond.col,
                })?;
        }
        structure.fill_hydrogens()?;
        Ok(structure)
    }
}

/// End of the atom token starting at `start`: a bracket atom or a run of
/// letters.
fn token_end(line: &[char], start: usize) -> usize {
    if line[start] == '[' {
        return line[start..]
            .iter()
            .position(|&c| c == ']')
            .map_or(line.len(), |p| start + p + 1);
    }
    line[start..]
        .iter()
        .position(|c| !c.is_ascii_alphabetic())
        .map_or(line.len(), |p| start + p)
}

/// Parses text art. Rows and columns in errors count from zero.
pub(crate) fn read(text: &str, catalog: &AtomCatalog) -> Result<MolecularStructure, AsciiError> {
    if text.trim() == "HH" {
        return Ok(MolecularStructure::hydrogen_molecule(catalog.hydrogen_weight()));
    }

    let lines: Vec<Vec<char>> = text.lines().map(|l| l.chars().collect()).collect();
    let mut reader = Reader::default();

    for (row, line) in lines.iter().enumerate() {
        if is_atom_row(line) {
            reader.read_atom_row(row, line, catalog)?;
        }
    }
    for (row, line) in lines.iter().enumerate() {
        if !is_atom_row(line) {
            reader.read_bond_row(row, line)?;
        }
    }
    reader.build(catalog)
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

    #[test]
    fn hand_drawn_propanol() {
        let read = read("C-C-O\n|\nC", &catalog()).unwrap();
        assert_eq!(read, mol("CCCO"));
        assert_eq!(read.implied_hydrogen_count(), 8);
    }

    #[test]
    fn markers_close_rings() {
        assert_eq!(read("C%1-C-C%1", &catalog()).unwrap(), mol("C1CC1"));
        assert_eq!(read("C%=1 C%=1", &catalog()).unwrap(), mol("C=C"));
        assert_eq!(
            read("C%1-C-C%1-C%1-C-C%1", &catalog()).unwrap(),
            mol("C1CC1C1CC1")
        );
    }

    #[test]
    fn bracket_atoms_and_long_gaps() {
        assert_eq!(read("[Na+]   [Cl-]", &catalog()).unwrap(), mol("[Na+].[Cl-]"));
        assert_eq!(read("Br--C", &catalog()).unwrap(), mol("BrC"));
    }

    #[test]
    fn empty() {
        assert_eq!(read("", &catalog()).unwrap_err(), AsciiError::Empty);
        assert_eq!(
            read("  \n |", &catalog()).unwrap_err(),
            AsciiError::DanglingBond { row: 1, col: 1 }
        );
    }

    #[test]
    fn malformed() {
        let c = catalog();
        assert_eq!(
            read("C?C", &c).unwrap_err(),
            AsciiError::UnexpectedChar { row: 0, col: 1, ch: '?' }
        );
        assert_eq!(read("C-", &c).unwrap_err(), AsciiError::DanglingBond { row: 0, col: 1 });
        assert_eq!(read("-C", &c).unwrap_err(), AsciiError::DanglingBond { row: 0, col: 0 });
        assert_eq!(read("C-=C", &c).unwrap_err(), AsciiError::MixedBond { row: 0, col: 2 });
        assert_eq!(read("C%1", &c).unwrap_err(), AsciiError::UnpairedMarker { label: 1 });
        assert_eq!(read("C%1-C%=1", &c).unwrap_err(), AsciiError::InvalidMarker { label: 1 });
        assert_eq!(read("C%1%1", &c).unwrap_err(), AsciiError::InvalidMarker { label: 1 });
        assert_eq!(
            read("C%1-C%1", &c).unwrap_err(),
            AsciiError::DuplicateBond { row: 0, col: 5 }
        );
        assert!(matches!(
            read("Xq", &c).unwrap_err(),
            AsciiError::InvalidAtom { row: 0, col: 0, .. }
        ));
        assert!(matches!(
            read("C#C#C#C", &c).unwrap_err(),
            AsciiError::Valence(_)
        ));
        assert_eq!(
            read("C\n  |\nC", &c).unwrap_err(),
            AsciiError::DanglingBond { row: 1, col: 2 }
        );
    }
}
