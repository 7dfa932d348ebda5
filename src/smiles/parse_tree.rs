use crate::bond::BondOrder;
use crate::smiles::error::ParseError;
use crate::smiles::tokenizer::{AtomToken, Token};

#[derive(Debug, Clone)]
pub struct ParseAtom {
    pub token: AtomToken,
    pub neighbors: Vec<Neighbor>,
}

#[derive(Debug, Clone)]
pub struct Neighbor {
    pub bond: Option<BondOrder>,
    pub atom_idx: usize,
}

#[derive(Debug, Clone)]
pub struct ParseTree {
    pub atoms: Vec<ParseAtom>,
}

struct OpenRing {
    atom: usize,
    bond: Option<BondOrder>,
}

pub fn build_parse_tree(tokens: &[Token]) -> Result<ParseTree, ParseError> {
    let mut atoms: Vec<ParseAtom> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new(); // (atom, paren position)
    let mut current: Option<usize> = None;
    let mut pending_bond: Option<(BondOrder, usize)> = None;
    let mut ring_opens: Vec<Option<OpenRing>> = (0..100).map(|_| None).collect();

    for token in tokens {
        match token {
            Token::Atom(atom_tok) => {
                let idx = atoms.len();
                atoms.push(ParseAtom {
                    token: atom_tok.clone(),
                    neighbors: Vec::new(),
                });

                match current {
                    Some(cur) => {
                        let bond = pending_bond.take().map(|(order, _)| order);
                        link(&mut atoms, cur, idx, bond);
                    }
                    None => {
                        if let Some((_, pos)) = pending_bond {
                            return Err(ParseError::DanglingBond { pos });
                        }
                    }
                }

                current = Some(idx);
            }
            Token::Bond { order, pos } => {
                if current.is_none() || pending_bond.is_some() {
                    return Err(ParseError::DanglingBond { pos: *pos });
                }
                pending_bond = Some((*order, *pos));
            }
            Token::RingClosure { bond, label, pos } => {
                let cur = current.ok_or(ParseError::RingLabelWithoutAtom {
                    label: *label,
                    pos: *pos,
                })?;
                let slot = &mut ring_opens[*label as usize];

                match slot.take() {
                    Some(open) => {
                        let ring_bond = match (*bond, open.bond) {
                            (None, None) => None,
                            (Some(b), None) | (None, Some(b)) => Some(b),
                            (Some(b1), Some(b2)) if b1 == b2 => Some(b1),
                            _ => return Err(ParseError::RingBondConflict { label: *label }),
                        };
                        if open.atom == cur
                            || atoms[cur].neighbors.iter().any(|n| n.atom_idx == open.atom)
                        {
                            return Err(ParseError::InvalidRingClosure {
                                label: *label,
                                pos: *pos,
                            });
                        }
                        link(&mut atoms, open.atom, cur, ring_bond);
                    }
                    None => {
                        *slot = Some(OpenRing {
                            atom: cur,
                            bond: *bond,
                        });
                    }
                }
            }
            Token::OpenParen(pos) => {
                let cur = current.ok_or(ParseError::BranchWithoutAtom { pos: *pos })?;
                if let Some((_, bond_pos)) = pending_bond {
                    return Err(ParseError::DanglingBond { pos: bond_pos });
                }
                stack.push((cur, *pos));
            }
            Token::CloseParen(pos) => {
                if let Some((_, bond_pos)) = pending_bond {
                    return Err(ParseError::DanglingBond { pos: bond_pos });
                }
                let (atom, _) = stack.pop().ok_or(ParseError::UnmatchedParen { pos: *pos })?;
                current = Some(atom);
            }
            Token::Dot(pos) => {
                if pending_bond.is_some() || !stack.is_empty() {
                    return Err(ParseError::UnexpectedChar { pos: *pos, ch: '.' });
                }
                current = None;
            }
        }
    }

    if let Some((_, pos)) = pending_bond {
        return Err(ParseError::DanglingBond { pos });
    }

    if let Some(&(_, pos)) = stack.last() {
        return Err(ParseError::UnmatchedParen { pos });
    }

    if let Some(label) = ring_opens.iter().position(|entry| entry.is_some()) {
        return Err(ParseError::UnclosedRing { label: label as u8 });
    }

    Ok(ParseTree { atoms })
}

fn link(atoms: &mut [ParseAtom], a: usize, b: usize, bond: Option<BondOrder>) {
    atoms[a].neighbors.push(Neighbor { bond, atom_idx: b });
    atoms[b].neighbors.push(Neighbor { bond, atom_idx: a });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;
    use crate::smiles::tokenizer::tokenize;

    fn tree(s: &str) -> Result<ParseTree, ParseError> {
        let tokens = tokenize(s, &AtomCatalog::with_common_elements()).unwrap();
        build_parse_tree(&tokens)
    }

    #[test]
    fn ethane_tree() {
        let tree = tree("CC").unwrap();
        assert_eq!(tree.atoms.len(), 2);
        assert_eq!(tree.atoms[0].neighbors.len(), 1);
        assert_eq!(tree.atoms[0].neighbors[0].atom_idx, 1);
    }

    #[test]
    fn cyclohexane_tree() {
        let tree = tree("C1CCCCC1").unwrap();
        assert_eq!(tree.atoms.len(), 6);
        for atom in &tree.atoms {
            assert_eq!(atom.neighbors.len(), 2);
        }
    }

    #[test]
    fn branch_tree() {
        let tree = tree("CC(C)C").unwrap();
        assert_eq!(tree.atoms.len(), 4);
        assert_eq!(tree.atoms[1].neighbors.len(), 3);
    }

    #[test]
    fn ring_label_reuse() {
        let tree = tree("C1CC1C1CC1").unwrap();
        assert_eq!(tree.atoms.len(), 6);
        assert_eq!(tree.atoms[3].neighbors.len(), 3);
    }

    #[test]
    fn ring_bond_from_either_end() {
        let tree = tree("C=1CCCCC1").unwrap();
        let closure = tree.atoms[0]
            .neighbors
            .iter()
            .find(|n| n.atom_idx == 5)
            .unwrap();
        assert_eq!(closure.bond, Some(BondOrder::Double));
    }

    #[test]
    fn disconnected() {
        let tree = tree("[Na+].[Cl-]").unwrap();
        assert_eq!(tree.atoms.len(), 2);
        assert!(tree.atoms[0].neighbors.is_empty());
        assert!(tree.atoms[1].neighbors.is_empty());
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(tree("C1CC"), Err(ParseError::UnclosedRing { label: 1 })));
        assert!(matches!(tree("C(C"), Err(ParseError::UnmatchedParen { pos: 1 })));
        assert!(matches!(tree("CC)"), Err(ParseError::UnmatchedParen { pos: 2 })));
        assert!(matches!(tree("(C)C"), Err(ParseError::BranchWithoutAtom { pos: 0 })));
        assert!(matches!(tree("1CC1"), Err(ParseError::RingLabelWithoutAtom { label: 1, .. })));
        assert!(matches!(tree("C11"), Err(ParseError::InvalidRingClosure { label: 1, .. })));
        assert!(matches!(tree("C1C1"), Err(ParseError::InvalidRingClosure { label: 1, .. })));
        assert!(matches!(tree("C=1CC#1"), Err(ParseError::RingBondConflict { label: 1 })));
        assert!(matches!(tree("CC="), Err(ParseError::DanglingBond { pos: 2 })));
        assert!(matches!(tree("=CC"), Err(ParseError::DanglingBond { pos: 0 })));
        assert!(matches!(tree("C=(C)"), Err(ParseError::DanglingBond { pos: 1 })));
    }
}
