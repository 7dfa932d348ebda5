use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::BondOrder;
use crate::smiles::error::ParseError;
use crate::smiles::parse_tree::{ParseAtom, ParseTree};
use crate::structure::MolecularStructure;

pub fn build_structure(tree: &ParseTree, hydrogen_weight: f64) -> Result<MolecularStructure, ParseError> {
    let folded = fold_hydrogens(tree)?;

    let mut structure = MolecularStructure::new(hydrogen_weight);
    let mut node_indices: Vec<Option<NodeIndex>> = Vec::with_capacity(tree.atoms.len());
    let mut written_h: Vec<u8> = Vec::new();

    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        if folded[i] {
            node_indices.push(None);
            continue;
        }
        let tok = &parse_atom.token;
        let atom = Atom {
            explicit_hydrogens: tok.hcount,
            formal_charge: tok.charge,
            is_aromatic: tok.is_aromatic,
            ..Atom::new(tok.kind.clone())
        };
        node_indices.push(Some(structure.add_atom(atom)));
        written_h.push(0);
    }

    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        for neighbor in &parse_atom.neighbors {
            let j = neighbor.atom_idx;
            match (node_indices[i], node_indices[j]) {
                (Some(a), Some(b)) => {
                    if i < j {
                        let order = resolve_bond_order(
                            neighbor.bond,
                            parse_atom.token.is_aromatic,
                            tree.atoms[j].token.is_aromatic,
                        );
                        structure.add_bond(a, b, order);
                    }
                }
                (Some(a), None) => {
                    written_h[a.index()] = written_h[a.index()].saturating_add(1);
                }
                _ => {}
            }
        }
    }

    structure.fill_hydrogens_with(&written_h)?;
    Ok(structure)
}

fn resolve_bond_order(bond: Option<BondOrder>, from_aromatic: bool, to_aromatic: bool) -> BondOrder {
    match bond {
        Some(order) => order,
        None if from_aromatic && to_aromatic => BondOrder::Aromatic,
        None => BondOrder::Single,
    }
}

/// Marks bare hydrogens that hang off a single heavy atom; those become
/// implied hydrogens of that atom instead of graph nodes.
fn fold_hydrogens(tree: &ParseTree) -> Result<Vec<bool>, ParseError> {
    let is_bare_h = |a: &ParseAtom| a.token.is_bare_hydrogen();
    let mut folded = vec![false; tree.atoms.len()];

    for (i, atom) in tree.atoms.iter().enumerate() {
        if !is_bare_h(atom) {
            continue;
        }
        if atom
            .neighbors
            .iter()
            .any(|n| !matches!(n.bond, None | Some(BondOrder::Single)))
        {
            return Err(ParseError::InvalidHydrogenBond { pos: atom.token.pos });
        }
        if let [only] = atom.neighbors.as_slice() {
            folded[i] = !is_bare_h(&tree.atoms[only.atom_idx]);
        }
    }

    Ok(folded)
}
