use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use crate::bond::BondOrder;
use crate::graph_ops::connected_components;
use crate::structure::MolecularStructure;

const ORGANIC_SUBSET: &[&str] = &["B", "C", "N", "O", "P", "S", "F", "Cl", "Br", "I"];
const AROMATIC_SUBSET: &[&str] = &["B", "C", "N", "O", "P", "S"];

/// Writes every component depth-first from its lowest-index atom, joined
/// with `.`. Ring labels are the lowest ones free at the time of writing.
pub fn to_smiles(structure: &MolecularStructure) -> String {
    if structure.is_virtual_hydrogen() {
        return "HH".to_string();
    }
    let components = connected_components(structure);
    let mut parts = Vec::with_capacity(components.len());
    for component in &components {
        parts.push(write_fragment(structure, component));
    }
    parts.join(".")
}

struct RingClosure {
    ring_id: usize,
    order: BondOrder,
    other: NodeIndex,
}

struct DfsContext {
    children: Vec<Vec<NodeIndex>>,
    ring_opens: Vec<Vec<RingClosure>>,
    ring_closes: Vec<Vec<RingClosure>>,
}

#[derive(Default)]
struct RingLabels {
    in_use: BTreeSet<usize>,
    assigned: Vec<Option<usize>>,
}

impl RingLabels {
    fn open(&mut self, ring_id: usize) -> usize {
        let label = (1..).find(|l| !self.in_use.contains(l)).unwrap_or(1);
        self.in_use.insert(label);
        if self.assigned.len() <= ring_id {
            self.assigned.resize(ring_id + 1, None);
        }
        self.assigned[ring_id] = Some(label);
        label
    }

    fn close(&mut self, ring_id: usize) -> usize {
        let label = self.assigned.get(ring_id).copied().flatten().unwrap_or(0);
        self.in_use.remove(&label);
        label
    }
}

fn write_fragment(structure: &MolecularStructure, component: &[NodeIndex]) -> String {
    let n = structure.atom_count();
    let start = component[0];

    let mut visited = vec![false; n];
    let mut parent = vec![None::<NodeIndex>; n];
    let mut ring_opens: Vec<Vec<RingClosure>> = (0..n).map(|_| Vec::new()).collect();
    let mut ring_closes: Vec<Vec<RingClosure>> = (0..n).map(|_| Vec::new()).collect();
    let mut children: Vec<Vec<NodeIndex>> = (0..n).map(|_| Vec::new()).collect();
    let mut next_ring_id = 0usize;

    let neighbor_lists: Vec<Vec<(NodeIndex, BondOrder)>> = (0..n)
        .map(|i| {
            let mut neighbors: Vec<(NodeIndex, BondOrder)> =
                structure.bonded(NodeIndex::new(i)).collect();
            neighbors.sort_by_key(|(nb, _)| *nb);
            neighbors
        })
        .collect();

    let mut stack: Vec<(NodeIndex, usize)> = Vec::new();
    visited[start.index()] = true;
    stack.push((start, 0));

    loop {
        let Some(&mut (node, ref mut ni)) = stack.last_mut() else {
            break;
        };
        let neighbors = &neighbor_lists[node.index()];
        if *ni >= neighbors.len() {
            stack.pop();
            continue;
        }
        let (neighbor, order) = neighbors[*ni];
        *ni += 1;

        if !visited[neighbor.index()] {
            visited[neighbor.index()] = true;
            parent[neighbor.index()] = Some(node);
            children[node.index()].push(neighbor);
            stack.push((neighbor, 0));
        } else if parent[node.index()] != Some(neighbor)
            && !ring_closes[neighbor.index()].iter().any(|rc| rc.other == node)
        {
            // Back edge from a descendant to an ancestor still on the stack.
            let ring_id = next_ring_id;
            next_ring_id += 1;
            ring_opens[neighbor.index()].push(RingClosure {
                ring_id,
                order,
                other: node,
            });
            ring_closes[node.index()].push(RingClosure {
                ring_id,
                order,
                other: neighbor,
            });
        }
    }

    let ctx = DfsContext {
        children,
        ring_opens,
        ring_closes,
    };

    let mut out = String::new();
    let mut labels = RingLabels::default();
    write_node(structure, start, &ctx, &mut labels, &mut out);
    out
}

fn write_node(
    structure: &MolecularStructure,
    node: NodeIndex,
    ctx: &DfsContext,
    labels: &mut RingLabels,
    out: &mut String,
) {
    write_atom_symbol(structure, node, out);

    for rc in &ctx.ring_closes[node.index()] {
        write_bond(structure, rc.order, node, rc.other, out);
        write_ring_label(labels.close(rc.ring_id), out);
    }

    for rc in &ctx.ring_opens[node.index()] {
        write_bond(structure, rc.order, node, rc.other, out);
        write_ring_label(labels.open(rc.ring_id), out);
    }

    let kids = &ctx.children[node.index()];
    if kids.is_empty() {
        return;
    }

    let last = kids.len() - 1;
    for (i, &child) in kids.iter().enumerate() {
        let is_branch = i < last;
        if is_branch {
            out.push('(');
        }
        let order = structure.bond_order_between(node, child).unwrap_or_default();
        write_bond(structure, order, node, child, out);
        write_node(structure, child, ctx, labels, out);
        if is_branch {
            out.push(')');
        }
    }
}

fn write_bond(
    structure: &MolecularStructure,
    order: BondOrder,
    from: NodeIndex,
    to: NodeIndex,
    out: &mut String,
) {
    let both_aromatic = structure.atom(from).is_aromatic && structure.atom(to).is_aromatic;
    match order {
        BondOrder::Aromatic if both_aromatic => {}
        BondOrder::Single if both_aromatic => out.push('-'),
        BondOrder::Single => {}
        other => out.push(other.symbol()),
    }
}

/// SMILES ring labels stop at `%99`.
fn write_ring_label(label: usize, out: &mut String) {
    debug_assert!(label < 100, "ring label {label} has no SMILES form");
    if label <= 9 {
        out.push(char::from(b'0' + label as u8));
    } else {
        out.push('%');
        out.push(char::from(b'0' + (label / 10 % 10) as u8));
        out.push(char::from(b'0' + (label % 10) as u8));
    }
}

/// The atom as it would appear in SMILES, bracketed when needed.
pub(crate) fn atom_token(structure: &MolecularStructure, node: NodeIndex) -> String {
    let mut out = String::new();
    write_atom_symbol(structure, node, &mut out);
    out
}

fn write_atom_symbol(structure: &MolecularStructure, node: NodeIndex, out: &mut String) {
    let atom = structure.atom(node);
    let symbol = atom.symbol();
    let text = symbol.as_str();

    let bare_symbol = if atom.is_radical() {
        text.len() <= 2
    } else if atom.is_aromatic {
        AROMATIC_SUBSET.contains(&text)
    } else {
        ORGANIC_SUBSET.contains(&text)
    };

    if bare_symbol && atom.explicit_hydrogens.is_none() && atom.formal_charge == 0 {
        push_symbol(text, atom.is_aromatic, out);
        return;
    }

    out.push('[');
    push_symbol(text, atom.is_aromatic, out);
    if atom.hydrogen_count > 0 {
        out.push('H');
        if atom.hydrogen_count > 1 {
            out.push_str(&atom.hydrogen_count.to_string());
        }
    }
    if atom.formal_charge > 0 {
        out.push('+');
        if atom.formal_charge > 1 {
            out.push_str(&atom.formal_charge.to_string());
        }
    } else if atom.formal_charge < 0 {
        out.push('-');
        if atom.formal_charge < -1 {
            out.push_str(&atom.formal_charge.unsigned_abs().to_string());
        }
    }
    out.push(']');
}

fn push_symbol(text: &str, aromatic: bool, out: &mut String) {
    if aromatic {
        out.extend(text.chars().map(|c| c.to_ascii_lowercase()));
    } else {
        out.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;

    fn parse(s: &str) -> MolecularStructure {
        MolecularStructure::parse(s, &AtomCatalog::with_common_elements())
            .unwrap_or_else(|e| panic!("bad SMILES {s:?}: {e}"))
    }

    fn round_trip(s: &str) -> String {
        let first = parse(s);
        let written = to_smiles(&first);
        let second = parse(&written);
        assert_eq!(first, second, "{s} -> {written}");
        written
    }

    #[test]
    fn chain_and_branches() {
        assert_eq!(round_trip("CCO"), "CCO");
        assert_eq!(round_trip("CC(C)C"), "CC(C)C");
        assert_eq!(round_trip("CC(=O)O"), "CC(=O)O");
    }

    #[test]
    fn rings_get_lowest_labels() {
        assert_eq!(round_trip("C1CCCCC1"), "C1CCCCC1");
        assert_eq!(round_trip("C%42CC%42"), "C1CC1");
        assert_eq!(round_trip("C1CC1C1CC1"), "C1CC1C1CC1");
    }

    #[test]
    fn aromatic_rings() {
        assert_eq!(round_trip("c1ccccc1"), "c1ccccc1");
        assert_eq!(round_trip("c1ccccc1-c1ccccc1"), "c1ccccc1-c1ccccc1");
    }

    #[test]
    fn brackets_only_when_needed() {
        assert_eq!(round_trip("[NH4+]"), "[NH4+]");
        assert_eq!(round_trip("[Na+].[Cl-]"), "[Na+].[Cl-]");
        assert_eq!(round_trip("[Mg](O)O"), "[Mg](O)O");
        assert_eq!(round_trip("OMgO"), "O[Mg]O");
        assert_eq!(round_trip("[nH]1cccc1"), "[nH]1cccc1");
    }

    #[test]
    fn radicals_written_bare() {
        assert_eq!(round_trip("RC(=O)OR"), "RC(=O)OR");
        assert_eq!(round_trip("CX"), "CX");
    }

    #[test]
    fn fused_and_bridged() {
        round_trip("C1CC12CC2");
        round_trip("C1C2CC3CC23C1");
        round_trip("C2CC1CC3C1C7C2CCC6CC4CC5CC3C45C67");
        round_trip("C12C3C4C1C5C2C3C45");
    }

    #[test]
    fn triple_and_quadruple_bonds() {
        assert_eq!(round_trip("C#N"), "C#N");
        assert_eq!(round_trip("C=1CCCCC=1"), "C=1CCCCC=1");
    }

    #[test]
    fn two_digit_ring_labels() {
        let mut out = String::new();
        for label in [7, 10, 42, 99] {
            write_ring_label(label, &mut out);
        }
        assert_eq!(out, "7%10%42%99");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "ring label 100")]
    fn three_digit_ring_label_is_refused() {
        write_ring_label(100, &mut String::new());
    }

    #[test]
    fn hydrogen_molecule() {
        assert_eq!(round_trip("HH"), "HH");
    }
}
