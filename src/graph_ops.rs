use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::NodeIndex;

use crate::structure::{MolecularStructure, ValenceError};
use crate::substruct::AtomMapping;

/// Atom sets of the connected fragments, each sorted, ordered by their
/// lowest atom.
pub fn connected_components(structure: &MolecularStructure) -> Vec<Vec<NodeIndex>> {
    let n = structure.atom_count();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for node in structure.atoms() {
        if visited[node.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(current);
            for neighbor in structure.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components
}

/// Grafts the branch of `source` hanging off `source_root` onto
/// `destination`.
///
/// `mapping` sends source atoms to destination atoms and must already hold
/// `source_root`. A radical at the root's image is replaced by the source
/// atom. Every source atom reachable from the root without passing through a
/// mapped or ignored atom is copied, together with its bonds to atoms that
/// are mapped by then. Newly copied atoms are added to `mapping`.
///
/// Hydrogen counts of the destination are left stale; call
/// [`MolecularStructure::fill_hydrogens`] once grafting is done.
pub fn copy_branch(
    destination: &mut MolecularStructure,
    source: &MolecularStructure,
    source_root: NodeIndex,
    mapping: &mut BTreeMap<NodeIndex, NodeIndex>,
    ignore: &BTreeSet<NodeIndex>,
) {
    let Some(&root_image) = mapping.get(&source_root) else {
        return;
    };
    if destination.atom(root_image).is_radical() {
        *destination.atom_mut(root_image) = source.atom(source_root).clone();
    }

    let mut stack: Vec<NodeIndex> = source
        .neighbors(source_root)
        .filter(|nb| !mapping.contains_key(nb) && !ignore.contains(nb))
        .collect();

    while let Some(current) = stack.pop() {
        if mapping.contains_key(&current) {
            continue;
        }
        let copy = destination.add_atom(source.atom(current).clone());
        mapping.insert(current, copy);

        for (neighbor, order) in source.bonded(current) {
            if let Some(&image) = mapping.get(&neighbor) {
                destination.add_bond(copy, image, order);
            } else if !ignore.contains(&neighbor) {
                stack.push(neighbor);
            }
        }
    }
}

/// Replaces the part of `instance` covered by `mapping` with `pattern`.
///
/// `mapping` sends pattern atoms to instance atoms, as returned by
/// [`find_mapping`](crate::substruct::find_mapping) or
/// [`find_overlap`](crate::substruct::find_overlap). The result starts as a
/// copy of `pattern`; mapped radicals take the kind of their instance atom,
/// and every unmapped instance atom is carried over with its bonds, bonds into
/// the covered part being redirected to the corresponding pattern atom.
/// Instance bonds between two covered atoms are dropped in favour of the
/// pattern's. Atom indices of the result follow the pattern first.
pub fn substitute(
    instance: &MolecularStructure,
    pattern: &MolecularStructure,
    mapping: &AtomMapping,
) -> Result<MolecularStructure, ValenceError> {
    let mut result = pattern.clone();
    let mut instance_to_result: BTreeMap<NodeIndex, NodeIndex> =
        mapping.iter().map(|(p, i)| (i, p)).collect();

    let roots: Vec<NodeIndex> = instance_to_result.keys().copied().collect();
    for root in roots {
        copy_branch(&mut result, instance, root, &mut instance_to_result, &BTreeSet::new());
    }

    // Fragments of the instance with no covered atom at all.
    for component in connected_components(instance) {
        if component.iter().any(|a| instance_to_result.contains_key(a)) {
            continue;
        }
        let root = component[0];
        let copy = result.add_atom(instance.atom(root).clone());
        instance_to_result.insert(root, copy);
        copy_branch(&mut result, instance, root, &mut instance_to_result, &BTreeSet::new());
    }

    result.fill_hydrogens()?;
    Ok(result)
}
