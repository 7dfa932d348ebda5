use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::structure::MolecularStructure;

/// A set of independent cycles spanning the cycle space of a structure.
///
/// Each cycle lists its atoms in ring order. Fundamental cycles start at the
/// source of their back edge; minimal cycles start at their lowest index and
/// continue towards the smaller neighbour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleBasis {
    cycles: Vec<Vec<NodeIndex>>,
}

impl CycleBasis {
    /// One cycle per non-tree bond of a depth-first spanning forest, in
    /// discovery order.
    pub fn fundamental(structure: &MolecularStructure) -> Self {
        let n = structure.atom_count();
        let mut depth: Vec<Option<usize>> = vec![None; n];
        let mut parent: Vec<Option<NodeIndex>> = vec![None; n];
        let mut cycles = Vec::new();

        for root in structure.atoms() {
            if depth[root.index()].is_some() {
                continue;
            }
            depth[root.index()] = Some(0);
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(root, sorted_neighbors(structure, root))];

            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                let Some(next) = pending.pop() else {
                    stack.pop();
                    continue;
                };
                let node_depth = depth[node.index()].unwrap_or(0);
                match depth[next.index()] {
                    None => {
                        depth[next.index()] = Some(node_depth + 1);
                        parent[next.index()] = Some(node);
                        stack.push((next, sorted_neighbors(structure, next)));
                    }
                    // Back edge to an ancestor; descendants already reported
                    // the edge from their side.
                    Some(d) if d + 1 < node_depth => {
                        let mut cycle = vec![node];
                        let mut cur = node;
                        while let Some(p) = parent[cur.index()] {
                            cycle.push(p);
                            if p == next {
                                break;
                            }
                            cur = p;
                        }
                        cycles.push(cycle);
                    }
                    Some(_) => {}
                }
            }
        }

        Self { cycles }
    }

    /// Minimum-weight cycle basis: shortest candidate cycles are accepted
    /// while they stay linearly independent over GF(2).
    pub fn minimal(structure: &MolecularStructure) -> Self {
        let needed = structure.cycle_count();
        if needed == 0 {
            return Self::default();
        }

        let num_edges = structure.bond_count();
        let mut candidates = horton_candidates(structure);
        // Fundamental cycles guarantee the candidates span the cycle space.
        candidates.extend(Self::fundamental(structure).cycles.iter().map(|c| normalize_ring(c)));
        sort_cycles(&mut candidates);

        let mut basis: Vec<Vec<u64>> = Vec::with_capacity(needed);
        let mut cycles = Vec::with_capacity(needed);
        for ring in candidates {
            if cycles.len() >= needed {
                break;
            }
            let bv = ring_to_edge_bitvector(&ring, num_edges, structure);
            if bv.iter().all(|&w| w == 0) {
                continue;
            }
            if try_add_to_basis(&mut basis, bv) {
                cycles.push(ring);
            }
        }

        sort_cycles(&mut cycles);
        Self { cycles }
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn cycles(&self) -> &[Vec<NodeIndex>] {
        &self.cycles
    }

    pub fn cyclic_atoms(&self) -> BTreeSet<NodeIndex> {
        self.cycles.iter().flatten().copied().collect()
    }

    pub fn cyclic_atom_count(&self) -> usize {
        self.cyclic_atoms().len()
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.cycles.iter().any(|ring| ring.contains(&atom))
    }

    pub fn is_ring_bond(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.cycles.iter().any(|ring| {
            let len = ring.len();
            (0..len).any(|i| {
                let j = (i + 1) % len;
                (ring[i] == a && ring[j] == b) || (ring[i] == b && ring[j] == a)
            })
        })
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.atom_cycles(atom).map(|ring| ring.len()).min()
    }

    pub fn atom_cycles(&self, atom: NodeIndex) -> impl Iterator<Item = &Vec<NodeIndex>> + '_ {
        self.cycles.iter().filter(move |ring| ring.contains(&atom))
    }

    /// Ring size to number of rings of that size.
    pub fn size_histogram(&self) -> BTreeMap<usize, usize> {
        let mut histogram = BTreeMap::new();
        for ring in &self.cycles {
            *histogram.entry(ring.len()).or_insert(0) += 1;
        }
        histogram
    }
}

fn sorted_neighbors(structure: &MolecularStructure, node: NodeIndex) -> Vec<NodeIndex> {
    // Reversed so pop() yields the lowest index first.
    let mut neighbors: Vec<NodeIndex> = structure.neighbors(node).collect();
    neighbors.sort_by(|a, b| b.cmp(a));
    neighbors
}

fn sort_cycles(cycles: &mut Vec<Vec<NodeIndex>>) {
    cycles.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    cycles.dedup();
}

/// For every atom `w` and bond `(u, v)`, the cycle formed by the shortest
/// paths `w..u` and `w..v` plus the bond, when those paths only meet at `w`.
fn horton_candidates(structure: &MolecularStructure) -> Vec<Vec<NodeIndex>> {
    let n = structure.atom_count();
    let dist = all_pairs_bfs(structure, n);
    let pred = all_pairs_predecessors(structure, n, &dist);

    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();

    for edge in structure.bonds() {
        let Some((u, v)) = structure.bond_endpoints(edge) else {
            continue;
        };
        for w in structure.atoms() {
            let du = dist[w.index()][u.index()];
            let dv = dist[w.index()][v.index()];
            if du == u32::MAX || dv == u32::MAX {
                continue;
            }
            if du as usize + dv as usize + 1 < 3 {
                continue;
            }
            let path_u = reconstruct_path(&pred, w, u);
            let path_v = reconstruct_path(&pred, w, v);
            if path_u.is_empty() || path_v.is_empty() || paths_share_internal_node(&path_u, &path_v) {
                continue;
            }
            let mut ring = path_u;
            for &node in path_v[1..].iter().rev() {
                ring.push(node);
            }
            candidates.push(normalize_ring(&ring));
        }
    }

    sort_cycles(&mut candidates);
    candidates
}

fn all_pairs_bfs(structure: &MolecularStructure, n: usize) -> Vec<Vec<u32>> {
    let mut dist = vec![vec![u32::MAX; n]; n];
    for (src, row) in dist.iter_mut().enumerate() {
        row[src] = 0;
        let mut queue = VecDeque::from([NodeIndex::new(src)]);
        while let Some(cur) = queue.pop_front() {
            let d = row[cur.index()];
            for nb in structure.neighbors(cur) {
                if row[nb.index()] == u32::MAX {
                    row[nb.index()] = d + 1;
                    queue.push_back(nb);
                }
            }
        }
    }
    dist
}

fn all_pairs_predecessors(
    structure: &MolecularStructure,
    n: usize,
    dist: &[Vec<u32>],
) -> Vec<Vec<Option<NodeIndex>>> {
    let mut pred = vec![vec![None; n]; n];
    for src in 0..n {
        let mut visited = vec![false; n];
        visited[src] = true;
        let mut queue = VecDeque::from([NodeIndex::new(src)]);
        while let Some(cur) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = structure.neighbors(cur).collect();
            next.sort();
            for nb in next {
                if !visited[nb.index()] && dist[src][nb.index()] == dist[src][cur.index()] + 1 {
                    visited[nb.index()] = true;
                    pred[src][nb.index()] = Some(cur);
                    queue.push_back(nb);
                }
            }
        }
    }
    pred
}

fn reconstruct_path(pred: &[Vec<Option<NodeIndex>>], src: NodeIndex, dst: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        match pred[src.index()][cur.index()] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return vec![],
        }
    }
    path.reverse();
    path
}

fn paths_share_internal_node(path_u: &[NodeIndex], path_v: &[NodeIndex]) -> bool {
    if path_u.len() < 2 || path_v.len() < 2 {
        return false;
    }
    path_u[1..].iter().any(|node| path_v[1..].contains(node))
}

fn ring_to_edge_bitvector(ring: &[NodeIndex], num_edges: usize, structure: &MolecularStructure) -> Vec<u64> {
    let mut bv = vec![0u64; num_edges.div_ceil(64)];
    let len = ring.len();
    for i in 0..len {
        if let Some(edge) = structure.bond_between(ring[i], ring[(i + 1) % len]) {
            let idx = edge.index();
            bv[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    bv
}

/// Reduces `candidate` against the basis rows and keeps it if anything is
/// left. Rows are stored reduced, so their leading bits are distinct.
fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(&mut v, row);
            }
        }
    }
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &word)| word != 0)
        .map(|(i, &word)| i * 64 + word.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b.iter()) {
        *aw ^= *bw;
    }
}

fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let Some(min_pos) = ring.iter().enumerate().min_by_key(|&(_, idx)| idx).map(|(i, _)| i) else {
        return vec![];
    };

    let len = ring.len();
    let mut normalized: Vec<NodeIndex> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;

    fn mol(s: &str) -> MolecularStructure {
        MolecularStructure::parse(s, &AtomCatalog::with_common_elements())
            .unwrap_or_else(|e| panic!("bad SMILES {s:?}: {e}"))
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn histogram(pairs: &[(usize, usize)]) -> BTreeMap<usize, usize> {
        pairs.iter().copied().collect()
    }

    const POLYCYCLE: &str = "C2CC1CC3C1C7C2CCC6CC4CC5CC3C45C67";

    #[test]
    fn fundamental_counts() {
        let cases = [
            ("CC(=O)OC(C)C", 0, 0),
            ("OC1CCC1", 1, 4),
            ("C1CCC(C)CC1", 1, 6),
            ("CCC1CCC(O)CC1", 1, 6),
            ("C1CC12CC2", 2, 5),
            ("CC2CC(CCCC)CC(C1CCCCC1)C2", 2, 12),
            ("C1C2CC3CC23C1", 3, 7),
            (POLYCYCLE, 7, 19),
        ];
        for (smiles, cycles, atoms) in cases {
            let basis = CycleBasis::fundamental(&mol(smiles));
            assert_eq!(basis.len(), cycles, "{smiles}");
            assert_eq!(basis.cyclic_atom_count(), atoms, "{smiles}");
        }
    }

    #[test]
    fn minimal_ring_sizes() {
        let cases = [
            ("C1CCC(C)CC1", 6, histogram(&[(6, 1)])),
            ("C1C(CCC2)C2CCC1", 9, histogram(&[(5, 1), (6, 1)])),
            ("C1C2CC3CC23C1", 7, histogram(&[(3, 1), (4, 2)])),
            (POLYCYCLE, 19, histogram(&[(4, 3), (5, 1), (6, 3)])),
            ("C12C3C1C23", 4, histogram(&[(3, 3)])),
            ("C12C3C4C1C234", 5, histogram(&[(3, 4)])),
            ("C12C3C4C1C5C2C3C45", 8, histogram(&[(4, 5)])),
        ];
        for (smiles, atoms, sizes) in cases {
            let basis = CycleBasis::minimal(&mol(smiles));
            assert_eq!(basis.cyclic_atom_count(), atoms, "{smiles}");
            assert_eq!(basis.size_histogram(), sizes, "{smiles}");
        }
    }

    #[test]
    fn bases_have_equal_rank() {
        for smiles in ["C1CC12CC2", "C1C2CC3CC23C1", POLYCYCLE, "c1ccc2ccccc2c1"] {
            let s = mol(smiles);
            assert_eq!(CycleBasis::fundamental(&s).len(), s.cycle_count());
            assert_eq!(CycleBasis::minimal(&s).len(), s.cycle_count());
        }
    }

    #[test]
    fn acyclic_has_empty_basis() {
        let basis = CycleBasis::minimal(&mol("CCCC"));
        assert!(basis.is_empty());
        assert!(!basis.is_ring_atom(n(0)));
    }

    #[test]
    fn fundamental_cycle_starts_at_back_edge_source() {
        let basis = CycleBasis::fundamental(&mol("C1CCCCC1"));
        assert_eq!(basis.cycles()[0], vec![n(5), n(4), n(3), n(2), n(1), n(0)]);
    }

    #[test]
    fn minimal_cycles_are_normalized() {
        let basis = CycleBasis::minimal(&mol("C1CCCCC1"));
        assert_eq!(basis.cycles()[0], vec![n(0), n(1), n(2), n(3), n(4), n(5)]);
    }

    #[test]
    fn ring_membership() {
        let s = mol("Oc1ccccc1");
        let basis = CycleBasis::minimal(&s);
        assert!(!basis.is_ring_atom(n(0)));
        assert!(basis.is_ring_atom(n(1)));
        assert!(basis.is_ring_bond(n(1), n(6)));
        assert!(!basis.is_ring_bond(n(0), n(1)));
        assert_eq!(basis.smallest_ring_size(n(3)), Some(6));
        assert_eq!(basis.smallest_ring_size(n(0)), None);
    }

    #[test]
    fn naphthalene_fusion_atoms_share_rings() {
        let s = mol("c1ccc2ccccc2c1");
        let basis = CycleBasis::minimal(&s);
        assert_eq!(basis.atom_cycles(n(3)).count(), 2);
        assert_eq!(basis.atom_cycles(n(0)).count(), 1);
    }

    #[test]
    fn disconnected_rings() {
        let basis = CycleBasis::minimal(&mol("C1CC1.C1CCC1"));
        assert_eq!(basis.size_histogram(), histogram(&[(3, 1), (4, 1)]));
    }
}
