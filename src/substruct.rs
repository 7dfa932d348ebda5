//! Atom mappings between molecular graphs.
//!
//! [`find_mapping`] is a connectivity-first backtracking search: pattern
//! atoms are visited breadth-first from the highest-degree atom, and each one
//! is tried only against target neighbours of an already mapped neighbour's
//! image. Which of several equivalent mappings comes back is not specified.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::structure::MolecularStructure;

/// Injective map from pattern atoms to target atoms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AtomMapping {
    pairs: BTreeMap<NodeIndex, NodeIndex>,
}

impl AtomMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Target atom that `pattern` maps to.
    pub fn get(&self, pattern: NodeIndex) -> Option<NodeIndex> {
        self.pairs.get(&pattern).copied()
    }

    pub fn contains_pattern(&self, pattern: NodeIndex) -> bool {
        self.pairs.contains_key(&pattern)
    }

    pub fn contains_target(&self, target: NodeIndex) -> bool {
        self.pairs.values().any(|&t| t == target)
    }

    /// `(pattern, target)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.pairs.iter().map(|(&p, &t)| (p, t))
    }

    pub fn targets(&self) -> BTreeSet<NodeIndex> {
        self.pairs.values().copied().collect()
    }

    /// Swaps the roles of pattern and target.
    pub fn inverse(&self) -> AtomMapping {
        AtomMapping {
            pairs: self.pairs.iter().map(|(&p, &t)| (t, p)).collect(),
        }
    }

    /// Adds a pair unless either side is already mapped.
    pub fn insert(&mut self, pattern: NodeIndex, target: NodeIndex) -> bool {
        if self.pairs.contains_key(&pattern) || self.contains_target(target) {
            return false;
        }
        self.pairs.insert(pattern, target);
        true
    }
}

impl FromIterator<(NodeIndex, NodeIndex)> for AtomMapping {
    fn from_iter<I: IntoIterator<Item = (NodeIndex, NodeIndex)>>(iter: I) -> Self {
        let mut mapping = AtomMapping::new();
        for (p, t) in iter {
            mapping.insert(p, t);
        }
        mapping
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomRule {
    /// Wildcard-aware: radicals accept anything in their match set and any
    /// number of substituents; elements must agree on symbol, degree,
    /// hydrogens and charge.
    Substructure,
    /// Same symbol, degree, hydrogens and charge.
    Identity,
}

/// Full mapping of `pattern` into `target`, if one exists.
pub fn find_mapping(pattern: &MolecularStructure, target: &MolecularStructure) -> Option<AtomMapping> {
    if let Some(trivial) = trivial_mapping(pattern, target) {
        return trivial;
    }
    if !target.fingerprint().may_contain(&pattern.fingerprint()) {
        return None;
    }
    Matcher::new(pattern, target, AtomRule::Substructure).find_first()
}

/// Largest mapping of `pattern` atoms into `target`; full when
/// [`find_mapping`] succeeds.
pub fn find_maximal_mapping(pattern: &MolecularStructure, target: &MolecularStructure) -> AtomMapping {
    if let Some(trivial) = trivial_mapping(pattern, target) {
        return trivial.unwrap_or_default();
    }
    if let Some(full) = find_mapping(pattern, target) {
        return full;
    }
    Matcher::new(pattern, target, AtomRule::Substructure).find_largest()
}

/// Full isomorphism with strict atom equality, used by structural equality.
pub(crate) fn find_identity_mapping(a: &MolecularStructure, b: &MolecularStructure) -> Option<AtomMapping> {
    if let Some(trivial) = trivial_mapping(a, b) {
        return trivial;
    }
    Matcher::new(a, b, AtomRule::Identity).find_first()
}

/// Molecular hydrogen only maps onto molecular hydrogen; an empty pattern
/// maps onto anything.
fn trivial_mapping(pattern: &MolecularStructure, target: &MolecularStructure) -> Option<Option<AtomMapping>> {
    if pattern.is_virtual_hydrogen() || target.is_virtual_hydrogen() {
        let both = pattern.is_virtual_hydrogen() && target.is_virtual_hydrogen();
        return Some(both.then(AtomMapping::new));
    }
    if pattern.atom_count() == 0 {
        return Some(Some(AtomMapping::new()));
    }
    if pattern.atom_count() > target.atom_count() {
        return Some(None);
    }
    None
}

struct Matcher<'a> {
    pattern: &'a MolecularStructure,
    target: &'a MolecularStructure,
    rule: AtomRule,
    /// Visiting order, each node with a previously visited neighbour.
    query_order: Vec<(NodeIndex, Option<NodeIndex>)>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
}

impl<'a> Matcher<'a> {
    fn new(pattern: &'a MolecularStructure, target: &'a MolecularStructure, rule: AtomRule) -> Self {
        Self {
            pattern,
            target,
            rule,
            query_order: connectivity_order(pattern),
            query_map: vec![None; pattern.atom_count()],
            target_used: vec![false; target.atom_count()],
        }
    }

    fn find_first(&mut self) -> Option<AtomMapping> {
        if self.recurse(0) {
            Some(self.current())
        } else {
            None
        }
    }

    fn current(&self) -> AtomMapping {
        self.query_map
            .iter()
            .enumerate()
            .filter_map(|(p, t)| t.map(|t| (NodeIndex::new(p), t)))
            .collect()
    }

    fn candidates(&self, anchor: Option<NodeIndex>) -> Vec<NodeIndex> {
        match anchor.and_then(|a| self.query_map[a.index()]) {
            Some(image) => self.target.neighbors(image).collect(),
            None => self.target.atoms().collect(),
        }
    }

    fn recurse(&mut self, depth: usize) -> bool {
        if depth == self.query_order.len() {
            return true;
        }
        let (query_node, anchor) = self.query_order[depth];

        for target_node in self.candidates(anchor) {
            if self.target_used[target_node.index()] || !self.is_feasible(query_node, target_node) {
                continue;
            }

            self.query_map[query_node.index()] = Some(target_node);
            self.target_used[target_node.index()] = true;

            if self.recurse(depth + 1) {
                return true;
            }

            self.query_map[query_node.index()] = None;
            self.target_used[target_node.index()] = false;
        }
        false
    }

    /// Include/exclude search over the visiting order keeping the largest
    /// consistent partial map. Skipped atoms free their neighbours to be
    /// placed anywhere.
    fn find_largest(&mut self) -> AtomMapping {
        let mut best = AtomMapping::new();
        self.recurse_partial(0, 0, &mut best);
        best
    }

    fn recurse_partial(&mut self, depth: usize, mapped: usize, best: &mut AtomMapping) {
        if mapped > best.len() {
            *best = self.current();
        }
        let remaining = self.query_order.len() - depth;
        if depth == self.query_order.len() || mapped + remaining <= best.len() {
            return;
        }
        let (query_node, _) = self.query_order[depth];

        let anchor = self
            .pattern
            .neighbors(query_node)
            .find(|nb| self.query_map[nb.index()].is_some());
        for target_node in self.candidates(anchor) {
            if self.target_used[target_node.index()] || !self.is_feasible(query_node, target_node) {
                continue;
            }
            self.query_map[query_node.index()] = Some(target_node);
            self.target_used[target_node.index()] = true;

            self.recurse_partial(depth + 1, mapped + 1, best);

            self.query_map[query_node.index()] = None;
            self.target_used[target_node.index()] = false;
        }

        self.recurse_partial(depth + 1, mapped, best);
    }

    fn is_feasible(&self, query_node: NodeIndex, target_node: NodeIndex) -> bool {
        let q = self.pattern.atom(query_node);
        let t = self.target.atom(target_node);

        let atoms_match = match self.rule {
            AtomRule::Substructure => {
                q.kind.matches(&t.kind)
                    && (q.is_radical()
                        || (self.pattern.degree(query_node) == self.target.degree(target_node)
                            && q.hydrogen_count == t.hydrogen_count
                            && q.formal_charge == t.formal_charge))
            }
            AtomRule::Identity => {
                q.symbol() == t.symbol()
                    && self.pattern.degree(query_node) == self.target.degree(target_node)
                    && q.hydrogen_count == t.hydrogen_count
                    && q.formal_charge == t.formal_charge
            }
        };
        if !atoms_match {
            return false;
        }

        for (q_neighbor, q_order) in self.pattern.bonded(query_node) {
            if let Some(t_mapped) = self.query_map[q_neighbor.index()] {
                match self.target.bond_order_between(target_node, t_mapped) {
                    Some(t_order) if t_order == q_order => {}
                    _ => return false,
                }
            }
        }

        true
    }
}

/// Breadth-first order starting from the highest-degree unvisited atom of
/// each fragment, so constrained atoms are placed first.
fn connectivity_order(structure: &MolecularStructure) -> Vec<(NodeIndex, Option<NodeIndex>)> {
    let n = structure.atom_count();
    let mut by_degree: Vec<NodeIndex> = structure.atoms().collect();
    by_degree.sort_by(|&a, &b| structure.degree(b).cmp(&structure.degree(a)).then(a.cmp(&b)));

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for &seed in &by_degree {
        if visited[seed.index()] {
            continue;
        }
        visited[seed.index()] = true;
        let mut queue = VecDeque::from([(seed, None)]);
        while let Some((node, anchor)) = queue.pop_front() {
            order.push((node, anchor));
            let mut next: Vec<NodeIndex> = structure
                .neighbors(node)
                .filter(|nb| !visited[nb.index()])
                .collect();
            next.sort_by(|&a, &b| structure.degree(b).cmp(&structure.degree(a)).then(a.cmp(&b)));
            for nb in next {
                visited[nb.index()] = true;
                queue.push_back((nb, Some(node)));
            }
        }
    }
    order
}

/// Largest connected common substructure of `a` and `b` as a map from `a`
/// atoms to `b` atoms, skipping atoms in the ignore sets.
///
/// Atoms must carry the same symbol. The map grows only along bonds present
/// in both graphs, whatever their order. Among maps of the same size the one
/// with more matching bond orders wins, then the one with the smaller total
/// degree difference.
pub fn find_overlap(
    a: &MolecularStructure,
    b: &MolecularStructure,
    ignore_a: &BTreeSet<NodeIndex>,
    ignore_b: &BTreeSet<NodeIndex>,
) -> AtomMapping {
    let mut search = OverlapSearch {
        a,
        b,
        map: vec![None; a.atom_count()],
        used: b.atoms().map(|n| ignore_b.contains(&n)).collect(),
        blocked: a.atoms().map(|n| ignore_a.contains(&n)).collect(),
        best: None,
    };

    let seeds: Vec<NodeIndex> = a.atoms().filter(|n| !ignore_a.contains(n)).collect();
    for seed in seeds {
        for candidate in b.atoms() {
            if search.used[candidate.index()] || a.atom(seed).symbol() != b.atom(candidate).symbol() {
                continue;
            }
            search.assign(seed, candidate);
            search.grow(1);
            search.unassign(seed, candidate);
        }
        // Every overlap containing `seed` has been seen.
        search.blocked[seed.index()] = true;
    }

    search
        .best
        .map(|(_, mapping)| mapping)
        .unwrap_or_default()
}

/// (size, matching bond orders, negated degree difference)
type OverlapScore = (usize, usize, i64);

struct OverlapSearch<'a> {
    a: &'a MolecularStructure,
    b: &'a MolecularStructure,
    map: Vec<Option<NodeIndex>>,
    used: Vec<bool>,
    /// Atoms of `a` that may not be added: ignored, seeded before or
    /// excluded on the current branch.
    blocked: Vec<bool>,
    best: Option<(OverlapScore, AtomMapping)>,
}

impl OverlapSearch<'_> {
    fn assign(&mut self, x: NodeIndex, y: NodeIndex) {
        self.map[x.index()] = Some(y);
        self.used[y.index()] = true;
    }

    fn unassign(&mut self, x: NodeIndex, y: NodeIndex) {
        self.map[x.index()] = None;
        self.used[y.index()] = false;
    }

    fn score(&self) -> OverlapScore {
        let mut size = 0;
        let mut orders = 0;
        let mut degree_diff = 0i64;
        for (x, y) in self.map.iter().enumerate() {
            let Some(y) = *y else { continue };
            let x = NodeIndex::new(x);
            size += 1;
            degree_diff += (self.a.degree(x) as i64 - self.b.degree(y) as i64).abs();
            for (nb, order) in self.a.bonded(x) {
                if nb < x {
                    continue;
                }
                if let Some(nb_image) = self.map[nb.index()] {
                    if self.b.bond_order_between(y, nb_image) == Some(order) {
                        orders += 1;
                    }
                }
            }
        }
        (size, orders, -degree_diff)
    }

    fn record(&mut self) {
        let score = self.score();
        if self.best.as_ref().map_or(true, |(best, _)| score > *best) {
            let mapping = self
                .map
                .iter()
                .enumerate()
                .filter_map(|(x, y)| y.map(|y| (NodeIndex::new(x), y)))
                .collect();
            self.best = Some((score, mapping));
        }
    }

    fn best_size(&self) -> usize {
        self.best.as_ref().map_or(0, |((size, _, _), _)| *size)
    }

    /// Next unmapped, unblocked `a` atom bonded to the mapped part.
    fn frontier(&self) -> Option<NodeIndex> {
        self.a.atoms().find(|&x| {
            self.map[x.index()].is_none()
                && !self.blocked[x.index()]
                && self.a.neighbors(x).any(|nb| self.map[nb.index()].is_some())
        })
    }

    fn grow(&mut self, size: usize) {
        self.record();

        let open_a = self
            .a
            .atoms()
            .filter(|x| self.map[x.index()].is_none() && !self.blocked[x.index()])
            .count();
        let open_b = self.used.iter().filter(|u| !**u).count();
        if size + open_a.min(open_b) < self.best_size() {
            return;
        }

        let Some(x) = self.frontier() else {
            return;
        };

        let mut candidates: BTreeSet<NodeIndex> = BTreeSet::new();
        for nb in self.a.neighbors(x) {
            if let Some(image) = self.map[nb.index()] {
                candidates.extend(self.b.neighbors(image).filter(|y| !self.used[y.index()]));
            }
        }

        for y in candidates {
            if self.a.atom(x).symbol() != self.b.atom(y).symbol() {
                continue;
            }
            self.assign(x, y);
            self.grow(size + 1);
            self.unassign(x, y);
        }

        self.blocked[x.index()] = true;
        self.grow(size);
        self.blocked[x.index()] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;

    fn mol(s: &str) -> MolecularStructure {
        MolecularStructure::parse(s, &AtomCatalog::with_common_elements())
            .unwrap_or_else(|e| panic!("bad SMILES {s:?}: {e}"))
    }

    fn overlap(a: &str, b: &str) -> AtomMapping {
        find_overlap(&mol(a), &mol(b), &BTreeSet::new(), &BTreeSet::new())
    }

    fn assert_injective(m: &AtomMapping) {
        assert_eq!(m.targets().len(), m.len());
    }

    #[test]
    fn ester_pattern_maps() {
        let m = find_mapping(&mol("RC(=O)OR"), &mol("CC(=O)OC")).unwrap();
        assert_eq!(m.len(), 5);
        assert_injective(&m);
    }

    #[test]
    fn acid_pattern_does_not_map_into_ester() {
        assert!(find_mapping(&mol("RC(=O)O"), &mol("CC(=O)OC")).is_none());
    }

    #[test]
    fn hydroxyl_pattern() {
        assert!(find_mapping(&mol("OR"), &mol("CC(O)C")).is_some());
    }

    #[test]
    fn halogen_radical() {
        assert!(find_mapping(&mol("X"), &mol("[Cl]")).is_some());
        assert!(find_mapping(&mol("CX"), &mol("CBr")).is_some());
        assert!(find_mapping(&mol("CX"), &mol("CO")).is_none());
    }

    #[test]
    fn element_degree_must_agree() {
        assert!(find_mapping(&mol("O(C)(C)"), &mol("O(C)(CC)")).is_none());
        assert!(find_mapping(&mol("O(C)(R)"), &mol("O(C)(CC)")).is_some());
    }

    #[test]
    fn bond_orders_must_agree() {
        assert!(find_mapping(&mol("RC=O"), &mol("CC=O")).is_some());
        assert!(find_mapping(&mol("RC#N"), &mol("CC=N")).is_none());
    }

    #[test]
    fn empty_and_hydrogen_patterns() {
        let h2 = mol("HH");
        assert!(find_mapping(&h2, &mol("HH")).is_some());
        assert!(find_mapping(&h2, &mol("CC")).is_none());
        assert!(find_mapping(&mol("C"), &h2).is_none());
        let empty = MolecularStructure::new(1.008);
        assert_eq!(find_mapping(&empty, &mol("CC")).map(|m| m.len()), Some(0));
    }

    #[test]
    fn pattern_larger_than_target() {
        assert!(find_mapping(&mol("CCCC"), &mol("CC")).is_none());
        assert!(find_maximal_mapping(&mol("CCCC"), &mol("CC")).len() <= 2);
    }

    #[test]
    fn maximal_mapping_is_full_when_possible() {
        let pattern = mol("RC(=O)OR");
        let target = mol("CC(=O)OC");
        assert_eq!(find_maximal_mapping(&pattern, &target).len(), pattern.atom_count());
    }

    #[test]
    fn maximal_mapping_partial() {
        let pattern = mol("RC(=O)O");
        let target = mol("CC(=O)OC");
        let m = find_maximal_mapping(&pattern, &target);
        assert!(m.len() < pattern.atom_count());
        assert!(m.len() >= 3);
        assert_injective(&m);
    }

    #[test]
    fn identity_mapping() {
        assert!(find_identity_mapping(&mol("OCC"), &mol("CCO")).is_some());
        assert!(find_identity_mapping(&mol("CC(=O)OC"), &mol("RC(=O)OR")).is_none());
        assert!(find_identity_mapping(&mol("C1CCCCC1"), &mol("C1CCCCC1")).is_some());
    }

    #[test]
    fn overlap_sizes() {
        assert_eq!(overlap("CC(=O)OC", "OCC").len(), 3);
        assert_eq!(overlap("C1CCCCC(O)CC1", "CC(O)C").len(), 4);
        assert_eq!(overlap("CC(=O)OR", "OCR").len(), 2);
        assert_eq!(overlap("C(=O)N(C)C", "C1CCC1").len(), 1);
        assert_eq!(overlap("O(C)CC", "O(CC)C").len(), 4);
        assert_eq!(overlap("CC2CCCC(C1CCCCC1)C2", "CC1CCCCC1").len(), 7);
    }

    #[test]
    fn overlap_prefers_matching_bond_orders() {
        let a = mol("CC(=O)OC");
        let m = overlap("CC(=O)OC", "OCC");
        // The ether oxygen, not the carbonyl one.
        let oxygen = m.iter().find(|(x, _)| a.atom(*x).symbol().as_str() == "O").unwrap().0;
        assert_eq!(oxygen, NodeIndex::new(3));
    }

    #[test]
    fn overlap_respects_ignore_sets() {
        let a = mol("CCO");
        let b = mol("CCO");
        let ignore: BTreeSet<NodeIndex> = [NodeIndex::new(2)].into();
        let m = find_overlap(&a, &b, &ignore, &BTreeSet::new());
        assert_eq!(m.len(), 2);
        assert!(!m.contains_pattern(NodeIndex::new(2)));
    }

    #[test]
    fn mapping_inverse() {
        let m: AtomMapping = [(NodeIndex::new(0), NodeIndex::new(3)), (NodeIndex::new(1), NodeIndex::new(2))]
            .into_iter()
            .collect();
        let inv = m.inverse();
        assert_eq!(inv.get(NodeIndex::new(3)), Some(NodeIndex::new(0)));
        assert_eq!(inv.inverse(), m);
    }

    #[test]
    fn mapping_rejects_non_injective_insert() {
        let mut m = AtomMapping::new();
        assert!(m.insert(NodeIndex::new(0), NodeIndex::new(1)));
        assert!(!m.insert(NodeIndex::new(2), NodeIndex::new(1)));
        assert!(!m.insert(NodeIndex::new(0), NodeIndex::new(5)));
        assert_eq!(m.len(), 1);
    }
}
