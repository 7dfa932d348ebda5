use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder};
use crate::catalog::AtomCatalog;
use crate::formula::{self, Fingerprint};
use crate::rings::CycleBasis;
use crate::smiles::{self, ParseError};
use crate::substruct;
use crate::symbol::Symbol;

/// Atom whose bonds and hydrogens fit none of its valences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValenceError {
    pub atom: NodeIndex,
    pub symbol: Symbol,
    /// Valence units in use, implied hydrogens excluded.
    pub bonds: u8,
}

impl fmt::Display for ValenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "atom {} ({}) exceeds its valence with {} bond units",
            self.atom.index(),
            self.symbol,
            self.bonds
        )
    }
}

impl std::error::Error for ValenceError {}

/// An undirected graph of bonded atoms.
///
/// Implied hydrogens are counted on their heavy atom rather than stored as
/// nodes. Molecular hydrogen is the one structure with no nodes at all; it
/// carries two implied hydrogens through [`MolecularStructure::hydrogen_molecule`].
#[derive(Clone)]
pub struct MolecularStructure {
    graph: UnGraph<Atom, Bond>,
    virtual_hydrogen: bool,
    hydrogen_weight: f64,
    cycles: OnceLock<CycleBasis>,
}

impl MolecularStructure {
    pub fn new(hydrogen_weight: f64) -> Self {
        Self {
            graph: UnGraph::default(),
            virtual_hydrogen: false,
            hydrogen_weight,
            cycles: OnceLock::new(),
        }
    }

    /// H2 without graph atoms.
    pub fn hydrogen_molecule(hydrogen_weight: f64) -> Self {
        Self {
            virtual_hydrogen: true,
            ..Self::new(hydrogen_weight)
        }
    }

    pub fn parse(text: &str, catalog: &AtomCatalog) -> Result<Self, ParseError> {
        smiles::parse(text, catalog)
    }

    pub fn print(&self) -> String {
        smiles::write(self)
    }

    pub fn graph(&self) -> &UnGraph<Atom, Bond> {
        &self.graph
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub(crate) fn atom_mut(&mut self, idx: NodeIndex) -> &mut Atom {
        self.cycles = OnceLock::new();
        &mut self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &Bond {
        &self.graph[idx]
    }

    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex {
        self.cycles = OnceLock::new();
        self.virtual_hydrogen = false;
        self.graph.add_node(atom)
    }

    /// Adds a bond unless it would be a self-loop or duplicate an existing one.
    pub fn add_bond(&mut self, a: NodeIndex, b: NodeIndex, order: BondOrder) -> Option<EdgeIndex> {
        if a == b
            || a.index() >= self.atom_count()
            || b.index() >= self.atom_count()
            || self.graph.find_edge(a, b).is_some()
        {
            return None;
        }
        self.cycles = OnceLock::new();
        Some(self.graph.add_edge(a, b, Bond::new(order)))
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    /// Neighbours with the connecting bond order.
    pub fn bonded(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, BondOrder)> + '_ {
        self.graph.edges(idx).map(move |e| {
            let other = if e.source() == idx { e.target() } else { e.source() };
            (other, e.weight().order)
        })
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors(idx).count()
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn bond_order_between(&self, a: NodeIndex, b: NodeIndex) -> Option<BondOrder> {
        self.bond_between(a, b).map(|e| self.graph[e].order)
    }

    pub fn bond_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    /// Valence units used by graph bonds, implied hydrogens excluded.
    pub fn bond_valence(&self, idx: NodeIndex) -> u8 {
        self.graph
            .edges(idx)
            .map(|e| e.weight().order.valence())
            .fold(0u8, |acc, v| acc.saturating_add(v))
    }

    /// Recomputes implied hydrogens of every atom without an explicit count.
    ///
    /// Radicals and atoms with open valence get none. Aromatic atoms reserve
    /// one extra unit when their valence allows it.
    pub fn fill_hydrogens(&mut self) -> Result<(), ValenceError> {
        self.fill_hydrogens_with(&vec![0; self.atom_count()])
    }

    /// As [`fill_hydrogens`](Self::fill_hydrogens), with `extra[i]` valence
    /// units already taken by hydrogens written out in the input.
    pub(crate) fn fill_hydrogens_with(&mut self, extra: &[u8]) -> Result<(), ValenceError> {
        let nodes: Vec<NodeIndex> = self.atoms().collect();
        for idx in nodes {
            let written = extra.get(idx.index()).copied().unwrap_or(0);
            let bonds = self.bond_valence(idx).saturating_add(written);
            let atom = &self.graph[idx];
            let error = ValenceError {
                atom: idx,
                symbol: atom.symbol(),
                bonds,
            };

            if let Some(explicit) = atom.explicit_hydrogens {
                if atom.formal_charge == 0
                    && atom.kind.valences().fitting_valence(bonds.saturating_add(explicit)).is_none()
                {
                    return Err(error);
                }
                self.graph[idx].hydrogen_count = explicit;
                continue;
            }

            if atom.is_radical() {
                self.graph[idx].hydrogen_count = 0;
                continue;
            }

            let valences = atom.kind.valences();
            let mut used = bonds;
            if atom.is_aromatic && valences.fitting_valence(used.saturating_add(1)).is_some() {
                used += 1;
            }
            let target = valences.fitting_valence(used).ok_or(error)?;
            self.graph[idx].hydrogen_count = target - used + written;
        }
        Ok(())
    }

    pub fn implied_hydrogen_count(&self) -> usize {
        let explicit = if self.virtual_hydrogen { 2 } else { 0 };
        explicit
            + self
                .graph
                .node_weights()
                .map(|a| a.hydrogen_count as usize)
                .sum::<usize>()
    }

    /// Graph atoms plus implied hydrogens.
    pub fn total_atom_count(&self) -> usize {
        self.atom_count() + self.implied_hydrogen_count()
    }

    pub fn hydrogen_weight(&self) -> f64 {
        self.hydrogen_weight
    }

    /// Molar mass in g/mol, implied hydrogens included.
    pub fn molar_mass(&self) -> f64 {
        self.graph.node_weights().map(|a| a.kind.weight()).sum::<f64>()
            + self.implied_hydrogen_count() as f64 * self.hydrogen_weight
    }

    pub fn component_counts(&self) -> BTreeMap<Symbol, usize> {
        formula::component_counts(self)
    }

    /// Hill-order formula such as `C2H6O`.
    pub fn formula(&self) -> String {
        formula::hill_formula(self)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }

    pub fn is_virtual_hydrogen(&self) -> bool {
        self.virtual_hydrogen
    }

    /// No radical atoms.
    pub fn is_concrete(&self) -> bool {
        self.graph.node_weights().all(|a| !a.is_radical())
    }

    pub fn is_generic(&self) -> bool {
        !self.is_concrete()
    }

    /// Has a carbon bearing at least one hydrogen.
    pub fn is_organic(&self) -> bool {
        self.graph
            .node_weights()
            .any(|a| a.symbol().as_str() == "C" && a.hydrogen_count > 0)
    }

    pub fn component_count(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    pub fn is_connected(&self) -> bool {
        self.component_count() <= 1
    }

    /// First Betti number of the graph.
    pub fn cycle_count(&self) -> usize {
        (self.bond_count() + self.component_count()).saturating_sub(self.atom_count())
    }

    pub fn is_cyclic(&self) -> bool {
        self.cycle_count() > 0
    }

    /// Minimal cycle basis, computed on first use.
    pub fn cycles(&self) -> &CycleBasis {
        self.cycles.get_or_init(|| CycleBasis::minimal(self))
    }

    pub fn is_ring_atom(&self, idx: NodeIndex) -> bool {
        self.cycles().is_ring_atom(idx)
    }

    pub fn is_ring_bond(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.cycles().is_ring_bond(a, b)
    }

    /// Translational plus rotational degrees of freedom.
    pub fn degrees_of_freedom(&self) -> u8 {
        match self.total_atom_count() {
            0 | 1 => 3,
            2 => 5,
            _ => 6,
        }
    }

    pub fn max_degree(&self) -> usize {
        self.atoms().map(|a| self.degree(a)).max().unwrap_or(0)
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Multi-line human readable summary.
    pub fn info(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("SMILES:   {}\n", self.print()));
        out.push_str(&format!("Formula:  {}\n", self.formula()));
        out.push_str(&format!("Mass:     {:.3} g/mol\n", self.molar_mass()));
        out.push_str(&format!(
            "Atoms:    {} ({} with hydrogen)\n",
            self.atom_count(),
            self.total_atom_count()
        ));
        out.push_str(&format!("Bonds:    {}\n", self.bond_count()));
        out.push_str(&format!("Cycles:   {}\n", self.cycle_count()));
        out.push_str(&format!(
            "Kind:     {}{}",
            if self.is_concrete() { "concrete" } else { "generic" },
            if self.is_organic() { ", organic" } else { "" }
        ));
        out
    }
}

impl PartialEq for MolecularStructure {
    fn eq(&self, other: &Self) -> bool {
        if self.virtual_hydrogen != other.virtual_hydrogen
            || self.atom_count() != other.atom_count()
            || self.bond_count() != other.bond_count()
            || self.implied_hydrogen_count() != other.implied_hydrogen_count()
        {
            return false;
        }
        substruct::find_identity_mapping(self, other).is_some()
    }
}

impl fmt::Display for MolecularStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

impl fmt::Debug for MolecularStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MolecularStructure")
            .field("smiles", &self.print())
            .field("atom_count", &self.atom_count())
            .field("bond_count", &self.bond_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> MolecularStructure {
        let catalog = AtomCatalog::with_common_elements();
        MolecularStructure::parse(s, &catalog).unwrap_or_else(|e| panic!("bad SMILES {s:?}: {e}"))
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn water_mass() {
        let water = parse("O");
        assert_eq!(water.implied_hydrogen_count(), 2);
        assert!((water.molar_mass() - 18.015).abs() < 1e-3);
    }

    #[test]
    fn hydrogen_molecule() {
        let h2 = parse("HH");
        assert!(h2.is_virtual_hydrogen());
        assert_eq!(h2.atom_count(), 0);
        assert_eq!(h2.total_atom_count(), 2);
        assert_eq!(h2.degrees_of_freedom(), 5);
        assert_eq!(h2.print(), "HH");
        assert_eq!(h2, parse("HH"));
    }

    #[test]
    fn degrees_of_freedom() {
        let catalog = AtomCatalog::with_common_elements();
        let mut helium_like = MolecularStructure::new(catalog.hydrogen_weight());
        helium_like.add_atom(Atom {
            explicit_hydrogens: Some(0),
            ..Atom::new(catalog.at("C").unwrap().clone())
        });
        helium_like.fill_hydrogens().unwrap();
        assert_eq!(helium_like.degrees_of_freedom(), 3);
        assert_eq!(parse("F").degrees_of_freedom(), 5);
        assert_eq!(parse("O").degrees_of_freedom(), 6);
    }

    #[test]
    fn add_bond_rejects_loops_and_duplicates() {
        let mut s = parse("CC");
        assert!(s.add_bond(n(0), n(0), BondOrder::Single).is_none());
        assert!(s.add_bond(n(0), n(1), BondOrder::Double).is_none());
        assert!(s.add_bond(n(0), n(7), BondOrder::Single).is_none());
    }

    #[test]
    fn fill_hydrogens_after_edit() {
        let mut s = parse("CC");
        let catalog = AtomCatalog::with_common_elements();
        let o = s.add_atom(Atom::new(catalog.at("O").unwrap().clone()));
        s.add_bond(n(1), o, BondOrder::Single).unwrap();
        s.fill_hydrogens().unwrap();
        assert_eq!(s.atom(n(1)).hydrogen_count, 2);
        assert_eq!(s.atom(o).hydrogen_count, 1);
        assert_eq!(s, parse("CCO"));
    }

    #[test]
    fn fill_hydrogens_reports_overflow() {
        let mut s = parse("C=O");
        let catalog = AtomCatalog::with_common_elements();
        let c = s.add_atom(Atom::new(catalog.at("C").unwrap().clone()));
        s.add_bond(n(1), c, BondOrder::Single).unwrap();
        let err = s.fill_hydrogens().unwrap_err();
        assert_eq!(err.atom, n(1));
        assert_eq!(err.bonds, 3);
    }

    #[test]
    fn concrete_and_generic() {
        assert!(parse("CCO").is_concrete());
        assert!(parse("CCR").is_generic());
        assert!(parse("CC").is_organic());
        assert!(!parse("C(Cl)(Cl)(Cl)Cl").is_organic());
    }

    #[test]
    fn cycle_queries() {
        let s = parse("C1CCC1C");
        assert_eq!(s.cycle_count(), 1);
        assert!(s.is_cyclic());
        assert!(s.is_ring_bond(n(0), n(1)));
        assert!(!s.is_ring_bond(n(3), n(4)));
        assert!(s.is_ring_atom(n(3)));
        assert!(!s.is_ring_atom(n(4)));
        assert!(!parse("CCO").is_cyclic());
    }

    #[test]
    fn disconnected_components() {
        let s = parse("CC.O");
        assert_eq!(s.component_count(), 2);
        assert!(!s.is_connected());
        assert!(parse("CCO").is_connected());
    }

    #[test]
    fn info_mentions_formula() {
        let info = parse("CCO").info();
        assert!(info.contains("C2H6O"));
        assert!(info.contains("concrete"));
    }

    #[test]
    fn bonded_reports_orders() {
        let s = parse("C=CO");
        let mut around: Vec<_> = s.bonded(n(1)).collect();
        around.sort();
        assert_eq!(around, vec![(n(0), BondOrder::Double), (n(2), BondOrder::Single)]);
        assert_eq!(s.bond_valence(n(1)), 3);
    }
}
