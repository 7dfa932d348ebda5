use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use tracing::debug;

use crate::graph_ops::copy_branch;
use crate::structure::MolecularStructure;
use crate::substruct::{find_mapping, AtomMapping};

use super::{ConcreteReaction, Reactant, ReactionTemplate, RetrosynthReaction};

impl ReactionTemplate {
    /// Maps each reactant pattern onto the reactant at the same position.
    ///
    /// Returns `None` unless the counts agree and every pattern matches.
    pub fn matches_reactants(&self, reactants: &[Reactant]) -> Option<Vec<AtomMapping>> {
        if reactants.len() != self.reactants.len() {
            return None;
        }
        self.reactants
            .iter()
            .zip(reactants)
            .map(|(pattern, reactant)| find_mapping(pattern, &reactant.structure))
            .collect()
    }

    /// Builds the products for reactants matched by
    /// [`matches_reactants`](Self::matches_reactants).
    ///
    /// Every reactant substituent sitting on a radical is grafted onto the
    /// product atom that radical maps to. Returns `None` when a product ends
    /// up with an impossible valence or more than `max_atoms` atoms; partial
    /// product sets are never produced.
    pub fn concrete_products(
        &self,
        reactants: &[Reactant],
        matches: &[AtomMapping],
        max_atoms: usize,
    ) -> Option<Vec<MolecularStructure>> {
        if reactants.len() != self.reactants.len() || matches.len() != self.reactants.len() {
            return None;
        }

        let mut products: Vec<MolecularStructure> =
            self.products.iter().map(|p| p.as_ref().clone()).collect();
        let mut grafts: BTreeMap<(usize, usize), Vec<GraftRoot>> = BTreeMap::new();
        for (&(r, r_atom), &(p, p_atom)) in &self.component_mapping {
            if let Some(root) = matches[r].get(r_atom) {
                grafts.entry((r, p)).or_default().push(GraftRoot {
                    pattern: r_atom,
                    source: root,
                    image: p_atom,
                });
            }
        }
        for ((r, p), roots) in &grafts {
            graft(
                &mut products[*p],
                &self.reactants[*r],
                &reactants[*r].structure,
                roots,
                &matches[*r].targets(),
            );
        }

        for product in &mut products {
            if let Err(e) = product.fill_hydrogens() {
                debug!(reaction = %self.tag(), error = %e, "product rejected");
                return None;
            }
            if product.atom_count() > max_atoms {
                debug!(reaction = %self.tag(), atoms = product.atom_count(), "product too large");
                return None;
            }
        }
        Some(products)
    }

    /// Applies the template to `reactants`, if they match.
    pub fn apply(&self, reactants: &[Reactant], max_atoms: usize) -> Option<ConcreteReaction> {
        let matches = self.matches_reactants(reactants)?;
        let products = self.concrete_products(reactants, &matches, max_atoms)?;
        Some(ConcreteReaction {
            template: self.id,
            tag: self.tag(),
            reactants: reactants.to_vec(),
            products,
            catalysts: self.catalysts.clone(),
        })
    }

    /// First product pattern that maps into `target`, with its mapping.
    pub fn match_retrosynth_product(&self, target: &MolecularStructure) -> Option<(usize, AtomMapping)> {
        self.products
            .iter()
            .enumerate()
            .find_map(|(i, product)| find_mapping(product, target).map(|m| (i, m)))
    }

    /// Specializes the reactants so that running the template forward can
    /// yield `target` in place of product `product_index`.
    ///
    /// Substituents of `target` on atoms matched by product radicals are
    /// grafted back onto the reactant radicals they came from. Reactants
    /// without such a radical keep their generic form.
    pub fn retrosynth(
        &self,
        target: &MolecularStructure,
        product_index: usize,
        mapping: &AtomMapping,
    ) -> Option<RetrosynthReaction> {
        let mut reactants: Vec<MolecularStructure> =
            self.reactants.iter().map(|r| r.as_ref().clone()).collect();
        let mut grafts: BTreeMap<usize, Vec<GraftRoot>> = BTreeMap::new();
        for (&(r, r_atom), &(p, p_atom)) in &self.component_mapping {
            if p != product_index {
                continue;
            }
            if let Some(root) = mapping.get(p_atom) {
                grafts.entry(r).or_default().push(GraftRoot {
                    pattern: p_atom,
                    source: root,
                    image: r_atom,
                });
            }
        }
        let matched = mapping.targets();
        for (r, roots) in &grafts {
            graft(
                &mut reactants[*r],
                &self.products[product_index],
                target,
                roots,
                &matched,
            );
        }

        for reactant in &mut reactants {
            if let Err(e) = reactant.fill_hydrogens() {
                debug!(reaction = %self.tag(), error = %e, "retrosynthesis rejected");
                return None;
            }
        }

        let target = Arc::new(target.clone());
        let products = std::iter::once(target)
            .chain(
                self.products
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != product_index)
                    .map(|(_, p)| Arc::clone(p)),
            )
            .collect();

        Some(RetrosynthReaction {
            template: self.id,
            tag: self.tag(),
            reactants,
            products,
            product_index,
            mapping: mapping.clone(),
        })
    }

    /// Matches `target` against the products and runs the template backwards.
    pub fn retrosynth_reaction(&self, target: &MolecularStructure) -> Option<RetrosynthReaction> {
        let (index, mapping) = self.match_retrosynth_product(target)?;
        self.retrosynth(target, index, &mapping)
    }
}

/// A radical of `pattern` together with the source atom it matched and the
/// destination radical it turns into.
struct GraftRoot {
    pattern: NodeIndex,
    source: NodeIndex,
    image: NodeIndex,
}

/// Copies everything `source` carries outside its match with `pattern` onto
/// `destination`, attached at the radical images in `roots`.
///
/// All roots share one atom map, so a substituent reaching several roots
/// (a ring through the matched part) is copied once and closes onto each of
/// them. Source bonds between two roots are carried over unless `pattern`
/// already has that bond.
fn graft(
    destination: &mut MolecularStructure,
    pattern: &MolecularStructure,
    source: &MolecularStructure,
    roots: &[GraftRoot],
    matched: &BTreeSet<NodeIndex>,
) {
    let mut grafted: BTreeMap<NodeIndex, NodeIndex> =
        roots.iter().map(|root| (root.source, root.image)).collect();
    let ignore: BTreeSet<NodeIndex> = matched
        .iter()
        .copied()
        .filter(|atom| !grafted.contains_key(atom))
        .collect();

    for (i, a) in roots.iter().enumerate() {
        for b in &roots[i + 1..] {
            if pattern.bond_between(a.pattern, b.pattern).is_some() {
                continue;
            }
            if let Some(order) = source.bond_order_between(a.source, b.source) {
                destination.add_bond(a.image, b.image, order);
            }
        }
    }
    for root in roots {
        copy_branch(destination, source, root.source, &mut grafted, &ignore);
    }
}
