use std::collections::BTreeMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::{trace, warn};

use crate::structure::MolecularStructure;

use super::{ConcreteReaction, Reactant, ReactionId, ReactionTemplate, RetrosynthReaction, TemplateError};

/// Templates ordered by specialization.
///
/// An edge runs from a template to each of its closest specializations.
/// Templates that specialize nothing form the top layer. Queries descend as
/// far as templates keep matching and answer with the most specialized
/// matches only.
#[derive(Debug, Default)]
pub struct ReactionNetwork {
    graph: DiGraph<ReactionTemplate, ()>,
    top_layer: Vec<NodeIndex>,
    index: BTreeMap<ReactionId, NodeIndex>,
}

impl ReactionNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `template` below its closest generalizations and above its
    /// closest specializations, updating base ids on the way.
    ///
    /// Templates whose id is taken or which are equivalent to a stored
    /// template are rejected.
    pub fn insert(&mut self, mut template: ReactionTemplate) -> Result<ReactionId, TemplateError> {
        let id = template.id;
        if self.index.contains_key(&id) {
            return Err(TemplateError::DuplicateId(id));
        }
        if let Some(existing) = self.graph.node_weights().find(|t| t.is_equivalent_to(&template)) {
            warn!(id, existing = existing.id, "discarded duplicate reaction");
            return Err(TemplateError::Equivalent {
                id,
                existing: existing.id,
            });
        }

        let generalizations: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| template.is_specialization_of(&self.graph[n]))
            .collect();
        let specializations: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.graph[n].is_specialization_of(&template))
            .collect();

        // Keep only the closest ones: no other candidate lies between.
        let parents: Vec<NodeIndex> = generalizations
            .iter()
            .copied()
            .filter(|&g| {
                !generalizations
                    .iter()
                    .any(|&other| other != g && has_path_connecting(&self.graph, g, other, None))
            })
            .collect();
        let children: Vec<NodeIndex> = specializations
            .iter()
            .copied()
            .filter(|&s| {
                !specializations
                    .iter()
                    .any(|&other| other != s && has_path_connecting(&self.graph, other, s, None))
            })
            .collect();

        if let Some(&first) = parents.iter().min() {
            template.set_base(self.graph[first].id);
        }
        let node = self.graph.add_node(template);
        self.index.insert(id, node);

        for &parent in &parents {
            for &child in &children {
                if let Some(edge) = self.graph.find_edge(parent, child) {
                    self.graph.remove_edge(edge);
                }
            }
            self.graph.add_edge(parent, node, ());
        }
        for &child in &children {
            self.graph.add_edge(node, child, ());
            self.graph[child].set_base(id);
        }

        self.rebuild_top_layer(node);
        Ok(id)
    }

    /// Top-layer entries that gained a parent are replaced by the new node,
    /// keeping the order of the remaining ones.
    fn rebuild_top_layer(&mut self, node: NodeIndex) {
        let mut top = Vec::with_capacity(self.top_layer.len() + 1);
        for &n in &self.top_layer {
            let entry = if self.is_root(n) { n } else { node };
            if !top.contains(&entry) {
                top.push(entry);
            }
        }
        if self.is_root(node) && !top.contains(&node) {
            top.push(node);
        }
        self.top_layer = top;
    }

    fn is_root(&self, n: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(n, Direction::Incoming)
            .next()
            .is_none()
    }

    fn children(&self, n: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self.graph.neighbors(n).collect();
        children.sort();
        children
    }

    pub fn get(&self, id: ReactionId) -> Option<&ReactionTemplate> {
        self.index.get(&id).map(|&n| &self.graph[n])
    }

    pub fn contains(&self, id: ReactionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Ids of the templates nothing generalizes.
    pub fn top_layer(&self) -> Vec<ReactionId> {
        self.top_layer.iter().map(|&n| self.graph[n].id).collect()
    }

    /// Ids of the closest specializations of `id`.
    pub fn specializations(&self, id: ReactionId) -> Vec<ReactionId> {
        self.index
            .get(&id)
            .map(|&n| self.children(n).into_iter().map(|c| self.graph[c].id).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Templates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ReactionTemplate> + '_ {
        self.graph.node_weights()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.top_layer.clear();
        self.index.clear();
    }

    /// Most specialized templates that apply to `reactants`, in order.
    pub fn occurring(&self, reactants: &[Reactant], max_atoms: usize) -> Vec<ConcreteReaction> {
        let mut result = Vec::new();
        for &top in &self.top_layer {
            self.occurring_at(top, reactants, max_atoms, &mut result);
        }
        result
    }

    /// Returns whether `n` or one of its descendants produced a reaction.
    fn occurring_at(
        &self,
        n: NodeIndex,
        reactants: &[Reactant],
        max_atoms: usize,
        result: &mut Vec<ConcreteReaction>,
    ) -> bool {
        let template = &self.graph[n];
        let Some(matches) = template.matches_reactants(reactants) else {
            return false;
        };
        trace!(reaction = %template.tag(), "reactants match");

        let mut descended = false;
        for child in self.children(n) {
            descended |= self.occurring_at(child, reactants, max_atoms, result);
        }
        if descended {
            return true;
        }

        let Some(products) = template.concrete_products(reactants, &matches, max_atoms) else {
            return false;
        };
        let reaction = ConcreteReaction {
            template: template.id,
            tag: template.tag(),
            reactants: reactants.to_vec(),
            products,
            catalysts: template.catalysts.clone(),
        };
        if !result.contains(&reaction) {
            result.push(reaction);
        }
        true
    }

    /// Most specialized templates that can produce `target`.
    pub fn retrosynth(&self, target: &MolecularStructure) -> Vec<RetrosynthReaction> {
        let mut result = Vec::new();
        for &top in &self.top_layer {
            self.retrosynth_at(top, target, &mut result);
        }
        result
    }

    fn retrosynth_at(
        &self,
        n: NodeIndex,
        target: &MolecularStructure,
        result: &mut Vec<RetrosynthReaction>,
    ) -> bool {
        let template = &self.graph[n];
        let Some((index, mapping)) = template.match_retrosynth_product(target) else {
            return false;
        };

        let mut descended = false;
        for child in self.children(n) {
            descended |= self.retrosynth_at(child, target, result);
        }
        if descended {
            return true;
        }

        let Some(reaction) = template.retrosynth(target, index, &mapping) else {
            return false;
        };
        if !result.contains(&reaction) {
            result.push(reaction);
        }
        true
    }

    /// Renders the hierarchy as a tree of template tags, one per line.
    pub fn print(&self) -> String {
        let mut lines = Vec::new();
        for &top in &self.top_layer {
            lines.push(self.graph[top].tag());
            let mut pipes = Vec::new();
            self.print_children(top, &mut pipes, &mut lines);
        }
        lines.join("\n")
    }

    fn print_children(&self, n: NodeIndex, pipes: &mut Vec<bool>, lines: &mut Vec<String>) {
        let children = self.children(n);
        for (i, &child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let mut line: String = pipes
                .iter()
                .map(|&open| if open { "│  " } else { "   " })
                .collect();
            line.push_str(if last { "└──" } else { "├──" });
            line.push_str(&self.graph[child].tag());
            lines.push(line);

            pipes.push(!last);
            self.print_children(child, pipes, lines);
            pipes.pop();
        }
    }
}
