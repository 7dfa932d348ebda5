use std::fmt;
use std::sync::Arc;

use crate::definition::Definition;
use crate::structure::MolecularStructure;

use super::{ConcreteReaction, ReactionTemplate, RetrosynthReaction};

/// `A + B -> C` with every distinct species once; balancing recovers the
/// coefficients when the specifier is parsed again.
pub(crate) fn specifier(template: &ReactionTemplate) -> String {
    format!(
        "{} -> {}",
        distinct(&template.reactants).join(" + "),
        distinct(&template.products).join(" + ")
    )
}

fn distinct(structures: &[Arc<MolecularStructure>]) -> Vec<String> {
    let mut seen: Vec<&Arc<MolecularStructure>> = Vec::new();
    for s in structures {
        if !seen.iter().any(|x| Arc::ptr_eq(x, s)) {
            seen.push(s);
        }
    }
    seen.into_iter().map(|s| s.print()).collect()
}

impl ReactionTemplate {
    /// A record that [`ReactionRepository::add`](super::ReactionRepository::add)
    /// turns back into an equivalent template. Estimator ids are not
    /// carried over.
    pub fn to_definition(&self) -> Definition {
        let mut def = Definition::new(specifier(self))
            .with_property("id", self.id.to_string())
            .with_property("name", self.name.clone());
        if !self.catalysts.is_empty() {
            let catalysts: Vec<String> = self
                .catalysts
                .iter()
                .map(|c| format!("{{{}, {}}}", c.structure, c.ideal_amount))
                .collect();
            def = def.with_property("catalysts", format!("{{{}}}", catalysts.join(", ")));
        }
        if self.is_cut {
            def = def.with_property("is_cut", "true");
        }
        if self.reaction_energy != 0.0 {
            def = def.with_property("energy", self.reaction_energy.to_string());
        }
        if self.activation_energy != 0.0 {
            def = def.with_property("activation", self.activation_energy.to_string());
        }
        def
    }
}

fn join(f: &mut fmt::Formatter<'_>, structures: impl Iterator<Item = String>) -> fmt::Result {
    let parts: Vec<String> = structures.collect();
    write!(f, "{}", parts.join(" + "))
}

impl fmt::Display for ConcreteReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.tag)?;
        join(f, self.reactants.iter().map(|r| r.structure.print()))?;
        write!(f, " -> ")?;
        join(f, self.products.iter().map(MolecularStructure::print))
    }
}

impl fmt::Display for RetrosynthReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.tag)?;
        join(f, self.reactants.iter().map(MolecularStructure::print))?;
        write!(f, " -> ")?;
        join(f, self.products.iter().map(|p| p.print()))
    }
}
