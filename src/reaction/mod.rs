mod balance;
pub mod error;
mod network;
mod parser;
mod repository;
mod runner;
mod writer;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use petgraph::graph::NodeIndex;

pub use error::TemplateError;
pub use network::ReactionNetwork;
pub use repository::{ReactionRepository, SpanReport, SpanStop};

use crate::error::LookupError;
use crate::estimator::{EstimatorId, EstimatorRepository};
use crate::molecule::{MoleculeData, MoleculeId};
use crate::structure::MolecularStructure;
use crate::substruct::{find_mapping, find_overlap, AtomMapping};

pub type ReactionId = u32;

/// `(species index, atom)` of a reactant radical mapped to the product atom
/// it becomes.
pub type ComponentMapping = BTreeMap<(usize, NodeIndex), (usize, NodeIndex)>;

/// A structure that must be present for a reaction to occur, in a given
/// ratio to the reactants, without being consumed.
#[derive(Debug, Clone)]
pub struct Catalyst {
    pub structure: Arc<MolecularStructure>,
    pub ideal_amount: f64,
}

impl Catalyst {
    pub fn new(structure: MolecularStructure, ideal_amount: f64) -> Self {
        Self {
            structure: Arc::new(structure),
            ideal_amount,
        }
    }

    pub fn matches_structure(&self, structure: &MolecularStructure) -> bool {
        find_mapping(&self.structure, structure).is_some()
    }

    /// Same ideal amount and `other`'s structure is an instance of ours.
    pub fn matches(&self, other: &Catalyst) -> bool {
        self.ideal_amount == other.ideal_amount && self.matches_structure(&other.structure)
    }

    pub fn tag(&self) -> String {
        format!("<{}, {}>", self.structure, self.ideal_amount)
    }
}

impl PartialEq for Catalyst {
    fn eq(&self, other: &Self) -> bool {
        self.structure == other.structure
    }
}

/// A concrete molecule taking part in a reaction.
#[derive(Debug, Clone)]
pub struct Reactant {
    pub molecule: MoleculeId,
    pub structure: Arc<MolecularStructure>,
}

impl Reactant {
    pub fn new(molecule: MoleculeId, structure: Arc<MolecularStructure>) -> Self {
        Self {
            molecule,
            structure,
        }
    }
}

impl From<&MoleculeData> for Reactant {
    fn from(data: &MoleculeData) -> Self {
        Self::new(data.id, Arc::clone(&data.structure))
    }
}

/// A template applied to concrete reactants.
#[derive(Debug, Clone)]
pub struct ConcreteReaction {
    pub template: ReactionId,
    pub tag: String,
    pub reactants: Vec<Reactant>,
    pub products: Vec<MolecularStructure>,
    pub catalysts: Vec<Catalyst>,
}

/// Reactant molecules, product structures and catalysts agree as multisets.
impl PartialEq for ConcreteReaction {
    fn eq(&self, other: &Self) -> bool {
        same_multiset(&self.reactants, &other.reactants, |a, b| a.molecule == b.molecule)
            && same_multiset(&self.products, &other.products, |a, b| a == b)
            && same_multiset(&self.catalysts, &other.catalysts, |a, b| a == b)
    }
}

/// A template specialized backwards from a target product.
#[derive(Debug, Clone)]
pub struct RetrosynthReaction {
    pub template: ReactionId,
    pub tag: String,
    /// Template reactants with the target's substituents grafted on; may
    /// still be generic.
    pub reactants: Vec<MolecularStructure>,
    /// The target first, then the template's other products.
    pub products: Vec<Arc<MolecularStructure>>,
    /// Index of the template product matched onto the target.
    pub product_index: usize,
    /// Template product atoms to target atoms.
    pub mapping: AtomMapping,
}

impl PartialEq for RetrosynthReaction {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
            && same_multiset(&self.reactants, &other.reactants, |a, b| a == b)
    }
}

/// A generic reaction rule.
///
/// Reactants and products are stored once per unit of their balanced
/// coefficient, so `C=C + HH -> CC` and `HH + O=O -> O` appear as
/// `[C=C, HH] -> [CC]` and `[HH, HH, O=O] -> [O, O]`.
#[derive(Debug, Clone)]
pub struct ReactionTemplate {
    pub(crate) id: ReactionId,
    pub(crate) name: String,
    pub(crate) reactants: Vec<Arc<MolecularStructure>>,
    pub(crate) products: Vec<Arc<MolecularStructure>>,
    pub(crate) catalysts: Vec<Catalyst>,
    pub(crate) is_cut: bool,
    pub(crate) reaction_energy: f64,
    pub(crate) activation_energy: f64,
    pub(crate) temperature_speed: Option<EstimatorId>,
    pub(crate) concentration_speed: Option<EstimatorId>,
    pub(crate) base: Option<ReactionId>,
    pub(crate) component_mapping: ComponentMapping,
}

impl ReactionTemplate {
    /// Balances `reactants -> products` and maps every reactant atom onto a
    /// product atom.
    pub fn new(
        id: ReactionId,
        name: impl Into<String>,
        reactants: Vec<MolecularStructure>,
        products: Vec<MolecularStructure>,
    ) -> Result<Self, TemplateError> {
        if reactants.is_empty() || products.is_empty() {
            return Err(TemplateError::EmptySide);
        }

        let (reactant_coefs, product_coefs) = balance::balance(
            &reactants.iter().collect::<Vec<_>>(),
            &products.iter().collect::<Vec<_>>(),
        )
        .ok_or(TemplateError::Unbalanced)?;

        let reactants = flatten(reactants, &reactant_coefs);
        let products = flatten(products, &product_coefs);
        let component_mapping =
            map_components(&reactants, &products).ok_or(TemplateError::Unmapped)?;

        Ok(Self {
            id,
            name: name.into(),
            reactants,
            products,
            catalysts: Vec::new(),
            is_cut: false,
            reaction_energy: 0.0,
            activation_energy: 0.0,
            temperature_speed: None,
            concentration_speed: None,
            base: None,
            component_mapping,
        })
    }

    pub fn with_catalysts(mut self, catalysts: Vec<Catalyst>) -> Self {
        self.catalysts = catalysts;
        self
    }

    /// Reaction and activation energy in J/mol.
    pub fn with_energies(mut self, reaction: f64, activation: f64) -> Self {
        self.reaction_energy = reaction;
        self.activation_energy = activation;
        self
    }

    pub fn with_speed(mut self, temperature: EstimatorId, concentration: EstimatorId) -> Self {
        self.temperature_speed = Some(temperature);
        self.concentration_speed = Some(concentration);
        self
    }

    /// Marks the template as a cut: it only describes how a structure splits
    /// and never proceeds on its own.
    pub fn as_cut(mut self) -> Self {
        self.is_cut = true;
        self
    }

    pub fn id(&self) -> ReactionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reactants(&self) -> &[Arc<MolecularStructure>] {
        &self.reactants
    }

    pub fn products(&self) -> &[Arc<MolecularStructure>] {
        &self.products
    }

    pub fn catalysts(&self) -> &[Catalyst] {
        &self.catalysts
    }

    pub fn is_cut(&self) -> bool {
        self.is_cut
    }

    pub fn reaction_energy(&self) -> f64 {
        self.reaction_energy
    }

    pub fn activation_energy(&self) -> f64 {
        self.activation_energy
    }

    /// Id of the closest more generic template, once placed in a network.
    pub fn base(&self) -> Option<ReactionId> {
        self.base
    }

    pub fn component_mapping(&self) -> &ComponentMapping {
        &self.component_mapping
    }

    pub fn tag(&self) -> String {
        format!("<{}:{}>", self.id, self.name)
    }

    /// Speed in mol/s: the temperature estimator at `temperature` times the
    /// concentration estimator at `concentration`. A missing estimator counts
    /// as 1; cuts never proceed.
    pub fn speed_at(
        &self,
        estimators: &EstimatorRepository,
        temperature: f64,
        concentration: f64,
    ) -> Result<f64, LookupError> {
        if self.is_cut {
            return Ok(0.0);
        }
        let t = match self.temperature_speed {
            Some(id) => estimators.get(id, temperature)?,
            None => 1.0,
        };
        let c = match self.concentration_speed {
            Some(id) => estimators.get(id, concentration)?,
            None => 1.0,
        };
        Ok(t * c)
    }

    /// Whether every species of `self` is an instance of a distinct species
    /// of `other`, and every catalyst of `other` matches one of ours.
    pub fn is_specialization_of(&self, other: &ReactionTemplate) -> bool {
        self.reactants.len() == other.reactants.len()
            && self.products.len() == other.products.len()
            && covers(&other.reactants, &self.reactants, |g, s| find_mapping(g, s).is_some())
            && covers(&other.products, &self.products, |g, s| find_mapping(g, s).is_some())
            && covers(&self.catalysts, &other.catalysts, |s, g| g.matches(s))
    }

    pub fn is_generalization_of(&self, other: &ReactionTemplate) -> bool {
        other.is_specialization_of(self)
    }

    /// Structurally the same reactants, products and catalysts.
    pub fn is_equivalent_to(&self, other: &ReactionTemplate) -> bool {
        same_multiset(&self.reactants, &other.reactants, |a, b| a == b)
            && same_multiset(&self.products, &other.products, |a, b| a == b)
            && same_multiset(&self.catalysts, &other.catalysts, |a, b| a == b)
    }

    pub(crate) fn set_base(&mut self, base: ReactionId) {
        self.base = Some(base);
    }
}

fn flatten(structures: Vec<MolecularStructure>, coefficients: &[u8]) -> Vec<Arc<MolecularStructure>> {
    let mut out = Vec::new();
    for (structure, &n) in structures.into_iter().zip(coefficients) {
        let shared = Arc::new(structure);
        out.extend(std::iter::repeat(shared).take(n as usize));
    }
    out
}

/// Assigns every reactant atom to a product atom by repeated largest
/// overlaps, recording where each reactant radical ends up.
fn map_components(
    reactants: &[Arc<MolecularStructure>],
    products: &[Arc<MolecularStructure>],
) -> Option<ComponentMapping> {
    let mut mapping = ComponentMapping::new();
    let mut reactant_done = vec![BTreeSet::new(); reactants.len()];
    let mut product_done = vec![BTreeSet::new(); products.len()];

    for (i, reactant) in reactants.iter().enumerate() {
        if reactant.is_virtual_hydrogen() {
            continue;
        }
        while reactant_done[i].len() < reactant.atom_count() {
            let mut best: Option<(usize, AtomMapping)> = None;
            for (j, product) in products.iter().enumerate() {
                let overlap = find_overlap(reactant, product, &reactant_done[i], &product_done[j]);
                if best.as_ref().map_or(true, |(_, b)| overlap.len() > b.len()) {
                    best = Some((j, overlap));
                }
            }
            let (j, overlap) = best?;
            if overlap.is_empty() {
                return None;
            }
            for (r_atom, p_atom) in overlap.iter() {
                reactant_done[i].insert(r_atom);
                product_done[j].insert(p_atom);
                if reactant.atom(r_atom).is_radical() {
                    mapping.insert((i, r_atom), (j, p_atom));
                }
            }
        }
    }

    let products_done = products
        .iter()
        .zip(&product_done)
        .all(|(p, done)| done.len() == p.atom_count());
    products_done.then_some(mapping)
}

/// Each item of `specific` is accepted by a distinct item of `general`.
///
/// Solved as a bipartite matching, so the order of either side does not
/// matter.
fn covers<G, S>(general: &[G], specific: &[S], accepts: impl Fn(&G, &S) -> bool) -> bool {
    if specific.len() > general.len() {
        return false;
    }
    let accepted: Vec<Vec<usize>> = specific
        .iter()
        .map(|s| (0..general.len()).filter(|&g| accepts(&general[g], s)).collect())
        .collect();
    let mut owner = vec![None; general.len()];
    (0..specific.len()).all(|s| augment(s, &accepted, &mut owner, &mut vec![false; general.len()]))
}

fn augment(s: usize, accepted: &[Vec<usize>], owner: &mut [Option<usize>], seen: &mut [bool]) -> bool {
    for &g in &accepted[s] {
        if seen[g] {
            continue;
        }
        seen[g] = true;
        if owner[g].map_or(true, |other| augment(other, accepted, owner, seen)) {
            owner[g] = Some(s);
            return true;
        }
    }
    false
}

fn same_multiset<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && covers(a, b, |x, y| eq(x, y))
}

impl fmt::Display for ReactionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag(), writer::specifier(self))
    }
}
