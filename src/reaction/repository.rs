use std::collections::BTreeSet;

use tracing::{debug, instrument, warn};

use crate::catalog::AtomCatalog;
use crate::config::SpanLimits;
use crate::definition::Definition;
use crate::error::LookupError;
use crate::estimator::EstimatorRepository;
use crate::molecule::{MoleculeId, MoleculeRepository};
use crate::structure::MolecularStructure;

use super::parser::{parse_catalysts, parse_sides, CATALYSTS};
use super::{ConcreteReaction, Reactant, ReactionId, ReactionNetwork, ReactionTemplate, RetrosynthReaction, TemplateError};

const ID: &str = "id";
const NAME: &str = "name";
const IS_CUT: &str = "is_cut";
const ENERGY: &str = "energy";
const ACTIVATION: &str = "activation";
const SPEED_T: &str = "speed_t";
const SPEED_C: &str = "speed_c";

/// Why a total span stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStop {
    /// A round produced no new molecule.
    Exhausted,
    /// `max_rounds` rounds ran.
    RoundLimit,
    /// The molecule repository reached `max_molecules`.
    MoleculeLimit,
}

/// Outcome of [`ReactionRepository::generate_total_span`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanReport {
    pub rounds: usize,
    pub new_molecules: usize,
    pub stop: SpanStop,
}

/// Registered reaction templates and the inference built on them.
#[derive(Debug, Default)]
pub struct ReactionRepository {
    network: ReactionNetwork,
    max_reactant_count: usize,
    limits: SpanLimits,
}

impl ReactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SpanLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> SpanLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: SpanLimits) {
        self.limits = limits;
    }

    /// Registers the template described by `definition`.
    ///
    /// The specifier reads `A + B -> C + D`. Recognized properties are `id`
    /// (next free id when absent), `name`, `catalysts`, `is_cut`, `energy`,
    /// `activation` and the speed estimators `speed_t` and `speed_c`. A cut
    /// always proceeds at speed 0. Rejected templates leave the repository
    /// unchanged.
    pub fn add(
        &mut self,
        definition: &Definition,
        catalog: &AtomCatalog,
        estimators: &mut EstimatorRepository,
    ) -> Result<ReactionId, TemplateError> {
        let id = match definition.parse_property::<ReactionId>(ID)? {
            Some(id) => id,
            None => self.free_id(),
        };
        if self.network.contains(id) {
            warn!(id, location = definition.location_name(), "reaction with duplicate id");
            return Err(TemplateError::DuplicateId(id));
        }

        let name = definition.property(NAME).unwrap_or("?").to_string();
        let (reactants, products) = parse_sides(definition, catalog)?;
        let catalysts = parse_catalysts(definition, catalog)?;
        let is_cut = definition.default_property(IS_CUT, false)?;
        let energy = definition.default_property(ENERGY, 0.0)?;
        let activation = definition.default_property(ACTIVATION, 0.0)?;
        let (speed_t, speed_c) = if is_cut {
            let zero = estimators.add_constant(0.0);
            (zero, zero)
        } else {
            (
                estimators.resolve(definition, SPEED_T, 1.0)?,
                estimators.resolve(definition, SPEED_C, 1.0)?,
            )
        };
        definition.warn_unused(&[ID, NAME, CATALYSTS, IS_CUT, ENERGY, ACTIVATION, SPEED_T, SPEED_C]);

        let mut template = ReactionTemplate::new(id, name, reactants, products)
            .inspect_err(|e| warn!(id, location = definition.location_name(), error = %e, "reaction rejected"))?
            .with_catalysts(catalysts)
            .with_energies(energy, activation)
            .with_speed(speed_t, speed_c);
        if is_cut {
            template = template.as_cut();
        }

        let reactant_count = template.reactants.len();
        self.network.insert(template)?;
        self.max_reactant_count = self.max_reactant_count.max(reactant_count);
        Ok(id)
    }

    /// Registers an already built template.
    pub fn insert(&mut self, template: ReactionTemplate) -> Result<ReactionId, TemplateError> {
        let reactant_count = template.reactants.len();
        let id = self.network.insert(template)?;
        self.max_reactant_count = self.max_reactant_count.max(reactant_count);
        Ok(id)
    }

    pub fn contains(&self, id: ReactionId) -> bool {
        self.network.contains(id)
    }

    pub fn find(&self, id: ReactionId) -> Option<&ReactionTemplate> {
        self.network.get(id)
    }

    pub fn at(&self, id: ReactionId) -> Result<&ReactionTemplate, LookupError> {
        self.find(id).ok_or(LookupError::Reaction(id))
    }

    pub fn len(&self) -> usize {
        self.network.len()
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReactionTemplate> + '_ {
        self.network.iter()
    }

    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }

    /// Largest number of reactants of any template, after balancing.
    pub fn max_reactant_count(&self) -> usize {
        self.max_reactant_count
    }

    pub fn clear(&mut self) {
        self.network.clear();
        self.max_reactant_count = 0;
    }

    pub fn find_occurring_reactions(&self, reactants: &[Reactant]) -> Vec<ConcreteReaction> {
        self.network
            .occurring(reactants, self.limits.max_product_atoms)
    }

    pub fn retrosynth_reactions(&self, target: &MolecularStructure) -> Vec<RetrosynthReaction> {
        self.network.retrosynth(target)
    }

    /// Runs every template once over every ordered selection of known
    /// concrete molecules and registers the products. Returns the number of
    /// new molecules.
    pub fn generate_current_span(
        &self,
        molecules: &mut MoleculeRepository,
        estimators: &mut EstimatorRepository,
    ) -> usize {
        let known: Vec<Reactant> = molecules.iter().map(Reactant::from).collect();
        let products = self.span_products(&known, None);
        self.register(products, molecules, estimators).len()
    }

    /// Repeats [`generate_current_span`](Self::generate_current_span) until
    /// a round discovers nothing, only trying selections that contain a
    /// molecule found in the previous round. Stops early on the configured
    /// limits.
    #[instrument(skip_all, fields(reactions = self.len()))]
    pub fn generate_total_span(
        &self,
        molecules: &mut MoleculeRepository,
        estimators: &mut EstimatorRepository,
    ) -> SpanReport {
        let mut report = SpanReport {
            rounds: 0,
            new_molecules: 0,
            stop: SpanStop::Exhausted,
        };
        let mut fresh: Option<BTreeSet<MoleculeId>> = None;

        loop {
            if report.rounds >= self.limits.max_rounds {
                warn!(rounds = report.rounds, "span round limit reached");
                report.stop = SpanStop::RoundLimit;
                break;
            }
            if molecules.len() >= self.limits.max_molecules {
                warn!(molecules = molecules.len(), "span molecule limit reached");
                report.stop = SpanStop::MoleculeLimit;
                break;
            }

            let known: Vec<Reactant> = molecules.iter().map(Reactant::from).collect();
            let products = self.span_products(&known, fresh.as_ref());
            let added = self.register(products, molecules, estimators);
            report.rounds += 1;
            report.new_molecules += added.len();
            debug!(round = report.rounds, new = added.len(), "span round done");

            if added.is_empty() {
                break;
            }
            fresh = Some(added);
        }
        report
    }

    /// Products of every template over ordered selections of `known` with
    /// repetition. With `fresh`, a selection must use at least one of those
    /// molecules.
    fn span_products(
        &self,
        known: &[Reactant],
        fresh: Option<&BTreeSet<MoleculeId>>,
    ) -> Vec<MolecularStructure> {
        let mut products = Vec::new();
        if known.is_empty() {
            return products;
        }
        for length in 1..=self.max_reactant_count {
            let mut selection = vec![0usize; length];
            loop {
                let reactants: Vec<Reactant> = selection.iter().map(|&i| known[i].clone()).collect();
                let uses_fresh = fresh.map_or(true, |f| reactants.iter().any(|r| f.contains(&r.molecule)));
                if uses_fresh {
                    for reaction in self.find_occurring_reactions(&reactants) {
                        products.extend(reaction.products);
                    }
                }
                if !next_selection(&mut selection, known.len()) {
                    break;
                }
            }
        }
        products
    }

    /// Adds concrete products up to the molecule limit; returns the new ids.
    fn register(
        &self,
        products: Vec<MolecularStructure>,
        molecules: &mut MoleculeRepository,
        estimators: &mut EstimatorRepository,
    ) -> BTreeSet<MoleculeId> {
        let mut added = BTreeSet::new();
        for product in products {
            if !product.is_concrete() || molecules.find_first_concrete(&product).is_some() {
                continue;
            }
            if molecules.len() >= self.limits.max_molecules {
                break;
            }
            added.insert(molecules.find_or_add(product, estimators));
        }
        added
    }

    fn free_id(&self) -> ReactionId {
        let mut id = 0;
        while self.network.contains(id) {
            id += 1;
        }
        id
    }
}

/// Advances an odometer over `0..base` digits; `false` once it wraps.
fn next_selection(selection: &mut [usize], base: usize) -> bool {
    for digit in selection.iter_mut().rev() {
        *digit += 1;
        if *digit < base {
            return true;
        }
        *digit = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Setup {
        catalog: AtomCatalog,
        estimators: EstimatorRepository,
        molecules: MoleculeRepository,
        reactions: ReactionRepository,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                catalog: AtomCatalog::with_common_elements(),
                estimators: EstimatorRepository::new(),
                molecules: MoleculeRepository::new(),
                reactions: ReactionRepository::new(),
            }
        }

        fn molecule(&mut self, smiles: &str) -> MoleculeId {
            self.molecules
                .add(&Definition::new(smiles), &self.catalog, &mut self.estimators)
                .unwrap()
        }

        fn reaction(&mut self, definition: Definition) -> Result<ReactionId, TemplateError> {
            self.reactions
                .add(&definition, &self.catalog, &mut self.estimators)
        }
    }

    #[test]
    fn add_reads_properties() {
        let mut s = Setup::new();
        let id = s
            .reaction(
                Definition::new("C=C + HH -> CC")
                    .with_property("id", "7")
                    .with_property("name", "hydrogenation")
                    .with_property("catalysts", "{{[Pt], 0.1}}")
                    .with_property("energy", "-136.3")
                    .with_property("speed_t", "2"),
            )
            .unwrap();
        assert_eq!(id, 7);
        let t = s.reactions.at(7).unwrap();
        assert_eq!(t.name(), "hydrogenation");
        assert_eq!(t.catalysts().len(), 1);
        assert_eq!(t.reaction_energy(), -136.3);
        assert_eq!(t.speed_at(&s.estimators, 25.0, 1.0).unwrap(), 2.0);
        assert_eq!(s.reactions.max_reactant_count(), 2);
    }

    #[test]
    fn defaults_and_free_ids() {
        let mut s = Setup::new();
        let a = s.reaction(Definition::new("C=C + BrBr -> BrCCBr")).unwrap();
        let b = s.reaction(Definition::new("C=C + ClCl -> ClCCCl")).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(s.reactions.at(0).unwrap().name(), "?");
        assert_eq!(s.reactions.at(5).unwrap_err(), LookupError::Reaction(5));
    }

    #[test]
    fn cut_never_proceeds() {
        let mut s = Setup::new();
        let id = s
            .reaction(
                Definition::new("CC -> C=C + HH")
                    .with_property("is_cut", "true")
                    .with_property("speed_t", "3"),
            )
            .unwrap();
        let t = s.reactions.at(id).unwrap();
        assert!(t.is_cut());
        assert_eq!(t.speed_at(&s.estimators, 25.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn rejected_templates_leave_no_trace() {
        let mut s = Setup::new();
        s.reaction(Definition::new("C=C + BrBr -> BrCCBr").with_property("id", "1"))
            .unwrap();

        let duplicate_id = s.reaction(Definition::new("C=C + ClCl -> ClCCCl").with_property("id", "1"));
        assert_eq!(duplicate_id, Err(TemplateError::DuplicateId(1)));

        let equivalent = s.reaction(Definition::new("BrBr + C=C -> C(Br)CBr").with_property("id", "2"));
        assert_eq!(equivalent, Err(TemplateError::Equivalent { id: 2, existing: 1 }));

        let unbalanced = s.reaction(Definition::new("C=C -> BrCCBr"));
        assert_eq!(unbalanced, Err(TemplateError::Unbalanced));

        let malformed = s.reaction(Definition::new("C=C + BrBr"));
        assert!(matches!(malformed, Err(TemplateError::Definition(_))));

        assert_eq!(s.reactions.len(), 1);
    }

    #[test]
    fn current_span_adds_products() {
        let mut s = Setup::new();
        s.molecule("C=C");
        s.molecule("BrBr");
        s.reaction(Definition::new("C=C + BrBr -> BrCCBr")).unwrap();

        let added = s
            .reactions
            .generate_current_span(&mut s.molecules, &mut s.estimators);
        assert_eq!(added, 1);
        let catalog = &s.catalog;
        let dibromide = MolecularStructure::parse("BrCCBr", catalog).unwrap();
        assert!(s.molecules.find_first_concrete(&dibromide).is_some());

        let again = s
            .reactions
            .generate_current_span(&mut s.molecules, &mut s.estimators);
        assert_eq!(again, 0);
    }

    fn esterification() -> Setup {
        let mut s = Setup::new();
        s.molecule("CC(=O)O");
        s.molecule("OCCO");
        s.reaction(Definition::new("RC(=O)O + OR -> RC(=O)OR + O")).unwrap();
        s
    }

    #[test]
    fn total_span_follows_chains() {
        let mut s = esterification();
        let report = s
            .reactions
            .generate_total_span(&mut s.molecules, &mut s.estimators);
        assert_eq!(report.stop, SpanStop::Exhausted);
        // Anhydride, mono-ester and water; then the di-ester; then nothing.
        assert_eq!(report.rounds, 3);
        assert_eq!(report.new_molecules, 4);

        let diester = MolecularStructure::parse("CC(=O)OCCOC(=O)C", &s.catalog).unwrap();
        assert!(s.molecules.find_first_concrete(&diester).is_some());
    }

    #[test]
    fn total_span_round_limit() {
        let mut s = esterification();
        s.reactions.set_limits(SpanLimits::default().with_max_rounds(1));
        let report = s
            .reactions
            .generate_total_span(&mut s.molecules, &mut s.estimators);
        assert_eq!(report.stop, SpanStop::RoundLimit);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.new_molecules, 3);
    }

    #[test]
    fn total_span_molecule_limit() {
        let mut s = esterification();
        s.reactions.set_limits(SpanLimits::default().with_max_molecules(4));
        let report = s
            .reactions
            .generate_total_span(&mut s.molecules, &mut s.estimators);
        assert_eq!(report.stop, SpanStop::MoleculeLimit);
        assert_eq!(s.molecules.len(), 4);
    }

    #[test]
    fn odometer() {
        let mut selection = [0, 0];
        let mut seen = vec![selection];
        while next_selection(&mut selection, 3) {
            seen.push(selection);
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[1], [0, 1]);
        assert_eq!(seen[8], [2, 2]);
    }
}
