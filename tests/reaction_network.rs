use chemgraph::{
    AtomCatalog, Definition, EstimatorRepository, MolecularStructure, MoleculeRepository, Reactant,
    ReactionRepository, SpanStop,
};

struct Lab {
    catalog: AtomCatalog,
    estimators: EstimatorRepository,
    molecules: MoleculeRepository,
    reactions: ReactionRepository,
}

impl Lab {
    fn new() -> Self {
        Self {
            catalog: AtomCatalog::with_common_elements(),
            estimators: EstimatorRepository::new(),
            molecules: MoleculeRepository::new(),
            reactions: ReactionRepository::new(),
        }
    }

    fn mol(&self, smiles: &str) -> MolecularStructure {
        MolecularStructure::parse(smiles, &self.catalog).unwrap()
    }

    fn molecule(&mut self, smiles: &str) {
        self.molecules
            .add(&Definition::new(smiles), &self.catalog, &mut self.estimators)
            .unwrap();
    }

    fn reaction(&mut self, specifier: &str, name: &str) -> u32 {
        let definition = Definition::new(specifier).with_property("name", name);
        self.reactions
            .add(&definition, &self.catalog, &mut self.estimators)
            .unwrap()
    }

    fn reactants(&self, smiles: &[&str]) -> Vec<Reactant> {
        smiles
            .iter()
            .map(|s| {
                let structure = self.mol(s);
                let data = self
                    .molecules
                    .find_first_concrete(&structure)
                    .unwrap_or_else(|| panic!("{s} is not registered"));
                Reactant::from(data)
            })
            .collect()
    }

    fn knows(&self, smiles: &str) -> bool {
        self.molecules.find_first_concrete(&self.mol(smiles)).is_some()
    }
}

#[test]
fn bromination_forward_and_back() {
    let mut lab = Lab::new();
    lab.molecule("C=C");
    lab.molecule("BrBr");
    lab.reaction("C=C + BrBr -> BrCCBr", "bromination");

    let forward = lab
        .reactions
        .find_occurring_reactions(&lab.reactants(&["C=C", "BrBr"]));
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].products, vec![lab.mol("BrCCBr")]);
    assert_eq!(forward[0].to_string(), "<0:bromination> C=C + BrBr -> BrCCBr");

    let retro = lab.reactions.retrosynth_reactions(&lab.mol("BrCCBr"));
    assert_eq!(retro.len(), 1);
    assert_eq!(retro[0].reactants, vec![lab.mol("C=C"), lab.mol("BrBr")]);
    assert!(lab.reactions.retrosynth_reactions(&lab.mol("ClCCCl")).is_empty());
}

#[test]
fn bromination_total_span() {
    let mut lab = Lab::new();
    lab.molecule("C=C");
    lab.molecule("BrBr");
    lab.reaction("C=C + BrBr -> BrCCBr", "bromination");

    let report = lab
        .reactions
        .generate_total_span(&mut lab.molecules, &mut lab.estimators);
    assert_eq!(report.stop, SpanStop::Exhausted);
    assert_eq!(report.rounds, 2);
    assert_eq!(report.new_molecules, 1);
    assert!(lab.knows("BrCCBr"));
}

#[test]
fn known_products_end_the_span_at_once() {
    let mut lab = Lab::new();
    lab.molecule("C=C");
    lab.molecule("BrBr");
    lab.molecule("BrCCBr");
    lab.reaction("C=C + BrBr -> BrCCBr", "bromination");

    let report = lab
        .reactions
        .generate_total_span(&mut lab.molecules, &mut lab.estimators);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.new_molecules, 0);
    assert_eq!(lab.molecules.len(), 3);
}

#[test]
fn specialized_esterification_wins() {
    let mut lab = Lab::new();
    lab.molecule("CC(=O)O");
    lab.molecule("OCC");
    let generic = lab.reaction("RC(=O)O + OR -> RC(=O)OR + O", "esterification");
    let special = lab.reaction("CC(=O)O + OCC -> CC(=O)OCC + O", "ethyl acetate");

    let network = lab.reactions.network();
    assert_eq!(network.top_layer(), vec![generic]);
    assert_eq!(network.specializations(generic), vec![special]);
    assert_eq!(
        network.print(),
        "<0:esterification>\n└──<1:ethyl acetate>"
    );

    let forward = lab
        .reactions
        .find_occurring_reactions(&lab.reactants(&["CC(=O)O", "OCC"]));
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].template, special);
    assert_eq!(forward[0].products, vec![lab.mol("CC(=O)OCC"), lab.mol("O")]);

    let retro = lab.reactions.retrosynth_reactions(&lab.mol("CCC(=O)OC"));
    assert_eq!(retro.len(), 1);
    assert_eq!(retro[0].template, generic);
    assert_eq!(retro[0].reactants, vec![lab.mol("CCC(=O)O"), lab.mol("OC")]);
}

#[test]
fn esterification_span_reaches_the_diester() {
    let mut lab = Lab::new();
    lab.molecule("CC(=O)O");
    lab.molecule("OCCO");
    lab.reaction("RC(=O)O + OR -> RC(=O)OR + O", "esterification");

    let report = lab
        .reactions
        .generate_total_span(&mut lab.molecules, &mut lab.estimators);
    assert_eq!(report.stop, SpanStop::Exhausted);
    for smiles in ["CC(=O)OCCO", "CC(=O)OCCOC(=O)C", "O"] {
        assert!(lab.knows(smiles), "{smiles}");
    }
}

#[test]
fn cyclic_ketone_reduction_keeps_the_ring() {
    let mut lab = Lab::new();
    lab.molecule("O=C1CCCC1");
    lab.molecule("HH");
    lab.reaction("RC(=O)R + HH -> RC(O)R", "ketone reduction");

    let forward = lab
        .reactions
        .find_occurring_reactions(&lab.reactants(&["O=C1CCCC1", "HH"]));
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].products, vec![lab.mol("OC1CCCC1")]);

    let retro = lab.reactions.retrosynth_reactions(&lab.mol("OC1CCCC1"));
    assert_eq!(retro.len(), 1);
    assert_eq!(retro[0].reactants, vec![lab.mol("O=C1CCCC1"), lab.mol("HH")]);

    let report = lab
        .reactions
        .generate_total_span(&mut lab.molecules, &mut lab.estimators);
    assert_eq!(report.stop, SpanStop::Exhausted);
    assert_eq!(report.new_molecules, 1);
    assert!(lab.knows("OC1CCCC1"));
    assert!(!lab.knows("CCCCCO"));
}
