use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::AtomCatalog;
use crate::definition::{Definition, DefinitionError};
use crate::error::LookupError;
use crate::estimator::{EstimatorId, EstimatorRepository};
use crate::structure::MolecularStructure;

pub type MoleculeId = u32;

const NAME: &str = "name";
const HYDROPHILICITY: &str = "hydrophilicity";
const LIPOPHILICITY: &str = "lipophilicity";
const MELTING_POINT: &str = "melting_point";
const BOILING_POINT: &str = "boiling_point";
const LIQUID_DENSITY: &str = "liquid_density";
const LIQUID_HEAT_CAPACITY: &str = "liquid_hc";

/// A concrete molecule and the estimators describing it.
#[derive(Debug, Clone)]
pub struct MoleculeData {
    pub id: MoleculeId,
    pub name: String,
    pub structure: Arc<MolecularStructure>,
    pub hydrophilicity: f64,
    pub lipophilicity: f64,
    /// Celsius as a function of pressure (torr).
    pub melting_point: EstimatorId,
    /// Celsius as a function of pressure (torr).
    pub boiling_point: EstimatorId,
    /// g/mL as a function of temperature (Celsius).
    pub liquid_density: EstimatorId,
    /// J/(mol·°C) as a function of pressure (torr).
    pub liquid_heat_capacity: EstimatorId,
}

impl MoleculeData {
    pub fn molar_mass(&self) -> f64 {
        self.structure.molar_mass()
    }

    pub fn melting_point_at(&self, estimators: &EstimatorRepository, pressure: f64) -> Result<f64, LookupError> {
        estimators.get(self.melting_point, pressure)
    }

    pub fn boiling_point_at(&self, estimators: &EstimatorRepository, pressure: f64) -> Result<f64, LookupError> {
        estimators.get(self.boiling_point, pressure)
    }
}

/// A pattern structure registered as a molecule.
#[derive(Debug, Clone)]
pub struct GenericMoleculeData {
    pub id: MoleculeId,
    pub structure: Arc<MolecularStructure>,
}

/// Owns every known molecule, concrete and generic, keyed by id.
///
/// Structures are deduplicated by structural equality, so a structure is
/// registered at most once.
#[derive(Debug, Default)]
pub struct MoleculeRepository {
    concrete: BTreeMap<MoleculeId, MoleculeData>,
    generic: BTreeMap<MoleculeId, GenericMoleculeData>,
    next_id: MoleculeId,
}

impl MoleculeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the molecule described by `definition`.
    ///
    /// The specifier holds the structure. An already known structure is
    /// skipped with a warning and its existing id returned.
    pub fn add(
        &mut self,
        definition: &Definition,
        catalog: &AtomCatalog,
        estimators: &mut EstimatorRepository,
    ) -> Result<MoleculeId, DefinitionError> {
        let structure = MolecularStructure::parse(&definition.specifier, catalog)
            .map_err(|e| definition.invalid_structure(&definition.specifier, e))?;

        if structure.is_generic() {
            return Ok(self.find_or_add(structure, estimators));
        }
        if let Some(existing) = self.find_first_concrete(&structure) {
            warn!(
                specifier = %definition.specifier,
                location = definition.location_name(),
                "already defined molecule skipped"
            );
            return Ok(existing.id);
        }

        let name = definition
            .property(NAME)
            .map(str::to_string)
            .unwrap_or_else(|| "?".to_string());
        let hydrophilicity = definition.default_property(HYDROPHILICITY, 1.0)?;
        let lipophilicity = definition.default_property(LIPOPHILICITY, 0.0)?;
        let melting_point = estimators.resolve(definition, MELTING_POINT, 0.0)?;
        let boiling_point = estimators.resolve(definition, BOILING_POINT, 100.0)?;
        let liquid_density = estimators.resolve(definition, LIQUID_DENSITY, 1.0)?;
        let liquid_heat_capacity = estimators.resolve(definition, LIQUID_HEAT_CAPACITY, 75.484)?;
        definition.warn_unused(&[
            NAME,
            HYDROPHILICITY,
            LIPOPHILICITY,
            MELTING_POINT,
            BOILING_POINT,
            LIQUID_DENSITY,
            LIQUID_HEAT_CAPACITY,
        ]);

        let id = self.free_id();
        self.concrete.insert(
            id,
            MoleculeData {
                id,
                name,
                structure: Arc::new(structure),
                hydrophilicity,
                lipophilicity,
                melting_point,
                boiling_point,
                liquid_density,
                liquid_heat_capacity,
            },
        );
        Ok(id)
    }

    /// Id of the molecule structurally equal to `structure`, registering it
    /// with default properties when new.
    pub fn find_or_add(
        &mut self,
        structure: MolecularStructure,
        estimators: &mut EstimatorRepository,
    ) -> MoleculeId {
        if structure.is_generic() {
            if let Some(existing) = self.find_first_generic(&structure) {
                return existing.id;
            }
            let id = self.free_id();
            self.generic.insert(
                id,
                GenericMoleculeData {
                    id,
                    structure: Arc::new(structure),
                },
            );
            return id;
        }

        if let Some(existing) = self.find_first_concrete(&structure) {
            return existing.id;
        }

        let id = self.free_id();
        debug!(id, structure = %structure, "new structure discovered");
        let data = MoleculeData {
            id,
            name: structure.print(),
            structure: Arc::new(structure),
            hydrophilicity: 1.0,
            lipophilicity: 0.0,
            melting_point: estimators.add_constant(0.0),
            boiling_point: estimators.add_constant(100.0),
            liquid_density: estimators.add_constant(1.0),
            liquid_heat_capacity: estimators.add_constant(75.484),
        };
        self.concrete.insert(id, data);
        id
    }

    pub fn find_first_concrete(&self, structure: &MolecularStructure) -> Option<&MoleculeData> {
        self.concrete.values().find(|m| m.structure.as_ref() == structure)
    }

    pub fn find_first_generic(&self, structure: &MolecularStructure) -> Option<&GenericMoleculeData> {
        self.generic.values().find(|m| m.structure.as_ref() == structure)
    }

    pub fn contains(&self, id: MoleculeId) -> bool {
        self.concrete.contains_key(&id)
    }

    pub fn find(&self, id: MoleculeId) -> Option<&MoleculeData> {
        self.concrete.get(&id)
    }

    pub fn at(&self, id: MoleculeId) -> Result<&MoleculeData, LookupError> {
        self.find(id).ok_or(LookupError::Molecule(id))
    }

    pub fn find_generic(&self, id: MoleculeId) -> Option<&GenericMoleculeData> {
        self.generic.get(&id)
    }

    /// Number of concrete molecules.
    pub fn len(&self) -> usize {
        self.concrete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concrete.is_empty()
    }

    /// Concrete plus generic molecules.
    pub fn total_len(&self) -> usize {
        self.concrete.len() + self.generic.len()
    }

    /// Concrete molecules in id order.
    pub fn iter(&self) -> impl Iterator<Item = &MoleculeData> + '_ {
        self.concrete.values()
    }

    pub fn generic_iter(&self) -> impl Iterator<Item = &GenericMoleculeData> + '_ {
        self.generic.values()
    }

    pub fn clear(&mut self) {
        self.concrete.clear();
        self.generic.clear();
        self.next_id = 0;
    }

    fn free_id(&mut self) -> MoleculeId {
        while self.concrete.contains_key(&self.next_id) || self.generic.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        self.next_id
    }
}
