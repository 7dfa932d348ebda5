use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::definition::{Definition, DefinitionError};
use crate::error::LookupError;

pub type EstimatorId = u32;

/// A supplier of one physical quantity as a function of one input.
///
/// The engine stores and forwards estimators but never looks inside them.
pub trait Estimator: fmt::Debug + Send + Sync {
    fn get(&self, input: f64) -> f64;

    /// Whether `other` always returns the same values. Used to share
    /// estimators between records.
    fn is_equivalent(&self, other: &dyn Estimator) -> bool {
        let _ = other;
        false
    }

    /// Constant value, if the estimator ignores its input.
    fn as_constant(&self) -> Option<f64> {
        None
    }

    /// `(slope, intercept)`, if the estimator is affine.
    fn as_linear(&self) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl Estimator for Constant {
    fn get(&self, _input: f64) -> f64 {
        self.0
    }

    fn is_equivalent(&self, other: &dyn Estimator) -> bool {
        other.as_constant() == Some(self.0)
    }

    fn as_constant(&self) -> Option<f64> {
        Some(self.0)
    }

    fn as_linear(&self) -> Option<(f64, f64)> {
        Some((0.0, self.0))
    }
}

/// `slope * input + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    pub slope: f64,
    pub intercept: f64,
}

impl Estimator for Linear {
    fn get(&self, input: f64) -> f64 {
        self.slope * input + self.intercept
    }

    fn is_equivalent(&self, other: &dyn Estimator) -> bool {
        other.as_linear() == Some((self.slope, self.intercept))
    }

    fn as_constant(&self) -> Option<f64> {
        (self.slope == 0.0).then_some(self.intercept)
    }

    fn as_linear(&self) -> Option<(f64, f64)> {
        Some((self.slope, self.intercept))
    }
}

/// Estimators by id. Adding an estimator equivalent to a stored one returns
/// the stored id.
#[derive(Debug, Default)]
pub struct EstimatorRepository {
    estimators: BTreeMap<EstimatorId, Arc<dyn Estimator>>,
    next_id: EstimatorId,
}

impl EstimatorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, estimator: Arc<dyn Estimator>) -> EstimatorId {
        if let Some((&id, _)) = self
            .estimators
            .iter()
            .find(|(_, e)| e.is_equivalent(estimator.as_ref()))
        {
            return id;
        }
        let id = self.free_id();
        self.estimators.insert(id, estimator);
        id
    }

    pub fn add_constant(&mut self, value: f64) -> EstimatorId {
        self.add(Arc::new(Constant(value)))
    }

    pub fn add_linear(&mut self, slope: f64, intercept: f64) -> EstimatorId {
        self.add(Arc::new(Linear { slope, intercept }))
    }

    /// Builds an estimator from a sub-definition.
    ///
    /// The specifier names the kind: `constant` reads `value`, `linear` reads
    /// `slope` and `intercept` (both default to zero).
    pub fn define(&mut self, definition: &Definition) -> Result<EstimatorId, DefinitionError> {
        let id = match definition.specifier.trim() {
            "constant" => {
                let value = definition
                    .parse_property("value")?
                    .ok_or_else(|| definition.invalid_property("value", ""))?;
                definition.warn_unused(&["value"]);
                self.add_constant(value)
            }
            "linear" => {
                let slope = definition.default_property("slope", 0.0)?;
                let intercept = definition.default_property("intercept", 0.0)?;
                definition.warn_unused(&["slope", "intercept"]);
                self.add_linear(slope, intercept)
            }
            other => {
                return Err(DefinitionError::UnknownEstimatorKind {
                    kind: other.to_string(),
                    location: definition.location_name().to_string(),
                })
            }
        };
        Ok(id)
    }

    /// Resolves the estimator stored under `key` of `definition`.
    ///
    /// A sub-definition is built with [`define`](Self::define); a plain
    /// numeric property becomes a constant; otherwise a constant `default`
    /// is used.
    pub fn resolve(
        &mut self,
        definition: &Definition,
        key: &str,
        default: f64,
    ) -> Result<EstimatorId, DefinitionError> {
        if let Some(sub) = definition.definition(key) {
            return self.define(sub);
        }
        let value = definition.default_property(key, default)?;
        Ok(self.add_constant(value))
    }

    pub fn contains(&self, id: EstimatorId) -> bool {
        self.estimators.contains_key(&id)
    }

    pub fn at(&self, id: EstimatorId) -> Result<&Arc<dyn Estimator>, LookupError> {
        self.estimators.get(&id).ok_or(LookupError::Estimator(id))
    }

    /// Evaluates estimator `id` at `input`.
    pub fn get(&self, id: EstimatorId, input: f64) -> Result<f64, LookupError> {
        Ok(self.at(id)?.get(input))
    }

    pub fn len(&self) -> usize {
        self.estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EstimatorId, &Arc<dyn Estimator>)> + '_ {
        self.estimators.iter().map(|(&id, e)| (id, e))
    }

    fn free_id(&mut self) -> EstimatorId {
        while self.estimators.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_estimators_are_shared() {
        let mut repo = EstimatorRepository::new();
        let a = repo.add_constant(100.0);
        let b = repo.add_linear(0.0, 100.0);
        let c = repo.add_linear(2.0, 1.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.get(c, 3.0).unwrap(), 7.0);
    }

    #[test]
    fn unknown_id() {
        let repo = EstimatorRepository::new();
        assert_eq!(repo.get(4, 0.0), Err(LookupError::Estimator(4)));
    }

    #[test]
    fn define_from_records() {
        let mut repo = EstimatorRepository::new();
        let linear = Definition::new("linear")
            .with_property("slope", "0.5")
            .with_property("intercept", "-1");
        let id = repo.define(&linear).unwrap();
        assert_eq!(repo.get(id, 4.0).unwrap(), 1.0);

        let bad = Definition::new("spline");
        assert!(matches!(
            repo.define(&bad),
            Err(DefinitionError::UnknownEstimatorKind { .. })
        ));
        let missing = Definition::new("constant");
        assert!(repo.define(&missing).is_err());
    }

    #[test]
    fn resolve_prefers_sub_definition() {
        let mut repo = EstimatorRepository::new();
        let record = Definition::new("C")
            .with_property("boiling_point", "78.4")
            .with_definition(
                "melting_point",
                Definition::new("constant").with_property("value", "-114"),
            );
        let mp = repo.resolve(&record, "melting_point", 0.0).unwrap();
        let bp = repo.resolve(&record, "boiling_point", 100.0).unwrap();
        let density = repo.resolve(&record, "density", 1.0).unwrap();
        assert_eq!(repo.get(mp, 0.0).unwrap(), -114.0);
        assert_eq!(repo.get(bp, 0.0).unwrap(), 78.4);
        assert_eq!(repo.get(density, 0.0).unwrap(), 1.0);
    }
}
