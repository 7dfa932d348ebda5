use serde::{Deserialize, Serialize};

/// Ceilings applied while generating reaction spans.
///
/// Every field has a default, so a partial document such as
/// `{"max_rounds": 4}` deserializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanLimits {
    /// Forward-inference rounds run by a total span.
    pub max_rounds: usize,
    /// A total span stops once the molecule repository holds this many
    /// concrete molecules.
    pub max_molecules: usize,
    /// Products with more graph atoms than this are dropped.
    pub max_product_atoms: usize,
}

impl Default for SpanLimits {
    fn default() -> Self {
        Self {
            max_rounds: 32,
            max_molecules: 1000,
            max_product_atoms: 100,
        }
    }
}

impl SpanLimits {
    pub fn with_max_rounds(self, max_rounds: usize) -> Self {
        Self { max_rounds, ..self }
    }

    pub fn with_max_molecules(self, max_molecules: usize) -> Self {
        Self {
            max_molecules,
            ..self
        }
    }

    pub fn with_max_product_atoms(self, max_product_atoms: usize) -> Self {
        Self {
            max_product_atoms,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let limits = SpanLimits::default();
        assert_eq!(limits.max_rounds, 32);
        assert_eq!(limits.max_molecules, 1000);
        assert_eq!(limits.max_product_atoms, 100);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let limits: SpanLimits = serde_json::from_str(r#"{"max_rounds": 4}"#).unwrap();
        assert_eq!(limits, SpanLimits::default().with_max_rounds(4));
    }

    #[test]
    fn json_round_trip() {
        let limits = SpanLimits::default()
            .with_max_molecules(50)
            .with_max_product_atoms(12);
        let text = serde_json::to_string(&limits).unwrap();
        assert_eq!(serde_json::from_str::<SpanLimits>(&text).unwrap(), limits);
    }
}
