//! Key/value records handed over by an external definition loader.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::smiles::ParseError;

/// Errors raised while interpreting a [`Definition`].
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionError {
    /// The specifier could not be interpreted.
    InvalidSpecifier { specifier: String, location: String },
    /// A property value could not be converted to the expected type.
    InvalidProperty {
        key: String,
        value: String,
        location: String,
    },
    /// A structure given in the record is not valid notation.
    InvalidStructure {
        text: String,
        location: String,
        source: ParseError,
    },
    /// A sub-definition names an estimator kind that does not exist.
    UnknownEstimatorKind { kind: String, location: String },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpecifier {
                specifier,
                location,
            } => write!(f, "invalid specifier '{specifier}', at: {location}"),
            Self::InvalidProperty {
                key,
                value,
                location,
            } => write!(f, "invalid value '{value}' for property '{key}', at: {location}"),
            Self::InvalidStructure {
                text,
                location,
                source,
            } => write!(f, "invalid structure '{text}' ({source}), at: {location}"),
            Self::UnknownEstimatorKind { kind, location } => {
                write!(f, "unknown estimator kind '{kind}', at: {location}")
            }
        }
    }
}

impl std::error::Error for DefinitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidStructure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One record of a definition file: a specifier, string properties and
/// named sub-records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    pub specifier: String,
    pub properties: BTreeMap<String, String>,
    pub definitions: BTreeMap<String, Definition>,
    /// Where the record came from, for diagnostics.
    pub location: Option<String>,
}

impl Definition {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_definition(mut self, key: impl Into<String>, definition: Definition) -> Self {
        self.definitions.insert(key.into(), definition);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn location_name(&self) -> &str {
        self.location.as_deref().unwrap_or("?")
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn definition(&self, key: &str) -> Option<&Definition> {
        self.definitions.get(key)
    }

    /// Parses the property under `key`, `None` when absent.
    pub fn parse_property<T: FromStr>(&self, key: &str) -> Result<Option<T>, DefinitionError> {
        let Some(value) = self.property(key) else {
            return Ok(None);
        };
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| self.invalid_property(key, value))
    }

    pub fn default_property<T: FromStr>(&self, key: &str, default: T) -> Result<T, DefinitionError> {
        Ok(self.parse_property(key)?.unwrap_or(default))
    }

    /// Splits the property under `key` into a comma separated list.
    ///
    /// A surrounding pair of braces is removed first; commas nested inside
    /// further braces do not split, so `{CO, 0.5}` stays one item. Empty items
    /// are skipped.
    pub fn list_property(&self, key: &str) -> Result<Vec<String>, DefinitionError> {
        match self.property(key) {
            Some(value) => split_list(value).ok_or_else(|| self.invalid_property(key, value)),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn invalid_property(&self, key: &str, value: &str) -> DefinitionError {
        DefinitionError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            location: self.location_name().to_string(),
        }
    }

    pub(crate) fn invalid_specifier(&self) -> DefinitionError {
        DefinitionError::InvalidSpecifier {
            specifier: self.specifier.clone(),
            location: self.location_name().to_string(),
        }
    }

    pub(crate) fn invalid_structure(&self, text: &str, source: ParseError) -> DefinitionError {
        DefinitionError::InvalidStructure {
            text: text.to_string(),
            location: self.location_name().to_string(),
            source,
        }
    }

    /// Warns about every property or sub-definition not listed in `known`.
    pub fn warn_unused(&self, known: &[&str]) {
        let known: BTreeSet<&str> = known.iter().copied().collect();
        for key in self.properties.keys().chain(self.definitions.keys()) {
            if !known.contains(key.as_str()) {
                warn!(key = %key, location = self.location_name(), "unused definition entry");
            }
        }
    }
}

/// Brace-aware comma split; `None` on unbalanced braces.
fn split_list(text: &str) -> Option<Vec<String>> {
    let text = text.trim();
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                push_item(&mut items, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if depth != 0 {
        return None;
    }
    push_item(&mut items, &current);
    Some(items)
}

fn push_item(items: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
}
