use std::fmt;

use crate::definition::DefinitionError;

use super::ReactionId;

/// Errors that reject a reaction template at registration time.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// The definition record itself is malformed.
    Definition(DefinitionError),
    /// Another template already uses this id.
    DuplicateId(ReactionId),
    /// The template has no reactants or no products.
    EmptySide,
    /// No unique positive integer coefficients balance the equation.
    Unbalanced,
    /// Some reactant or product atom has no counterpart on the other side.
    Unmapped,
    /// An equivalent template is already registered.
    Equivalent { id: ReactionId, existing: ReactionId },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition(e) => write!(f, "{e}"),
            Self::DuplicateId(id) => write!(f, "reaction with duplicate id {id}"),
            Self::EmptySide => write!(f, "reaction needs at least one reactant and one product"),
            Self::Unbalanced => write!(f, "reaction could not be balanced"),
            Self::Unmapped => write!(f, "reactant atoms could not be mapped onto product atoms"),
            Self::Equivalent { id, existing } => {
                write!(f, "reaction {id} duplicates reaction {existing}")
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Definition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DefinitionError> for TemplateError {
    fn from(e: DefinitionError) -> Self {
        Self::Definition(e)
    }
}
