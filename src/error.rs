use std::fmt;

/// An id or symbol requested from a repository does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No atom kind is registered under this symbol.
    Atom(String),
    /// No molecule has this id.
    Molecule(u32),
    /// No reaction template has this id.
    Reaction(u32),
    /// No estimator has this id.
    Estimator(u32),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(symbol) => write!(f, "undefined atom symbol '{symbol}'"),
            Self::Molecule(id) => write!(f, "no molecule with id {id}"),
            Self::Reaction(id) => write!(f, "no reaction with id {id}"),
            Self::Estimator(id) => write!(f, "no estimator with id {id}"),
        }
    }
}

impl std::error::Error for LookupError {}
