use std::fmt;

use crate::structure::ValenceError;

/// Errors produced when parsing a SMILES string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input string was empty or contained only whitespace.
    EmptyInput,
    /// An unexpected character was encountered at the given position.
    UnexpectedChar { pos: usize, ch: char },
    /// A symbol that the atom catalog does not know.
    UnknownSymbol { pos: usize, text: String },
    /// A bracket atom `[` was opened but never closed with `]`.
    UnclosedBracket { pos: usize },
    /// A parenthesis was opened without a matching close, or vice versa.
    UnmatchedParen { pos: usize },
    /// A branch was opened before any atom.
    BranchWithoutAtom { pos: usize },
    /// A ring label appeared before any atom.
    RingLabelWithoutAtom { label: u8, pos: usize },
    /// A ring label was opened and never closed.
    UnclosedRing { label: u8 },
    /// Both ends of a ring closure specify different bond orders.
    RingBondConflict { label: u8 },
    /// A ring closure would bond an atom to itself or repeat an existing bond.
    InvalidRingClosure { label: u8, pos: usize },
    /// A bond symbol with no atom on one of its sides.
    DanglingBond { pos: usize },
    /// A written-out hydrogen attached by something other than a single bond.
    InvalidHydrogenBond { pos: usize },
    /// A charge specifier inside a bracket atom could not be parsed.
    InvalidCharge { pos: usize },
    /// An atom carries more bonds than any of its valences allow.
    ValenceExceeded(ValenceError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty SMILES string"),
            Self::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character '{}' at position {}", ch, pos)
            }
            Self::UnknownSymbol { pos, text } => {
                write!(f, "unknown atom symbol '{}' at position {}", text, pos)
            }
            Self::UnclosedBracket { pos } => {
                write!(f, "unclosed bracket atom starting at position {}", pos)
            }
            Self::UnmatchedParen { pos } => {
                write!(f, "unmatched parenthesis at position {}", pos)
            }
            Self::BranchWithoutAtom { pos } => {
                write!(f, "branch opened before any atom at position {}", pos)
            }
            Self::RingLabelWithoutAtom { label, pos } => {
                write!(f, "ring label {} before any atom at position {}", label, pos)
            }
            Self::UnclosedRing { label } => write!(f, "unclosed ring {}", label),
            Self::RingBondConflict { label } => {
                write!(f, "conflicting bond types on ring closure {}", label)
            }
            Self::InvalidRingClosure { label, pos } => {
                write!(f, "invalid ring closure {} at position {}", label, pos)
            }
            Self::DanglingBond { pos } => write!(f, "dangling bond at position {}", pos),
            Self::InvalidHydrogenBond { pos } => {
                write!(f, "hydrogen at position {} must be single bonded", pos)
            }
            Self::InvalidCharge { pos } => write!(f, "invalid charge at position {}", pos),
            Self::ValenceExceeded(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ValenceExceeded(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValenceError> for ParseError {
    fn from(e: ValenceError) -> Self {
        Self::ValenceExceeded(e)
    }
}
