use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::symbol::Symbol;

/// Allowed valences of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Valences {
    /// Ascending, non-empty list of valences.
    Listed(Vec<u8>),
    /// Any non-zero valence; no implied hydrogens are ever added.
    Any,
}

impl Valences {
    /// Smallest allowed valence that can hold `bonds` bond units.
    ///
    /// Returns `None` when `bonds` exceeds every listed valence.
    pub fn fitting_valence(&self, bonds: u8) -> Option<u8> {
        match self {
            Valences::Listed(list) => list.iter().copied().find(|&v| v >= bonds),
            Valences::Any => Some(bonds),
        }
    }

    pub fn max_valence(&self) -> Option<u8> {
        match self {
            Valences::Listed(list) => list.last().copied(),
            Valences::Any => None,
        }
    }
}

static ANY_VALENCE: Valences = Valences::Any;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub symbol: Symbol,
    pub name: String,
    /// Standard atomic weight in g/mol.
    pub weight: f64,
    pub valences: Valences,
}

/// Symbols a radical is allowed to stand in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadicalMatch {
    Any,
    Only(BTreeSet<Symbol>),
}

impl RadicalMatch {
    pub fn contains(&self, symbol: Symbol) -> bool {
        match self {
            RadicalMatch::Any => true,
            RadicalMatch::Only(set) => set.contains(&symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadicalData {
    pub symbol: Symbol,
    pub name: String,
    pub matches: RadicalMatch,
}

/// An element or a wildcard ("radical") atom kind.
///
/// Radicals only appear in pattern structures; they weigh nothing and accept
/// any valence.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomKind {
    Element(ElementData),
    Radical(RadicalData),
}

impl AtomKind {
    pub fn symbol(&self) -> Symbol {
        match self {
            AtomKind::Element(e) => e.symbol,
            AtomKind::Radical(r) => r.symbol,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AtomKind::Element(e) => &e.name,
            AtomKind::Radical(r) => &r.name,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            AtomKind::Element(e) => e.weight,
            AtomKind::Radical(_) => 0.0,
        }
    }

    pub fn valences(&self) -> &Valences {
        match self {
            AtomKind::Element(e) => &e.valences,
            AtomKind::Radical(_) => &ANY_VALENCE,
        }
    }

    pub fn is_radical(&self) -> bool {
        matches!(self, AtomKind::Radical(_))
    }

    /// Whether a pattern atom of this kind accepts a target atom of kind `other`.
    ///
    /// Elements accept only themselves. Radicals accept every symbol in their
    /// match set, which may include other radicals.
    pub fn matches(&self, other: &AtomKind) -> bool {
        match self {
            AtomKind::Element(e) => e.symbol == other.symbol() && !other.is_radical(),
            AtomKind::Radical(r) => r.symbol == other.symbol() || r.matches.contains(other.symbol()),
        }
    }

    /// Display ordering used when summarising structures: carbon first,
    /// common heteroatoms next, hydrogen late and radicals before everything.
    pub fn precedence(&self) -> u8 {
        if self.is_radical() {
            return 0;
        }
        match self.symbol().as_str() {
            "C" => 1,
            "O" => 2,
            "N" => 3,
            "Cl" | "Br" => 4,
            "I" => 5,
            "F" => 6,
            "S" => 7,
            "P" => 8,
            "B" => 9,
            "Al" => 10,
            "Se" => 11,
            "H" => 100,
            _ => 255,
        }
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A node of a [`MolecularStructure`](crate::MolecularStructure).
///
/// Implied hydrogens are not graph nodes; they are counted here and only take
/// part in valence accounting, mass and formula.
#[derive(Debug, Clone)]
pub struct Atom {
    pub kind: Arc<AtomKind>,
    /// Hydrogens implied by the atom's valence (or given explicitly).
    pub hydrogen_count: u8,
    /// Hydrogen count fixed by a bracket atom; never recomputed.
    pub explicit_hydrogens: Option<u8>,
    pub formal_charge: i8,
    pub is_aromatic: bool,
}

impl Atom {
    pub fn new(kind: Arc<AtomKind>) -> Self {
        Self {
            kind,
            hydrogen_count: 0,
            explicit_hydrogens: None,
            formal_charge: 0,
            is_aromatic: false,
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.kind.symbol()
    }

    pub fn is_radical(&self) -> bool {
        self.kind.is_radical()
    }
}
