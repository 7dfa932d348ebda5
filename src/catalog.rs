use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::atom::{AtomKind, ElementData, RadicalData, RadicalMatch, Valences};
use crate::error::LookupError;
use crate::symbol::Symbol;

/// Symbol, name, standard atomic weight, valences.
static COMMON_ELEMENTS: &[(&str, &str, f64, &[u8])] = &[
    ("H", "hydrogen", 1.008, &[1]),
    ("Li", "lithium", 6.94, &[1]),
    ("B", "boron", 10.81, &[3]),
    ("C", "carbon", 12.011, &[4]),
    ("N", "nitrogen", 14.007, &[3, 5]),
    ("O", "oxygen", 15.999, &[2]),
    ("F", "fluorine", 18.998, &[1]),
    ("Na", "sodium", 22.990, &[1]),
    ("Mg", "magnesium", 24.305, &[2]),
    ("Al", "aluminium", 26.982, &[3]),
    ("Si", "silicon", 28.085, &[4]),
    ("P", "phosphorus", 30.974, &[3, 5]),
    ("S", "sulfur", 32.06, &[2, 4, 6]),
    ("Cl", "chlorine", 35.45, &[1]),
    ("K", "potassium", 39.098, &[1]),
    ("Ca", "calcium", 40.078, &[2]),
    ("Mn", "manganese", 54.938, &[2, 4, 7]),
    ("Fe", "iron", 55.845, &[2, 3]),
    ("Cu", "copper", 63.546, &[1, 2]),
    ("Zn", "zinc", 65.38, &[2]),
    ("Se", "selenium", 78.971, &[2, 4, 6]),
    ("Br", "bromine", 79.904, &[1]),
    ("Ag", "silver", 107.87, &[1]),
    ("I", "iodine", 126.90, &[1, 3, 5, 7]),
    ("Pt", "platinum", 195.08, &[2, 4]),
];

/// Errors raised while registering atom kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The symbol is empty, too long or contains non-ASCII characters.
    InvalidSymbol(String),
    /// The symbol is already registered.
    Duplicate(Symbol),
    /// An element was declared without any valence.
    NoValences(Symbol),
    /// A radical refers to a symbol that is not registered.
    UnknownMatch { radical: Symbol, symbol: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSymbol(s) => write!(f, "invalid atom symbol '{s}'"),
            Self::Duplicate(s) => write!(f, "atom symbol '{s}' is already defined"),
            Self::NoValences(s) => write!(f, "element '{s}' has no valences"),
            Self::UnknownMatch { radical, symbol } => {
                write!(f, "radical '{radical}' matches undefined atom '{symbol}'")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Registry of the atom kinds a parser may refer to, keyed by symbol.
///
/// Populated once up front and then shared read-only by every parse.
#[derive(Debug, Clone, Default)]
pub struct AtomCatalog {
    kinds: BTreeMap<Symbol, Arc<AtomKind>>,
}

impl AtomCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the common elements plus the radicals `R` (matches
    /// anything) and `X` (halogens).
    pub fn with_common_elements() -> Self {
        let mut catalog = Self::new();
        for &(symbol, name, weight, valences) in COMMON_ELEMENTS {
            // The table is static and free of duplicates.
            let _ = catalog.add_element(symbol, name, weight, valences);
        }
        let _ = catalog.add_radical("R", "radical", &["*"]);
        let _ = catalog.add_radical("X", "halogen", &["F", "Cl", "Br", "I"]);
        catalog
    }

    pub fn find(&self, symbol: &str) -> Option<&Arc<AtomKind>> {
        self.kinds.get(&Symbol::new(symbol)?)
    }

    pub fn find_symbol(&self, symbol: Symbol) -> Option<&Arc<AtomKind>> {
        self.kinds.get(&symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.find(symbol).is_some()
    }

    pub fn at(&self, symbol: &str) -> Result<&Arc<AtomKind>, LookupError> {
        self.find(symbol)
            .ok_or_else(|| LookupError::Atom(symbol.to_string()))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AtomKind>> + '_ {
        self.kinds.values()
    }

    /// Weight used for implied hydrogens.
    pub fn hydrogen_weight(&self) -> f64 {
        self.find("H").map(|h| h.weight()).unwrap_or(1.008)
    }

    pub fn add_element(
        &mut self,
        symbol: &str,
        name: &str,
        weight: f64,
        valences: &[u8],
    ) -> Result<(), CatalogError> {
        let sym = self.fresh_symbol(symbol)?;
        let valences = if valences.is_empty() {
            return Err(CatalogError::NoValences(sym));
        } else if valences == [0] {
            Valences::Any
        } else {
            let mut list = valences.to_vec();
            list.sort_unstable();
            list.dedup();
            Valences::Listed(list)
        };
        self.kinds.insert(
            sym,
            Arc::new(AtomKind::Element(ElementData {
                symbol: sym,
                name: name.to_string(),
                weight,
                valences,
            })),
        );
        Ok(())
    }

    /// Registers a radical accepting `matches`; `*` stands for any symbol.
    ///
    /// Matching between radicals is inferred from set inclusion: a radical
    /// whose set strictly contains another's also accepts that radical.
    pub fn add_radical(
        &mut self,
        symbol: &str,
        name: &str,
        matches: &[&str],
    ) -> Result<(), CatalogError> {
        let sym = self.fresh_symbol(symbol)?;

        let mut set = BTreeSet::new();
        let mut any = false;
        for &m in matches {
            if m == "*" {
                if any || matches.len() > 1 {
                    warn!(radical = %sym, "redundant match symbols next to '*'");
                }
                any = true;
                continue;
            }
            let target = Symbol::new(m)
                .filter(|s| self.kinds.contains_key(s))
                .ok_or_else(|| CatalogError::UnknownMatch {
                    radical: sym,
                    symbol: m.to_string(),
                })?;
            set.insert(target);
        }

        let matches = if any || set.is_empty() {
            RadicalMatch::Any
        } else {
            self.infer_radical_matches(sym, &mut set);
            RadicalMatch::Only(set)
        };

        self.kinds.insert(
            sym,
            Arc::new(AtomKind::Radical(RadicalData {
                symbol: sym,
                name: name.to_string(),
                matches,
            })),
        );
        Ok(())
    }

    fn infer_radical_matches(&mut self, new: Symbol, set: &mut BTreeSet<Symbol>) {
        let element_set: BTreeSet<Symbol> = set.clone();
        let mut widened = Vec::new();
        for kind in self.kinds.values() {
            let AtomKind::Radical(existing) = kind.as_ref() else {
                continue;
            };
            let RadicalMatch::Only(other) = &existing.matches else {
                continue;
            };
            let other_elements: BTreeSet<Symbol> = other
                .iter()
                .copied()
                .filter(|s| {
                    self.kinds
                        .get(s)
                        .is_some_and(|k| !k.is_radical())
                })
                .collect();

            if other_elements == element_set {
                warn!(radical = %new, existing = %existing.symbol, "radical duplicates an existing match set");
                set.insert(existing.symbol);
                widened.push(existing.symbol);
            } else if other_elements.is_subset(&element_set) {
                set.insert(existing.symbol);
            } else if element_set.is_subset(&other_elements) {
                widened.push(existing.symbol);
            }
        }

        for symbol in widened {
            if let Some(kind) = self.kinds.get_mut(&symbol) {
                let mut updated = kind.as_ref().clone();
                if let AtomKind::Radical(RadicalData {
                    matches: RadicalMatch::Only(other),
                    ..
                }) = &mut updated
                {
                    other.insert(new);
                }
                *kind = Arc::new(updated);
            }
        }
    }

    fn fresh_symbol(&self, symbol: &str) -> Result<Symbol, CatalogError> {
        let sym = Symbol::new(symbol).ok_or_else(|| CatalogError::InvalidSymbol(symbol.to_string()))?;
        if self.kinds.contains_key(&sym) {
            return Err(CatalogError::Duplicate(sym));
        }
        Ok(sym)
    }
}
