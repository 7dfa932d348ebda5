pub mod ascii;
pub mod atom;
pub mod bond;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod definition;
pub mod error;
pub mod estimator;
pub mod formula;
pub mod graph_ops;
pub mod molecule;
pub mod reaction;
pub mod rings;
pub mod smiles;
pub mod structure;
pub mod substruct;
pub mod symbol;

pub use ascii::{from_ascii, to_ascii, AsciiError, AsciiOptions};
pub use atom::{Atom, AtomKind, ElementData, RadicalData, RadicalMatch, Valences};
pub use bond::{Bond, BondOrder};
pub use catalog::{AtomCatalog, CatalogError};
pub use codec::BinError;
pub use config::SpanLimits;
pub use definition::{Definition, DefinitionError};
pub use error::LookupError;
pub use estimator::{Constant, Estimator, EstimatorId, EstimatorRepository, Linear};
pub use formula::Fingerprint;
pub use graph_ops::{connected_components, copy_branch, substitute};
pub use molecule::{GenericMoleculeData, MoleculeData, MoleculeId, MoleculeRepository};
pub use reaction::{
    Catalyst, ConcreteReaction, Reactant, ReactionId, ReactionNetwork, ReactionRepository,
    ReactionTemplate, RetrosynthReaction, SpanReport, SpanStop, TemplateError,
};
pub use rings::CycleBasis;
pub use smiles::ParseError;
pub use structure::{MolecularStructure, ValenceError};
pub use substruct::{find_mapping, find_maximal_mapping, find_overlap, AtomMapping};
pub use symbol::Symbol;
