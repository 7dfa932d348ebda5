mod builder;
pub mod error;
mod parse_tree;
mod tokenizer;
mod writer;

use crate::catalog::AtomCatalog;
use crate::structure::MolecularStructure;
pub use error::ParseError;
pub(crate) use writer::atom_token;
pub use writer::to_smiles as write;

/// Parses SMILES-like notation against the atom kinds in `catalog`.
///
/// The literal `HH` stands for molecular hydrogen, which has no graph atoms.
pub fn parse(s: &str, catalog: &AtomCatalog) -> Result<MolecularStructure, ParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    if trimmed == "HH" {
        return Ok(MolecularStructure::hydrogen_molecule(catalog.hydrogen_weight()));
    }
    let tokens = tokenizer::tokenize(trimmed, catalog)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let tree = parse_tree::build_parse_tree(&tokens)?;
    builder::build_structure(&tree, catalog.hydrogen_weight())
}
