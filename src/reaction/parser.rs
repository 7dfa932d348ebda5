use tracing::warn;

use crate::catalog::AtomCatalog;
use crate::definition::{Definition, DefinitionError};
use crate::structure::MolecularStructure;

use super::Catalyst;

pub(crate) const CATALYSTS: &str = "catalysts";

/// Reactant and product structures of a `A + B -> C + D` specifier.
pub(crate) fn parse_sides(
    definition: &Definition,
    catalog: &AtomCatalog,
) -> Result<(Vec<MolecularStructure>, Vec<MolecularStructure>), DefinitionError> {
    let (reactants, products) =
        split_specifier(&definition.specifier).ok_or_else(|| definition.invalid_specifier())?;
    let parse = |text: &str| {
        MolecularStructure::parse(text, catalog).map_err(|e| definition.invalid_structure(text, e))
    };
    Ok((
        reactants.into_iter().map(parse).collect::<Result<_, _>>()?,
        products.into_iter().map(parse).collect::<Result<_, _>>()?,
    ))
}

/// Catalysts listed under the `catalysts` property. Structurally repeated
/// entries are skipped with a warning.
pub(crate) fn parse_catalysts(
    definition: &Definition,
    catalog: &AtomCatalog,
) -> Result<Vec<Catalyst>, DefinitionError> {
    let mut catalysts: Vec<Catalyst> = Vec::new();
    for entry in definition.list_property(CATALYSTS)? {
        let (text, amount) =
            split_catalyst(&entry).ok_or_else(|| definition.invalid_property(CATALYSTS, &entry))?;
        let structure = MolecularStructure::parse(text, catalog)
            .map_err(|e| definition.invalid_structure(text, e))?;
        let catalyst = Catalyst::new(structure, amount);
        if catalysts.contains(&catalyst) {
            warn!(
                catalyst = %catalyst.tag(),
                location = definition.location_name(),
                "duplicate catalyst skipped"
            );
            continue;
        }
        catalysts.push(catalyst);
    }
    Ok(catalysts)
}

/// Splits `A + B -> C` into species, `None` when either side is missing or
/// has an empty species.
fn split_specifier(s: &str) -> Option<(Vec<&str>, Vec<&str>)> {
    let (left, right) = s.split_once("->")?;
    if right.contains("->") {
        return None;
    }
    Some((split_species(left)?, split_species(right)?))
}

/// `+` inside a bracket atom is a charge, not a separator.
fn split_species(s: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut bracket_depth = 0u32;

    for (i, ch) in s.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            '+' if bracket_depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);

    let parts: Vec<&str> = parts.into_iter().map(str::trim).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

/// `SMILES` or `{SMILES, amount}`; a bare structure has an ideal amount of 0.
fn split_catalyst(entry: &str) -> Option<(&str, f64)> {
    let entry = entry.trim();
    let Some(inner) = entry.strip_prefix('{') else {
        return (!entry.is_empty()).then_some((entry, 0.0));
    };
    let inner = inner.strip_suffix('}')?;
    let (text, amount) = inner.rsplit_once(',')?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((text, amount.trim().parse().ok()?))
}
