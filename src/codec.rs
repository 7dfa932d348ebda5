//! Compact binary form of a [`MolecularStructure`].
//!
//! Atom kinds are stored by symbol and resolved against a catalog on load,
//! so the bytes stay valid across catalogs that agree on symbols.

use std::fmt;

use bincode::{Decode, Encode};
use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::BondOrder;
use crate::catalog::AtomCatalog;
use crate::structure::{MolecularStructure, ValenceError};

/// Upper bound on the bytes a decoded record may claim.
const DECODE_LIMIT: usize = 1 << 24;

#[derive(Debug, Encode, Decode)]
struct StructureRecord {
    virtual_hydrogen: bool,
    atoms: Vec<AtomRecord>,
    bonds: Vec<BondRecord>,
}

#[derive(Debug, Encode, Decode)]
struct AtomRecord {
    symbol: String,
    hydrogens: u8,
    explicit_hydrogens: bool,
    formal_charge: i8,
    is_aromatic: bool,
}

#[derive(Debug, Encode, Decode)]
struct BondRecord {
    a: u32,
    b: u32,
    order: BondOrder,
}

/// Errors raised while loading a structure from bytes.
#[derive(Debug)]
pub enum BinError {
    /// The bytes are not a structure record.
    Decode(bincode::error::DecodeError),
    /// Bytes remain after the record.
    TrailingBytes { used: usize, len: usize },
    /// The catalog has no atom kind with this symbol.
    UnknownSymbol(String),
    /// A bond refers to an atom past the end of the atom list.
    AtomIndex { bond: usize, atom: u32 },
    /// A bond joins an atom to itself.
    SelfBond { bond: usize, atom: u32 },
    /// Two bonds join the same pair of atoms.
    DuplicateBond { bond: usize },
    /// Molecular hydrogen record that also lists atoms.
    VirtualHydrogenWithAtoms,
    /// An atom's bonds and hydrogens exceed its valence.
    Valence(ValenceError),
}

impl fmt::Display for BinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "malformed structure record: {e}"),
            Self::TrailingBytes { used, len } => {
                write!(f, "structure record ends at byte {used} of {len}")
            }
            Self::UnknownSymbol(s) => write!(f, "undefined atom symbol '{s}'"),
            Self::AtomIndex { bond, atom } => {
                write!(f, "bond {bond} refers to missing atom {atom}")
            }
            Self::SelfBond { bond, atom } => write!(f, "bond {bond} joins atom {atom} to itself"),
            Self::DuplicateBond { bond } => write!(f, "bond {bond} duplicates an earlier bond"),
            Self::VirtualHydrogenWithAtoms => {
                write!(f, "molecular hydrogen record lists graph atoms")
            }
            Self::Valence(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Valence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bincode::error::DecodeError> for BinError {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ValenceError> for BinError {
    fn from(e: ValenceError) -> Self {
        Self::Valence(e)
    }
}

impl MolecularStructure {
    pub fn to_bin(&self) -> Vec<u8> {
        let record = StructureRecord {
            virtual_hydrogen: self.is_virtual_hydrogen(),
            atoms: self
                .atoms()
                .map(|idx| {
                    let atom = self.atom(idx);
                    AtomRecord {
                        symbol: atom.symbol().as_str().to_string(),
                        hydrogens: atom.hydrogen_count,
                        explicit_hydrogens: atom.explicit_hydrogens.is_some(),
                        formal_charge: atom.formal_charge,
                        is_aromatic: atom.is_aromatic,
                    }
                })
                .collect(),
            bonds: self
                .bonds()
                .filter_map(|e| {
                    let (a, b) = self.bond_endpoints(e)?;
                    Some(BondRecord {
                        a: a.index() as u32,
                        b: b.index() as u32,
                        order: self.bond(e).order,
                    })
                })
                .collect(),
        };
        bincode::encode_to_vec(&record, bincode::config::standard())
            .expect("encoding plain records into memory cannot fail")
    }

    pub fn from_bin(bytes: &[u8], catalog: &AtomCatalog) -> Result<Self, BinError> {
        let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
        let (record, used): (StructureRecord, usize) = bincode::decode_from_slice(bytes, config)?;
        if used != bytes.len() {
            return Err(BinError::TrailingBytes {
                used,
                len: bytes.len(),
            });
        }

        if record.virtual_hydrogen {
            if !record.atoms.is_empty() || !record.bonds.is_empty() {
                return Err(BinError::VirtualHydrogenWithAtoms);
            }
            return Ok(Self::hydrogen_molecule(catalog.hydrogen_weight()));
        }

        let mut structure = Self::new(catalog.hydrogen_weight());
        for rec in &record.atoms {
            let kind = catalog
                .find(&rec.symbol)
                .ok_or_else(|| BinError::UnknownSymbol(rec.symbol.clone()))?;
            structure.add_atom(Atom {
                hydrogen_count: rec.hydrogens,
                explicit_hydrogens: rec.explicit_hydrogens.then_some(rec.hydrogens),
                formal_charge: rec.formal_charge,
                is_aromatic: rec.is_aromatic,
                ..Atom::new(kind.clone())
            });
        }

        let n = record.atoms.len() as u32;
        for (i, bond) in record.bonds.iter().enumerate() {
            if let Some(&atom) = [bond.a, bond.b].iter().find(|&&x| x >= n) {
                return Err(BinError::AtomIndex { bond: i, atom });
            }
            if bond.a == bond.b {
                return Err(BinError::SelfBond { bond: i, atom: bond.a });
            }
            let a = NodeIndex::new(bond.a as usize);
            let b = NodeIndex::new(bond.b as usize);
            if structure.add_bond(a, b, bond.order).is_none() {
                return Err(BinError::DuplicateBond { bond: i });
            }
        }

        for idx in structure.atoms() {
            let atom = structure.atom(idx);
            if atom.is_radical() || atom.formal_charge != 0 {
                continue;
            }
            let bonds = structure.bond_valence(idx);
            let used = bonds.saturating_add(atom.hydrogen_count);
            let fits = atom.kind.valences().max_valence().map_or(true, |max| used <= max);
            if !fits {
                return Err(ValenceError {
                    atom: idx,
                    symbol: atom.symbol(),
                    bonds,
                }
                .into());
            }
        }

        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AtomCatalog {
        AtomCatalog::with_common_elements()
    }

    fn mol(s: &str) -> MolecularStructure {
        MolecularStructure::parse(s, &catalog()).unwrap_or_else(|e| panic!("bad SMILES {s:?}: {e}"))
    }

    fn encode(record: &StructureRecord) -> Vec<u8> {
        bincode::encode_to_vec(record, bincode::config::standard()).unwrap()
    }

    fn carbon(hydrogens: u8) -> AtomRecord {
        AtomRecord {
            symbol: "C".into(),
            hydrogens,
            explicit_hydrogens: false,
            formal_charge: 0,
            is_aromatic: false,
        }
    }

    #[test]
    fn round_trips() {
        for smiles in [
            "CCO",
            "C1CC12CC2",
            "c1ccccc1O",
            "[NH4+]",
            "[Na+].[Cl-]",
            "RC(=O)OR",
            "HH",
            "HC(H)(H)C(H)(H)C(H)(H)H",
            "S(H)(H)(H)H",
        ] {
            let s = mol(smiles);
            let back = MolecularStructure::from_bin(&s.to_bin(), &catalog()).unwrap();
            assert_eq!(back, s, "{smiles}");
            assert_eq!(back.implied_hydrogen_count(), s.implied_hydrogen_count(), "{smiles}");
        }
    }

    #[test]
    fn rejects_garbage_and_trailing_bytes() {
        assert!(matches!(
            MolecularStructure::from_bin(&[0xff, 0xff, 0xff], &catalog()),
            Err(BinError::Decode(_))
        ));
        let mut bytes = mol("CC").to_bin();
        bytes.push(0);
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn rejects_unknown_symbol() {
        let bytes = encode(&StructureRecord {
            virtual_hydrogen: false,
            atoms: vec![AtomRecord {
                symbol: "Q".into(),
                ..carbon(0)
            }],
            bonds: vec![],
        });
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::UnknownSymbol(s)) if s == "Q"
        ));
    }

    #[test]
    fn rejects_bad_bonds() {
        let with_bonds = |bonds: Vec<BondRecord>| {
            encode(&StructureRecord {
                virtual_hydrogen: false,
                atoms: vec![carbon(3), carbon(3)],
                bonds,
            })
        };
        let single = |a, b| BondRecord {
            a,
            b,
            order: BondOrder::Single,
        };

        let bytes = with_bonds(vec![single(0, 5)]);
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::AtomIndex { bond: 0, atom: 5 })
        ));
        let bytes = with_bonds(vec![single(1, 1)]);
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::SelfBond { bond: 0, atom: 1 })
        ));
        let bytes = with_bonds(vec![single(0, 1), single(1, 0)]);
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::DuplicateBond { bond: 1 })
        ));
    }

    #[test]
    fn rejects_overfull_valence() {
        let bytes = encode(&StructureRecord {
            virtual_hydrogen: false,
            atoms: vec![carbon(4), carbon(3)],
            bonds: vec![BondRecord {
                a: 0,
                b: 1,
                order: BondOrder::Single,
            }],
        });
        let err = MolecularStructure::from_bin(&bytes, &catalog()).unwrap_err();
        assert!(matches!(err, BinError::Valence(ValenceError { bonds: 1, .. })));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn rejects_hydrogen_with_atoms() {
        let bytes = encode(&StructureRecord {
            virtual_hydrogen: true,
            atoms: vec![carbon(4)],
            bonds: vec![],
        });
        assert!(matches!(
            MolecularStructure::from_bin(&bytes, &catalog()),
            Err(BinError::VirtualHydrogenWithAtoms)
        ));
    }
}
