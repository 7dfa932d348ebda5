use proptest::prelude::*;

use chemgraph::{find_mapping, AsciiOptions, AtomCatalog, MolecularStructure};

/// Strategy for chains of organic atoms with optional double bonds,
/// side branches and one ring closure between the first and last atom.
fn simple_smiles() -> impl Strategy<Value = String> {
    let atom = prop_oneof![Just("C"), Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl")];
    let bond = prop_oneof![Just(""), Just(""), Just("=")];
    let part = (bond, atom, any::<bool>()).prop_map(|(b, a, branch)| {
        if branch {
            format!("({b}{a})")
        } else {
            format!("{b}{a}")
        }
    });
    (proptest::collection::vec(part, 0..12), any::<bool>()).prop_map(|(parts, ring)| {
        let mut s = String::from(if ring { "C1" } else { "C" });
        s.push_str(&parts.concat());
        if ring && parts.len() >= 2 {
            s.push('1');
        } else if ring {
            s.remove(1);
        }
        s
    })
}

fn parse(s: &str) -> Option<MolecularStructure> {
    MolecularStructure::parse(s, &AtomCatalog::with_common_elements()).ok()
}

proptest! {
    #[test]
    fn parse_does_not_panic(s in "\\PC{0,60}") {
        let _ = parse(&s);
    }

    #[test]
    fn readers_do_not_panic(text in "[CO=|%1 \\n-]{0,40}", bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let catalog = AtomCatalog::with_common_elements();
        let _ = MolecularStructure::from_ascii(&text, &catalog);
        let _ = MolecularStructure::from_bin(&bytes, &catalog);
    }

    #[test]
    fn printing_round_trips(smi in simple_smiles()) {
        if let Some(structure) = parse(&smi) {
            let printed = structure.print();
            let reparsed = parse(&printed);
            prop_assert_eq!(reparsed.as_ref(), Some(&structure), "{} printed as {}", smi, printed);
        }
    }

    #[test]
    fn binary_round_trips(smi in simple_smiles()) {
        if let Some(structure) = parse(&smi) {
            let catalog = AtomCatalog::with_common_elements();
            let decoded = MolecularStructure::from_bin(&structure.to_bin(), &catalog);
            let decoded = decoded.ok();
            prop_assert_eq!(decoded.as_ref(), Some(&structure));
        }
    }

    #[test]
    fn ascii_round_trips(smi in simple_smiles(), linear in any::<bool>()) {
        if let Some(structure) = parse(&smi) {
            let catalog = AtomCatalog::with_common_elements();
            let options = AsciiOptions { linear_cycle_expansion: linear };
            let text = structure.to_ascii(&options);
            let read = MolecularStructure::from_ascii(&text, &catalog);
            let read = read.ok();
            prop_assert_eq!(read.as_ref(), Some(&structure), "{}\n{}", smi, text);
        }
    }

    #[test]
    fn self_mapping_is_injective(smi in simple_smiles()) {
        if let Some(structure) = parse(&smi) {
            let mapping = find_mapping(&structure, &structure);
            prop_assert!(mapping.is_some());
            let mapping = mapping.unwrap();
            prop_assert_eq!(mapping.len(), structure.atom_count());
            prop_assert_eq!(mapping.targets().len(), mapping.len());
        }
    }
}
