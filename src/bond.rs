use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Encode, Decode)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Valence units the bond consumes on each endpoint.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BondOrder::Single => '-',
            BondOrder::Double => '=',
            BondOrder::Triple => '#',
            BondOrder::Quadruple => '$',
            BondOrder::Aromatic => ':',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '-' => Some(BondOrder::Single),
            '=' => Some(BondOrder::Double),
            '#' => Some(BondOrder::Triple),
            '$' => Some(BondOrder::Quadruple),
            ':' => Some(BondOrder::Aromatic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bond {
    pub order: BondOrder,
}

impl Bond {
    pub fn new(order: BondOrder) -> Self {
        Self { order }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valence_units() {
        assert_eq!(BondOrder::Single.valence(), 1);
        assert_eq!(BondOrder::Aromatic.valence(), 1);
        assert_eq!(BondOrder::Triple.valence(), 3);
        assert_eq!(BondOrder::Quadruple.valence(), 4);
    }

    #[test]
    fn symbols() {
        for order in [
            BondOrder::Single,
            BondOrder::Double,
            BondOrder::Triple,
            BondOrder::Quadruple,
            BondOrder::Aromatic,
        ] {
            assert_eq!(BondOrder::from_symbol(order.symbol()), Some(order));
        }
        assert_eq!(BondOrder::from_symbol('~'), None);
        assert_eq!(Bond::default().order, BondOrder::Single);
    }
}
