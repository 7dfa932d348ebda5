//! Stoichiometric balancing by exact rational elimination.

use std::collections::BTreeMap;
use std::ops::{Mul, Sub};

use crate::structure::MolecularStructure;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ratio {
    num: i64,
    den: i64,
}

impl Ratio {
    const ZERO: Ratio = Ratio { num: 0, den: 1 };

    fn new(num: i64, den: i64) -> Self {
        let g = gcd(num, den).max(1);
        let sign = if den < 0 { -1 } else { 1 };
        Self {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    fn int(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    fn is_zero(self) -> bool {
        self.num == 0
    }

    fn div(self, other: Ratio) -> Ratio {
        Ratio::new(self.num * other.den, self.den * other.num)
    }
}

impl Sub for Ratio {
    type Output = Ratio;

    fn sub(self, other: Ratio) -> Ratio {
        Ratio::new(self.num * other.den - other.num * self.den, self.den * other.den)
    }
}

impl Mul for Ratio {
    type Output = Ratio;

    fn mul(self, other: Ratio) -> Ratio {
        Ratio::new(self.num * other.num, self.den * other.den)
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: i64, b: i64) -> i64 {
    a / gcd(a, b) * b
}

/// Smallest positive integer coefficients for `reactants -> products`.
///
/// The first product's coefficient is fixed before solving, which leaves one
/// unknown per remaining species. Returns `None` unless the system has exactly
/// one solution, every coefficient is positive and none exceeds 255.
pub(crate) fn balance(
    reactants: &[&MolecularStructure],
    products: &[&MolecularStructure],
) -> Option<(Vec<u8>, Vec<u8>)> {
    let (first, rest) = products.split_first()?;
    if reactants.is_empty() {
        return None;
    }

    let unknowns = reactants.len() + rest.len();
    let mut rows: BTreeMap<Symbol, Vec<Ratio>> = BTreeMap::new();
    for (col, structure) in reactants.iter().enumerate() {
        for (symbol, n) in structure.component_counts() {
            row(&mut rows, symbol, unknowns)[col] = Ratio::int(n as i64);
        }
    }
    for (symbol, n) in first.component_counts() {
        row(&mut rows, symbol, unknowns)[unknowns] = Ratio::int(n as i64);
    }
    for (k, structure) in rest.iter().enumerate() {
        for (symbol, n) in structure.component_counts() {
            row(&mut rows, symbol, unknowns)[reactants.len() + k] = Ratio::int(-(n as i64));
        }
    }

    let solution = solve(rows.into_values().collect(), unknowns)?;
    if solution.iter().any(|r| r.num <= 0) {
        return None;
    }

    let scale = solution.iter().fold(1, |acc, r| lcm(acc, r.den));
    let coefficient = |r: &Ratio| u8::try_from(r.num * (scale / r.den)).ok();
    let mut reactant_coefs = Vec::with_capacity(reactants.len());
    for r in &solution[..reactants.len()] {
        reactant_coefs.push(coefficient(r)?);
    }
    let mut product_coefs = vec![u8::try_from(scale).ok()?];
    for r in &solution[reactants.len()..] {
        product_coefs.push(coefficient(r)?);
    }
    Some((reactant_coefs, product_coefs))
}

fn row(rows: &mut BTreeMap<Symbol, Vec<Ratio>>, symbol: Symbol, unknowns: usize) -> &mut Vec<Ratio> {
    rows.entry(symbol)
        .or_insert_with(|| vec![Ratio::ZERO; unknowns + 1])
}

/// Gauss-Jordan elimination on an augmented matrix; `None` when the system
/// is inconsistent or underdetermined.
fn solve(mut matrix: Vec<Vec<Ratio>>, unknowns: usize) -> Option<Vec<Ratio>> {
    let mut pivot_row = 0;
    for col in 0..unknowns {
        let found = (pivot_row..matrix.len()).find(|&r| !matrix[r][col].is_zero())?;
        matrix.swap(pivot_row, found);

        let pivot = matrix[pivot_row][col];
        for value in matrix[pivot_row].iter_mut() {
            *value = value.div(pivot);
        }
        for r in 0..matrix.len() {
            if r == pivot_row || matrix[r][col].is_zero() {
                continue;
            }
            let factor = matrix[r][col];
            for c in col..=unknowns {
                let delta = factor * matrix[pivot_row][c];
                matrix[r][c] = matrix[r][c] - delta;
            }
        }
        pivot_row += 1;
    }

    if matrix[pivot_row..].iter().any(|row| !row[unknowns].is_zero()) {
        return None;
    }
    Some(matrix[..unknowns].iter().map(|row| row[unknowns]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AtomCatalog;

    fn coefficients(reactants: &[&str], products: &[&str]) -> Option<(Vec<u8>, Vec<u8>)> {
        let catalog = AtomCatalog::with_common_elements();
        let parse = |s: &&str| MolecularStructure::parse(s, &catalog).unwrap();
        let reactants: Vec<_> = reactants.iter().map(parse).collect();
        let products: Vec<_> = products.iter().map(parse).collect();
        balance(
            &reactants.iter().collect::<Vec<_>>(),
            &products.iter().collect::<Vec<_>>(),
        )
    }

    #[test]
    fn addition_is_one_to_one() {
        assert_eq!(
            coefficients(&["C=C", "BrBr"], &["BrCCBr"]),
            Some((vec![1, 1], vec![1]))
        );
    }

    #[test]
    fn water_synthesis() {
        assert_eq!(
            coefficients(&["HH", "O=O"], &["O"]),
            Some((vec![2, 1], vec![2]))
        );
    }

    #[test]
    fn methane_combustion() {
        assert_eq!(
            coefficients(&["C", "O=O"], &["O=C=O", "O"]),
            Some((vec![1, 2], vec![1, 2]))
        );
    }

    #[test]
    fn generic_esterification() {
        assert_eq!(
            coefficients(&["RC(=O)O", "OR"], &["RC(=O)OR", "O"]),
            Some((vec![1, 1], vec![1, 1]))
        );
    }

    #[test]
    fn impossible_equations() {
        assert_eq!(coefficients(&["C"], &["O"]), None);
        assert_eq!(coefficients(&["CC"], &["C=C"]), None);
    }

    #[test]
    fn negative_coefficient() {
        assert_eq!(coefficients(&["C", "CC"], &["CCC"]), None);
    }

    #[test]
    fn underdetermined_equation() {
        assert_eq!(coefficients(&["C=C", "C=C"], &["C=C"]), None);
    }

    #[test]
    fn empty_sides() {
        assert_eq!(coefficients(&[], &["C"]), None);
        assert_eq!(coefficients(&["C"], &[]), None);
    }

    #[test]
    fn ratio_arithmetic() {
        let half = Ratio::new(2, -4);
        assert_eq!(half, Ratio { num: -1, den: 2 });
        assert_eq!(half * Ratio::int(-2), Ratio::int(1));
        assert_eq!(Ratio::int(1) - Ratio::new(1, 3), Ratio::new(2, 3));
        assert_eq!(Ratio::new(3, 4).div(Ratio::new(3, 2)), Ratio::new(1, 2));
    }
}
