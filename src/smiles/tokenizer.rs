use std::sync::Arc;

use crate::atom::AtomKind;
use crate::bond::BondOrder;
use crate::catalog::AtomCatalog;
use crate::smiles::error::ParseError;

#[derive(Debug, Clone)]
pub enum Token {
    Atom(AtomToken),
    Bond {
        order: BondOrder,
        pos: usize,
    },
    RingClosure {
        bond: Option<BondOrder>,
        label: u8,
        pos: usize,
    },
    OpenParen(usize),
    CloseParen(usize),
    Dot(usize),
}

#[derive(Debug, Clone)]
pub struct AtomToken {
    pub kind: Arc<AtomKind>,
    pub is_aromatic: bool,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub is_bracket: bool,
    pub pos: usize,
}

impl AtomToken {
    /// A hydrogen written without brackets, a candidate for folding into
    /// its neighbour's implied hydrogens.
    pub fn is_bare_hydrogen(&self) -> bool {
        !self.is_bracket && self.kind.symbol().as_str() == "H"
    }
}

const AROMATIC: &[char] = &['b', 'c', 'n', 'o', 'p', 's'];

pub fn tokenize(input: &str, catalog: &AtomCatalog) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '[' => {
                let (tok, next) = parse_bracket_atom(&chars, i, catalog)?;
                tokens.push(Token::Atom(tok));
                i = next;
            }
            c if c.is_ascii_uppercase() => {
                let (kind, len) = bare_symbol(&chars, i, catalog)?;
                tokens.push(Token::Atom(bare_atom(kind, false, i)));
                i += len;
            }
            c if AROMATIC.contains(&c) => {
                let upper = c.to_ascii_uppercase().to_string();
                let kind = catalog.find(&upper).ok_or_else(|| ParseError::UnknownSymbol {
                    pos: i,
                    text: c.to_string(),
                })?;
                tokens.push(Token::Atom(bare_atom(kind.clone(), true, i)));
                i += 1;
            }
            c @ ('-' | '=' | '#' | '$' | ':') => {
                let order = BondOrder::from_symbol(c).unwrap_or_default();
                tokens.push(Token::Bond { order, pos: i });
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen(i));
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen(i));
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot(i));
                i += 1;
            }
            '%' => {
                let label = parse_percent_label(&chars, i)?;
                let bond = try_consume_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure { bond, label, pos: i });
                i += 3;
            }
            d @ '0'..='9' => {
                let bond = try_consume_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond,
                    label: d as u8 - b'0',
                    pos: i,
                });
                i += 1;
            }
            ch => return Err(ParseError::UnexpectedChar { pos: i, ch }),
        }
    }

    Ok(tokens)
}

fn bare_atom(kind: Arc<AtomKind>, aromatic: bool, pos: usize) -> AtomToken {
    AtomToken {
        kind,
        is_aromatic: aromatic,
        hcount: None,
        charge: 0,
        is_bracket: false,
        pos,
    }
}

/// Two-character symbols win over one-character ones.
fn bare_symbol(
    chars: &[char],
    start: usize,
    catalog: &AtomCatalog,
) -> Result<(Arc<AtomKind>, usize), ParseError> {
    if let Some(&next) = chars.get(start + 1) {
        if next.is_ascii_lowercase() {
            let two: String = chars[start..start + 2].iter().collect();
            if let Some(kind) = catalog.find(&two) {
                return Ok((kind.clone(), 2));
            }
        }
    }
    let one = chars[start].to_string();
    catalog
        .find(&one)
        .map(|kind| (kind.clone(), 1))
        .ok_or(ParseError::UnknownSymbol {
            pos: start,
            text: one,
        })
}

fn try_consume_pending_bond(tokens: &mut Vec<Token>) -> Option<BondOrder> {
    if let Some(Token::Bond { .. }) = tokens.last() {
        if let Some(Token::Bond { order, .. }) = tokens.pop() {
            return Some(order);
        }
    }
    None
}

fn parse_percent_label(chars: &[char], start: usize) -> Result<u8, ParseError> {
    let i = start + 1;
    match (chars.get(i), chars.get(i + 1)) {
        (Some(d1), Some(d2)) if d1.is_ascii_digit() && d2.is_ascii_digit() => {
            Ok((*d1 as u8 - b'0') * 10 + (*d2 as u8 - b'0'))
        }
        _ => Err(ParseError::UnexpectedChar {
            pos: start,
            ch: '%',
        }),
    }
}

fn parse_bracket_atom(
    chars: &[char],
    start: usize,
    catalog: &AtomCatalog,
) -> Result<(AtomToken, usize), ParseError> {
    let mut i = start + 1; // skip '['

    let (kind, is_aromatic) = parse_bracket_symbol(chars, &mut i, start, catalog)?;
    let hcount = parse_hcount(chars, &mut i);
    let charge = parse_charge(chars, &mut i, start)?;

    match chars.get(i) {
        Some(']') => i += 1,
        Some(&ch) if ch != '[' => return Err(ParseError::UnexpectedChar { pos: i, ch }),
        _ => return Err(ParseError::UnclosedBracket { pos: start }),
    }

    Ok((
        AtomToken {
            kind,
            is_aromatic,
            hcount: Some(hcount.unwrap_or(0)),
            charge,
            is_bracket: true,
            pos: start,
        },
        i,
    ))
}

/// Longest `[A-Z][a-z]*` prefix known to the catalog, or an aromatic letter.
fn parse_bracket_symbol(
    chars: &[char],
    i: &mut usize,
    bracket_start: usize,
    catalog: &AtomCatalog,
) -> Result<(Arc<AtomKind>, bool), ParseError> {
    let Some(&first) = chars.get(*i) else {
        return Err(ParseError::UnclosedBracket { pos: bracket_start });
    };

    if AROMATIC.contains(&first) {
        let upper = first.to_ascii_uppercase().to_string();
        if let Some(kind) = catalog.find(&upper) {
            *i += 1;
            return Ok((kind.clone(), true));
        }
    }

    if !first.is_ascii_uppercase() {
        return Err(ParseError::UnexpectedChar { pos: *i, ch: first });
    }

    let mut end = *i + 1;
    while end < chars.len() && chars[end].is_ascii_lowercase() {
        end += 1;
    }
    for len in (1..=end - *i).rev() {
        let text: String = chars[*i..*i + len].iter().collect();
        if let Some(kind) = catalog.find(&text) {
            *i += len;
            return Ok((kind.clone(), false));
        }
    }

    Err(ParseError::UnknownSymbol {
        pos: *i,
        text: chars[*i..end].iter().collect(),
    })
}

fn parse_hcount(chars: &[char], i: &mut usize) -> Option<u8> {
    if chars.get(*i) != Some(&'H') {
        return None;
    }
    *i += 1;
    let mut count: u8 = 0;
    let mut digits = false;
    while let Some(d) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        count = count.saturating_mul(10).saturating_add(*d as u8 - b'0');
        digits = true;
        *i += 1;
    }
    Some(if digits { count } else { 1 })
}

fn parse_charge(chars: &[char], i: &mut usize, bracket_start: usize) -> Result<i8, ParseError> {
    let sign: i8 = match chars.get(*i) {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Ok(0),
    };
    let sign_char = chars[*i];
    *i += 1;

    if chars.get(*i) == Some(&sign_char) {
        let mut count: i8 = sign;
        while chars.get(*i) == Some(&sign_char) {
            count = count
                .checked_add(sign)
                .ok_or(ParseError::InvalidCharge { pos: bracket_start })?;
            *i += 1;
        }
        return Ok(count);
    }

    let mut val: i8 = 0;
    let mut digits = false;
    while let Some(d) = chars.get(*i).filter(|c| c.is_ascii_digit()) {
        val = val
            .checked_mul(10)
            .and_then(|v| v.checked_add(*d as i8 - b'0' as i8))
            .ok_or(ParseError::InvalidCharge { pos: bracket_start })?;
        digits = true;
        *i += 1;
    }
    Ok(if digits { sign * val } else { sign })
}
