//! Elemental compositions and formula parsing

use std::collections::BTreeMap;
use std::fmt;

use super::Element;
use crate::{Error, Result};

/// Amounts below this are treated as absent.
const AMOUNT_EPS: f64 = 1e-8;

/// Tolerance for deciding that an amount is a whole number.
const INTEGRAL_TOLERANCE: f64 = 1e-6;

/// Elemental gases whose reduced formula keeps the molecular unit (O2, not O).
const DIATOMIC: [&str; 5] = ["H", "N", "O", "F", "Cl"];

/// Elemental amounts of a phase or mixture.
///
/// Amounts are per formula unit as written; [`Composition::reduced`] divides
/// out the common integer factor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    amounts: BTreeMap<Element, f64>,
}

impl Composition {
    /// Parse a chemical formula.
    ///
    /// Accepts integer and decimal subscripts, nested parentheses/brackets and
    /// whitespace between element groups:
    ///
    /// ```rust
    /// use synth_planner::chemistry::Composition;
    ///
    /// let ybco = Composition::parse("Y Ba2 Cu3 O6.5")?;
    /// assert_eq!(ybco.reduced_formula(), "Ba2YCu3O6.5");
    ///
    /// let carbonate = Composition::parse("Y2(CO3)3")?;
    /// assert_eq!(carbonate.reduced_formula(), "Y2C3O9");
    /// # Ok::<(), synth_planner::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormulaParse`] for unknown element symbols, unbalanced
    /// parentheses, malformed numbers or an empty formula.
    pub fn parse(formula: &str) -> Result<Self> {
        let mut parser = FormulaParser {
            formula,
            chars: formula.chars().collect(),
            pos: 0,
        };
        let amounts = parser.parse_group(0)?;
        let composition = Self::from_amounts(amounts);
        if composition.is_empty() {
            return Err(parser.error("formula contains no elements"));
        }
        Ok(composition)
    }

    /// Build a composition from (element, amount) pairs; near-zero amounts are dropped.
    #[must_use]
    pub fn from_amounts(amounts: impl IntoIterator<Item = (Element, f64)>) -> Self {
        let mut composition = Self::default();
        for (element, amount) in amounts {
            *composition.amounts.entry(element).or_insert(0.0) += amount;
        }
        composition.amounts.retain(|_, amount| amount.abs() > AMOUNT_EPS);
        composition
    }

    /// Amount of `element` per formula unit (0 when absent).
    #[must_use]
    pub fn amount(&self, element: Element) -> f64 {
        self.amounts.get(&element).copied().unwrap_or(0.0)
    }

    /// Elements present, in atomic-number order.
    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.amounts.keys().copied()
    }

    /// (element, amount) pairs in atomic-number order.
    pub fn iter(&self) -> impl Iterator<Item = (Element, f64)> + '_ {
        self.amounts.iter().map(|(element, amount)| (*element, *amount))
    }

    /// True when no element is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Atoms per formula unit.
    #[must_use]
    pub fn num_atoms(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Molar mass per formula unit (g/mol).
    #[must_use]
    pub fn molar_mass(&self) -> f64 {
        self.iter()
            .map(|(element, amount)| element.atomic_mass() * amount)
            .sum()
    }

    /// Composition multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_amounts(self.iter().map(|(element, amount)| (element, amount * factor)))
    }

    /// Add `factor` formula units of `other` to this composition.
    pub fn add_scaled(&mut self, other: &Self, factor: f64) {
        for (element, amount) in other.iter() {
            *self.amounts.entry(element).or_insert(0.0) += amount * factor;
        }
        self.amounts.retain(|_, amount| amount.abs() > AMOUNT_EPS);
    }

    /// Reduce to the smallest integral formula unit.
    ///
    /// Returns `(reduced, factor)` with `self == reduced * factor`. Compositions
    /// with non-integral amounts are already reduced (`factor == 1`).
    /// Diatomic elemental gases reduce to the molecule (`O` -> `O2`).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn reduced(&self) -> (Self, f64) {
        if self.amounts.len() == 1 {
            if let Some((element, amount)) = self.iter().next() {
                if DIATOMIC.contains(&element.symbol()) {
                    let factor = amount / 2.0;
                    return (Self::from_amounts([(element, 2.0)]), factor);
                }
            }
        }

        let integral = self
            .amounts
            .values()
            .all(|amount| (amount - amount.round()).abs() < INTEGRAL_TOLERANCE && amount.round() >= 1.0);
        if !integral {
            return (self.clone(), 1.0);
        }

        let divisor = self
            .amounts
            .values()
            .map(|amount| amount.round() as u64)
            .fold(0, gcd);
        if divisor <= 1 {
            return (self.clone(), 1.0);
        }
        let factor = divisor as f64;
        (self.scaled(1.0 / factor), factor)
    }

    /// Reduced formula with electronegativity ordering, e.g. `Ba2YCu3O7`.
    #[must_use]
    pub fn reduced_formula(&self) -> String {
        self.reduced().0.formula()
    }

    /// Formula with amounts as stored (not reduced).
    #[must_use]
    pub fn formula(&self) -> String {
        let mut ordered: Vec<(Element, f64)> = self.iter().collect();
        ordered.sort_by(|(a, _), (b, _)| {
            a.electronegativity()
                .total_cmp(&b.electronegativity())
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        ordered
            .into_iter()
            .map(|(element, amount)| format!("{}{}", element.symbol(), format_amount(amount)))
            .collect()
    }

    /// Element-wise equality within an absolute tolerance.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.amounts
            .keys()
            .chain(other.amounts.keys())
            .all(|element| (self.amount(*element) - other.amount(*element)).abs() <= tolerance)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula())
    }
}

const fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Subscript text: empty for 1, integer for whole numbers, trimmed decimal otherwise.
#[allow(clippy::cast_possible_truncation)]
fn format_amount(amount: f64) -> String {
    if (amount - 1.0).abs() < INTEGRAL_TOLERANCE {
        return String::new();
    }
    if (amount - amount.round()).abs() < INTEGRAL_TOLERANCE {
        return format!("{}", amount.round() as i64);
    }
    let text = format!("{amount:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

struct FormulaParser<'a> {
    formula: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl FormulaParser<'_> {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::FormulaParse {
            formula: self.formula.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_group(&mut self, depth: usize) -> Result<BTreeMap<Element, f64>> {
        let mut amounts: BTreeMap<Element, f64> = BTreeMap::new();

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '(' | '[' => {
                    self.pos += 1;
                    let inner = self.parse_group(depth + 1)?;
                    let close = if c == '(' { ')' } else { ']' };
                    if self.peek() != Some(close) {
                        return Err(self.error(format!("expected '{close}' at position {}", self.pos)));
                    }
                    self.pos += 1;
                    let multiplier = self.parse_number()?.unwrap_or(1.0);
                    for (element, amount) in inner {
                        *amounts.entry(element).or_insert(0.0) += amount * multiplier;
                    }
                }
                ')' | ']' => {
                    if depth == 0 {
                        return Err(self.error(format!("unbalanced '{c}' at position {}", self.pos)));
                    }
                    return Ok(amounts);
                }
                c if c.is_ascii_uppercase() => {
                    let start = self.pos;
                    self.pos += 1;
                    while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
                        self.pos += 1;
                    }
                    let symbol: String = self.chars[start..self.pos].iter().collect();
                    let element = Element::from_symbol(&symbol)
                        .ok_or_else(|| self.error(format!("unknown element '{symbol}'")))?;
                    let amount = self.parse_number()?.unwrap_or(1.0);
                    *amounts.entry(element).or_insert(0.0) += amount;
                }
                other => {
                    return Err(self.error(format!("unexpected character '{other}' at position {}", self.pos)));
                }
            }
        }

        if depth > 0 {
            return Err(self.error("unclosed parenthesis"));
        }
        Ok(amounts)
    }

    fn parse_number(&mut self) -> Result<Option<f64>> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(format!("malformed amount '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(symbol: &str) -> Element {
        Element::from_symbol(symbol).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let comp = Composition::parse("BaCO3").unwrap();
        assert_eq!(comp.amount(el("Ba")), 1.0);
        assert_eq!(comp.amount(el("C")), 1.0);
        assert_eq!(comp.amount(el("O")), 3.0);
        assert_eq!(comp.num_atoms(), 5.0);
    }

    #[test]
    fn test_parse_parentheses_and_spaces() {
        let comp = Composition::parse("Y2(CO3)3").unwrap();
        assert_eq!(comp.amount(el("C")), 3.0);
        assert_eq!(comp.amount(el("O")), 9.0);

        let spaced = Composition::parse("Y Ba2 Cu3 O6.5").unwrap();
        assert_eq!(spaced.amount(el("O")), 6.5);
        assert_eq!(spaced.num_atoms(), 12.5);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Composition::parse("").is_err());
        assert!(Composition::parse("Xq2O").is_err());
        assert!(Composition::parse("Y2(CO3").is_err());
        assert!(Composition::parse("BaO)").is_err());
        assert!(Composition::parse("Ba-O").is_err());
    }

    #[test]
    fn test_reduced_formula_ordering() {
        assert_eq!(Composition::parse("YBa2Cu3O7").unwrap().reduced_formula(), "Ba2YCu3O7");
        assert_eq!(Composition::parse("Ba2Cu2O4").unwrap().reduced_formula(), "BaCuO2");
        assert_eq!(Composition::parse("NH3").unwrap().reduced_formula(), "H3N");
        assert_eq!(Composition::parse("O2").unwrap().reduced_formula(), "O2");
        assert_eq!(Composition::parse("O").unwrap().reduced_formula(), "O2");
        assert_eq!(Composition::parse("CO2").unwrap().reduced_formula(), "CO2");
    }

    #[test]
    fn test_reduced_factor() {
        let (reduced, factor) = Composition::parse("Cu2O2").unwrap().reduced();
        assert_eq!(factor, 2.0);
        assert_eq!(reduced.formula(), "CuO");

        let (same, factor) = Composition::parse("Ba2YCu3O6.5").unwrap().reduced();
        assert_eq!(factor, 1.0);
        assert_eq!(same.formula(), "Ba2YCu3O6.5");
    }

    #[test]
    fn test_molar_mass() {
        let cuo = Composition::parse("CuO").unwrap();
        assert!((cuo.molar_mass() - 79.545).abs() < 1e-3);
    }

    #[test]
    fn test_add_scaled_cancels() {
        let mut mix = Composition::parse("BaO2").unwrap();
        mix.add_scaled(&Composition::parse("BaO").unwrap(), -1.0);
        assert!(mix.approx_eq(&Composition::parse("O").unwrap(), 1e-9));
        assert_eq!(mix.elements().count(), 1);
    }
}
