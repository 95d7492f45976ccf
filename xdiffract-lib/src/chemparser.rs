//! Chemical formula parsing into element counts.

use std::collections::BTreeMap;

use crate::elements;
use crate::error::{DiffractError, Result};

/// Element symbol to (unnormalized) count, in symbol order.
pub type Counts = BTreeMap<String, f64>;

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, msg: &str) -> DiffractError {
        let formula: String = self.chars.iter().collect();
        DiffractError::InvalidFormula(format!("{formula}: {msg} at position {}", self.pos))
    }

    /// sequence := (group | element)*
    fn sequence(&mut self, depth: usize) -> Result<Counts> {
        let mut counts = Counts::new();
        loop {
            match self.peek() {
                Some('(') => {
                    self.pos += 1;
                    let inner = self.sequence(depth + 1)?;
                    if self.peek() != Some(')') {
                        return Err(self.error("expected closing parenthesis"));
                    }
                    self.pos += 1;
                    let n = self.count()?;
                    for (sym, c) in inner {
                        *counts.entry(sym).or_insert(0.0) += c * n;
                    }
                }
                Some(ch) if ch.is_ascii_uppercase() => {
                    let sym = self.symbol()?;
                    let n = self.count()?;
                    *counts.entry(sym).or_insert(0.0) += n;
                }
                Some(')') if depth > 0 => return Ok(counts),
                None => return Ok(counts),
                Some(ch) => return Err(self.error(&format!("unrecognized character '{ch}'"))),
            }
        }
    }

    fn symbol(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
            self.pos += 1;
        }
        let sym: String = self.chars[start..self.pos].iter().collect();
        match elements::by_symbol(&sym) {
            Some(e) => Ok(e.symbol.to_string()),
            None => Err(DiffractError::InvalidFormula(format!(
                "'{sym}' is not an element symbol"
            ))),
        }
    }

    /// Optional stoichiometry: digits, decimal point, exponent. Defaults to 1.
    fn count(&mut self) -> Result<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(1.0);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let text = if text.starts_with('.') {
            format!("0{text}")
        } else {
            text
        };
        text.parse::<f64>()
            .map_err(|_| self.error(&format!("invalid number '{text}'")))
    }
}

/// Parse a chemical formula into a map of element symbol to count.
///
/// Supports nested parentheses, fractional stoichiometries (`Fe.7Mg.3O`),
/// and scientific notation. `D` is read as hydrogen.
///
/// ```
/// let counts = xdiffract::chemparser::chemparse("H2O").unwrap();
/// assert_eq!(counts["H"], 2.0);
/// assert_eq!(counts["O"], 1.0);
/// ```
pub fn chemparse(formula: &str) -> Result<Counts> {
    let chars: Vec<char> = formula.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser {
        chars: &chars,
        pos: 0,
    };
    let counts = parser.sequence(0)?;
    if parser.pos != chars.len() {
        return Err(parser.error("unexpected token after formula"));
    }
    if counts.is_empty() {
        return Err(DiffractError::InvalidFormula(format!("empty formula: '{formula}'")));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water() {
        let result = chemparse("H2O").unwrap();
        assert_eq!(result["H"], 2.0);
        assert_eq!(result["O"], 1.0);
    }

    #[test]
    fn test_nested_parens() {
        let result = chemparse("Mn(SO4)2(H2O)7").unwrap();
        assert_eq!(result["Mn"], 1.0);
        assert_eq!(result["S"], 2.0);
        assert_eq!(result["O"], 15.0);
        assert_eq!(result["H"], 14.0);
    }

    #[test]
    fn test_scientific_notation() {
        let result = chemparse("Zn1.e-5Fe3O4").unwrap();
        assert!((result["Zn"] - 1e-5).abs() < 1e-10);
        assert_eq!(result["Fe"], 3.0);
        assert_eq!(result["O"], 4.0);
    }

    #[test]
    fn test_co_vs_co() {
        let co = chemparse("CO").unwrap();
        assert_eq!(co["C"], 1.0);
        assert_eq!(co["O"], 1.0);

        let cobalt = chemparse("Co").unwrap();
        assert_eq!(cobalt["Co"], 1.0);
    }

    #[test]
    fn test_decimal_starting_with_dot() {
        let result = chemparse("Fe.7Mg.3O").unwrap();
        assert!((result["Fe"] - 0.7).abs() < 1e-10);
        assert!((result["Mg"] - 0.3).abs() < 1e-10);
        assert_eq!(result["O"], 1.0);
    }

    #[test]
    fn test_protein_like_formula() {
        let result = chemparse("H86 C52 N13 O15 S").unwrap();
        assert_eq!(result["H"], 86.0);
        assert_eq!(result["S"], 1.0);
    }

    #[test]
    fn test_invalid_formula() {
        assert!(chemparse("co").is_err());
        assert!(chemparse("Xx").is_err());
        assert!(chemparse("(H2O").is_err());
        assert!(chemparse("H2O)").is_err());
        assert!(chemparse("").is_err());
    }

    #[test]
    fn test_deuterium() {
        let result = chemparse("D2O").unwrap();
        assert_eq!(result["H"], 2.0);
    }
}
