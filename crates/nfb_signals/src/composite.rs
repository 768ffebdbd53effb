use std::collections::HashMap;

use crate::error::SignalError;

/// An arithmetic expression over named derived signals: `+`, `-`, `*`,
/// `/` and parentheses, evaluated fresh every tick against the current
/// value of each referenced signal. Division by zero evaluates to zero
/// rather than propagating NaN/inf, matching how this lineage treats a
/// momentarily-degenerate denominator as "no signal" rather than a fault.
///
/// References may only name signals defined *before* this one in the
/// settings tree; `CompositeSignal::build` resolves names to indices at
/// construction time, which makes a reference cycle structurally
/// impossible (an index can only ever point backward) rather than
/// something checked by walking a graph.
pub struct CompositeSignal {
    pub name: String,
    expr: Expr,
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Signal(usize),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl CompositeSignal {
    /// `known_signals` maps every signal name defined strictly before this
    /// composite to its index into the `values` slice passed to
    /// `evaluate`.
    pub fn build(
        name: impl Into<String>,
        expression: &str,
        known_signals: &HashMap<String, usize>,
    ) -> Result<Self, SignalError> {
        let tokens = tokenize(expression).map_err(SignalError::ParseError)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            known_signals,
        };
        let expr = parser.parse_expr()?;
        if parser.pos != tokens.len() {
            return Err(SignalError::ParseError(format!(
                "unexpected trailing tokens in expression: {}",
                expression
            )));
        }
        Ok(Self {
            name: name.into(),
            expr,
        })
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        eval(&self.expr, values)
    }
}

fn eval(expr: &Expr, values: &[f64]) -> f64 {
    match expr {
        Expr::Number(n) => *n,
        Expr::Signal(i) => values.get(*i).copied().unwrap_or(0.0),
        Expr::Add(a, b) => eval(a, values) + eval(b, values),
        Expr::Sub(a, b) => eval(a, values) - eval(b, values),
        Expr::Mul(a, b) => eval(a, values) * eval(b, values),
        Expr::Div(a, b) => {
            let denom = eval(b, values);
            if denom == 0.0 {
                0.0
            } else {
                eval(a, values) / denom
            }
        }
        Expr::Neg(a) => -eval(a, values),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal: {}", text))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    known_signals: &'a HashMap<String, usize>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, SignalError> {
        let mut node = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    node = Expr::Add(Box::new(node), Box::new(self.parse_term()?));
                }
                Some(Token::Minus) => {
                    self.advance();
                    node = Expr::Sub(Box::new(node), Box::new(self.parse_term()?));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    // term := factor (('*' | '/') factor)*
    fn parse_term(&mut self) -> Result<Expr, SignalError> {
        let mut node = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    node = Expr::Mul(Box::new(node), Box::new(self.parse_factor()?));
                }
                Some(Token::Slash) => {
                    self.advance();
                    node = Expr::Div(Box::new(node), Box::new(self.parse_factor()?));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    // factor := '-' factor | '(' expr ')' | number | ident
    fn parse_factor(&mut self) -> Result<Expr, SignalError> {
        match self.advance() {
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.parse_factor()?))),
            Some(Token::Number(n)) => Ok(Expr::Number(*n)),
            Some(Token::Ident(name)) => {
                let index = self.known_signals.get(name).copied().ok_or_else(|| {
                    SignalError::UnknownReference(String::new(), name.clone())
                })?;
                Ok(Expr::Signal(index))
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(SignalError::ParseError("expected ')'".to_string())),
                }
            }
            other => Err(SignalError::ParseError(format!(
                "unexpected token in expression: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(names: &[&str]) -> HashMap<String, usize> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i))
            .collect()
    }

    #[test]
    fn evaluates_basic_arithmetic() {
        let known = signals(&["A", "B"]);
        let comp = CompositeSignal::build("C", "A + B * 2", &known).unwrap();
        assert_eq!(comp.evaluate(&[1.0, 2.0]), 5.0);
    }

    #[test]
    fn respects_parentheses() {
        let known = signals(&["A", "B"]);
        let comp = CompositeSignal::build("C", "(A + B) * 2", &known).unwrap();
        assert_eq!(comp.evaluate(&[1.0, 2.0]), 6.0);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let known = signals(&["A", "B"]);
        let comp = CompositeSignal::build("C", "A / B", &known).unwrap();
        assert_eq!(comp.evaluate(&[5.0, 0.0]), 0.0);
    }

    #[test]
    fn unknown_reference_is_rejected_at_build_time() {
        let known = signals(&["A"]);
        assert!(CompositeSignal::build("C", "A + Z", &known).is_err());
    }

    #[test]
    fn forward_reference_is_structurally_impossible() {
        // "C" itself is not in `known`, since it only contains signals
        // defined strictly before it — referencing itself fails to parse.
        let known = signals(&["A"]);
        assert!(CompositeSignal::build("C", "C + A", &known).is_err());
    }

    #[test]
    fn aai_with_equal_channels_is_zero_and_double_is_one_third() {
        let known = signals(&["L", "R"]);
        let aai = CompositeSignal::build("AAI", "(L - R) / (L + R)", &known).unwrap();
        assert_eq!(aai.evaluate(&[2.0, 2.0]), 0.0);
        assert!((aai.evaluate(&[2.0, 1.0]) - 1.0 / 3.0).abs() < 1e-12);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The AAI expression never panics or produces NaN/inf for any
            /// finite pair of channel values, since a zero denominator is
            /// defined to evaluate to zero rather than propagating.
            #[test]
            fn aai_never_produces_nan_or_inf(l in -1e6..1e6_f64, r in -1e6..1e6_f64) {
                let known = signals(&["L", "R"]);
                let aai = CompositeSignal::build("AAI", "(L - R) / (L + R)", &known).unwrap();
                prop_assert!(aai.evaluate(&[l, r]).is_finite());
            }

            /// Equal, nonzero inputs always cancel to zero regardless of
            /// magnitude, since only the shared denominator's sign/scale
            /// could otherwise matter.
            #[test]
            fn aai_with_equal_nonzero_channels_is_always_zero(v in 1e-6..1e6_f64) {
                let known = signals(&["L", "R"]);
                let aai = CompositeSignal::build("AAI", "(L - R) / (L + R)", &known).unwrap();
                prop_assert_eq!(aai.evaluate(&[v, v]), 0.0);
            }
        }
    }
}
