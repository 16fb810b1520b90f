use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operator waiting for its second operand
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Any other symbol. Evaluates to the second operand unchanged.
    Unrecognized(char),
}

impl Operator {
    /// Map a keypad symbol to an operator.
    ///
    /// Accepts both the ASCII symbols and the typographic ones shown on the
    /// keypad (`×`, `−`, `÷`). Anything else becomes
    /// [`Operator::Unrecognized`]; an empty or multi-character symbol
    /// returns `None`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let mut chars = symbol.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Some(match c {
            '+' => Operator::Add,
            '-' | '−' => Operator::Subtract,
            '*' | '×' => Operator::Multiply,
            '/' | '÷' => Operator::Divide,
            other => Operator::Unrecognized(other),
        })
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
            Operator::Unrecognized(c) => *c,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Evaluate `first <op> second`.
///
/// Division by zero is not guarded and yields IEEE infinity or NaN.
pub fn calculate(first: f64, second: f64, op: Operator) -> f64 {
    match op {
        Operator::Add => first + second,
        Operator::Subtract => first - second,
        Operator::Multiply => first * second,
        Operator::Divide => first / second,
        Operator::Unrecognized(_) => second,
    }
}
