use crate::evaluator::{Operator, calculate};
use crate::number::{format_number, parse_display};
use serde::{Deserialize, Serialize};

/// Where the calculator is in its input cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fresh, cleared, or showing the result of `=`
    Start,
    EnteringFirst,
    /// An operator was just pressed
    AwaitingSecond,
    EnteringSecond,
}

/// A single keypad event
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Digit(char),
    Decimal,
    Operator(Operator),
    Equals,
    Clear,
}

impl Action {
    /// Map a keypad label to an action.
    ///
    /// Digits, `.`, `=`, `C` and operator symbols are accepted. Letters,
    /// whitespace and multi-character labels are not keys.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c {
            '0'..='9' => Some(Action::Digit(c)),
            '.' => Some(Action::Decimal),
            '=' => Some(Action::Equals),
            'C' | 'c' => Some(Action::Clear),
            c if c.is_ascii_punctuation() || "×−÷".contains(c) => {
                Operator::from_symbol(key).map(Action::Operator)
            }
            _ => None,
        }
    }
}

/// A completed `first <op> second` evaluation, ready to be recorded
#[derive(Clone, Debug, PartialEq)]
pub struct Calculation {
    pub expression: String,
    pub result: f64,
}

/// Outcome of applying one action
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: CalculatorState,
    /// Set only when `=` completed an evaluation
    pub calculation: Option<Calculation>,
}

impl From<CalculatorState> for Transition {
    fn from(state: CalculatorState) -> Self {
        Transition {
            state,
            calculation: None,
        }
    }
}

/// Calculator input state.
///
/// Every operation takes `&self` and returns a new value; nothing is mutated
/// in place. The owner of the state applies [`CalculatorState::reduce`] for
/// each event and keeps the returned state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculatorState {
    display: String,
    first_operand: Option<f64>,
    operator: Option<Operator>,
    waiting_for_second_operand: bool,
    phase: Phase,
}

impl Default for CalculatorState {
    fn default() -> Self {
        CalculatorState {
            display: "0".to_string(),
            first_operand: None,
            operator: None,
            waiting_for_second_operand: false,
            phase: Phase::Start,
        }
    }
}

impl CalculatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn first_operand(&self) -> Option<f64> {
        self.first_operand
    }

    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    pub fn is_waiting_for_second_operand(&self) -> bool {
        self.waiting_for_second_operand
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply one action.
    pub fn reduce(&self, action: Action) -> Transition {
        match action {
            Action::Digit(digit) => self.input_digit(digit).into(),
            Action::Decimal => self.input_decimal().into(),
            Action::Operator(op) => self.handle_operator(op).into(),
            Action::Equals => self.perform_calculation(),
            Action::Clear => self.clear().into(),
        }
    }

    pub fn input_digit(&self, digit: char) -> Self {
        if !digit.is_ascii_digit() {
            return self.clone();
        }

        let mut next = self.clone();
        if self.waiting_for_second_operand {
            next.display = digit.to_string();
            next.waiting_for_second_operand = false;
        } else if self.display == "0" {
            next.display = digit.to_string();
        } else {
            next.display.push(digit);
        }
        next.phase = self.entering_phase();
        next
    }

    pub fn input_decimal(&self) -> Self {
        let mut next = self.clone();
        if self.waiting_for_second_operand {
            next.display = "0.".to_string();
            next.waiting_for_second_operand = false;
        } else if !self.display.contains('.') {
            next.display.push('.');
        }
        next.phase = self.entering_phase();
        next
    }

    pub fn clear(&self) -> Self {
        Self::default()
    }

    /// Commit the pending operation (if any) and wait for the next operand.
    pub fn handle_operator(&self, op: Operator) -> Self {
        let input = parse_display(&self.display);
        let mut next = self.clone();

        match (self.first_operand, self.operator) {
            (None, _) => next.first_operand = Some(input),
            (Some(first), Some(pending)) => {
                let result = calculate(first, input, pending);
                next.display = format_number(result);
                next.first_operand = Some(result);
            }
            (Some(_), None) => {}
        }

        next.waiting_for_second_operand = true;
        next.operator = Some(op);
        next.phase = Phase::AwaitingSecond;
        next
    }

    /// `=`: evaluate the pending operation and reset to [`Phase::Start`].
    ///
    /// A no-op unless both a first operand and an operator are pending.
    pub fn perform_calculation(&self) -> Transition {
        let (Some(first), Some(op)) = (self.first_operand, self.operator) else {
            return self.clone().into();
        };

        let second = parse_display(&self.display);
        let result = calculate(first, second, op);
        let expression = format!(
            "{} {} {}",
            format_number(first),
            op,
            format_number(second)
        );

        let state = CalculatorState {
            display: format_number(result),
            first_operand: None,
            operator: None,
            waiting_for_second_operand: false,
            phase: Phase::Start,
        };

        Transition {
            state,
            calculation: Some(Calculation { expression, result }),
        }
    }

    /// Apply a sequence of keypad labels, collecting every completed calculation.
    ///
    /// Labels that are not keys are skipped.
    pub fn press_keys<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> (Self, Vec<Calculation>) {
        let mut state = self.clone();
        let mut calculations = Vec::new();
        for action in keys.into_iter().filter_map(Action::from_key) {
            let transition = state.reduce(action);
            state = transition.state;
            calculations.extend(transition.calculation);
        }
        (state, calculations)
    }

    fn entering_phase(&self) -> Phase {
        match self.phase {
            Phase::Start | Phase::EnteringFirst => Phase::EnteringFirst,
            Phase::AwaitingSecond | Phase::EnteringSecond => Phase::EnteringSecond,
        }
    }
}
