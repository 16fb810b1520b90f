use rusty_calculator::calculator::{Action, CalculatorState, Phase};
use rusty_calculator::evaluator::Operator;

// Helper: press every character of `keys` from a fresh calculator
fn press(keys: &str) -> CalculatorState {
    let labels: Vec<String> = keys.chars().map(|c| c.to_string()).collect();
    CalculatorState::new()
        .press_keys(labels.iter().map(String::as_str))
        .0
}

fn assert_display(keys: &str, expected: &str) {
    let state = press(keys);
    assert_eq!(state.display(), expected, "keys {:?}", keys);
    println!("✓ {:<10} shows {}", keys, expected);
}

fn test_digit_entry() {
    println!("\n====== Testing digit entry ======");
    assert_display("123", "123");
    assert_display("005", "5");
    assert_display("0", "0");
}

fn test_decimal_entry() {
    println!("\n====== Testing decimal entry ======");
    assert_display(".", "0.");
    assert_display("..", "0.");
    assert_display("3..", "3.");
    assert_display("1.25", "1.25");
}

fn test_operator_chaining() {
    println!("\n====== Testing operator chaining ======");
    assert_display("5+3+", "8");
    assert_display("5+3+2=", "10");
    assert_display("9-4*3=", "15");
    assert_display("8/2/2=", "2");
}

fn test_division_by_zero() {
    println!("\n====== Testing division by zero ======");
    assert_display("5/0=", "Infinity");
    assert_display("0/0=", "NaN");

    // Still usable afterwards
    let state = press("5/0=C7");
    assert_eq!(state.display(), "7");
    println!("✓ Calculator recovers after clear");
}

fn test_phases() {
    println!("\n====== Testing phases ======");
    let mut state = CalculatorState::new();
    let steps = [
        (Action::Digit('6'), Phase::EnteringFirst),
        (Action::Operator(Operator::Subtract), Phase::AwaitingSecond),
        (Action::Digit('1'), Phase::EnteringSecond),
        (Action::Equals, Phase::Start),
    ];
    for (action, phase) in steps {
        state = state.reduce(action).state;
        assert_eq!(state.phase(), phase);
        println!("✓ {:?} -> {:?}", action, phase);
    }
    assert_eq!(state.display(), "5");
}

pub fn run_tests() {
    println!("Starting calculator walkthrough");
    test_digit_entry();
    test_decimal_entry();
    test_operator_chaining();
    test_division_by_zero();
    test_phases();
    println!("All tests passed!");
}

fn main() {
    run_tests();
}
