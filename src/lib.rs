/*!
# Calculator Application

A browser-based four-function calculator with per-user calculation history,
built in Rust.

## Overview

The calculator is a small input state machine: digits and a decimal point
accumulate into a display string, operators capture a pending operand, and
equals evaluates it. Each completed calculation is recorded to a history store
in the background and the most recent entries are shown next to the keypad.
Access to the calculator is gated behind a sign-in.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript
- **Key Components**:
  - Keypad - Sends each key press to the backend
  - Display - Shows the current display string
  - History Panel - The ten most recent calculations

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Input Accumulator - Digit and decimal entry into the display string
  - Operator State - Pending first operand and operator, with chaining
  - Evaluator - `first <op> second` with IEEE semantics for division by zero
  - History Recorder - Fire-and-forget persistence of completed calculations
  - Auth Gate - Local users with Argon2 hashes and cookie sessions

### Data Persistence Layer
- Users in `database/users.json`
- History per user in `database/<user>/history.json`
- History archives as gzip-compressed bincode (`.bin.gz`) for export/import

## Calculator State Machine

```text
Start --digit/.--> EnteringFirst --op--> AwaitingSecond --digit/.--> EnteringSecond
  ^                                           ^                          |
  |                                           +----------op--------------+
  +--------------------------------=------------------------------------+
```

`C` returns to `Start` from anywhere. The state is an owned value: each key
press goes through [`CalculatorState::reduce`] which returns the next state and,
for `=`, the [`Calculation`] to record.

## Modules

- **calculator**: State machine, actions and transitions
- **evaluator**: Operators and the arithmetic
- **number**: Display parsing and number formatting
- **history**: History entries, stores and the recorder
- **saving**: History archive import/export
- **config**: Server settings
- **login**: User registration, sign-in and session middleware
- **app**: Routing and handlers

## REST API Endpoints

- `/api/state` - Current display, phase and recent history
- `/api/press` - Apply one key press
- `/api/history` - Ten most recent calculations
- `/api/history/export` - Download the full history archive
- `/api/history/import` - Upload a history archive
*/

pub mod calculator;
pub mod config;
pub mod evaluator;
pub mod history;
pub mod number;
pub mod saving;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;

/// Re-export everything from these modules to make it easier to use
pub use calculator::*;
pub use config::*;
pub use evaluator::*;
pub use history::*;
pub use number::*;
pub use saving::*;
