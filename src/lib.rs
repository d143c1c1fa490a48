//! # wire_circuit
//!
//! **16-bit logic-gate circuits from a text booklet**
//!
//! Each booklet line wires a gate's output into a named wire. Rules can
//! appear in any order; the evaluator works out the dependency order itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use wire_circuit::{override_signal, resolve, Circuit};
//!
//! let circuit = Circuit::parse(r#"
//!     b AND 255 -> a
//!     x LSHIFT 2 -> b
//!     123 -> x
//! "#).unwrap();
//!
//! let a = resolve(&circuit.rules, "a").unwrap();
//! assert_eq!(a, (123 << 2) & 255);
//!
//! // pin b to the answer and recompute from scratch
//! let again = override_signal(&circuit.rules, "b", a, "a").unwrap();
//! assert_eq!(again, a & 255);
//!
//! println!("Circuit identity: blake3:{}", circuit.hash());
//! ```
//!
//! ## Key Concepts
//!
//! - **Wire**: a lowercase name carrying a `u16` signal
//! - **Rule**: one gate (assign, AND, OR, LSHIFT, RSHIFT, NOT) driving one wire
//! - **Resolve**: memoised evaluation of a wire and everything it reads
//! - **Override**: pin a wire to a constant and resolve again from scratch

pub mod assembly;
pub mod circuit_ir;
pub mod resolve;

pub use circuit_ir::{Circuit, CircuitHash, CircuitParseError, GateOp, Operand, Rule};
pub use resolve::{override_signal, resolve, resolve_all, EvalError, Strategy};
