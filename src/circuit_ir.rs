//! # Circuit IR — rules and circuits for 16-bit wire networks
//!
//! This module provides the data structures for parsing, printing and
//! hashing wire circuits written in the booklet format: one rule per line,
//! each rule feeding a gate's output into a named wire.
//!
//! ## Example
//!
//! ```rust
//! use wire_circuit::Circuit;
//!
//! let circuit = Circuit::parse(r#"
//!     123 -> x
//!     456 -> y
//!     x AND y -> d
//!     NOT x -> h
//! "#).unwrap();
//!
//! assert_eq!(circuit.signal("d").unwrap(), 72);
//! assert_eq!(circuit.signal("h").unwrap(), 65412);
//! ```

use blake3::Hasher;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as FmtWrite};
use std::str::FromStr;
use thiserror::Error;

/// Hash of a circuit (hex-encoded BLAKE3 of the canonical JSON rule set).
///
/// Rule order and whitespace do not change the hash: two booklets that
/// describe the same wiring have the same identity.
pub type CircuitHash = String;

#[derive(Serialize)]
struct CircuitAtom<'a> {
    kind: &'static str,
    version: u32,
    rules: Vec<&'a Rule>,
}

/// An input to a gate: either a fixed signal or the signal on another wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// A literal 16-bit signal
    Literal(u16),
    /// The signal carried by the named wire
    Wire(String),
}

/// Gate operation types.
///
/// Shift amounts are plain integers and never read from a wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOp {
    /// Direct assignment: `123 -> x` or `y -> x`
    Assign(Operand),
    /// Bitwise AND
    And(Operand, Operand),
    /// Bitwise OR
    Or(Operand, Operand),
    /// Left shift, truncated to 16 bits
    LShift(Operand, u32),
    /// Right shift
    RShift(Operand, u32),
    /// 16-bit complement
    Not(Operand),
}

/// One booklet line: a gate whose output drives `dest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The gate operation
    pub op: GateOp,
    /// Name of the wire receiving the gate's output
    pub dest: String,
}

/// A wire circuit: every rule from the booklet, in the order it was read.
///
/// Rules may reference wires that are only defined further down; the
/// evaluator in [`crate::resolve`] does not need them sorted.
///
/// # Booklet Format
///
/// ```text
/// 123 -> x
/// x AND y -> z
/// p LSHIFT 2 -> q
/// NOT e -> f
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    pub rules: Vec<Rule>,
}

/// Errors that can occur when parsing a booklet.
///
/// Line numbers are 1-based and count blank lines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitParseError {
    /// Input was empty or whitespace-only
    #[error("empty input")]
    Empty,
    /// Line has no `->` separating the gate from its destination
    #[error("line {line}: missing `->` in rule: {text}")]
    MissingArrow { line: usize, text: String },
    /// Token in wire position is not made of lowercase letters
    #[error("line {line}: invalid wire name `{name}`")]
    InvalidWire { line: usize, name: String },
    /// Left-hand side does not match any gate form
    #[error("line {line}: invalid expression: {text}")]
    InvalidExpr { line: usize, text: String },
    /// Numeric literal does not fit its slot
    #[error("line {line}: literal {literal} is out of range")]
    LiteralOutOfRange { line: usize, literal: String },
}

impl Circuit {
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Circuit { rules }
    }

    pub fn parse(text: &str) -> Result<Self, CircuitParseError> {
        if text.trim().is_empty() {
            return Err(CircuitParseError::Empty);
        }
        let mut rules = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            rules.push(parse_rule_line(line, idx + 1)?);
        }
        Ok(Circuit { rules })
    }

    /// Rules sorted by destination, one per line.
    pub fn canonical_text(&self) -> String {
        let mut buf = String::new();
        for rule in self.sorted_rules() {
            writeln!(&mut buf, "{}", rule).unwrap();
        }
        buf
    }

    pub fn hash(&self) -> CircuitHash {
        let atom = CircuitAtom {
            kind: "circuit",
            version: 0,
            rules: self.sorted_rules(),
        };
        let canon = serde_json::to_vec(&atom).expect("circuit canonize");
        let mut hasher = Hasher::new();
        hasher.update(&canon);
        let digest = hasher.finalize();
        hex::encode(digest.as_bytes())
    }

    /// Returns a copy where `wire` is pinned to `value`.
    ///
    /// Every rule writing `wire` is dropped and `value -> wire` is appended.
    /// If nothing wrote `wire` before, the constant rule is simply added.
    pub fn with_override(&self, wire: &str, value: u16) -> Self {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.dest != wire)
            .cloned()
            .collect();
        rules.push(Rule {
            op: GateOp::Assign(Operand::Literal(value)),
            dest: wire.to_string(),
        });
        Circuit { rules }
    }

    /// Names of all driven wires, sorted and deduplicated.
    pub fn wires(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.iter().map(|r| r.dest.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn sorted_rules(&self) -> Vec<&Rule> {
        let mut sorted: Vec<&Rule> = self.rules.iter().collect();
        sorted.sort_by(|a, b| a.dest.cmp(&b.dest).then_with(|| a.op.to_string().cmp(&b.op.to_string())));
        sorted
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

impl GateOp {
    /// Gate inputs in textual order (shift amounts excluded).
    pub fn operands(&self) -> impl Iterator<Item = &Operand> + '_ {
        let (first, second) = match self {
            GateOp::Assign(a) | GateOp::Not(a) | GateOp::LShift(a, _) | GateOp::RShift(a, _) => {
                (a, None)
            }
            GateOp::And(a, b) | GateOp::Or(a, b) => (a, Some(b)),
        };
        std::iter::once(first).chain(second)
    }

    /// Names of the wires this gate reads.
    pub fn wire_inputs(&self) -> impl Iterator<Item = &str> + '_ {
        self.operands().filter_map(|o| match o {
            Operand::Wire(name) => Some(name.as_str()),
            Operand::Literal(_) => None,
        })
    }

    /// Computes the gate output, or `None` while any input is unknown.
    ///
    /// Every result is truncated to 16 bits; shifting by 16 or more yields 0.
    pub fn apply<F>(&self, mut value_of: F) -> Option<u16>
    where
        F: FnMut(&Operand) -> Option<u16>,
    {
        let value = match self {
            GateOp::Assign(a) => value_of(a)?,
            GateOp::And(a, b) => value_of(a)? & value_of(b)?,
            GateOp::Or(a, b) => value_of(a)? | value_of(b)?,
            GateOp::LShift(a, n) => value_of(a)?.checked_shl(*n).unwrap_or(0),
            GateOp::RShift(a, n) => value_of(a)?.checked_shr(*n).unwrap_or(0),
            GateOp::Not(a) => !value_of(a)?,
        };
        Some(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Wire(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOp::Assign(a) => write!(f, "{}", a),
            GateOp::And(a, b) => write!(f, "{} AND {}", a, b),
            GateOp::Or(a, b) => write!(f, "{} OR {}", a, b),
            GateOp::LShift(a, n) => write!(f, "{} LSHIFT {}", a, n),
            GateOp::RShift(a, n) => write!(f, "{} RSHIFT {}", a, n),
            GateOp::Not(a) => write!(f, "NOT {}", a),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.op, self.dest)
    }
}

/// Parses a single rule; errors report it as line 1.
impl FromStr for Rule {
    type Err = CircuitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rule_line(s.trim(), 1)
    }
}

/// True for one or more lowercase ASCII letters.
pub fn is_wire_name(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_lowercase())
}

fn parse_rule_line(line: &str, lineno: usize) -> Result<Rule, CircuitParseError> {
    let (lhs, rhs) = line
        .split_once("->")
        .ok_or_else(|| CircuitParseError::MissingArrow {
            line: lineno,
            text: line.to_string(),
        })?;
    let dest = rhs.trim();
    if !is_wire_name(dest) {
        return Err(CircuitParseError::InvalidWire {
            line: lineno,
            name: dest.to_string(),
        });
    }
    let op = parse_gate_op(lhs.trim(), lineno)?;
    Ok(Rule {
        op,
        dest: dest.to_string(),
    })
}

fn parse_gate_op(text: &str, line: usize) -> Result<GateOp, CircuitParseError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let op = match tokens.as_slice() {
        [a] => GateOp::Assign(parse_operand(a, line)?),
        ["NOT", a] => GateOp::Not(parse_operand(a, line)?),
        [a, "AND", b] => GateOp::And(parse_operand(a, line)?, parse_operand(b, line)?),
        [a, "OR", b] => GateOp::Or(parse_operand(a, line)?, parse_operand(b, line)?),
        [a, "LSHIFT", n] => GateOp::LShift(parse_operand(a, line)?, parse_shift(n, line)?),
        [a, "RSHIFT", n] => GateOp::RShift(parse_operand(a, line)?, parse_shift(n, line)?),
        _ => {
            return Err(CircuitParseError::InvalidExpr {
                line,
                text: text.to_string(),
            })
        }
    };
    Ok(op)
}

fn parse_operand(token: &str, line: usize) -> Result<Operand, CircuitParseError> {
    if is_decimal(token) {
        return u16::from_str(token)
            .map(Operand::Literal)
            .map_err(|_| CircuitParseError::LiteralOutOfRange {
                line,
                literal: token.to_string(),
            });
    }
    if is_wire_name(token) {
        return Ok(Operand::Wire(token.to_string()));
    }
    Err(CircuitParseError::InvalidWire {
        line,
        name: token.to_string(),
    })
}

fn parse_shift(token: &str, line: usize) -> Result<u32, CircuitParseError> {
    if !is_decimal(token) {
        return Err(CircuitParseError::InvalidExpr {
            line,
            text: format!("shift amount `{}` is not an integer", token),
        });
    }
    u32::from_str(token).map_err(|_| CircuitParseError::LiteralOutOfRange {
        line,
        literal: token.to_string(),
    })
}

fn is_decimal(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Bijective base-26 wire name: 0 → `a`, 25 → `z`, 26 → `aa`.
pub fn wire_name(mut idx: usize) -> String {
    let mut rev = Vec::new();
    loop {
        rev.push(b'a' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    rev.iter().rev().map(|&b| b as char).collect()
}

fn random_operand<R: Rng>(rng: &mut R, wire_idx: usize) -> Operand {
    if wire_idx == 0 || rng.gen_bool(0.2) {
        Operand::Literal(rng.gen())
    } else {
        Operand::Wire(wire_name(rng.gen_range(0..wire_idx)))
    }
}

/// Generates an acyclic circuit over `wires` wires, in shuffled order.
///
/// Wire `k` only reads wires named before it, so the circuit always
/// resolves; shuffling makes sure callers cannot rely on rule order.
pub fn random_circuit<R: Rng>(rng: &mut R, wires: usize) -> Circuit {
    let mut rules = Vec::with_capacity(wires);
    for idx in 0..wires {
        let op = if idx == 0 || rng.gen_bool(0.1) {
            GateOp::Assign(Operand::Literal(rng.gen()))
        } else {
            match rng.gen_range(0..6) {
                0 => GateOp::Assign(random_operand(rng, idx)),
                1 => GateOp::And(random_operand(rng, idx), random_operand(rng, idx)),
                2 => GateOp::Or(random_operand(rng, idx), random_operand(rng, idx)),
                3 => GateOp::LShift(random_operand(rng, idx), rng.gen_range(0..16)),
                4 => GateOp::RShift(random_operand(rng, idx), rng.gen_range(0..16)),
                _ => GateOp::Not(random_operand(rng, idx)),
            }
        };
        rules.push(Rule {
            op,
            dest: wire_name(idx),
        });
    }
    rules.shuffle(rng);
    Circuit { rules }
}
