//! # Resolve — signal evaluation for wire circuits
//!
//! Rules arrive in booklet order, which is not dependency order. Two
//! strategies compute the same fixed point:
//!
//! - [`Strategy::Memo`] walks dependencies depth-first with an explicit work
//!   stack and a memo table, evaluating each wire exactly once.
//! - [`Strategy::Passes`] rescans the pending rules until nothing changes.
//!
//! Every call owns its evaluation state; nothing is cached across calls.

use crate::circuit_ir::{Circuit, GateOp, Operand, Rule};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, trace};

/// Fatal configuration errors found while resolving.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    /// A gate (or the caller) names a wire no rule drives
    #[error("undefined wire `{0}`")]
    UndefinedWire(String),
    /// Wires left without a value: a cycle, listed in dependency order, or
    /// (for passes) every wire still pending when progress stopped
    #[error("unresolvable wires: {}", .0.join(", "))]
    Unresolvable(Vec<String>),
    /// Two rules drive the same wire
    #[error("wire `{0}` is driven by more than one rule")]
    DuplicateDestination(String),
}

/// Evaluation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Depth-first memoised resolution
    #[default]
    Memo,
    /// Repeated scans until a fixed point
    Passes,
}

impl Strategy {
    /// Parse strategy from string name.
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "memo" => Some(Strategy::Memo),
            "passes" => Some(Strategy::Passes),
            _ => None,
        }
    }

    /// Get canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Memo => "memo",
            Strategy::Passes => "passes",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// On the work stack, waiting for inputs
    Pending,
    Resolved(u16),
}

/// Builds the destination index and checks the closed-world rules.
fn index_rules(rules: &[Rule]) -> Result<HashMap<&str, &GateOp>, EvalError> {
    let mut by_dest: HashMap<&str, &GateOp> = HashMap::with_capacity(rules.len());
    for rule in rules {
        if by_dest.insert(rule.dest.as_str(), &rule.op).is_some() {
            return Err(EvalError::DuplicateDestination(rule.dest.clone()));
        }
    }
    for rule in rules {
        if let Some(missing) = rule.op.wire_inputs().find(|w| !by_dest.contains_key(w)) {
            return Err(EvalError::UndefinedWire(missing.to_string()));
        }
    }
    Ok(by_dest)
}

/// Memoising resolver over one rule set.
///
/// A resolver is the state of a single evaluation: build a new one for
/// every independent resolution.
#[derive(Debug)]
pub struct Resolver<'a> {
    rules: HashMap<&'a str, &'a GateOp>,
    slots: HashMap<&'a str, Slot>,
    evaluations: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(rules: &'a [Rule]) -> Result<Self, EvalError> {
        let rules = index_rules(rules)?;
        Ok(Resolver {
            slots: HashMap::with_capacity(rules.len()),
            rules,
            evaluations: 0,
        })
    }

    /// Number of gate evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Resolves `target`, reusing every wire already resolved by this resolver.
    pub fn signal(&mut self, target: &str) -> Result<u16, EvalError> {
        let (&target, _) = self
            .rules
            .get_key_value(target)
            .ok_or_else(|| EvalError::UndefinedWire(target.to_string()))?;

        let mut stack: Vec<&'a str> = vec![target];
        while let Some(&wire) = stack.last() {
            if let Some(Slot::Resolved(_)) = self.slots.get(wire) {
                stack.pop();
                continue;
            }
            let op: &'a GateOp = self
                .rules
                .get(wire)
                .copied()
                .ok_or_else(|| EvalError::UndefinedWire(wire.to_string()))?;
            self.slots.insert(wire, Slot::Pending);

            let mut blocked = None;
            for dep in op.wire_inputs() {
                match self.slots.get(dep) {
                    Some(Slot::Resolved(_)) => {}
                    Some(Slot::Pending) => return Err(cycle_error(dep, &stack)),
                    None => {
                        blocked = Some(dep);
                        break;
                    }
                }
            }
            if let Some(dep) = blocked {
                stack.push(dep);
                continue;
            }

            let slots = &self.slots;
            let value = op
                .apply(|operand| read_slot(slots, operand))
                .ok_or_else(|| EvalError::Unresolvable(vec![wire.to_string()]))?;
            trace!(wire, value, "resolved");
            self.evaluations += 1;
            self.slots.insert(wire, Slot::Resolved(value));
            stack.pop();
        }

        match self.slots.get(target) {
            Some(Slot::Resolved(value)) => Ok(*value),
            _ => Err(EvalError::Unresolvable(vec![target.to_string()])),
        }
    }
}

fn read_slot(slots: &HashMap<&str, Slot>, operand: &Operand) -> Option<u16> {
    match operand {
        Operand::Literal(v) => Some(*v),
        Operand::Wire(name) => match slots.get(name.as_str()) {
            Some(Slot::Resolved(v)) => Some(*v),
            _ => None,
        },
    }
}

/// The stack suffix starting at `dep` is exactly the cycle.
fn cycle_error(dep: &str, stack: &[&str]) -> EvalError {
    let start = stack.iter().position(|w| *w == dep).unwrap_or(0);
    EvalError::Unresolvable(stack[start..].iter().map(|w| w.to_string()).collect())
}

/// Rescans pending rules until `target` (or, with `None`, every wire) is known.
fn resolve_by_passes<'r>(
    rules: &'r [Rule],
    target: Option<&str>,
) -> Result<HashMap<&'r str, u16>, EvalError> {
    let by_dest = index_rules(rules)?;
    if let Some(t) = target {
        if !by_dest.contains_key(t) {
            return Err(EvalError::UndefinedWire(t.to_string()));
        }
    }

    let mut values: HashMap<&'r str, u16> = HashMap::with_capacity(rules.len());
    let mut pending: Vec<&'r Rule> = rules.iter().collect();
    let mut passes = 0usize;
    while !pending.is_empty() {
        if target.map_or(false, |t| values.contains_key(t)) {
            break;
        }
        passes += 1;
        let before = pending.len();
        pending.retain(|&rule: &&'r Rule| {
            let ready = rule.op.apply(|operand| match operand {
                Operand::Literal(v) => Some(*v),
                Operand::Wire(name) => values.get(name.as_str()).copied(),
            });
            match ready {
                Some(value) => {
                    values.insert(rule.dest.as_str(), value);
                    false
                }
                None => true,
            }
        });
        if pending.len() == before {
            let mut stuck: Vec<String> = pending.iter().map(|r| r.dest.clone()).collect();
            stuck.sort();
            return Err(EvalError::Unresolvable(stuck));
        }
    }
    debug!(passes, resolved = values.len(), "fixed point reached");
    Ok(values)
}

/// Resolves `target` with the default memoised strategy.
pub fn resolve(rules: &[Rule], target: &str) -> Result<u16, EvalError> {
    resolve_with(rules, target, Strategy::Memo)
}

pub fn resolve_with(rules: &[Rule], target: &str, strategy: Strategy) -> Result<u16, EvalError> {
    debug!(wire = target, rules = rules.len(), strategy = strategy.as_str(), "resolving");
    match strategy {
        Strategy::Memo => {
            let mut resolver = Resolver::new(rules)?;
            let value = resolver.signal(target)?;
            debug!(wire = target, value, evaluations = resolver.evaluations(), "resolved");
            Ok(value)
        }
        Strategy::Passes => {
            let values = resolve_by_passes(rules, Some(target))?;
            values
                .get(target)
                .copied()
                .ok_or_else(|| EvalError::Unresolvable(vec![target.to_string()]))
        }
    }
}

/// Pins `wire` to `value`, then resolves `target` from scratch.
pub fn override_signal(
    rules: &[Rule],
    wire: &str,
    value: u16,
    target: &str,
) -> Result<u16, EvalError> {
    override_signal_with(rules, wire, value, target, Strategy::Memo)
}

pub fn override_signal_with(
    rules: &[Rule],
    wire: &str,
    value: u16,
    target: &str,
    strategy: Strategy,
) -> Result<u16, EvalError> {
    let patched = Circuit::from_rules(rules.to_vec()).with_override(wire, value);
    debug!(wire, value, goal = target, "override");
    resolve_with(&patched.rules, target, strategy)
}

/// Resolves every driven wire.
pub fn resolve_all(rules: &[Rule]) -> Result<BTreeMap<String, u16>, EvalError> {
    resolve_all_with(rules, Strategy::Memo)
}

pub fn resolve_all_with(
    rules: &[Rule],
    strategy: Strategy,
) -> Result<BTreeMap<String, u16>, EvalError> {
    match strategy {
        Strategy::Memo => {
            let mut resolver = Resolver::new(rules)?;
            let mut out = BTreeMap::new();
            for rule in rules {
                let value = resolver.signal(&rule.dest)?;
                out.insert(rule.dest.clone(), value);
            }
            Ok(out)
        }
        Strategy::Passes => Ok(resolve_by_passes(rules, None)?
            .into_iter()
            .map(|(wire, value)| (wire.to_string(), value))
            .collect()),
    }
}

impl Circuit {
    /// Resolves one wire of this circuit.
    pub fn signal(&self, target: &str) -> Result<u16, EvalError> {
        resolve(&self.rules, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_ir::random_circuit;
    use rand::SeedableRng;

    const SAMPLE: &str = "123 -> x\n456 -> y\nx AND y -> d\nx OR y -> e\nx LSHIFT 2 -> f\ny RSHIFT 2 -> g\nNOT x -> h\nNOT y -> i\n";

    fn rules(text: &str) -> Vec<Rule> {
        Circuit::parse(text).unwrap().rules
    }

    #[test]
    fn direct_assignment() {
        assert_eq!(resolve(&rules("123 -> x"), "x"), Ok(123));
    }

    #[test]
    fn sample_circuit_signals() {
        let r = rules(SAMPLE);
        let expected: [(&str, u16); 8] = [
            ("d", 72),
            ("e", 507),
            ("f", 492),
            ("g", 114),
            ("h", 65412),
            ("i", 65079),
            ("x", 123),
            ("y", 456),
        ];
        for strategy in [Strategy::Memo, Strategy::Passes] {
            for (wire, value) in expected {
                assert_eq!(resolve_with(&r, wire, strategy), Ok(value), "{wire} via {strategy:?}");
            }
        }
    }

    #[test]
    fn order_does_not_matter() {
        let mut r = rules(SAMPLE);
        r.reverse();
        assert_eq!(resolve(&r, "d"), Ok(72));
        assert_eq!(resolve_with(&r, "i", Strategy::Passes), Ok(65079));
    }

    #[test]
    fn repeated_resolution_is_idempotent() {
        let r = rules("b -> a\nNOT c -> b\n17 LSHIFT 3 -> c\n");
        let first = resolve(&r, "a").unwrap();
        let second = resolve(&r, "a").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, !(17u16 << 3));
    }

    #[test]
    fn each_wire_evaluated_once() {
        let r = rules(SAMPLE);
        let mut resolver = Resolver::new(&r).unwrap();
        for rule in &r {
            resolver.signal(&rule.dest).unwrap();
        }
        resolver.signal("d").unwrap();
        assert_eq!(resolver.evaluations(), 8);
    }

    #[test]
    fn resolve_all_lists_every_wire() {
        let r = rules(SAMPLE);
        let all = resolve_all(&r).unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all["h"], 65412);
        assert_eq!(resolve_all_with(&r, Strategy::Passes).unwrap(), all);
    }

    #[test]
    fn override_matches_manual_surgery() {
        let text = "a AND b -> c\n5 -> b\nb LSHIFT 1 -> d\nd OR 1 -> a\n";
        let r = rules(text);
        assert_eq!(resolve(&r, "c"), Ok(5 & 11));
        let manual = rules("a AND b -> c\n9 -> b\nb LSHIFT 1 -> d\nd OR 1 -> a\n");
        assert_eq!(override_signal(&r, "b", 9, "c"), resolve(&manual, "c"));
        assert_eq!(
            override_signal_with(&r, "b", 9, "c", Strategy::Passes),
            Ok(9 & 19)
        );
    }

    #[test]
    fn override_feeds_previous_answer_back() {
        let r = rules("b -> a\nx AND 255 -> b\n1000 -> x\n");
        let signal = resolve(&r, "a").unwrap();
        assert_eq!(signal, 1000 & 255);
        let again = override_signal(&r, "b", signal + 1, "a").unwrap();
        assert_eq!(again, signal + 1);
    }

    #[test]
    fn undefined_wire_is_fatal() {
        let r = rules("x AND q -> z\n1 -> x\n");
        assert_eq!(resolve(&r, "z"), Err(EvalError::UndefinedWire("q".into())));
        assert_eq!(
            resolve_with(&r, "z", Strategy::Passes),
            Err(EvalError::UndefinedWire("q".into()))
        );
        let ok = rules("1 -> x\n");
        assert_eq!(resolve(&ok, "nope"), Err(EvalError::UndefinedWire("nope".into())));
    }

    #[test]
    fn cycle_is_reported_not_looped() {
        let r = rules("b -> a\na -> b\n");
        assert_eq!(
            resolve(&r, "a"),
            Err(EvalError::Unresolvable(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            resolve_with(&r, "a", Strategy::Passes),
            Err(EvalError::Unresolvable(vec!["a".into(), "b".into()]))
        );
        let self_loop = rules("x OR 1 -> x\n");
        assert_eq!(
            resolve(&self_loop, "x"),
            Err(EvalError::Unresolvable(vec!["x".into()]))
        );
    }

    #[test]
    fn cycle_behind_resolved_prefix() {
        let r = rules("1 -> p\np AND c -> a\nc -> b\nb OR p -> c\n");
        match resolve(&r, "a") {
            Err(EvalError::Unresolvable(wires)) => assert_eq!(wires, vec!["c", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_destination_rejected() {
        let r = rules("1 -> x\n2 -> x\n");
        assert_eq!(resolve(&r, "x"), Err(EvalError::DuplicateDestination("x".into())));
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let names: Vec<String> = (0..20_000).map(crate::circuit_ir::wire_name).collect();
        let mut text = String::new();
        text.push_str(&format!("1 -> {}\n", names[0]));
        for pair in names.windows(2).rev() {
            text.push_str(&format!("{} LSHIFT 1 -> {}\n", pair[0], pair[1]));
        }
        let r = rules(&text);
        assert_eq!(resolve(&r, names.last().unwrap()), Ok(0));
        assert_eq!(resolve(&r, &names[15]), Ok(1 << 15));
    }

    #[test]
    fn strategies_agree_on_random_circuits() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(7);
        for _ in 0..25 {
            let circuit = random_circuit(&mut rng, 60);
            let memo = resolve_all(&circuit.rules).unwrap();
            let passes = resolve_all_with(&circuit.rules, Strategy::Passes).unwrap();
            assert_eq!(memo, passes, "circuit:\n{}", circuit);
        }
    }

    #[test]
    fn random_override_equals_rebuilt_circuit() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(2015);
        for _ in 0..25 {
            let circuit = random_circuit(&mut rng, 30);
            let a = circuit.signal("a").unwrap();
            let rebuilt = Circuit::parse(&circuit.with_override("b", a).canonical_text()).unwrap();
            assert_eq!(
                override_signal(&circuit.rules, "b", a, "a"),
                rebuilt.signal("a")
            );
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(Strategy::from_str("memo"), Some(Strategy::Memo));
        assert_eq!(Strategy::from_str("passes"), Some(Strategy::Passes));
        assert_eq!(Strategy::from_str("fast"), None);
        assert_eq!(Strategy::Passes.as_str(), "passes");
    }
}
