//! # Assembly — the two-step booklet run
//!
//! 1. Resolve the goal wire of the booklet.
//! 2. Pin the overridden wire to that signal, reset everything else and
//!    resolve the goal wire again.
//!
//! Both steps run on independent resolvers, so the second one never sees a
//! cached value from the first.

use crate::circuit_ir::{is_wire_name, Circuit, CircuitHash};
use crate::resolve::{override_signal_with, resolve_with, Strategy};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Which wires the run reads and pins, and how it resolves them.
///
/// Missing fields in a JSON config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub goal_wire: String,
    pub overridden_wire: String,
    pub strategy: Strategy,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        AssemblyConfig {
            goal_wire: "a".into(),
            overridden_wire: "b".into(),
            strategy: Strategy::Memo,
        }
    }
}

impl AssemblyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AssemblyConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            is_wire_name(&self.goal_wire),
            "goal wire `{}` is not a wire name",
            self.goal_wire
        );
        ensure!(
            is_wire_name(&self.overridden_wire),
            "overridden wire `{}` is not a wire name",
            self.overridden_wire
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub circuit_hash: CircuitHash,
    pub rules: usize,
    pub strategy: Strategy,
    pub goal_wire: String,
    pub signal: u16,
    pub overridden_wire: String,
    pub overridden_signal: u16,
}

pub fn run_assembly(text: &str, config: &AssemblyConfig) -> Result<AssemblyReport> {
    config.validate()?;
    let circuit = Circuit::parse(text)?;
    run_circuit(&circuit, config)
}

pub fn run_assembly_file(path: &Path, config: &AssemblyConfig) -> Result<AssemblyReport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading booklet {}", path.display()))?;
    run_assembly(&text, config).with_context(|| format!("assembling {}", path.display()))
}

pub fn run_circuit(circuit: &Circuit, config: &AssemblyConfig) -> Result<AssemblyReport> {
    let circuit_hash = circuit.hash();
    debug!(rules = circuit.rules.len(), hash = %circuit_hash, "booklet loaded");

    let signal = resolve_with(&circuit.rules, &config.goal_wire, config.strategy)
        .with_context(|| format!("resolving wire {}", config.goal_wire))?;
    info!(wire = %config.goal_wire, signal, "baseline signal");

    let overridden_signal = override_signal_with(
        &circuit.rules,
        &config.overridden_wire,
        signal,
        &config.goal_wire,
        config.strategy,
    )
    .with_context(|| {
        format!(
            "resolving wire {} with {} pinned to {}",
            config.goal_wire, config.overridden_wire, signal
        )
    })?;
    info!(
        wire = %config.goal_wire,
        pinned = %config.overridden_wire,
        signal = overridden_signal,
        "overridden signal"
    );

    Ok(AssemblyReport {
        circuit_hash,
        rules: circuit.rules.len(),
        strategy: config.strategy,
        goal_wire: config.goal_wire.clone(),
        signal,
        overridden_wire: config.overridden_wire.clone(),
        overridden_signal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::EvalError;
    use tempfile::tempdir;

    const BOOKLET: &str = "\
lx -> a
NOT k -> b
1 OR c -> lx
k RSHIFT 4 -> c
3000 -> k
";

    #[test]
    fn two_step_run() {
        let report = run_assembly(BOOKLET, &AssemblyConfig::default()).unwrap();
        // k=3000, c=187, lx=187, a=187
        assert_eq!(report.signal, 187);
        // b is unused by a, so pinning it changes nothing
        assert_eq!(report.overridden_signal, 187);
        assert_eq!(report.rules, 5);
        assert_eq!(report.goal_wire, "a");
    }

    #[test]
    fn override_feeds_back_into_goal() {
        let text = "b AND 255 -> a\n300 -> b\n";
        let cfg = AssemblyConfig::default();
        let report = run_assembly(text, &cfg).unwrap();
        assert_eq!(report.signal, 300 & 255);
        assert_eq!(report.overridden_signal, 44);
        let passes = AssemblyConfig {
            strategy: Strategy::Passes,
            ..cfg
        };
        let again = run_assembly(text, &passes).unwrap();
        assert_eq!(again.signal, report.signal);
        assert_eq!(again.overridden_signal, report.overridden_signal);
        assert_eq!(again.circuit_hash, report.circuit_hash);
    }

    #[test]
    fn errors_surface_as_fatal() {
        let err = run_assembly("x -> a\n", &AssemblyConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EvalError>(),
            Some(&EvalError::UndefinedWire("x".into()))
        );
        let err = run_assembly("b -> a\na -> b\n", &AssemblyConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::Unresolvable(_))
        ));
        assert!(run_assembly("a AND -> b", &AssemblyConfig::default()).is_err());
    }

    #[test]
    fn config_file_defaults_and_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"goal_wire":"z"}"#).unwrap();
        let cfg = AssemblyConfig::load(&path).unwrap();
        assert_eq!(cfg.goal_wire, "z");
        assert_eq!(cfg.overridden_wire, "b");
        assert_eq!(cfg.strategy, Strategy::Memo);

        fs::write(&path, r#"{"strategy":"passes","overridden_wire":"Q"}"#).unwrap();
        assert!(AssemblyConfig::load(&path).is_err());
    }

    #[test]
    fn booklet_file_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        fs::write(&path, BOOKLET).unwrap();
        let report = run_assembly_file(&path, &AssemblyConfig::default()).unwrap();
        assert_eq!(report.signal, 187);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "memo");
        assert_eq!(json["overridden_signal"], 187);

        let missing = dir.path().join("missing.txt");
        let err = run_assembly_file(&missing, &AssemblyConfig::default()).unwrap_err();
        assert!(err.to_string().contains("reading booklet"));
    }
}
