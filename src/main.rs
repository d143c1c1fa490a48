use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use wire_circuit::assembly::{run_circuit, AssemblyConfig};
use wire_circuit::circuit_ir::{random_circuit, Circuit};
use wire_circuit::resolve::{resolve_all_with, resolve_with, Strategy};

#[derive(Parser)]
#[command(name = "wires", version, about = "Resolve 16-bit logic-gate wire circuits")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the goal wire, then pin the overridden wire to it and resolve again
    Solve {
        input: PathBuf,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long = "override")]
        overridden: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        /// JSON file with goal_wire / overridden_wire / strategy
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the signal on one wire
    Signal {
        input: PathBuf,
        #[arg(long, default_value = "a")]
        wire: String,
        #[arg(long, default_value = "memo")]
        strategy: String,
    },
    /// Print every wire's signal
    Dump {
        input: PathBuf,
        #[arg(long, default_value = "memo")]
        strategy: String,
    },
    /// Print the booklet with rules sorted by destination
    Canon { input: PathBuf },
    /// Print the circuit identity
    Hash { input: PathBuf },
    /// Print a random acyclic booklet
    Random {
        #[arg(long)]
        seed: u64,
        #[arg(long, default_value_t = 32)]
        wires: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    match cli.command {
        Commands::Solve {
            input,
            goal,
            overridden,
            strategy,
            config,
            json,
        } => {
            let mut cfg = match config {
                Some(path) => AssemblyConfig::load(&path)?,
                None => AssemblyConfig::default(),
            };
            if let Some(goal) = goal {
                cfg.goal_wire = goal;
            }
            if let Some(overridden) = overridden {
                cfg.overridden_wire = overridden;
            }
            if let Some(strategy) = strategy {
                cfg.strategy = parse_strategy(&strategy)?;
            }
            cfg.validate()?;
            let circuit = read_circuit(&input)?;
            let report = run_circuit(&circuit, &cfg)
                .with_context(|| format!("assembling {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "signal={} overridden_signal={} goal={} override={} strategy={}",
                    report.signal,
                    report.overridden_signal,
                    report.goal_wire,
                    report.overridden_wire,
                    report.strategy.as_str()
                );
            }
        }
        Commands::Signal {
            input,
            wire,
            strategy,
        } => {
            let strategy = parse_strategy(&strategy)?;
            let circuit = read_circuit(&input)?;
            let value = resolve_with(&circuit.rules, &wire, strategy)?;
            println!("{}", value);
        }
        Commands::Dump { input, strategy } => {
            let strategy = parse_strategy(&strategy)?;
            let circuit = read_circuit(&input)?;
            for (wire, value) in resolve_all_with(&circuit.rules, strategy)? {
                println!("{}: {}", wire, value);
            }
        }
        Commands::Canon { input } => {
            print!("{}", read_circuit(&input)?.canonical_text());
        }
        Commands::Hash { input } => {
            println!("blake3:{}", read_circuit(&input)?.hash());
        }
        Commands::Random { seed, wires } => {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            print!("{}", random_circuit(&mut rng, wires));
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn parse_strategy(name: &str) -> Result<Strategy> {
    Strategy::from_str(name).ok_or_else(|| anyhow!("unknown strategy `{}`", name))
}

fn read_circuit(path: &Path) -> Result<Circuit> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading booklet {}", path.display()))?;
    Circuit::parse(&text).with_context(|| format!("parsing booklet {}", path.display()))
}
