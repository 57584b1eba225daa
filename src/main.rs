use hpi::policy_iteration::HeuristicPolicyIteration;
use hpi::problems::dec_tiger;
use hpi::SolverConfig;
use clap::Parser;
use serde_json::json;
use std::error::Error;
use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "hpi")]
#[command(version, about = "Solves Dec-Tiger by heuristic policy iteration and prints the report and controllers as JSON")]
struct Cli {
    /// JSON solver configuration, the benchmark settings when omitted
    config: Option<PathBuf>,

    /// Also write one graphviz file per agent controller
    #[arg(long)]
    dot: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging()?;
    let config = match cli.config.as_ref() {
        Some(path) => {
            let mut config = SolverConfig::from_path(path)?;
            if config.initial_policies.is_none() {
                config.initial_policies = Some(dec_tiger::initial_policies());
            }
            config
        }
        None => dec_tiger::config(),
    };

    let model = dec_tiger::dec_tiger()?;
    let mut solver = HeuristicPolicyIteration::new(model, config)?;
    let report = solver.solve_with_report()?;

    let controllers: Vec<_> = solver.model().agents().iter().map(|agent| agent.snapshot()).collect();
    let output = json!({
        "report": report,
        "controllers": controllers,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.dot {
        for agent in solver.model().agents() {
            let mut file = File::create(format!("{}.dot", agent.name()))?;
            file.write_all(agent.to_dot().as_bytes())?;
        }
    }
    Ok(())
}
