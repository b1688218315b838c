use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use plantflow_infra::EngineConfig;

mod scenario;

use scenario::{Report, Scenario};

/// Replay plant scenarios against the in-memory stock core.
#[derive(Debug, Parser)]
#[command(name = "plantflow", version)]
struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level when `RUST_LOG` is unset.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every step of a scenario and print the resulting balances.
    Run(RunArgs),
    /// Load a scenario's master data without running any step.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    scenario: PathBuf,
    /// Stop at the first rejected step.
    #[arg(long)]
    fail_fast: bool,
    /// Permit re-verifying a batch's remaining quantity.
    #[arg(long)]
    allow_reverify: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    scenario: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        plantflow_observability::init_with_default("debug");
    } else {
        plantflow_observability::init();
    }

    match cli.command {
        Commands::Run(args) => handle_run(args, cli.json),
        Commands::Check(args) => handle_check(args, cli.json),
    }
}

fn handle_run(args: RunArgs, json: bool) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let mut config = scenario.config.clone().unwrap_or_else(EngineConfig::from_env);
    config.allow_reverify |= args.allow_reverify;

    let report = scenario::run(&scenario, config, args.fail_fast)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.rejected() > 0 {
        bail!("{} of {} step(s) rejected", report.rejected(), report.steps.len());
    }
    Ok(())
}

fn handle_check(args: CheckArgs, json: bool) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let config = scenario.config.clone().unwrap_or_else(EngineConfig::from_env);
    let catalog = scenario.catalog()?;
    let (store, floor) = scenario::well_known_locations(&catalog, &config)?;

    let summary = serde_json::json!({
        "store": &store.code,
        "production": &floor.code,
        "items": scenario.items.len(),
        "locations": scenario.locations.len(),
        "recipes": scenario.direct_boms.len() + scenario.peetu_boms.len() + scenario.yield_boms.len(),
        "steps": scenario.steps.len(),
    });
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "ok: {} items, {} locations, {} recipes, {} steps (store {}, production {})",
            summary["items"], summary["locations"], summary["recipes"], summary["steps"], store.code, floor.code
        );
    }
    Ok(())
}

fn print_report(report: &Report) {
    for step in &report.steps {
        match &step.error {
            None => println!("#{:<3} {:<24} ok", step.index, step.command),
            Some(err) => println!("#{:<3} {:<24} rejected: {err}", step.index, step.command),
        }
    }

    println!();
    println!("{:<16} {:<16} {:>14}", "ITEM", "LOCATION", "BALANCE");
    for row in &report.balances {
        println!("{:<16} {:<16} {:>14}", row.item, row.location, row.balance);
    }

    println!();
    println!(
        "{} event(s) published, {} command(s) audited",
        report.events_published, report.commands_audited
    );
}
