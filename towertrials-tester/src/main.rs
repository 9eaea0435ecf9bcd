mod harness;
mod scenarios;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use harness::{Harness, RunReport, ScenarioReport};
use scenarios::Scenario;

#[derive(Debug, Parser)]
#[command(name = "towertrials-tester", version = "0.1.0")]
#[command(about = "Headless QA harness for Tower Trials client logic")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run each scenario with (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print per-scenario notes
    #[arg(long)]
    verbose: bool,
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_scenarios(input: &str) -> Result<Vec<Scenario>> {
    if input == "all" {
        return Ok(Scenario::ALL.to_vec());
    }
    split_csv(input)
        .iter()
        .map(|name| Scenario::parse(name))
        .collect()
}

fn resolve_seeds(input: &str) -> Result<Vec<u64>> {
    split_csv(input)
        .iter()
        .map(|seed| {
            seed.parse::<u64>()
                .with_context(|| format!("invalid seed '{seed}'"))
        })
        .collect()
}

async fn run_one(scenario: Scenario, seed: u64, verbose: bool) -> ScenarioReport {
    let world = Harness::new(seed);
    let started = Instant::now();
    let outcome = scenario.run(&world).await;
    let duration_ms = started.elapsed().as_millis();
    match outcome {
        Ok(notes) => {
            println!(
                "  {} {} (seed {seed}, {duration_ms}ms)",
                "PASS".green().bold(),
                scenario.name()
            );
            if verbose {
                for note in &notes {
                    println!("       {note}");
                }
            }
            ScenarioReport {
                scenario: scenario.name().to_string(),
                seed,
                passed: true,
                duration_ms,
                notes,
                error: None,
            }
        }
        Err(err) => {
            println!(
                "  {} {} (seed {seed}): {err:#}",
                "FAIL".red().bold(),
                scenario.name()
            );
            ScenarioReport {
                scenario: scenario.name().to_string(),
                seed,
                passed: false,
                duration_ms,
                notes: Vec::new(),
                error: Some(format!("{err:#}")),
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_scenarios {
        println!("{}", "Available scenarios:".bold());
        for scenario in Scenario::ALL {
            println!("  {:<12} {}", scenario.name().cyan(), scenario.describe());
        }
        return Ok(());
    }

    let scenarios = resolve_scenarios(&args.scenarios)?;
    let seeds = resolve_seeds(&args.seeds)?;
    log::info!(
        "resolved {} scenario(s) and {} seed(s)",
        scenarios.len(),
        seeds.len()
    );

    println!(
        "{} {} scenario(s) x {} seed(s)",
        "Running".bold(),
        scenarios.len(),
        seeds.len()
    );

    let mut results = Vec::new();
    for &seed in &seeds {
        for &scenario in &scenarios {
            results.push(run_one(scenario, seed, args.verbose).await);
        }
    }

    let report = RunReport::from_results(results);
    println!(
        "\n{}: {} passed, {} failed",
        "Summary".bold(),
        report.passed.to_string().green(),
        report.failed.to_string().red()
    );

    if let Some(path) = &args.report {
        let file = File::create(path)
            .with_context(|| format!("creating report at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report).context("serializing report")?;
        writer.flush().context("flushing report")?;
        println!("Report written to {}", path.display());
    }

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
