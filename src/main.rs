use crate::aircraft::AircraftClass;
use crate::billing::{BillingConsole, BillingLedger, Invoice};
use crate::config::SimulationConfig;
use crate::flight::FlightOutcome;
use crate::tower::tower::{Tower, TowerReport};
use clap::Parser;
use colored::Colorize;
use std::env::var;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tabled::Table;
use tabled::settings::{Alignment, Style};
use tracing::info;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, registry};

mod aircraft;
mod airport;
mod billing;
mod config;
mod flight;
mod limits;
mod radar;
mod signal;
mod time;
mod tower;
mod violation;

#[derive(Parser)]
struct Args {
    /// Path to the JSON scenario file
    #[arg(short, long, value_name = "FILE", default_value = "data/default.json")]
    scenario: PathBuf,

    /// Override the run length, in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Seed for reproducible speed draws
    #[arg(long)]
    seed: Option<u64>,

    /// Compress simulated time by this factor
    #[arg(short, long)]
    time_scale: Option<f64>,

    /// Violation ledger, truncated at startup
    #[arg(short, long, value_name = "FILE", default_value = "avn_log.jsonl")]
    ledger: PathBuf,

    /// Seconds between flight board refreshes, 0 disables the board
    #[arg(short, long, default_value_t = 5)]
    board: u64,

    /// Open the interactive billing console after the run
    #[arg(short, long)]
    console: bool,

    /// End the run as soon as every flight has finished instead of waiting out the timer
    #[arg(short, long)]
    finish_early: bool,
}

fn setup_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let directives = match var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => format!("aircontrolx=info,{}", value),
        _ => "aircontrolx=info".to_owned(),
    };

    registry()
        .with(EnvFilter::builder().parse(directives)?)
        .with(layer().with_thread_names(true))
        .init();
    Ok(())
}

fn print_table<T: tabled::Tabled>(title: &str, rows: &[T]) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.with(Alignment::left());
    println!("{}\n{}", title.bold(), table);
}

fn print_board(tower: &Tower) {
    println!(
        "\n{} ({:?}) {} AVN(s) issued, {} runway(s) in use",
        "Flight board".cyan().bold(),
        tower.state(),
        tower.violations().len(),
        tower.airport().in_use()
    );
    print_table("Aircraft", &tower.flight_board());
    print_table("Runways", &tower.runway_board());
}

/// Prints the board every `every` until the run stops.
fn watch_board(tower: &Tower, every: Duration) {
    let mut last = Instant::now();
    while tower.is_active() {
        thread::sleep(Duration::from_millis(100).min(every));
        if last.elapsed() >= every && tower.is_active() {
            print_board(tower);
            last = Instant::now();
        }
    }
}

/// Stops the run once no flight is active any more.
fn stop_when_landed(tower: &Tower) {
    while tower.is_active() {
        if tower.fleet().iter().all(|aircraft| !aircraft.is_active()) {
            tower.stop();
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn print_report(report: &TowerReport) {
    println!("\n{} after {}", "Run complete".green().bold(), report.elapsed);
    print_table("Final aircraft status", &report.flights);
    print_table("Runways", &report.runways);
    print_table("Runway grants", &report.grants);
    println!("Fines issued: ${}", report.total_fines());

    let cut = report
        .outcomes
        .iter()
        .filter_map(|(id, outcome)| match outcome {
            FlightOutcome::Cut { entered } => Some(format!("{} after {} phase(s)", id, entered)),
            FlightOutcome::Completed => None,
        })
        .collect::<Vec<_>>();
    if !cut.is_empty() {
        println!("{} {}", "Cut short before finishing:".yellow(), cut.join(", "));
    }

    for class in [
        AircraftClass::Emergency,
        AircraftClass::Commercial,
        AircraftClass::Cargo,
    ] {
        match report.mean_wait(class) {
            Some(wait) => println!("  {:<10} mean runway wait {:>8.1} ms", class, wait),
            None => println!("  {:<10} no runway grants", class),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing()?;

    let mut config = SimulationConfig::load_from_file(&args.scenario)?;
    if let Some(secs) = args.duration {
        config.duration_ms = secs.saturating_mul(1000);
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(scale) = args.time_scale {
        config.time_scale = scale;
    }

    println!("{}", "AirControlX: Automated Air Traffic Control".blue().bold());
    println!(
        "Tower online. Loaded {} flights and {} runways from {}",
        config.roster.len(),
        config.runways.len(),
        args.scenario.display()
    );

    let ledger = Arc::new(BillingLedger::create(&args.ledger)?);
    let tower = Tower::new(config)?.with_relay(ledger.clone());

    let report = thread::scope(|s| {
        if args.board > 0 {
            let every = Duration::from_secs(args.board);
            let tower = &tower;
            s.spawn(move || watch_board(tower, every));
        }
        if args.finish_early {
            let tower = &tower;
            s.spawn(move || stop_when_landed(tower));
        }
        tower.run()
    })?;
    print_report(&report);

    info!(path = %ledger.path().display(), "reading violation ledger");
    let invoice = Invoice::new(BillingLedger::read(ledger.path())?);
    invoice.print_summary();

    if args.console {
        let mut console = BillingConsole::new(invoice);
        console.run()?;
        if !console.is_paid() {
            println!("{}", "Invoice left unpaid.".yellow());
        }
    } else if invoice.total() > 0 {
        println!("Processing payment...");
        println!("{}", "Payment successful.".green());
    }
    Ok(())
}
