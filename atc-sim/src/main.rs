use std::path::PathBuf;
use std::time::Duration;

use atc_sim::{SimConfig, SimError, Simulation};
use avn_protocol::channel::channel;
use avn_protocol::messages::avn_notice::AvnNotice;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use billing::BillingPipeline;
use clap::Parser;
use logger::Logger;

#[derive(Parser)]
#[command(name = "atc-sim")]
#[command(about = "AirControlX control tower simulation", long_about = None)]
struct Args {
    /// INI file with the run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Real seconds to run before shutting down
    #[arg(long)]
    duration: Option<u64>,

    /// Directory for the log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write logs to file only, no console output
    #[arg(long)]
    quiet: bool,
}

fn load_config(args: &Args) -> Result<SimConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load_from(path)?,
        None => SimConfig::default(),
    };

    if let Some(secs) = args.duration {
        if secs == 0 {
            return Err(SimError::InvalidDuration("--duration must be positive".to_string()));
        }
        config.simulation.duration_secs = secs;
    }
    if let Some(dir) = &args.log_dir {
        config.log.directory = dir.clone();
    }
    if args.quiet {
        config.log.console = false;
    }
    Ok(config)
}

fn main() -> Result<(), SimError> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let log_dir = config.log.directory.clone();
    let console = config.log.console;
    let run_time = Duration::from_secs(config.simulation.duration_secs);

    let logger = Logger::new(&log_dir, "atc", console)?;

    let (to_billing, from_core) = channel::<AvnNotice>()?;
    let (to_core, from_billing) = channel::<PaymentConfirmation>()?;
    let billing = BillingPipeline::spawn(&log_dir, console, from_core, to_core)?;

    let sim = Simulation::new(config, logger)?;
    sim.start(to_billing, from_billing)?;
    let stats = sim.run_for(run_time)?;

    // The radar dropped its writer on exit, so every stage drains now
    let summary = billing.join()?;

    println!("\n{}", stats.render());
    println!(
        "Billing: {} billed, {} paid, {} confirmations relayed",
        summary.billed, summary.payments_approved, summary.confirmations_relayed
    );
    Ok(())
}
