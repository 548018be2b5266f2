//! snailio command-line tool
//!
//! Runs the demo programs on top of the cooperative scheduler.

mod commands;
mod config;
mod logger;

use clap::{ArgAction, Parser, Subcommand};
use commands::demo::{self, DemoArgs};
use config::CliConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snailio")]
#[command(about = "Single-threaded cooperative task scheduler", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Scheduler configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two workers on one loop, optionally timing one of them out
    Demo {
        /// Timeout in seconds for the `timepass` task
        #[arg(long)]
        timeout: Option<f64>,
        /// Seconds `timepass` blocks the loop before each sleep
        #[arg(long, default_value_t = 0.0)]
        work_secs: f64,
        /// Seconds `timepass` sleeps between prints
        #[arg(long, default_value_t = 1.0)]
        sleep_secs: f64,
        /// Print scheduler statistics after the run
        #[arg(long)]
        stats: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if logger::init(cli.verbose).is_err() {
        eprintln!("warning: logger already installed");
    }

    let config = CliConfig::load_optional(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo {
            timeout,
            work_secs,
            sleep_secs,
            stats,
        } => {
            let args = DemoArgs {
                timeout: timeout.map(|t| demo::secs(t, "--timeout")).transpose()?,
                work: demo::secs(work_secs, "--work-secs")?,
                sleep: demo::secs(sleep_secs, "--sleep-secs")?,
            };
            let out: demo::Output = Arc::new(|line: &str| println!("{}", line));
            let report = demo::execute(&args, config.scheduler_config(), out)?;

            if stats {
                let s = &report.stats;
                match report.timepass {
                    Some(outcome) => println!("timepass:        {:?}", outcome),
                    None => println!("timepass:        unfinished"),
                }
                println!("tasks spawned:   {}", s.tasks_spawned);
                println!("tasks completed: {}", s.tasks_completed);
                println!("tasks cancelled: {}", s.tasks_cancelled);
                println!("tasks timed out: {}", s.tasks_timed_out);
                println!("cycles:          {}", s.cycles);
                println!("resumptions:     {}", s.resumptions);
            }
        }
    }

    Ok(())
}
