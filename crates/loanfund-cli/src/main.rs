mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::waterfall::{IrrArgs, WaterfallArgs};

/// Loan fund waterfall and return calculations
#[derive(Parser)]
#[command(
    name = "lfa",
    version,
    about = "Loan fund waterfall and return calculations",
    long_about = "A CLI for closed-end loan fund economics with decimal precision. \
                  Distributes fund-level cash flows between GP and LP through a \
                  configurable waterfall (European or American) and computes \
                  money-weighted returns."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a waterfall distribution over a fund cash-flow series
    Waterfall(WaterfallArgs),
    /// Calculate IRR for a cash-flow vector (with fallback strategies)
    Irr(IrrArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Irr(args) => commands::waterfall::run_irr(args),
        Commands::Version => {
            println!("lfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
