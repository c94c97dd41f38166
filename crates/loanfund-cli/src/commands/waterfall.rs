use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanfund_core::config::TimeGranularity;
use loanfund_core::waterfall::irr::{self, IrrInput};
use loanfund_core::waterfall::{self, WaterfallInput};

use crate::input;

/// Arguments for a waterfall distribution run
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to JSON input file (cash_flows, config, optional exited_loans)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wf_input: WaterfallInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for waterfall".into());
    };

    let result = waterfall::calculate_waterfall(&wf_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a standalone IRR calculation
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Signed cash flows (comma-separated, e.g. "-100,0,0,150")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Treat the vector as monthly periods (annualises the result)
    #[arg(long)]
    pub monthly: bool,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let cash_flows = args
            .cash_flows
            .ok_or("--cash-flows is required (or provide --input)")?;
        IrrInput {
            cash_flows,
            time_granularity: if args.monthly {
                TimeGranularity::Monthly
            } else {
                TimeGranularity::Annual
            },
        }
    };

    let result = irr::calculate_irr(&irr_input)?;
    Ok(serde_json::to_value(result)?)
}
