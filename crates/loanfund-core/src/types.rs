use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.08 = 8%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 1.8x on invested capital)
pub type Multiple = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// One period of fund-level cash flow activity, keyed externally by period
/// index (year or month, starting at 0).
///
/// Sign convention: outflows (capital calls, fees, deployments) are negative;
/// inflows (exit proceeds, idle cash income) are positive. The engine treats
/// these records as immutable input and diagnoses convention violations
/// rather than silently correcting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashFlowPeriod {
    /// Net fund-level cash flow for the period (signed)
    pub net_cash_flow: Money,
    /// Capital called from partners this period (negative outflow)
    pub capital_calls: Money,
    /// Origination fees earned on new loans
    pub origination_fees: Money,
    /// Management fees charged (negative outflow)
    pub management_fees: Money,
    /// Capital deployed into loans (negative outflow)
    pub loan_deployments: Money,
    /// Proceeds from loan exits
    pub exit_proceeds: Money,
    /// Income earned on undeployed cash
    pub idle_cash_income: Money,
}

/// An amount split between the General Partner and the Limited Partners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpLpSplit {
    pub gp: Money,
    pub lp: Money,
}

impl GpLpSplit {
    pub fn total(&self) -> Money {
        self.gp + self.lp
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
