//! Waterfall distribution and capital-structure settlement engine.
//!
//! Takes a time-ordered stream of fund-level net cash flows plus contractual
//! parameters (hurdle, carry, catch-up, compounding, commitment split) and
//! produces the period-by-period split of capital return, preferred return,
//! catch-up and carried interest between GP and LP, with resulting IRRs.
//!
//! The engine is a pure function of its inputs: all accumulators are local
//! to the call, so concurrent invocations never observe each other's state.

pub mod american;
pub mod european;
pub mod irr;
pub mod loans;
pub mod params;
pub mod preferred;

use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{FundConfig, WaterfallStructure};
use crate::error::LoanFundError;
use crate::types::{
    with_metadata, CashFlowPeriod, ComputationOutput, GpLpSplit, Money, Multiple, Rate,
};
use crate::LoanFundResult;

use loans::{ExitedLoan, LoanContribution};
use params::CapitalContributions;
use preferred::PreferredReturnState;

/// Input for a full waterfall computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    /// Cash-flow series keyed by period index (year or month, from 0)
    pub cash_flows: BTreeMap<u32, CashFlowPeriod>,
    /// Loose fund configuration; missing fields take documented defaults
    #[serde(default)]
    pub config: FundConfig,
    /// Exited-loan records per period, for the optional loan correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_loans: Option<BTreeMap<u32, Vec<ExitedLoan>>>,
}

/// Tier allocations for one period of the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBreakdown {
    pub period: u32,
    pub return_of_capital: GpLpSplit,
    pub preferred_return: GpLpSplit,
    pub catch_up: GpLpSplit,
    pub carried_interest: GpLpSplit,
    pub total_gp: Money,
    pub total_lp: Money,
    pub cumulative_gp: Money,
    pub cumulative_lp: Money,
}

/// Tier totals and breakdown produced by one distributor pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub return_of_capital: GpLpSplit,
    pub preferred_return: GpLpSplit,
    pub catch_up: GpLpSplit,
    pub carried_interest: GpLpSplit,
    pub total_gp_distribution: Money,
    pub total_lp_distribution: Money,
    pub breakdown: Vec<PeriodBreakdown>,
}

/// Consolidated waterfall result. Constructed fresh per invocation; a new
/// computation always starts from the raw cash-flow series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub structure: WaterfallStructure,
    pub capital_contributions: CapitalContributions,
    pub return_of_capital: GpLpSplit,
    pub preferred_return: GpLpSplit,
    pub catch_up: GpLpSplit,
    pub carried_interest: GpLpSplit,
    pub total_gp_distribution: Money,
    pub total_lp_distribution: Money,
    pub gp_multiple: Multiple,
    pub lp_multiple: Multiple,
    /// Per-period tier breakdown with running cumulative totals
    pub yearly_breakdown: Vec<PeriodBreakdown>,
    /// Preferred-return accrual schedule (European structure only)
    pub preferred_schedule: Vec<PreferredReturnState>,
    /// LP capital never returned by the end of the series
    pub unreturned_lp_capital: Money,
    /// Preferred return accrued but never paid by the end of the series
    pub unpaid_preferred: Money,
    /// Partner cash-flow vectors: index 0 = negative contribution,
    /// subsequent entries = per-period distributions
    pub gp_cash_flows: Vec<Money>,
    pub lp_cash_flows: Vec<Money>,
    pub gp_irr: Rate,
    pub lp_irr: Rate,
    /// IRR as of each period window (entry 0 = 0.0 by convention)
    pub gp_irr_by_period: Vec<Rate>,
    pub lp_irr_by_period: Vec<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_contributions: Option<BTreeMap<u32, Vec<LoanContribution>>>,
}

/// Total cash available for distribution: the sum of positive net cash
/// flows across the series.
pub(crate) fn distributable_cash(cash_flows: &BTreeMap<u32, CashFlowPeriod>) -> Money {
    cash_flows
        .values()
        .map(|f| f.net_cash_flow.max(Decimal::ZERO))
        .sum()
}

/// Management-fee offset applied against GP carried interest. Fees come from
/// the cash-flow series (recorded as negative outflows); a series with no
/// recorded fees falls back to `fund_size × fee_rate × fund_term`.
pub(crate) fn management_fee_offset(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &params::WaterfallParams,
) -> Money {
    if params.management_fee_offset_pct <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut total_fees: Money = cash_flows
        .values()
        .map(|f| f.management_fees.abs())
        .sum();
    if total_fees.is_zero() {
        total_fees =
            params.fund_size * params.management_fee_rate * Decimal::from(params.fund_term);
    }

    total_fees * params.management_fee_offset_pct
}

fn partner_multiple(
    distribution: Money,
    contribution: Money,
    label: &str,
    warnings: &mut Vec<String>,
) -> Multiple {
    if contribution.is_zero() {
        warnings.push(format!(
            "{label} contribution is zero; multiple reported as 0"
        ));
        Decimal::ZERO
    } else {
        distribution / contribution
    }
}

/// Run the full waterfall: normalise parameters, derive contributions,
/// dispatch to the European or American distributor, then compute partner
/// cash-flow vectors, IRRs, multiples and optional loan contributions.
pub fn calculate_waterfall(
    input: &WaterfallInput,
) -> LoanFundResult<ComputationOutput<WaterfallResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.cash_flows.is_empty() {
        return Err(LoanFundError::InvalidInput {
            field: "cash_flows".into(),
            reason: "At least one cash-flow period is required".into(),
        });
    }

    let params = params::normalize_params(&input.config);
    let contributions = params::capital_contributions(&input.cash_flows, &params, &mut warnings);

    let (distribution, preferred_schedule) = match params.structure {
        WaterfallStructure::European => {
            let schedule = preferred::accrue_preferred(
                &input.cash_flows,
                &params,
                contributions.lp_contribution,
                &mut warnings,
            );
            let dist = european::distribute(
                &input.cash_flows,
                &params,
                &contributions,
                &schedule,
                &mut warnings,
            )?;
            (dist, schedule)
        }
        WaterfallStructure::American => (
            american::distribute(&input.cash_flows, &params, &mut warnings)?,
            Vec::new(),
        ),
    };

    let mut gp_cash_flows = Vec::with_capacity(distribution.breakdown.len() + 1);
    let mut lp_cash_flows = Vec::with_capacity(distribution.breakdown.len() + 1);
    gp_cash_flows.push(-contributions.gp_contribution);
    lp_cash_flows.push(-contributions.lp_contribution);
    for entry in &distribution.breakdown {
        gp_cash_flows.push(entry.total_gp);
        lp_cash_flows.push(entry.total_lp);
    }

    let gp_irr = irr::partner_irr(&gp_cash_flows, params.granularity, "GP", &mut warnings);
    let lp_irr = irr::partner_irr(&lp_cash_flows, params.granularity, "LP", &mut warnings);
    let gp_irr_by_period =
        irr::irr_by_window(&gp_cash_flows, params.granularity, "GP", &mut warnings);
    let lp_irr_by_period =
        irr::irr_by_window(&lp_cash_flows, params.granularity, "LP", &mut warnings);

    let gp_multiple = partner_multiple(
        distribution.total_gp_distribution,
        contributions.gp_contribution,
        "GP",
        &mut warnings,
    );
    let lp_multiple = partner_multiple(
        distribution.total_lp_distribution,
        contributions.lp_contribution,
        "LP",
        &mut warnings,
    );

    let loan_contributions = input
        .exited_loans
        .as_ref()
        .map(|exits| loans::correlate_loans(exits, &distribution.breakdown));

    let (unreturned_lp_capital, unpaid_preferred) = preferred_schedule
        .last()
        .map(|s| (s.remaining_lp_capital, s.accrued_unpaid))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    let result = WaterfallResult {
        structure: params.structure,
        capital_contributions: contributions,
        return_of_capital: distribution.return_of_capital,
        preferred_return: distribution.preferred_return,
        catch_up: distribution.catch_up,
        carried_interest: distribution.carried_interest,
        total_gp_distribution: distribution.total_gp_distribution,
        total_lp_distribution: distribution.total_lp_distribution,
        gp_multiple,
        lp_multiple,
        yearly_breakdown: distribution.breakdown,
        preferred_schedule,
        unreturned_lp_capital,
        unpaid_preferred,
        gp_cash_flows,
        lp_cash_flows,
        gp_irr,
        lp_irr,
        gp_irr_by_period,
        lp_irr_by_period,
        loan_contributions,
    };

    let methodology = match params.structure {
        WaterfallStructure::European => "Fund-Level Waterfall Distribution (European)",
        WaterfallStructure::American => "Deal-by-Deal Waterfall Distribution (American)",
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "structure": params.structure,
            "hurdle_rate": params.hurdle_rate.to_string(),
            "carried_interest_rate": params.carried_interest_rate.to_string(),
            "catch_up_structure": params.catch_up_structure,
            "compounding": params.compounding,
            "time_granularity": params.granularity,
            "gp_commitment": params.gp_commitment.to_string(),
            "lp_commitment": params.lp_commitment.to_string(),
            "periods": input.cash_flows.len(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
