use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::CatchUpStructure;
use crate::error::LoanFundError;
use crate::types::{CashFlowPeriod, GpLpSplit, Money};
use crate::LoanFundResult;

use super::params::{CapitalContributions, WaterfallParams};
use super::preferred::PreferredReturnState;
use super::{distributable_cash, management_fee_offset, Distribution, PeriodBreakdown};

/// GP catch-up target: `carry / (1 − carry) × LP preferred paid`, so that the
/// profit split above the hurdle reaches the carried-interest ratio.
fn catch_up_target(lp_preferred_paid: Money, params: &WaterfallParams, residual: Money) -> Money {
    let carry = params.carried_interest_rate;
    if carry < Decimal::ONE {
        (carry / (Decimal::ONE - carry)) * lp_preferred_paid
    } else {
        residual
    }
}

/// Run the catch-up tier against `residual` cash. `headroom` is the portion
/// of the catch-up target the GP has not yet received.
fn catch_up_tier(residual: Money, headroom: Money, params: &WaterfallParams) -> GpLpSplit {
    let headroom = headroom.max(Decimal::ZERO);
    match params.catch_up_structure {
        CatchUpStructure::None => GpLpSplit::default(),
        CatchUpStructure::Full => GpLpSplit {
            gp: residual.min(headroom),
            lp: Decimal::ZERO,
        },
        CatchUpStructure::Partial => {
            let rate = params.catch_up_rate;
            if rate.is_zero() {
                return GpLpSplit::default();
            }
            let gp = (residual * rate).min(headroom);
            let tier_total = (gp / rate).min(residual);
            GpLpSplit {
                gp,
                lp: tier_total - gp,
            }
        }
    }
}

/// European (fund-level) waterfall: the four-tier sequential allocation
/// applied to the series totals, plus an independent per-period stepwise pass
/// for the breakdown.
///
/// Tier order, both passes: return of capital (LP first, then GP), LP
/// preferred return, GP catch-up, carried-interest split. The per-period pass
/// re-derives tiers from each period's own cash and accrual entry rather than
/// pro-rating the aggregate, accumulating running cumulative totals.
pub fn distribute(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &WaterfallParams,
    contributions: &CapitalContributions,
    preferred: &[PreferredReturnState],
    warnings: &mut Vec<String>,
) -> LoanFundResult<Distribution> {
    let total_available = distributable_cash(cash_flows);
    let total_accrued_pref: Money = preferred.iter().map(|s| s.accrual).sum();

    // --- Aggregate pass ---
    let mut remaining = total_available;

    let lp_roc = remaining.min(contributions.lp_contribution);
    remaining -= lp_roc;
    let gp_roc = remaining.min(contributions.gp_contribution);
    remaining -= gp_roc;

    let lp_pref = remaining.min(total_accrued_pref);
    remaining -= lp_pref;

    let target = catch_up_target(lp_pref, params, remaining);
    let catch_up = catch_up_tier(remaining, target, params);
    remaining -= catch_up.total();

    let mut gp_carry = remaining * params.carried_interest_rate;
    let lp_residual = remaining - gp_carry;

    // Management-fee offset reduces GP carry, floored at zero
    let offset = management_fee_offset(cash_flows, params);
    if offset > Decimal::ZERO {
        let reduced = (gp_carry - offset).max(Decimal::ZERO);
        warnings.push(format!(
            "Management-fee offset of {offset} reduced GP carried interest from {gp_carry} to {reduced}"
        ));
        gp_carry = reduced;
    }

    let return_of_capital = GpLpSplit {
        gp: gp_roc,
        lp: lp_roc,
    };
    let preferred_return = GpLpSplit {
        gp: Decimal::ZERO,
        lp: lp_pref,
    };
    let carried_interest = GpLpSplit {
        gp: gp_carry,
        lp: lp_residual,
    };

    let total_gp_distribution = return_of_capital.gp + catch_up.gp + carried_interest.gp;
    let total_lp_distribution =
        return_of_capital.lp + preferred_return.lp + catch_up.lp + carried_interest.lp;

    // Distributing more than the series produced indicates an upstream
    // sign-convention or accounting bug; fail hard rather than clamp.
    if total_gp_distribution + total_lp_distribution > total_available {
        return Err(LoanFundError::FinancialImpossibility(format!(
            "GP+LP distributions ({}) exceed total distributable cash ({total_available})",
            total_gp_distribution + total_lp_distribution
        )));
    }

    // --- Per-period stepwise pass ---
    let breakdown = period_breakdown(cash_flows, params, contributions, preferred);

    Ok(Distribution {
        return_of_capital,
        preferred_return,
        catch_up,
        carried_interest,
        total_gp_distribution,
        total_lp_distribution,
        breakdown,
    })
}

/// Re-derive the four tiers independently for each period, using that
/// period's net cash flow and accrual entry, with cumulative caps so that no
/// tier pays out more across periods than its aggregate ceiling.
fn period_breakdown(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &WaterfallParams,
    contributions: &CapitalContributions,
    preferred: &[PreferredReturnState],
) -> Vec<PeriodBreakdown> {
    let mut cum_lp_roc = Decimal::ZERO;
    let mut cum_gp_roc = Decimal::ZERO;
    let mut unpaid_pref = Decimal::ZERO;
    let mut cum_lp_pref = Decimal::ZERO;
    let mut cum_gp_catch_up = Decimal::ZERO;
    let mut cumulative_gp = Decimal::ZERO;
    let mut cumulative_lp = Decimal::ZERO;

    let mut breakdown = Vec::with_capacity(cash_flows.len());

    for ((&period, flows), state) in cash_flows.iter().zip(preferred) {
        unpaid_pref += state.accrual;

        let mut cash = flows.net_cash_flow.max(Decimal::ZERO);

        let lp_roc = cash.min(contributions.lp_contribution - cum_lp_roc);
        cash -= lp_roc;
        cum_lp_roc += lp_roc;

        let gp_roc = cash.min(contributions.gp_contribution - cum_gp_roc);
        cash -= gp_roc;
        cum_gp_roc += gp_roc;

        let lp_pref = cash.min(unpaid_pref);
        cash -= lp_pref;
        unpaid_pref -= lp_pref;
        cum_lp_pref += lp_pref;

        let target = catch_up_target(cum_lp_pref, params, cash);
        let catch_up = catch_up_tier(cash, target - cum_gp_catch_up, params);
        cash -= catch_up.total();
        cum_gp_catch_up += catch_up.gp;

        let gp_carry = cash * params.carried_interest_rate;
        let carried_interest = GpLpSplit {
            gp: gp_carry,
            lp: cash - gp_carry,
        };

        let total_gp = gp_roc + catch_up.gp + carried_interest.gp;
        let total_lp = lp_roc + lp_pref + catch_up.lp + carried_interest.lp;
        cumulative_gp += total_gp;
        cumulative_lp += total_lp;

        breakdown.push(PeriodBreakdown {
            period,
            return_of_capital: GpLpSplit {
                gp: gp_roc,
                lp: lp_roc,
            },
            preferred_return: GpLpSplit {
                gp: Decimal::ZERO,
                lp: lp_pref,
            },
            catch_up,
            carried_interest,
            total_gp,
            total_lp,
            cumulative_gp,
            cumulative_lp,
        });
    }

    breakdown
}
