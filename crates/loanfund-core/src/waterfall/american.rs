use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::error::LoanFundError;
use crate::types::{CashFlowPeriod, GpLpSplit, Money};
use crate::LoanFundResult;

use super::params::WaterfallParams;
use super::{distributable_cash, management_fee_offset, Distribution, PeriodBreakdown};

/// American (deal-by-deal) waterfall.
///
/// Each period is tiered on its own: the capital deployed that period forms
/// the period's capital base, the preferred return is a simple
/// `lp_base × hurdle` with no accrual carried across periods, and the
/// remainder is split at the carried-interest rate. Periods with
/// non-positive net cash flow produce zero for every tier. Only cumulative
/// GP/LP totals carry forward.
pub fn distribute(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &WaterfallParams,
    warnings: &mut Vec<String>,
) -> LoanFundResult<Distribution> {
    let gp_share = params.gp_commitment_share();

    let mut return_of_capital = GpLpSplit::default();
    let mut preferred_return = GpLpSplit::default();
    let mut carried_interest = GpLpSplit::default();

    let mut cumulative_gp = Decimal::ZERO;
    let mut cumulative_lp = Decimal::ZERO;
    let mut breakdown = Vec::with_capacity(cash_flows.len());

    for (&period, flows) in cash_flows {
        if flows.net_cash_flow <= Decimal::ZERO {
            breakdown.push(PeriodBreakdown {
                period,
                return_of_capital: GpLpSplit::default(),
                preferred_return: GpLpSplit::default(),
                catch_up: GpLpSplit::default(),
                carried_interest: GpLpSplit::default(),
                total_gp: Decimal::ZERO,
                total_lp: Decimal::ZERO,
                cumulative_gp,
                cumulative_lp,
            });
            continue;
        }

        let mut cash = flows.net_cash_flow;

        // The period's capital base is whatever was deployed into loans that
        // period, split by commitment percentage
        let deployed = flows.loan_deployments.abs();
        let lp_base = deployed - deployed * gp_share;
        let period_pref = lp_base * params.hurdle_rate;

        let roc_amount = cash.min(deployed);
        let roc = GpLpSplit {
            gp: roc_amount * gp_share,
            lp: roc_amount - roc_amount * gp_share,
        };
        cash -= roc_amount;

        let lp_pref = cash.min(period_pref);
        cash -= lp_pref;

        let gp_carry = cash * params.carried_interest_rate;
        let carry = GpLpSplit {
            gp: gp_carry,
            lp: cash - gp_carry,
        };

        return_of_capital.gp += roc.gp;
        return_of_capital.lp += roc.lp;
        preferred_return.lp += lp_pref;
        carried_interest.gp += carry.gp;
        carried_interest.lp += carry.lp;

        let total_gp = roc.gp + carry.gp;
        let total_lp = roc.lp + lp_pref + carry.lp;
        cumulative_gp += total_gp;
        cumulative_lp += total_lp;

        breakdown.push(PeriodBreakdown {
            period,
            return_of_capital: roc,
            preferred_return: GpLpSplit {
                gp: Decimal::ZERO,
                lp: lp_pref,
            },
            catch_up: GpLpSplit::default(),
            carried_interest: carry,
            total_gp,
            total_lp,
            cumulative_gp,
            cumulative_lp,
        });
    }

    // Same management-fee offset treatment as the fund-level waterfall
    let offset = management_fee_offset(cash_flows, params);
    if offset > Decimal::ZERO {
        let reduced = (carried_interest.gp - offset).max(Decimal::ZERO);
        warnings.push(format!(
            "Management-fee offset of {offset} reduced GP carried interest from {} to {reduced}",
            carried_interest.gp
        ));
        cumulative_gp -= carried_interest.gp - reduced;
        carried_interest.gp = reduced;
    }

    let total_gp_distribution = cumulative_gp;
    let total_lp_distribution = cumulative_lp;

    let total_available = distributable_cash(cash_flows);
    if total_gp_distribution + total_lp_distribution > total_available {
        return Err(LoanFundError::FinancialImpossibility(format!(
            "GP+LP distributions ({}) exceed total distributable cash ({total_available})",
            total_gp_distribution + total_lp_distribution
        )));
    }

    Ok(Distribution {
        return_of_capital,
        preferred_return,
        catch_up: GpLpSplit::default(),
        carried_interest,
        total_gp_distribution,
        total_lp_distribution,
        breakdown,
    })
}
