use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::{Compounding, TimeGranularity};
use crate::types::{CashFlowPeriod, Money, Rate};

use super::params::WaterfallParams;

/// Preferred-return accrual state for a single period.
///
/// Each period's state depends only on the prior period's state: the accrual
/// engine is a strict left-to-right fold over the series with no lookahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredReturnState {
    pub period: u32,
    /// Preferred return accrued this period on the remaining LP capital base
    pub accrual: Money,
    /// Cumulative unpaid accrual after this period's distribution
    pub accrued_unpaid: Money,
    /// LP distribution applied against the accrual this period
    pub distributed: Money,
    /// Un-returned LP capital base after this period
    pub remaining_lp_capital: Money,
}

/// Effective per-period hurdle rate under the configured compounding
/// convention.
///
/// For a monthly series the hurdle has already been converted to a monthly
/// periodic rate during normalisation and is used as-is. For an annual series
/// sub-annual conventions compound the hurdle to the sub-period and
/// re-annualise; continuous compounding uses `e^r − 1`.
pub fn effective_periodic_rate(params: &WaterfallParams) -> Rate {
    if params.granularity == TimeGranularity::Monthly {
        return params.hurdle_rate;
    }

    let h = params.hurdle_rate;
    match params.compounding {
        Compounding::Annual => h,
        Compounding::Quarterly => (Decimal::ONE + h / dec!(4)).powd(dec!(4)) - Decimal::ONE,
        Compounding::Monthly => (Decimal::ONE + h / dec!(12)).powd(dec!(12)) - Decimal::ONE,
        Compounding::Continuous => h.exp() - Decimal::ONE,
    }
}

/// Walk the series forward, compounding unpaid LP preferred return and
/// tracking the shrinking LP capital base.
///
/// Negative-cash-flow periods are diagnosed and record a zero distribution.
/// The terminal state (remaining capital, unpaid accrual) is retained for
/// transparency but not further used.
pub fn accrue_preferred(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &WaterfallParams,
    lp_contribution: Money,
    warnings: &mut Vec<String>,
) -> Vec<PreferredReturnState> {
    let rate = effective_periodic_rate(params);

    let mut remaining_lp_capital = lp_contribution;
    let mut accrued_unpaid = Decimal::ZERO;
    let mut schedule = Vec::with_capacity(cash_flows.len());

    for (&period, flows) in cash_flows {
        let accrual = remaining_lp_capital * rate;
        accrued_unpaid += accrual;

        let distributed = if flows.net_cash_flow < Decimal::ZERO {
            warnings.push(format!(
                "Period {period}: negative net cash flow ({}); no preferred return distributed",
                flows.net_cash_flow
            ));
            Decimal::ZERO
        } else {
            accrued_unpaid.min(flows.net_cash_flow)
        };

        accrued_unpaid -= distributed;
        remaining_lp_capital = (remaining_lp_capital - distributed).max(Decimal::ZERO);

        schedule.push(PreferredReturnState {
            period,
            accrual,
            accrued_unpaid,
            distributed,
            remaining_lp_capital,
        });
    }

    schedule
}
