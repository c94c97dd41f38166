use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::{
    CatchUpStructure, Compounding, DistributionFrequency, FundConfig, TimeGranularity,
    WaterfallStructure,
};
use crate::types::{CashFlowPeriod, Money, Rate};

// Documented defaults applied when configuration fields are missing or invalid
const DEFAULT_HURDLE_RATE: Decimal = dec!(0.08);
const DEFAULT_CARRIED_INTEREST_RATE: Decimal = dec!(0.20);
const DEFAULT_CATCH_UP_RATE: Decimal = dec!(0.20);
const DEFAULT_FUND_SIZE: Decimal = dec!(100000000);
const DEFAULT_FUND_TERM: u32 = 10;
const DEFAULT_MANAGEMENT_FEE_RATE: Decimal = dec!(0.02);

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Fully-defaulted waterfall parameters.
///
/// All rate fields are already expressed on the period base of the cash-flow
/// series: when the series is monthly, annual rates have been converted to
/// monthly equivalents and the compounding convention and distribution
/// frequency forced to monthly. Internal tiers never re-check for missing
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallParams {
    pub structure: WaterfallStructure,
    pub hurdle_rate: Rate,
    pub carried_interest_rate: Rate,
    pub catch_up_rate: Rate,
    pub catch_up_structure: CatchUpStructure,
    pub compounding: Compounding,
    pub distribution_frequency: DistributionFrequency,
    pub clawback: bool,
    pub management_fee_offset_pct: Rate,
    pub fund_size: Money,
    pub fund_term: u32,
    pub management_fee_rate: Rate,
    /// GP commitment amount (`fund_size × gp_commitment_percentage`)
    pub gp_commitment: Money,
    /// LP commitment amount (complement of the GP commitment)
    pub lp_commitment: Money,
    pub granularity: TimeGranularity,
}

impl WaterfallParams {
    pub fn total_commitment(&self) -> Money {
        self.gp_commitment + self.lp_commitment
    }

    /// GP share of total commitments, zero when the fund has no commitments.
    pub fn gp_commitment_share(&self) -> Rate {
        let total = self.total_commitment();
        if total.is_zero() {
            Decimal::ZERO
        } else {
            self.gp_commitment / total
        }
    }
}

/// Capital called from each partner class over the life of the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalContributions {
    pub gp_contribution: Money,
    pub lp_contribution: Money,
    pub total_contribution: Money,
}

/// Convert an annual rate to its monthly equivalent: `(1+r)^(1/12) − 1`.
fn annual_to_monthly(rate: Rate) -> Rate {
    (Decimal::ONE + rate).powd(Decimal::ONE / MONTHS_PER_YEAR) - Decimal::ONE
}

/// A rate that must be non-negative; anything else falls back to the default.
fn rate_or_default(value: Option<Rate>, default: Rate) -> Rate {
    match value {
        Some(r) if r >= Decimal::ZERO => r,
        _ => default,
    }
}

/// A rate constrained to [0, 1); out-of-range values fall back to the default.
fn unit_rate_or_default(value: Option<Rate>, default: Rate) -> Rate {
    match value {
        Some(r) if r >= Decimal::ZERO && r < Decimal::ONE => r,
        _ => default,
    }
}

/// Normalise loose fund configuration into fully-defaulted parameters.
///
/// Missing or invalid fields fall back to documented defaults (hurdle 8%,
/// carry 20%, catch-up 20%, structure european, compounding annual); this
/// never fails. Tranche overrides are consulted before flat values.
pub fn normalize_params(config: &FundConfig) -> WaterfallParams {
    let structure = config
        .resolve(|c| c.waterfall_structure)
        .unwrap_or_default();
    let granularity = config.resolve(|c| c.time_granularity).unwrap_or_default();

    let mut hurdle_rate = rate_or_default(config.resolve(|c| c.hurdle_rate), DEFAULT_HURDLE_RATE);
    let mut carried_interest_rate = unit_rate_or_default(
        config.resolve(|c| c.carried_interest_rate),
        DEFAULT_CARRIED_INTEREST_RATE,
    );
    let mut catch_up_rate =
        unit_rate_or_default(config.resolve(|c| c.catch_up_rate), DEFAULT_CATCH_UP_RATE);
    let catch_up_structure = config.resolve(|c| c.catch_up_structure).unwrap_or_default();

    let mut compounding = config
        .resolve(|c| c.preferred_return_compounding)
        .unwrap_or_default();
    let mut distribution_frequency = config
        .resolve(|c| c.distribution_frequency)
        .unwrap_or_default();

    if granularity == TimeGranularity::Monthly {
        hurdle_rate = annual_to_monthly(hurdle_rate);
        carried_interest_rate = annual_to_monthly(carried_interest_rate);
        catch_up_rate = annual_to_monthly(catch_up_rate);
        compounding = Compounding::Monthly;
        distribution_frequency = DistributionFrequency::Monthly;
    }

    let fund_size = match config.resolve(|c| c.fund_size) {
        Some(size) if size >= Decimal::ZERO => size,
        _ => DEFAULT_FUND_SIZE,
    };
    let gp_pct = unit_rate_or_default(
        config.resolve(|c| c.gp_commitment_percentage),
        Decimal::ZERO,
    );
    let gp_commitment = fund_size * gp_pct;
    let lp_commitment = fund_size - gp_commitment;

    WaterfallParams {
        structure,
        hurdle_rate,
        carried_interest_rate,
        catch_up_rate,
        catch_up_structure,
        compounding,
        distribution_frequency,
        clawback: config.resolve(|c| c.clawback).unwrap_or(false),
        management_fee_offset_pct: rate_or_default(
            config.resolve(|c| c.management_fee_offset_percentage),
            Decimal::ZERO,
        ),
        fund_size,
        fund_term: config.resolve(|c| c.fund_term).unwrap_or(DEFAULT_FUND_TERM),
        management_fee_rate: rate_or_default(
            config.resolve(|c| c.management_fee_rate),
            DEFAULT_MANAGEMENT_FEE_RATE,
        ),
        gp_commitment,
        lp_commitment,
        granularity,
    }
}

/// Derive GP/LP capital contributions from the cash-flow series.
///
/// Capital calls are stored as negative outflows, so the absolute value of
/// each period's calls is summed before splitting pro-rata to commitment
/// amounts. Sign-convention violations and zero totals are diagnosed as
/// warnings, never hard failures.
pub fn capital_contributions(
    cash_flows: &BTreeMap<u32, CashFlowPeriod>,
    params: &WaterfallParams,
    warnings: &mut Vec<String>,
) -> CapitalContributions {
    let mut total_calls = Decimal::ZERO;
    for (period, flows) in cash_flows {
        if flows.capital_calls > Decimal::ZERO {
            warnings.push(format!(
                "Period {period}: capital_calls is positive ({}); calls must be recorded as negative outflows",
                flows.capital_calls
            ));
        }
        total_calls += flows.capital_calls.abs();
    }

    if total_calls.is_zero() {
        warnings.push("No capital calls recorded in cash-flow series; contributions are zero".into());
    }

    let gp_share = if params.total_commitment().is_zero() {
        warnings.push("Total fund commitment is zero; GP share defaults to 0%".into());
        Decimal::ZERO
    } else {
        params.gp_commitment_share()
    };

    let gp_contribution = total_calls * gp_share;
    CapitalContributions {
        gp_contribution,
        lp_contribution: total_calls - gp_contribution,
        total_contribution: total_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn series(calls: &[Decimal]) -> BTreeMap<u32, CashFlowPeriod> {
        calls
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                (
                    i as u32,
                    CashFlowPeriod {
                        capital_calls: c,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let params = normalize_params(&FundConfig::default());
        assert_eq!(params.structure, WaterfallStructure::European);
        assert_eq!(params.hurdle_rate, dec!(0.08));
        assert_eq!(params.carried_interest_rate, dec!(0.20));
        assert_eq!(params.catch_up_rate, dec!(0.20));
        assert_eq!(params.compounding, Compounding::Annual);
        assert_eq!(params.gp_commitment, Decimal::ZERO);
        assert_eq!(params.lp_commitment, dec!(100000000));
    }

    #[test]
    fn test_invalid_rates_fall_back() {
        let config = FundConfig {
            hurdle_rate: Some(dec!(-0.05)),
            carried_interest_rate: Some(dec!(1.5)),
            ..Default::default()
        };
        let params = normalize_params(&config);
        assert_eq!(params.hurdle_rate, dec!(0.08));
        assert_eq!(params.carried_interest_rate, dec!(0.20));
    }

    #[test]
    fn test_commitment_split() {
        let config = FundConfig {
            fund_size: Some(dec!(100)),
            gp_commitment_percentage: Some(dec!(0.05)),
            ..Default::default()
        };
        let params = normalize_params(&config);
        assert_eq!(params.gp_commitment, dec!(5));
        assert_eq!(params.lp_commitment, dec!(95));
        assert_eq!(params.gp_commitment_share(), dec!(0.05));
    }

    #[test]
    fn test_monthly_conversion_forces_frequencies() {
        let config = FundConfig {
            time_granularity: Some(TimeGranularity::Monthly),
            preferred_return_compounding: Some(Compounding::Quarterly),
            ..Default::default()
        };
        let params = normalize_params(&config);
        assert_eq!(params.compounding, Compounding::Monthly);
        assert_eq!(params.distribution_frequency, DistributionFrequency::Monthly);
        assert!(params.hurdle_rate < dec!(0.08));
    }

    #[test]
    fn test_monthly_rate_compounds_back_to_annual() {
        let monthly = annual_to_monthly(dec!(0.08));
        let recompounded = (Decimal::ONE + monthly).powd(dec!(12)) - Decimal::ONE;
        assert!((recompounded - dec!(0.08)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_contributions_use_absolute_calls() {
        let config = FundConfig {
            fund_size: Some(dec!(100)),
            gp_commitment_percentage: Some(dec!(0.10)),
            ..Default::default()
        };
        let params = normalize_params(&config);
        let mut warnings = Vec::new();
        let cash_flows = series(&[dec!(-60), dec!(-40)]);
        let contrib = capital_contributions(&cash_flows, &params, &mut warnings);
        assert_eq!(contrib.total_contribution, dec!(100));
        assert_eq!(contrib.gp_contribution, dec!(10));
        assert_eq!(contrib.lp_contribution, dec!(90));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_positive_call_diagnosed() {
        let params = normalize_params(&FundConfig::default());
        let mut warnings = Vec::new();
        let cash_flows = series(&[dec!(-60), dec!(40)]);
        let contrib = capital_contributions(&cash_flows, &params, &mut warnings);
        // The absolute value still counts toward contributions
        assert_eq!(contrib.total_contribution, dec!(100));
        assert!(warnings.iter().any(|w| w.contains("Period 1")));
    }

    #[test]
    fn test_zero_calls_warned() {
        let params = normalize_params(&FundConfig::default());
        let mut warnings = Vec::new();
        let contrib = capital_contributions(&series(&[dec!(0)]), &params, &mut warnings);
        assert_eq!(contrib.total_contribution, Decimal::ZERO);
        assert!(warnings.iter().any(|w| w.contains("No capital calls")));
    }

    #[test]
    fn test_zero_commitment_defaults_gp_to_zero() {
        let config = FundConfig {
            fund_size: Some(dec!(0)),
            ..Default::default()
        };
        let params = normalize_params(&config);
        let mut warnings = Vec::new();
        let contrib = capital_contributions(&series(&[dec!(-100)]), &params, &mut warnings);
        assert_eq!(contrib.gp_contribution, Decimal::ZERO);
        assert_eq!(contrib.lp_contribution, dec!(100));
        assert!(warnings.iter().any(|w| w.contains("commitment is zero")));
    }
}
