use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::TimeGranularity;
use crate::error::LoanFundError;
use crate::time_value;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::LoanFundResult;

// Seeds for the Newton-Raphson retry pass when the default guess diverges
const FALLBACK_SEEDS: [Decimal; 5] = [
    dec!(0.0),
    dec!(0.05),
    dec!(0.15),
    dec!(0.30),
    dec!(-0.20),
];

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Money-weighted return from a signed cash-flow vector (index 0 = negative
/// initial contribution), tried through an ordered list of strategies:
///
/// 1. the shared Newton-Raphson solver with the standard 10% guess,
/// 2. the same solver re-seeded from a spread of guesses,
/// 3. a compound-annual-growth approximation over the vector length,
///    applicable only when the sign pattern is sensible (negative first
///    flow, positive remainder).
///
/// Returns the periodic rate and the name of the strategy that produced it,
/// or `None` when every strategy fails.
pub fn periodic_irr(cash_flows: &[Money]) -> Option<(Rate, &'static str)> {
    type Strategy = (&'static str, fn(&[Money]) -> Option<Rate>);
    const STRATEGIES: [Strategy; 3] = [
        ("newton_raphson", newton_default),
        ("newton_reseeded", newton_reseeded),
        ("cagr_approximation", cagr_approximation),
    ];

    STRATEGIES
        .iter()
        .find_map(|(name, solve)| solve(cash_flows).map(|rate| (rate, *name)))
}

fn newton_default(cash_flows: &[Money]) -> Option<Rate> {
    time_value::irr(cash_flows, dec!(0.10)).ok()
}

fn newton_reseeded(cash_flows: &[Money]) -> Option<Rate> {
    FALLBACK_SEEDS
        .iter()
        .find_map(|&seed| time_value::irr(cash_flows, seed).ok())
}

/// `(total_inflows / |initial outflow|)^(1/n) − 1` over the vector length.
/// Only defined for the sensible sign pattern: negative first flow and a
/// positive sum of the remainder.
fn cagr_approximation(cash_flows: &[Money]) -> Option<Rate> {
    if cash_flows.len() < 2 {
        return None;
    }
    let initial = cash_flows[0];
    let inflows: Decimal = cash_flows[1..].iter().sum();
    if initial >= Decimal::ZERO || inflows <= Decimal::ZERO {
        return None;
    }

    let periods = Decimal::from((cash_flows.len() - 1) as i64);
    let multiple = inflows / initial.abs();
    Some(multiple.powd(Decimal::ONE / periods) - Decimal::ONE)
}

/// Annualise a periodic rate: monthly rates become `(1+r)^12 − 1`, annual
/// rates pass through.
pub fn annualize(rate: Rate, granularity: TimeGranularity) -> Rate {
    match granularity {
        TimeGranularity::Annual => rate,
        TimeGranularity::Monthly => (Decimal::ONE + rate).powd(MONTHS_PER_YEAR) - Decimal::ONE,
    }
}

/// Overall IRR for a partner cash-flow vector, annualised for the series
/// granularity. Failures from every strategy are reported as 0.0 with a
/// diagnostic rather than propagated.
pub fn partner_irr(
    cash_flows: &[Money],
    granularity: TimeGranularity,
    label: &str,
    warnings: &mut Vec<String>,
) -> Rate {
    match periodic_irr(cash_flows) {
        Some((rate, _)) => annualize(rate, granularity),
        None => {
            warnings.push(format!("{label} IRR could not be computed; reporting 0"));
            Decimal::ZERO
        }
    }
}

/// Windowed IRR series: entry `k` is the IRR over cash flows `[0..k]`
/// (inclusive). Window 0 is 0.0 by convention (too few flows to be
/// meaningful); any window whose computation fails is reported as 0.0 with a
/// diagnostic, so one bad window never aborts the rest of the series.
pub fn irr_by_window(
    cash_flows: &[Money],
    granularity: TimeGranularity,
    label: &str,
    warnings: &mut Vec<String>,
) -> Vec<Rate> {
    let mut series = Vec::with_capacity(cash_flows.len());

    for k in 0..cash_flows.len() {
        if k == 0 {
            series.push(Decimal::ZERO);
            continue;
        }
        match periodic_irr(&cash_flows[..=k]) {
            Some((rate, _)) => series.push(annualize(rate, granularity)),
            None => {
                warnings.push(format!(
                    "{label} IRR window {k}: no strategy converged; reporting 0"
                ));
                series.push(Decimal::ZERO);
            }
        }
    }

    series
}

/// Input for a standalone IRR calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrInput {
    /// Signed cash-flow vector, index 0 = initial contribution (negative)
    pub cash_flows: Vec<Money>,
    #[serde(default)]
    pub time_granularity: TimeGranularity,
}

/// Output of a standalone IRR calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrOutput {
    /// Annualised IRR (0.0 when no strategy converged)
    pub irr: Rate,
    /// Rate on the period base of the input vector
    pub periodic_irr: Rate,
    /// Which strategy produced the rate, if any converged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// IRR as of each period window
    pub irr_by_period: Vec<Rate>,
}

/// Standalone money-weighted return calculation over a cash-flow vector.
pub fn calculate_irr(input: &IrrInput) -> LoanFundResult<ComputationOutput<IrrOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.cash_flows.len() < 2 {
        return Err(LoanFundError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let (periodic, strategy) = match periodic_irr(&input.cash_flows) {
        Some((rate, strategy)) => (rate, Some(strategy.to_string())),
        None => {
            warnings.push("No IRR strategy converged; reporting 0".into());
            (Decimal::ZERO, None)
        }
    };

    let irr_by_period = irr_by_window(
        &input.cash_flows,
        input.time_granularity,
        "Window",
        &mut warnings,
    );

    let output = IrrOutput {
        irr: annualize(periodic, input.time_granularity),
        periodic_irr: periodic,
        strategy,
        irr_by_period,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Money-Weighted Return (IRR with fallback strategies)",
        &serde_json::json!({
            "cash_flows": input.cash_flows.len(),
            "time_granularity": input.time_granularity,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_newton_primary_converges() {
        let flows = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let (rate, strategy) = periodic_irr(&flows).unwrap();
        assert_eq!(strategy, "newton_raphson");
        assert!((rate - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_cagr_matches_closed_form() {
        // (150/100)^(1/3) - 1 ≈ 0.14471
        let flows = vec![dec!(-100), dec!(0), dec!(0), dec!(150)];
        let rate = cagr_approximation(&flows).unwrap();
        assert!((rate - dec!(0.14471)).abs() < dec!(0.0005));
    }

    #[test]
    fn test_cagr_agrees_with_exact_solver_for_single_flow() {
        // A single terminal inflow is the one shape where CAGR is exact
        let flows = vec![dec!(-100), dec!(0), dec!(0), dec!(150)];
        let (exact, _) = periodic_irr(&flows).unwrap();
        let approx = cagr_approximation(&flows).unwrap();
        assert!((exact - approx).abs() < dec!(0.001));
    }

    #[test]
    fn test_cagr_rejects_bad_sign_pattern() {
        assert!(cagr_approximation(&[dec!(100), dec!(50)]).is_none());
        assert!(cagr_approximation(&[dec!(-100), dec!(-50)]).is_none());
    }

    #[test]
    fn test_all_strategies_fail_reports_zero() {
        // All-negative flows: no IRR exists and CAGR's sign guard rejects it
        let flows = vec![dec!(-100), dec!(-50), dec!(-25)];
        let mut warnings = Vec::new();
        let rate = partner_irr(&flows, TimeGranularity::Annual, "LP", &mut warnings);
        assert_eq!(rate, Decimal::ZERO);
        assert!(warnings.iter().any(|w| w.contains("LP IRR")));
    }

    #[test]
    fn test_annualize_monthly() {
        let monthly = dec!(0.01);
        let annual = annualize(monthly, TimeGranularity::Monthly);
        // (1.01)^12 - 1 ≈ 0.126825
        assert!((annual - dec!(0.126825)).abs() < dec!(0.0001));
        assert_eq!(annualize(monthly, TimeGranularity::Annual), monthly);
    }

    #[test]
    fn test_windowed_irr_conventions() {
        let flows = vec![dec!(-100), dec!(0), dec!(60), dec!(80)];
        let mut warnings = Vec::new();
        let series = irr_by_window(&flows, TimeGranularity::Annual, "LP", &mut warnings);

        assert_eq!(series.len(), 4);
        // Window 0 is 0.0 by convention
        assert_eq!(series[0], Decimal::ZERO);
        // Window 1 ([-100, 0]) has no solution and reports 0.0
        assert_eq!(series[1], Decimal::ZERO);
        // Window 3 uses the whole vector and is positive
        assert!(series[3] > Decimal::ZERO);
        // The final window matches the overall IRR
        let (full, _) = periodic_irr(&flows).unwrap();
        assert_eq!(series[3], full);
    }

    #[test]
    fn test_calculate_irr_envelope() {
        let input = IrrInput {
            cash_flows: vec![dec!(-100), dec!(0), dec!(0), dec!(150)],
            time_granularity: TimeGranularity::Annual,
        };
        let output = calculate_irr(&input).unwrap();
        assert_eq!(output.result.strategy.as_deref(), Some("newton_raphson"));
        assert!((output.result.irr - dec!(0.1447)).abs() < dec!(0.001));
        assert_eq!(output.result.irr_by_period.len(), 4);
    }

    #[test]
    fn test_calculate_irr_requires_two_flows() {
        let input = IrrInput {
            cash_flows: vec![dec!(-100)],
            time_granularity: TimeGranularity::Annual,
        };
        assert!(calculate_irr(&input).is_err());
    }

    #[test]
    fn test_windowed_failures_do_not_abort_series() {
        let flows = vec![dec!(-100), dec!(-20), dec!(200)];
        let mut warnings = Vec::new();
        let series = irr_by_window(&flows, TimeGranularity::Annual, "GP", &mut warnings);
        assert_eq!(series[1], Decimal::ZERO);
        assert!(series[2] > Decimal::ZERO);
        assert!(!warnings.is_empty());
    }
}
