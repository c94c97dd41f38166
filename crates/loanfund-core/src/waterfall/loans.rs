use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

use super::PeriodBreakdown;

/// A loan that exited the portfolio in a given period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitedLoan {
    pub loan_id: String,
    /// Value realised at exit
    pub exit_value: Money,
    /// Geographic zone tag carried through for downstream analytics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_reinvestment: bool,
}

/// A single loan's share of one period's GP/LP distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanContribution {
    pub loan_id: String,
    pub exit_value: Money,
    /// This loan's share of the period's total exit value
    pub proportion: Rate,
    pub gp_distribution: Money,
    pub lp_distribution: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub is_default: bool,
    pub is_reinvestment: bool,
}

/// Apportion each period's GP/LP distributions back to the loans that exited
/// that period, proportional to each loan's share of the period's total exit
/// value.
///
/// Purely additive analytics: the result never feeds back into distribution
/// totals. Periods with no distribution or zero total exit value are skipped.
pub fn correlate_loans(
    exited_loans: &BTreeMap<u32, Vec<ExitedLoan>>,
    breakdown: &[PeriodBreakdown],
) -> BTreeMap<u32, Vec<LoanContribution>> {
    let mut contributions = BTreeMap::new();

    for (&period, loans) in exited_loans {
        let Some(entry) = breakdown.iter().find(|e| e.period == period) else {
            continue;
        };

        let period_total: Money = loans.iter().map(|l| l.exit_value).sum();
        if period_total.is_zero() || (entry.total_gp + entry.total_lp).is_zero() {
            continue;
        }

        let records: Vec<LoanContribution> = loans
            .iter()
            .map(|loan| {
                let proportion = loan.exit_value / period_total;
                LoanContribution {
                    loan_id: loan.loan_id.clone(),
                    exit_value: loan.exit_value,
                    proportion,
                    gp_distribution: entry.total_gp * proportion,
                    lp_distribution: entry.total_lp * proportion,
                    zone: loan.zone.clone(),
                    is_default: loan.is_default,
                    is_reinvestment: loan.is_reinvestment,
                }
            })
            .collect();

        contributions.insert(period, records);
    }

    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GpLpSplit;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn entry(period: u32, total_gp: Decimal, total_lp: Decimal) -> PeriodBreakdown {
        PeriodBreakdown {
            period,
            return_of_capital: GpLpSplit::default(),
            preferred_return: GpLpSplit::default(),
            catch_up: GpLpSplit::default(),
            carried_interest: GpLpSplit::default(),
            total_gp,
            total_lp,
            cumulative_gp: total_gp,
            cumulative_lp: total_lp,
        }
    }

    fn loan(id: &str, exit_value: Decimal) -> ExitedLoan {
        ExitedLoan {
            loan_id: id.into(),
            exit_value,
            zone: Some("green".into()),
            is_default: false,
            is_reinvestment: false,
        }
    }

    #[test]
    fn test_apportions_proportionally() {
        let exited = BTreeMap::from([(1, vec![loan("a", dec!(75)), loan("b", dec!(25))])]);
        let breakdown = vec![entry(0, dec!(0), dec!(0)), entry(1, dec!(10), dec!(90))];

        let result = correlate_loans(&exited, &breakdown);
        let records = &result[&1];

        assert_eq!(records[0].proportion, dec!(0.75));
        assert_eq!(records[0].gp_distribution, dec!(7.5));
        assert_eq!(records[0].lp_distribution, dec!(67.5));
        assert_eq!(records[1].proportion, dec!(0.25));
        assert_eq!(records[1].gp_distribution, dec!(2.5));
        assert_eq!(records[1].lp_distribution, dec!(22.5));

        // Shares reassemble the period totals
        let gp_sum: Decimal = records.iter().map(|r| r.gp_distribution).sum();
        assert_eq!(gp_sum, dec!(10));
    }

    #[test]
    fn test_skips_periods_without_distribution() {
        let exited = BTreeMap::from([(0, vec![loan("a", dec!(50))])]);
        let breakdown = vec![entry(0, dec!(0), dec!(0))];

        let result = correlate_loans(&exited, &breakdown);
        assert!(result.is_empty());
    }

    #[test]
    fn test_skips_zero_exit_value_periods() {
        let exited = BTreeMap::from([(0, vec![loan("a", dec!(0))])]);
        let breakdown = vec![entry(0, dec!(5), dec!(45))];

        let result = correlate_loans(&exited, &breakdown);
        assert!(result.is_empty());
    }

    #[test]
    fn test_skips_periods_missing_from_breakdown() {
        let exited = BTreeMap::from([(7, vec![loan("a", dec!(50))])]);
        let breakdown = vec![entry(0, dec!(5), dec!(45))];

        let result = correlate_loans(&exited, &breakdown);
        assert!(result.is_empty());
    }

    #[test]
    fn test_metadata_carried_through() {
        let exited = BTreeMap::from([(
            0,
            vec![ExitedLoan {
                loan_id: "d1".into(),
                exit_value: dec!(40),
                zone: Some("red".into()),
                is_default: true,
                is_reinvestment: true,
            }],
        )]);
        let breakdown = vec![entry(0, dec!(1), dec!(9))];

        let result = correlate_loans(&exited, &breakdown);
        let record = &result[&0][0];
        assert_eq!(record.zone.as_deref(), Some("red"));
        assert!(record.is_default);
        assert!(record.is_reinvestment);
    }
}
