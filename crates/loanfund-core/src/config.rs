use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

/// Which waterfall algorithm governs the fund's distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterfallStructure {
    /// Tiers computed across the whole fund's aggregate cash flows
    #[default]
    European,
    /// Tiers computed per period (deal-by-deal), no cross-period accrual
    American,
}

/// GP catch-up mechanics after the preferred return is paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatchUpStructure {
    /// No catch-up tier
    None,
    /// GP receives `catch_up_rate` of residual cash until the target is met
    Partial,
    /// GP receives 100% of residual cash until the target is met
    #[default]
    Full,
}

/// Compounding convention for the preferred return accrual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    #[default]
    Annual,
    Quarterly,
    Monthly,
    Continuous,
}

/// How often the fund distributes cash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFrequency {
    #[default]
    Annual,
    Quarterly,
    Monthly,
}

/// Granularity of the cash-flow series. Annual rates are converted to
/// periodic rates when the series is monthly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    #[default]
    Annual,
    Monthly,
}

/// Loose fund configuration as supplied by callers.
///
/// Every field is optional; missing or absent values fall back to documented
/// defaults during normalisation (see `waterfall::params`). Tranche and
/// multi-fund callers may override any field per-call via
/// `waterfall_overrides`, which is checked before the flat value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FundConfig {
    pub waterfall_structure: Option<WaterfallStructure>,
    pub hurdle_rate: Option<Rate>,
    pub carried_interest_rate: Option<Rate>,
    pub catch_up_rate: Option<Rate>,
    pub catch_up_structure: Option<CatchUpStructure>,
    pub preferred_return_compounding: Option<Compounding>,
    pub distribution_frequency: Option<DistributionFrequency>,
    pub clawback: Option<bool>,
    pub management_fee_offset_percentage: Option<Rate>,
    pub fund_size: Option<Money>,
    pub fund_term: Option<u32>,
    pub management_fee_rate: Option<Rate>,
    pub gp_commitment_percentage: Option<Rate>,
    pub time_granularity: Option<TimeGranularity>,
    /// Per-tranche override block, checked before the flat fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waterfall_overrides: Option<Box<FundConfig>>,
}

impl FundConfig {
    /// Resolve a field: tranche override first, then the flat value.
    pub fn resolve<T>(&self, get: impl Fn(&FundConfig) -> Option<T>) -> Option<T> {
        self.waterfall_overrides
            .as_deref()
            .and_then(&get)
            .or_else(|| get(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_resolve_prefers_override() {
        let config = FundConfig {
            hurdle_rate: Some(dec!(0.08)),
            waterfall_overrides: Some(Box::new(FundConfig {
                hurdle_rate: Some(dec!(0.10)),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(config.resolve(|c| c.hurdle_rate), Some(dec!(0.10)));
    }

    #[test]
    fn test_resolve_falls_back_to_flat() {
        let config = FundConfig {
            hurdle_rate: Some(dec!(0.08)),
            waterfall_overrides: Some(Box::new(FundConfig::default())),
            ..Default::default()
        };
        assert_eq!(config.resolve(|c| c.hurdle_rate), Some(dec!(0.08)));
    }

    #[test]
    fn test_resolve_absent_everywhere() {
        let config = FundConfig::default();
        assert_eq!(config.resolve(|c| c.hurdle_rate), None);
    }

    #[test]
    fn test_deserialize_loose_config() {
        let json = r#"{
            "waterfall_structure": "american",
            "hurdle_rate": "0.07",
            "catch_up_structure": "partial",
            "unknown_field": 42
        }"#;
        let config: FundConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.waterfall_structure,
            Some(WaterfallStructure::American)
        );
        assert_eq!(config.hurdle_rate, Some(dec!(0.07)));
        assert_eq!(config.catch_up_structure, Some(CatchUpStructure::Partial));
        assert!(config.fund_size.is_none());
    }
}
