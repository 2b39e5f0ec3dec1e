use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::OverpaymentPolicy;

/// default reference stamped on principal-only prepayment rows
pub const PRINCIPAL_PREPAYMENT: &str = "PRINCIPAL_PREPAYMENT";

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// balances at or below this count as paid off
    pub settlement_tolerance: Money,
    /// days after the last due date a balloon installment falls due
    pub balloon_offset_days: i64,
    /// upper bound accepted for the annual rate, in percent
    pub max_annual_rate_percent: Decimal,
    /// reference used on prepayment rows when the payment carries none
    pub prepayment_reference: String,
    pub overpayment_policy: OverpaymentPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_tolerance: Money::CENT,
            balloon_offset_days: 30,
            max_annual_rate_percent: dec!(30),
            prepayment_reference: PRINCIPAL_PREPAYMENT.to_string(),
            overpayment_policy: OverpaymentPolicy::CapAtBalance,
        }
    }
}

impl EngineConfig {
    /// parse from json; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| LoanError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoanError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.settlement_tolerance.is_negative() {
            return Err(LoanError::InvalidConfiguration {
                message: format!(
                    "settlement tolerance must not be negative, got {}",
                    self.settlement_tolerance
                ),
            });
        }

        if self.balloon_offset_days < 1 {
            return Err(LoanError::InvalidConfiguration {
                message: format!(
                    "balloon offset must be at least one day, got {}",
                    self.balloon_offset_days
                ),
            });
        }

        if self.max_annual_rate_percent < Decimal::ZERO {
            return Err(LoanError::InvalidConfiguration {
                message: format!(
                    "maximum annual rate must not be negative, got {}",
                    self.max_annual_rate_percent
                ),
            });
        }

        if self.prepayment_reference.trim().is_empty() {
            return Err(LoanError::InvalidConfiguration {
                message: "prepayment reference must not be blank".to_string(),
            });
        }

        Ok(())
    }

    /// true when a balance is small enough to treat the loan as repaid
    pub fn is_settled(&self, balance: Money) -> bool {
        balance <= self.settlement_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.settlement_tolerance, Money::from_minor(1));
        assert_eq!(config.balloon_offset_days, 30);
        assert_eq!(config.prepayment_reference, "PRINCIPAL_PREPAYMENT");
        assert_eq!(config.overpayment_policy, OverpaymentPolicy::CapAtBalance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "balloon_offset_days": 14, "overpayment_policy": "Reject" }"#,
        )
        .unwrap();

        assert_eq!(config.balloon_offset_days, 14);
        assert_eq!(config.overpayment_policy, OverpaymentPolicy::Reject);
        assert_eq!(config.max_annual_rate_percent, dec!(30));
    }

    #[test]
    fn test_json_round_trip_keeps_money_as_string() {
        let json = EngineConfig::default().to_json().unwrap();
        assert!(json.contains("\"settlement_tolerance\": \"0.01\""));
        assert_eq!(EngineConfig::from_json(&json).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "balloon_offset_days": 0 }"#),
            Err(LoanError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "settlement_tolerance": "-1" }"#),
            Err(LoanError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(LoanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_is_settled() {
        let config = EngineConfig::default();
        assert!(config.is_settled(Money::ZERO));
        assert!(config.is_settled(Money::CENT));
        assert!(!config.is_settled(Money::from_minor(2)));
    }
}
