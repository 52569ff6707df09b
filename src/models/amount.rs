//! Minor-unit conversions on arbitrary precision decimals

use crate::error::{SwapError, SwapResult};

use bigdecimal::BigDecimal;
use ethers::types::U256;

fn scale_factor(decimals: u32) -> BigDecimal {
    BigDecimal::new(1.into(), -i64::from(decimals))
}

/// Convert a currency amount (e.g. `1.5` ETH) into integer minor units,
/// truncating anything below one unit
pub fn currency_to_unit(decimals: u32, amount: &BigDecimal) -> BigDecimal {
    (amount * scale_factor(decimals)).with_scale(0)
}

/// Convert integer minor units back into a currency amount
pub fn unit_to_currency(decimals: u32, units: &BigDecimal) -> BigDecimal {
    (units / scale_factor(decimals)).normalized()
}

/// Convert integer minor units into an on-chain `U256`
pub fn to_u256(units: &BigDecimal) -> SwapResult<U256> {
    if units < &BigDecimal::from(0) {
        return Err(SwapError::Internal(format!("negative amount {}", units)));
    }
    let integer = units.with_scale(0).to_string();
    U256::from_dec_str(&integer)
        .map_err(|e| SwapError::Internal(format!("amount {} out of range: {}", units, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_currency_unit_conversion() {
        let amount = BigDecimal::from_str("1.5").unwrap();
        let units = currency_to_unit(18, &amount);
        assert_eq!(units, BigDecimal::from_str("1500000000000000000").unwrap());
        assert_eq!(unit_to_currency(18, &units), amount);
    }

    #[test]
    fn test_sub_unit_amounts_truncate() {
        let amount = BigDecimal::from_str("0.0000001").unwrap();
        assert_eq!(currency_to_unit(6, &amount), BigDecimal::from(0));
    }

    #[test]
    fn test_to_u256() {
        let units = BigDecimal::from_str("123456789012345678901234567890").unwrap();
        assert_eq!(
            to_u256(&units).unwrap(),
            U256::from_dec_str("123456789012345678901234567890").unwrap()
        );
        assert!(to_u256(&BigDecimal::from(-1)).is_err());
    }
}
