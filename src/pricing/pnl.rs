//! Profit/loss and breakeven arithmetic.
//!
//! Pure functions invoked every frame with the contract's live spot and
//! cached premium. No side effects, no allocation.

use crate::contract::OptionType;

/// Standard equity option contract size. Referenced by display collaborators
/// as well; never rederive it inline.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Floor for the effective premium, keeps P/L-percentage math finite.
pub const MIN_PREMIUM: f64 = 0.01;

/// Payoff if exercised now. Zero-floored.
#[inline]
pub fn intrinsic_value(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

/// Strict inequality: exactly-at-the-money counts as out-of-the-money.
#[inline]
pub fn is_in_the_money(spot: f64, strike: f64, option_type: OptionType) -> bool {
    match option_type {
        OptionType::Call => spot > strike,
        OptionType::Put => spot < strike,
    }
}

/// P/L in dollars for `quantity` contracts. Negative quantity is a short
/// position and flips the sign.
#[inline]
pub fn profit_loss(current_price: f64, premium: f64, quantity: i32) -> f64 {
    (current_price - premium) * CONTRACT_MULTIPLIER * quantity as f64
}

/// Underlying price at which the position breaks even at expiry.
#[inline]
pub fn breakeven(strike: f64, premium: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => strike + premium,
        OptionType::Put => strike - premium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic() {
        assert_eq!(intrinsic_value(110.0, 100.0, OptionType::Call), 10.0);
        assert_eq!(intrinsic_value(90.0, 100.0, OptionType::Call), 0.0);
        assert_eq!(intrinsic_value(90.0, 100.0, OptionType::Put), 10.0);
        assert_eq!(intrinsic_value(110.0, 100.0, OptionType::Put), 0.0);
    }

    #[test]
    fn test_exactly_atm_is_not_itm() {
        assert!(!is_in_the_money(100.0, 100.0, OptionType::Call));
        assert!(!is_in_the_money(100.0, 100.0, OptionType::Put));
        assert!(is_in_the_money(100.01, 100.0, OptionType::Call));
        assert!(is_in_the_money(99.99, 100.0, OptionType::Put));
    }

    #[test]
    fn test_profit_loss_fixtures() {
        assert_eq!(profit_loss(5.20, 5.20, 1), 0.0);
        assert_eq!(profit_loss(7.00, 5.20, 1), 180.0);
        // Short position: price dropping below entry is a gain
        assert_eq!(profit_loss(3.00, 5.20, -1), 220.0);
    }

    #[test]
    fn test_breakeven() {
        assert_eq!(breakeven(600.0, 5.20, OptionType::Call), 605.2);
        assert_eq!(breakeven(600.0, 5.20, OptionType::Put), 594.8);
    }
}
