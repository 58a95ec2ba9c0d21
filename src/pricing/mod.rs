pub mod moneyness;
pub mod pnl;

use crate::contract::OptionType;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Black-Scholes sensitivities for a single contract.
///
/// Conventions:
/// - `delta` in [-1, 1] (negative for puts)
/// - `gamma` >= 0, identical for calls and puts
/// - `vega` per 1-percentage-point IV move
/// - `theta` per calendar day (negative for long options away from expiry)
/// - `price` >= 0
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub price: f64,
}

const DAYS_PER_YEAR: f64 = 365.0;

/// Standard normal CDF. statrs is erf-based, so cdf(x) + cdf(-x) == 1 holds
/// to machine precision, which the put-call delta parity test relies on.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Standard normal PDF.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    Normal::standard().pdf(x)
}

/// Compute option price and Greeks from market parameters.
///
/// Pure function: deterministic output from inputs only, no allocation.
/// Callers validate `spot > 0`, `strike > 0`, `iv > 0` at the boundary;
/// non-finite inputs propagate as NaN rather than panicking.
///
/// `t_years <= 0` is not an error: the Greeks collapse to the terminal
/// payoff (unit-step delta, zero gamma/vega/theta, intrinsic price).
pub fn compute_greeks(
    spot: f64,
    strike: f64,
    t_years: f64,
    iv: f64,
    rate: f64,
    option_type: OptionType,
) -> Greeks {
    if t_years <= 0.0 {
        return terminal_greeks(spot, strike, option_type);
    }

    let sqrt_t = t_years.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * iv * iv) * t_years) / (iv * sqrt_t);
    let d2 = d1 - iv * sqrt_t;

    let pdf_d1 = norm_pdf(d1);
    let discount = (-rate * t_years).exp();

    let (delta, price, theta_year) = match option_type {
        OptionType::Call => {
            let delta = norm_cdf(d1);
            let price = spot * delta - strike * discount * norm_cdf(d2);
            let theta = -(spot * pdf_d1 * iv) / (2.0 * sqrt_t)
                - rate * strike * discount * norm_cdf(d2);
            (delta, price, theta)
        }
        OptionType::Put => {
            let delta = norm_cdf(d1) - 1.0;
            let price = strike * discount * norm_cdf(-d2) - spot * norm_cdf(-d1);
            let theta = -(spot * pdf_d1 * iv) / (2.0 * sqrt_t)
                + rate * strike * discount * norm_cdf(-d2);
            (delta, price, theta)
        }
    };

    Greeks {
        delta,
        gamma: pdf_d1 / (spot * iv * sqrt_t),
        vega: spot * pdf_d1 * sqrt_t * 0.01,
        theta: theta_year / DAYS_PER_YEAR,
        price: price.max(0.0),
    }
}

/// Expiry boundary: delta is a unit step on the strict ITM test,
/// time-dependent Greeks vanish, price is intrinsic.
fn terminal_greeks(spot: f64, strike: f64, option_type: OptionType) -> Greeks {
    let delta = match option_type {
        OptionType::Call => {
            if spot > strike {
                1.0
            } else {
                0.0
            }
        }
        OptionType::Put => {
            if spot < strike {
                -1.0
            } else {
                0.0
            }
        }
    };

    Greeks {
        delta,
        gamma: 0.0,
        vega: 0.0,
        theta: 0.0,
        price: pnl::intrinsic_value(spot, strike, option_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_and_gamma_ranges() {
        // Sweep spot/strike/iv/T and check structural invariants
        for &spot in &[50.0, 100.0, 250.0, 690.0] {
            for &strike in &[80.0, 100.0, 600.0] {
                for &iv in &[0.05, 0.16, 0.5, 1.2] {
                    for &t in &[1.0 / 365.0, 30.0 / 365.0, 1.0] {
                        for &ty in &[OptionType::Call, OptionType::Put] {
                            let g = compute_greeks(spot, strike, t, iv, 0.05, ty);
                            assert!(
                                (-1.0..=1.0).contains(&g.delta),
                                "delta {} out of range",
                                g.delta
                            );
                            assert!(g.gamma >= 0.0, "gamma {} negative", g.gamma);
                            assert!(g.price >= 0.0, "price {} negative", g.price);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_payoff_call() {
        let g = compute_greeks(110.0, 100.0, 0.0, 0.2, 0.05, OptionType::Call);
        assert_eq!(g.price, 10.0);
        assert_eq!(g.delta, 1.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.vega, 0.0);
        assert_eq!(g.theta, 0.0);
    }

    #[test]
    fn test_terminal_payoff_put() {
        let g = compute_greeks(110.0, 100.0, 0.0, 0.2, 0.05, OptionType::Put);
        assert_eq!(g.price, 0.0);
        assert_eq!(g.delta, 0.0);
    }

    #[test]
    fn test_terminal_exactly_atm_is_otm() {
        // Strict inequality at the boundary: exactly-at-the-money expires worthless
        let call = compute_greeks(100.0, 100.0, 0.0, 0.2, 0.05, OptionType::Call);
        assert_eq!(call.delta, 0.0);
        assert_eq!(call.price, 0.0);
        let put = compute_greeks(100.0, 100.0, 0.0, 0.2, 0.05, OptionType::Put);
        assert_eq!(put.delta, 0.0);
    }

    #[test]
    fn test_cdf_symmetry() {
        for &x in &[0.0, 0.3, 1.0, 2.5, 7.0] {
            let sum = norm_cdf(x) + norm_cdf(-x);
            assert!((sum - 1.0).abs() < 1e-12, "cdf({x}) asymmetric: {sum}");
        }
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_put_call_delta_parity() {
        let c = compute_greeks(690.0, 700.0, 45.0 / 365.0, 0.22, 0.05, OptionType::Call);
        let p = compute_greeks(690.0, 700.0, 45.0 / 365.0, 0.22, 0.05, OptionType::Put);
        assert!(
            ((c.delta - p.delta) - 1.0).abs() < 1e-10,
            "delta(call) - delta(put) = {}",
            c.delta - p.delta
        );
        // gamma and vega are type-independent
        assert!((c.gamma - p.gamma).abs() < 1e-12);
        assert!((c.vega - p.vega).abs() < 1e-12);
    }

    #[test]
    fn test_atm_call_delta_near_half() {
        let g = compute_greeks(690.0, 690.0, 60.0 / 365.0, 0.14, 0.0, OptionType::Call);
        assert!(
            (g.delta - 0.5).abs() < 0.05,
            "ATM delta {} should be near 0.5",
            g.delta
        );
    }

    #[test]
    fn test_theta_negative_for_long_atm() {
        let g = compute_greeks(100.0, 100.0, 30.0 / 365.0, 0.3, 0.05, OptionType::Call);
        assert!(g.theta < 0.0, "ATM call theta {} should decay", g.theta);
    }
}
