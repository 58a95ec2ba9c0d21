//! Free-text contract parser.
//!
//! Accepts strings like `"2 SPY 600C Dec 20 @ 5.20"` and produces the same
//! structured shape as the creation endpoint. Grammar, all but the middle
//! two tokens optional:
//!
//!   [quantity] TICKER STRIKE{C|P} [MONTH DAY] [@ PREMIUM]
//!
//! Quantity may be negative (short). Output always satisfies creation
//! validation: non-empty ticker, positive strike, call/put type.

use crate::contract::{ContractParams, OptionType};
use crate::errors::{EngineError, EngineResult};
use chrono::{Datelike, NaiveDate, Utc};

/// Expiry assumed when the string carries no date
const DEFAULT_DTE_YEARS: f64 = 30.0 / 365.0;

const DAYS_PER_YEAR: f64 = 365.0;

pub fn parse_contract(
    input: &str,
    default_spot: f64,
    default_iv: f64,
) -> EngineResult<ContractParams> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(EngineError::Parse("empty contract string".into()));
    }

    let mut idx = 0;

    // Optional signed quantity
    let quantity = match tokens[idx].parse::<i32>() {
        Ok(q) => {
            idx += 1;
            if q == 0 {
                return Err(EngineError::Parse("quantity must be nonzero".into()));
            }
            q
        }
        Err(_) => 1,
    };

    let ticker = tokens
        .get(idx)
        .filter(|t| t.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
        .ok_or_else(|| EngineError::Parse("expected ticker symbol".into()))?
        .to_uppercase();
    idx += 1;

    let (strike, option_type) = parse_strike_token(
        tokens
            .get(idx)
            .ok_or_else(|| EngineError::Parse("expected strike like 600C or 450P".into()))?,
    )?;
    idx += 1;

    // Split the tail at "@": date tokens before it, premium after
    let tail = &tokens[idx..];
    let at_pos = tail.iter().position(|t| *t == "@" || t.starts_with('@'));

    let (date_tokens, entry) = match at_pos {
        Some(p) => {
            let premium_str = if tail[p] == "@" {
                tail.get(p + 1)
                    .copied()
                    .ok_or_else(|| EngineError::Parse("expected premium after @".into()))?
            } else {
                &tail[p][1..]
            };
            let premium: f64 = premium_str
                .parse()
                .map_err(|_| EngineError::Parse(format!("invalid premium: {premium_str}")))?;
            if !(premium.is_finite() && premium > 0.0) {
                return Err(EngineError::Parse(format!("premium must be positive: {premium}")));
            }
            (&tail[..p], Some(premium))
        }
        None => (tail, None),
    };

    let t_years = match date_tokens {
        [] => DEFAULT_DTE_YEARS,
        [month, day] => parse_expiry(month, day)?,
        _ => {
            return Err(EngineError::Parse(format!(
                "unrecognized trailing tokens: {}",
                date_tokens.join(" ")
            )))
        }
    };

    Ok(ContractParams {
        ticker,
        option_type,
        strike,
        spot: default_spot,
        t_years,
        iv: default_iv,
        entry,
        quantity,
    })
}

/// "600C" / "450.5p" -> (strike, type)
fn parse_strike_token(token: &str) -> EngineResult<(f64, OptionType)> {
    let (num, suffix) = token.split_at(token.len().saturating_sub(1));
    let option_type = match suffix {
        "C" | "c" => OptionType::Call,
        "P" | "p" => OptionType::Put,
        _ => {
            return Err(EngineError::Parse(format!(
                "strike must end in C or P: {token}"
            )))
        }
    };
    let strike: f64 = num
        .parse()
        .map_err(|_| EngineError::Parse(format!("invalid strike: {token}")))?;
    if !(strike.is_finite() && strike > 0.0) {
        return Err(EngineError::Parse(format!("strike must be positive: {token}")));
    }
    Ok((strike, option_type))
}

/// "Dec 20" -> years to that date, rolling to next year if already past.
fn parse_expiry(month_tok: &str, day_tok: &str) -> EngineResult<f64> {
    let month = match month_tok.to_lowercase().get(..3) {
        Some("jan") => 1,
        Some("feb") => 2,
        Some("mar") => 3,
        Some("apr") => 4,
        Some("may") => 5,
        Some("jun") => 6,
        Some("jul") => 7,
        Some("aug") => 8,
        Some("sep") => 9,
        Some("oct") => 10,
        Some("nov") => 11,
        Some("dec") => 12,
        _ => return Err(EngineError::Parse(format!("unknown month: {month_tok}"))),
    };

    let day: u32 = day_tok
        .parse()
        .map_err(|_| EngineError::Parse(format!("invalid day: {day_tok}")))?;

    let today = Utc::now().date_naive();
    let mut expiry = NaiveDate::from_ymd_opt(today.year(), month, day)
        .ok_or_else(|| EngineError::Parse(format!("invalid date: {month_tok} {day_tok}")))?;
    if expiry < today {
        expiry = NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            .ok_or_else(|| EngineError::Parse(format!("invalid date: {month_tok} {day_tok}")))?;
    }

    Ok((expiry - today).num_days() as f64 / DAYS_PER_YEAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_contract_string() {
        let p = parse_contract("2 SPY 600C Dec 20 @ 5.20", 690.0, 0.16).unwrap();
        assert_eq!(p.quantity, 2);
        assert_eq!(p.ticker, "SPY");
        assert_eq!(p.strike, 600.0);
        assert_eq!(p.option_type, OptionType::Call);
        assert_eq!(p.entry, Some(5.20));
        assert_eq!(p.spot, 690.0);
        assert!(p.t_years > 0.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_minimal_contract_string() {
        let p = parse_contract("spy 550p", 690.0, 0.16).unwrap();
        assert_eq!(p.quantity, 1);
        assert_eq!(p.ticker, "SPY");
        assert_eq!(p.option_type, OptionType::Put);
        assert_eq!(p.entry, None);
        assert!((p.t_years - DEFAULT_DTE_YEARS).abs() < 1e-12);
    }

    #[test]
    fn test_short_position_quantity() {
        let p = parse_contract("-1 QQQ 480C @ 3", 480.0, 0.2).unwrap();
        assert_eq!(p.quantity, -1);
        assert_eq!(p.entry, Some(3.0));
    }

    #[test]
    fn test_premium_attached_to_at_sign() {
        let p = parse_contract("SPY 600C @5.20", 690.0, 0.16).unwrap();
        assert_eq!(p.entry, Some(5.20));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(parse_contract("", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY 600X", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY 0C", 690.0, 0.16).is_err());
        assert!(parse_contract("0 SPY 600C", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY 600C @", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY 600C @ -2", 690.0, 0.16).is_err());
        assert!(parse_contract("SPY 600C Foo 20", 690.0, 0.16).is_err());
    }

    #[test]
    fn test_expiry_rolls_forward() {
        let p = parse_contract("SPY 600C Jan 15", 690.0, 0.16).unwrap();
        // Whatever today is, the parsed expiry is in the future
        assert!(p.t_years >= 0.0);
        assert!(p.t_years < 1.01);
    }
}
