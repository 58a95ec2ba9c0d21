use crate::errors::{EngineError, EngineResult};
use crate::pricing::moneyness::Moneyness;
use crate::pricing::{self, pnl, Greeks};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl OptionType {
    /// +1 for calls, -1 for puts. Used for vertical orientation flips.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Call => 1.0,
            Self::Put => -1.0,
        }
    }
}

/// Creation input, the shape every entry path (REST body, text parser,
/// import) must produce before a rocket launches.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContractParams {
    pub ticker: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike: f64,
    pub spot: f64,
    #[serde(rename = "timeToExpiryYears")]
    pub t_years: f64,
    #[serde(rename = "impliedVolatility")]
    pub iv: f64,
    /// Entry premium actually paid; defaults to the computed creation price
    #[serde(default)]
    pub entry: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

impl ContractParams {
    /// Boundary validation. Rejects before any contract state exists.
    pub fn validate(&self) -> EngineResult<()> {
        if self.ticker.trim().is_empty() {
            return Err(EngineError::InvalidContract("ticker must be non-empty".into()));
        }
        if !(self.strike.is_finite() && self.strike > 0.0) {
            return Err(EngineError::InvalidContract(format!(
                "strike must be positive, got {}",
                self.strike
            )));
        }
        if !(self.spot.is_finite() && self.spot > 0.0) {
            return Err(EngineError::InvalidContract(format!(
                "spot must be positive, got {}",
                self.spot
            )));
        }
        if !(self.iv.is_finite() && self.iv > 0.0) {
            return Err(EngineError::InvalidContract(format!(
                "implied volatility must be positive, got {}",
                self.iv
            )));
        }
        if !(self.t_years.is_finite() && self.t_years >= 0.0) {
            return Err(EngineError::InvalidContract(format!(
                "time to expiry must be non-negative, got {}",
                self.t_years
            )));
        }
        if let Some(entry) = self.entry {
            if !(entry.is_finite() && entry > 0.0) {
                return Err(EngineError::InvalidContract(format!(
                    "entry premium must be positive, got {entry}"
                )));
            }
        }
        if self.quantity == 0 {
            return Err(EngineError::InvalidContract("quantity must be nonzero".into()));
        }
        Ok(())
    }
}

/// Sparse adjustment to a live contract. Absent fields are left untouched;
/// any present field that fails validation rejects the whole update.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AdjustParams {
    pub strike: Option<f64>,
    pub spot: Option<f64>,
    #[serde(rename = "impliedVolatility")]
    pub iv: Option<f64>,
    #[serde(rename = "timeToExpiryYears")]
    pub t_years: Option<f64>,
    #[serde(rename = "type")]
    pub option_type: Option<OptionType>,
    /// One-frame manual position override, consumed by the next tick
    pub position: Option<[f64; 3]>,
}

impl AdjustParams {
    /// True when any financial field is present (forces a synchronous
    /// Greek recomputation before the adjustment reply goes out).
    #[inline]
    pub fn touches_greeks(&self) -> bool {
        self.strike.is_some()
            || self.spot.is_some()
            || self.iv.is_some()
            || self.t_years.is_some()
            || self.option_type.is_some()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(s) = self.strike {
            if !(s.is_finite() && s > 0.0) {
                return Err(EngineError::InvalidContract(format!("strike: {s}")));
            }
        }
        if let Some(s) = self.spot {
            if !(s.is_finite() && s > 0.0) {
                return Err(EngineError::InvalidContract(format!("spot: {s}")));
            }
        }
        if let Some(v) = self.iv {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::InvalidContract(format!("implied volatility: {v}")));
            }
        }
        if let Some(t) = self.t_years {
            if !(t.is_finite() && t >= 0.0) {
                return Err(EngineError::InvalidContract(format!("time to expiry: {t}")));
            }
        }
        if let Some(p) = self.position {
            if p.iter().any(|c| !c.is_finite()) {
                return Err(EngineError::InvalidContract("position must be finite".into()));
            }
        }
        Ok(())
    }
}

/// One simulated option position. Financial parameters plus live Greeks;
/// kinematic state lives separately in the simulator.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Contract {
    pub id: Uuid,
    pub ticker: String,
    pub option_type: OptionType,
    pub strike: f64,
    /// Per-contract live spot: the feed updates it for matching tickers,
    /// what-if sliders update it directly
    pub spot: f64,
    pub t_years: f64,
    pub iv: f64,
    /// Explicitly stored premium override, if any
    pub premium: Option<f64>,
    /// Entry premium supplied at creation, if any
    pub entry: Option<f64>,
    pub quantity: i32,
    /// Option price computed at creation time, the default P/L baseline
    pub creation_price: f64,
    pub greeks: Greeks,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Contract {
    /// Validate, price, and launch a new contract.
    pub fn create(params: ContractParams, rate: f64) -> EngineResult<Self> {
        params.validate()?;

        let greeks = pricing::compute_greeks(
            params.spot,
            params.strike,
            params.t_years,
            params.iv,
            rate,
            params.option_type,
        );

        Ok(Self {
            id: Uuid::new_v4(),
            ticker: params.ticker.trim().to_uppercase(),
            option_type: params.option_type,
            strike: params.strike,
            spot: params.spot,
            t_years: params.t_years,
            iv: params.iv,
            premium: None,
            entry: params.entry,
            quantity: params.quantity,
            creation_price: greeks.price,
            greeks,
            created_at: chrono::Utc::now(),
        })
    }

    /// Recompute Greeks from the current parameter set. Called synchronously
    /// on every parameter change and each frame from live spot.
    #[inline]
    pub fn refresh_greeks(&mut self, rate: f64) {
        self.greeks = pricing::compute_greeks(
            self.spot,
            self.strike,
            self.t_years,
            self.iv,
            rate,
            self.option_type,
        );
    }

    /// Apply a validated sparse adjustment. Greeks are refreshed here, before
    /// the caller's reply, so no stale Greeks survive a parameter change.
    pub fn apply_adjustment(&mut self, params: &AdjustParams, rate: f64) {
        if let Some(s) = params.strike {
            self.strike = s;
        }
        if let Some(s) = params.spot {
            self.spot = s;
        }
        if let Some(v) = params.iv {
            self.iv = v;
        }
        if let Some(t) = params.t_years {
            self.t_years = t;
        }
        if let Some(ty) = params.option_type {
            self.option_type = ty;
        }
        if params.touches_greeks() {
            self.refresh_greeks(rate);
        }
    }

    /// P/L baseline, resolved in documented priority order:
    /// stored premium -> entry at creation -> creation-time computed price ->
    /// current computed price. The last resort makes first-frame P/L exactly
    /// zero. Floored at MIN_PREMIUM to keep ratio math finite.
    #[inline]
    pub fn effective_premium(&self) -> f64 {
        self.premium
            .or(self.entry)
            .unwrap_or(if self.creation_price > 0.0 {
                self.creation_price
            } else {
                self.greeks.price
            })
            .max(pnl::MIN_PREMIUM)
    }

    /// Current P/L in dollars from live computed price vs the premium chain.
    #[inline]
    pub fn profit_loss(&self) -> f64 {
        pnl::profit_loss(self.greeks.price, self.effective_premium(), self.quantity)
    }

    #[inline]
    pub fn breakeven(&self) -> f64 {
        pnl::breakeven(self.strike, self.effective_premium(), self.option_type)
    }

    #[inline]
    pub fn moneyness(&self) -> Moneyness {
        Moneyness::classify(self.greeks.delta)
    }

    #[inline]
    pub fn is_in_the_money(&self) -> bool {
        pnl::is_in_the_money(self.spot, self.strike, self.option_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm_call() -> ContractParams {
        ContractParams {
            ticker: "SPY".into(),
            option_type: OptionType::Call,
            strike: 690.0,
            spot: 690.0,
            t_years: 60.0 / 365.0,
            iv: 0.14,
            entry: Some(0.5),
            quantity: 1,
        }
    }

    #[test]
    fn test_create_validates_boundary() {
        let mut p = atm_call();
        p.strike = -1.0;
        assert!(Contract::create(p, 0.05).is_err());

        let mut p = atm_call();
        p.iv = 0.0;
        assert!(Contract::create(p, 0.05).is_err());

        let mut p = atm_call();
        p.ticker = "  ".into();
        assert!(Contract::create(p, 0.05).is_err());

        let mut p = atm_call();
        p.quantity = 0;
        assert!(Contract::create(p, 0.05).is_err());

        assert!(Contract::create(atm_call(), 0.05).is_ok());
    }

    #[test]
    fn test_zero_expiry_is_not_an_error() {
        let mut p = atm_call();
        p.t_years = 0.0;
        p.spot = 700.0;
        let c = Contract::create(p, 0.05).unwrap();
        assert_eq!(c.greeks.delta, 1.0);
        assert_eq!(c.greeks.price, 10.0);
    }

    #[test]
    fn test_premium_fallback_chain() {
        // entry supplied -> used
        let c = Contract::create(atm_call(), 0.05).unwrap();
        assert_eq!(c.effective_premium(), 0.5);

        // explicit premium overrides entry
        let mut c2 = c.clone();
        c2.premium = Some(7.5);
        assert_eq!(c2.effective_premium(), 7.5);

        // neither -> creation price
        let mut p = atm_call();
        p.entry = None;
        let c3 = Contract::create(p, 0.05).unwrap();
        assert!((c3.effective_premium() - c3.creation_price).abs() < 1e-12);
        // and first-frame P/L is exactly zero through that path
        assert_eq!(c3.profit_loss(), 0.0);
    }

    #[test]
    fn test_adjustment_refreshes_greeks_synchronously() {
        let mut c = Contract::create(atm_call(), 0.05).unwrap();
        let before = c.greeks.delta;

        let adj = AdjustParams {
            spot: Some(500.0),
            ..Default::default()
        };
        adj.validate().unwrap();
        c.apply_adjustment(&adj, 0.05);

        assert!(c.greeks.delta < before);
        assert!(c.greeks.delta.abs() < 0.15, "deep OTM delta {}", c.greeks.delta);
    }

    #[test]
    fn test_adjustment_rejects_bad_values() {
        let adj = AdjustParams {
            iv: Some(-0.2),
            ..Default::default()
        };
        assert!(adj.validate().is_err());

        let adj = AdjustParams {
            position: Some([f64::NAN, 0.0, 0.0]),
            ..Default::default()
        };
        assert!(adj.validate().is_err());
    }
}
