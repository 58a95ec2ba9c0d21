//! Moneyness classification from delta magnitude.
//!
//! Three independent threshold families reference these boundaries: the
//! primary ITM/ATM/OTM split, the warp regime, and the crash regime. They
//! are deliberately separate constants; do not collapse them.

/// Primary classification: `|delta| > ITM_DELTA` is in-the-money
pub const ITM_DELTA: f64 = 0.8;
/// Primary classification: `|delta| <= OTM_DELTA` is out-of-the-money
pub const OTM_DELTA: f64 = 0.2;
/// Warp regime entry/exit: stricter than the ITM boundary
pub const WARP_DELTA: f64 = 0.9;
/// Crash regime entry: looser than the OTM boundary
pub const CRASH_DELTA: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moneyness {
    Itm,
    Atm,
    Otm,
}

impl std::fmt::Display for Moneyness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Itm => write!(f, "itm"),
            Self::Atm => write!(f, "atm"),
            Self::Otm => write!(f, "otm"),
        }
    }
}

impl Moneyness {
    /// Classify from live delta. Sign is irrelevant; puts carry negative delta.
    #[inline]
    pub fn classify(delta: f64) -> Self {
        let d = delta.abs();
        if d > ITM_DELTA {
            Self::Itm
        } else if d > OTM_DELTA {
            Self::Atm
        } else {
            Self::Otm
        }
    }

    /// Spawn-orbit scale for this class: deeper ITM launches closer to the
    /// anchor, far OTM starts on a wider orbit.
    #[inline]
    pub fn orbit_factor(self) -> f64 {
        match self {
            Self::Itm => 0.7,
            Self::Atm => 1.0,
            Self::Otm => 1.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_bands() {
        assert_eq!(Moneyness::classify(0.95), Moneyness::Itm);
        assert_eq!(Moneyness::classify(-0.85), Moneyness::Itm);
        assert_eq!(Moneyness::classify(0.5), Moneyness::Atm);
        assert_eq!(Moneyness::classify(-0.21), Moneyness::Atm);
        assert_eq!(Moneyness::classify(0.2), Moneyness::Otm);
        assert_eq!(Moneyness::classify(-0.05), Moneyness::Otm);
    }

    #[test]
    fn test_boundary_exact() {
        // 0.8 exactly is ATM (strict >), 0.2 exactly is OTM (strict >)
        assert_eq!(Moneyness::classify(0.8), Moneyness::Atm);
        assert_eq!(Moneyness::classify(0.2), Moneyness::Otm);
    }

    #[test]
    fn test_regime_thresholds_are_distinct() {
        assert!(WARP_DELTA > ITM_DELTA);
        assert!(CRASH_DELTA < OTM_DELTA);
    }
}
