use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the spot-price service
    pub spot_feed_base_url: String,
    /// Symbol the live feed tracks; only contracts on this ticker follow it
    pub spot_feed_symbol: String,
    /// Polling interval in seconds
    pub spot_poll_secs: u64,
    /// Price used when the feed is down or never came up
    pub fallback_spot: f64,
    /// Default implied volatility for parsed contracts that omit one
    pub default_iv: f64,
    /// Risk-free rate used in all Greek computation
    pub risk_free_rate: f64,
    /// Simulation frame rate (ticks per second)
    pub frame_rate: u32,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let spot_poll_secs = env_var_or("SPOT_POLL_SECS", "5")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("SPOT_POLL_SECS: {e}")))?;

        let fallback_spot = env_var_or("FALLBACK_SPOT", "690.0")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("FALLBACK_SPOT: {e}")))?;

        let default_iv = env_var_or("DEFAULT_IV", "0.16")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_IV: {e}")))?;

        let risk_free_rate = env_var_or("RISK_FREE_RATE", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("RISK_FREE_RATE: {e}")))?;

        let frame_rate = env_var_or("FRAME_RATE", "60")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("FRAME_RATE: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        if fallback_spot <= 0.0 {
            return Err(EngineError::Config("FALLBACK_SPOT must be positive".into()));
        }
        if default_iv <= 0.0 {
            return Err(EngineError::Config("DEFAULT_IV must be positive".into()));
        }
        if frame_rate == 0 {
            return Err(EngineError::Config("FRAME_RATE must be nonzero".into()));
        }

        Ok(Self {
            spot_feed_base_url: env_var_or(
                "SPOT_FEED_BASE_URL",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            ),
            spot_feed_symbol: env_var_or("SPOT_FEED_SYMBOL", "SPY"),
            spot_poll_secs,
            fallback_spot,
            default_iv,
            risk_free_rate,
            frame_rate,
            server_port,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
