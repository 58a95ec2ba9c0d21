use crate::config::AppConfig;
use crate::contract::{AdjustParams, ContractParams};
use crate::pricing::moneyness::Moneyness;
use crate::pricing::Greeks;
use crate::sim::{Regime, Rocket};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use uuid::Uuid;

// ── Spot mailbox ──

/// Latest quote from the spot feed. Single-slot: the engine reads whatever
/// is current at the start of each tick, never a partial update.
#[derive(Debug, Clone, Copy)]
pub struct SpotQuote {
    pub price: f64,
    /// True once the feed has fail-latched onto the fallback price
    pub degraded: bool,
    pub timestamp_ms: i64,
}

// ── Messages INTO the engine (bounded channel + oneshot replies) ──

#[derive(Debug)]
pub enum EngineEvent {
    CreateContract {
        params: ContractParams,
        reply: oneshot::Sender<Result<Uuid, String>>,
    },
    AdjustContract {
        id: Uuid,
        params: AdjustParams,
        reply: oneshot::Sender<bool>,
    },
    RemoveContract {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Export {
        camera_state: serde_json::Value,
        reply: oneshot::Sender<serde_json::Value>,
    },
    Import {
        record: serde_json::Value,
        reply: oneshot::Sender<Result<usize, String>>,
    },
    Tick,
    Shutdown,
}

// ── Messages OUT of the engine ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "spot_price")]
    SpotPrice {
        price: f64,
        degraded: bool,
        timestamp: String,
    },

    #[serde(rename = "rocket_launched")]
    RocketLaunched { rocket: RocketSnapshot },

    #[serde(rename = "rocket_removed")]
    RocketRemoved { id: Uuid },

    #[serde(rename = "regime_change")]
    RegimeChange { id: Uuid, regime: Regime },

    #[serde(rename = "rocket_frozen")]
    RocketFrozen { id: Uuid },

    #[serde(rename = "feed_down")]
    FeedDown { reason: String, fallback: f64 },

    #[serde(rename = "scene_imported")]
    SceneImported { count: usize },
}

// ── Scene snapshot for rendering collaborators (watch channel) ──

/// Everything a renderer needs for one rocket, flat and serializable.
/// The rendering layer reads this; it never writes back into sim state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RocketSnapshot {
    pub id: Uuid,
    pub ticker: String,
    #[serde(rename = "type")]
    pub option_type: crate::contract::OptionType,
    pub strike: f64,
    pub spot: f64,
    pub quantity: i32,
    #[serde(rename = "timeToExpiryYears")]
    pub t_years: f64,
    #[serde(rename = "impliedVolatility")]
    pub iv: f64,
    pub greeks: Greeks,
    pub moneyness: Moneyness,
    pub regime: Regime,
    pub fuel: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub premium: f64,
    pub profit_loss: f64,
    pub breakeven: f64,
    pub in_the_money: bool,
    pub warp_pulse: f64,
    pub frozen: bool,
}

impl RocketSnapshot {
    pub fn from_rocket(rocket: &Rocket) -> Self {
        let c = &rocket.contract;
        let s = &rocket.state;
        Self {
            id: c.id,
            ticker: c.ticker.clone(),
            option_type: c.option_type,
            strike: c.strike,
            spot: c.spot,
            quantity: c.quantity,
            t_years: c.t_years,
            iv: c.iv,
            greeks: c.greeks,
            moneyness: c.moneyness(),
            regime: s.regime,
            fuel: s.fuel,
            position: [s.position.x, s.position.y, s.position.z],
            velocity: [s.velocity.x, s.velocity.y, s.velocity.z],
            premium: c.effective_premium(),
            profit_loss: c.profit_loss(),
            breakeven: c.breakeven(),
            in_the_money: c.is_in_the_money(),
            warp_pulse: s.warp_pulse,
            frozen: s.frozen,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SceneSnapshot {
    pub spot: f64,
    pub spot_degraded: bool,
    pub timestamp: String,
    pub frame: u64,
    pub rockets: Vec<RocketSnapshot>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            spot: 0.0,
            spot_degraded: false,
            timestamp: String::new(),
            frame: 0,
            rockets: Vec::new(),
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub frames_advanced: AtomicU64,
    pub prices_received: AtomicU64,
    pub contracts_launched: AtomicU64,
    pub adjustments_applied: AtomicU64,
    pub errors_recovered: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            frames_advanced: AtomicU64::new(0),
            prices_received: AtomicU64::new(0),
            contracts_launched: AtomicU64::new(0),
            adjustments_applied: AtomicU64::new(0),
            errors_recovered: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,

    // Engine -> renderers: latest scene (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<SceneSnapshot>,
    pub snapshot_rx: watch::Receiver<SceneSnapshot>,

    // Engine -> renderers: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    // HTTP handlers / feed -> engine: bounded event channel
    pub engine_tx: mpsc::Sender<EngineEvent>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, engine_tx: mpsc::Sender<EngineEvent>) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(2048);
        let (snapshot_tx, snapshot_rx) = watch::channel(SceneSnapshot::default());

        Arc::new(Self {
            config,
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            engine_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }
}
