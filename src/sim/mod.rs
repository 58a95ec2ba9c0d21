pub mod kinematics;

use crate::contract::{AdjustParams, Contract, ContractParams};
use crate::errors::EngineResult;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Common 3D vector type for the kinematic core
pub type Vec3 = nalgebra::Vector3<f64>;

/// Active kinematic behavior mode. `Crashed` is a one-way latch and takes
/// precedence over everything; `Warping` and `Normal` are re-evaluated each
/// frame from live delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Normal,
    Warping,
    Crashed,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warping => write!(f, "warping"),
            Self::Crashed => write!(f, "crashed"),
        }
    }
}

/// Per-frame notifications out of the integrator, consumed by the engine
/// loop for logging and WS broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    WarpEntered,
    WarpExited,
    Crashed,
    Frozen,
}

/// Kinematic state, owned exclusively by the simulator. One per contract,
/// created and destroyed together with it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Depletes over the run, clamped at 0, never replenished
    pub fuel: f64,
    /// Fixed at creation from creation-time |delta|
    pub max_thrust: f64,
    /// Fixed at creation from creation-time |theta|
    pub fuel_burn_rate: f64,
    pub max_speed: f64,
    pub drag_coeff: f64,
    /// Fixed forward orientation from initial delta tilt + call/put flip
    pub forward: Vec3,
    /// Per-contract spot marker, the warp/crash attraction target
    pub spot_anchor: Vec3,
    pub regime: Regime,
    /// Latched when position/velocity go non-finite
    pub frozen: bool,
    #[serde(skip)]
    pub position_override: Option<Vec3>,
    /// Transient warp trail intensity, reset on regime exit
    pub warp_pulse: f64,
}

/// Contract plus its kinematic state. The only place the two are paired.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Rocket {
    pub contract: Contract,
    pub state: SimState,
}

/// Owned, id-keyed collection of all live rockets. BTreeMap gives a stable
/// iteration order across frames (contracts never interact, but snapshots
/// and advance passes stay deterministic).
pub struct Fleet {
    rockets: BTreeMap<Uuid, Rocket>,
    /// Risk-free rate shared by every Greek recomputation
    rate: f64,
}

impl Fleet {
    pub fn new(rate: f64) -> Self {
        Self {
            rockets: BTreeMap::new(),
            rate,
        }
    }

    /// Validate, price, and launch. Contract and SimState are born together.
    pub fn launch(&mut self, params: ContractParams) -> EngineResult<Uuid> {
        let contract = Contract::create(params, self.rate)?;
        let id = contract.id;
        let state = kinematics::spawn_state(&contract);

        tracing::info!(
            id = %id,
            ticker = %contract.ticker,
            kind = %contract.option_type,
            strike = contract.strike,
            spot = contract.spot,
            delta = contract.greeks.delta,
            moneyness = %contract.moneyness(),
            "rocket launched"
        );

        self.rockets.insert(id, Rocket { contract, state });
        Ok(id)
    }

    /// Remove a rocket and its state together. False for unknown ids.
    pub fn remove(&mut self, id: Uuid) -> bool {
        self.rockets.remove(&id).is_some()
    }

    /// Sparse parameter adjustment. Returns false without mutation when the
    /// id does not resolve; Greeks are refreshed synchronously before return.
    pub fn adjust(&mut self, id: Uuid, params: &AdjustParams) -> bool {
        if params.validate().is_err() {
            return false;
        }
        let Some(rocket) = self.rockets.get_mut(&id) else {
            return false;
        };

        rocket.contract.apply_adjustment(params, self.rate);

        if params.spot.is_some() || params.strike.is_some() {
            rocket.state.spot_anchor =
                kinematics::spot_anchor(rocket.contract.spot, rocket.contract.strike);
        }
        if let Some(p) = params.position {
            rocket.state.position_override = Some(Vec3::new(p[0], p[1], p[2]));
        }
        true
    }

    /// Apply a live feed price to every contract tracking `symbol`.
    pub fn apply_spot(&mut self, symbol: &str, price: f64) {
        for rocket in self.rockets.values_mut() {
            if rocket.contract.ticker == symbol {
                rocket.contract.spot = price;
                rocket.contract.refresh_greeks(self.rate);
                rocket.state.spot_anchor =
                    kinematics::spot_anchor(rocket.contract.spot, rocket.contract.strike);
            }
        }
    }

    /// One frame for the whole fleet: refresh Greeks from each contract's
    /// current spot, then integrate. Pure synchronous pass, no suspension.
    pub fn advance_all(&mut self, dt: f64) -> SmallVec<[(Uuid, SimEvent); 8]> {
        let mut events: SmallVec<[(Uuid, SimEvent); 8]> = SmallVec::new();

        for (id, rocket) in self.rockets.iter_mut() {
            rocket.contract.refresh_greeks(self.rate);
            for ev in kinematics::advance(&rocket.contract, &mut rocket.state, dt) {
                events.push((*id, ev));
            }
        }

        events
    }

    #[inline]
    pub fn get(&self, id: Uuid) -> Option<&Rocket> {
        self.rockets.get(&id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &Rocket)> {
        self.rockets.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rockets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rockets.is_empty()
    }

    /// Drop everything and install imported rockets in one step.
    pub fn replace_all(&mut self, rockets: Vec<Rocket>) {
        self.rockets.clear();
        for rocket in rockets {
            self.rockets.insert(rocket.contract.id, rocket);
        }
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}
