use crate::contract::Contract;
use crate::pricing::moneyness::{Moneyness, CRASH_DELTA, WARP_DELTA};
use crate::sim::{Regime, SimEvent, SimState, Vec3};
use smallvec::SmallVec;

// ═══════════════════════════════════════════════════════════════════════════
// KINEMATIC TUNING
//
// Units are visual, not SI. The invariants that matter:
// - fuel is monotone non-increasing in [0, 1]
// - a rocket never penetrates the origin anchor under normal dynamics
// - crash contact latches permanently; warp distance is hard-bounded
// ═══════════════════════════════════════════════════════════════════════════

/// Inverse-square gravity strength toward the origin anchor
pub const GRAVITY_K: f64 = 40.0;
/// Gravity is skipped inside this distance to avoid a 1/d² blow-up
pub const ANCHOR_EPSILON: f64 = 1e-3;
/// Rockets reflect off this radius around the origin
pub const MIN_SAFE_RADIUS: f64 = 2.0;
/// Fraction of normal-component speed kept on reflection (inelastic)
pub const BOUNCE_RESTITUTION: f64 = 0.35;

/// Baseline linear drag (per second); IV widens it at creation
pub const BASE_DRAG: f64 = 0.12;
pub const IV_DRAG_SCALE: f64 = 1.5;

/// Thrust/burn/speed scales, fixed from creation-time Greeks
pub const BASE_THRUST: f64 = 6.0;
pub const BASE_BURN_RATE: f64 = 0.02;
pub const THETA_BURN_SCALE: f64 = 8.0;
pub const BASE_MAX_SPEED: f64 = 12.0;

/// Spawn orbit radius before the moneyness factor is applied
pub const BASE_ORBIT_RADIUS: f64 = 20.0;
/// Forward-orientation pitch per unit of creation delta
pub const DELTA_TILT: f64 = std::f64::consts::FRAC_PI_4;
/// Vertical placement of the per-contract spot marker per unit log-moneyness
pub const PRICE_AXIS_SCALE: f64 = 30.0;

/// Warp regime: hard cap on distance from the spot marker, and the
/// acceleration used to approach it
pub const WARP_MAX_DISTANCE: f64 = 8.0;
pub const WARP_ACCEL: f64 = 20.0;
/// Warp pulse decay rate (per second), transient trail state
pub const WARP_PULSE_DECAY: f64 = 2.0;

/// Crash regime: pull toward the spot marker, ramping up as |delta| -> 0
pub const CRASH_PULL_BASE: f64 = 15.0;
pub const CRASH_PULL_RAMP: f64 = 4.0;
/// Contact distance at which the crash latches
pub const CRASH_CONTACT_RADIUS: f64 = 0.75;

/// Vertical position of a contract's spot marker: log-moneyness on the
/// price axis. Recomputed whenever spot or strike changes.
#[inline]
pub fn spot_anchor(spot: f64, strike: f64) -> Vec3 {
    Vec3::new(0.0, (spot / strike).ln() * PRICE_AXIS_SCALE, 0.0)
}

/// Build the initial kinematic state for a freshly launched contract.
///
/// Thrust, burn rate, top speed and drag are derived ONCE from the
/// creation-time Greeks and never refreshed from live delta/theta during
/// flight. Spawn placement is deterministic per contract id.
pub fn spawn_state(contract: &Contract) -> SimState {
    let delta = contract.greeks.delta;
    let theta = contract.greeks.theta;

    let radius = BASE_ORBIT_RADIUS * Moneyness::classify(delta).orbit_factor();
    let angle = (contract.id.as_u128() % 360) as f64 * std::f64::consts::PI / 180.0;

    let position = Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
    let tangent = Vec3::new(-angle.sin(), 0.0, angle.cos());

    // Circular-orbit speed for k/d² gravity: v = sqrt(k / r)
    let velocity = tangent * (GRAVITY_K / radius).sqrt();

    // Fixed forward orientation: tangential, pitched by delta, vertical
    // component flipped for puts
    let tilt = delta.abs() * DELTA_TILT;
    let forward =
        (tangent * tilt.cos() + Vec3::new(0.0, contract.option_type.sign() * tilt.sin(), 0.0))
            .normalize();

    SimState {
        position,
        velocity,
        fuel: 1.0,
        max_thrust: BASE_THRUST * (0.5 + delta.abs()),
        fuel_burn_rate: BASE_BURN_RATE * (1.0 + theta.abs() * THETA_BURN_SCALE),
        max_speed: BASE_MAX_SPEED * (0.5 + delta.abs()),
        drag_coeff: BASE_DRAG * (1.0 + contract.iv * IV_DRAG_SCALE),
        forward,
        spot_anchor: spot_anchor(contract.spot, contract.strike),
        regime: Regime::Normal,
        frozen: false,
        position_override: None,
        warp_pulse: 0.0,
    }
}

/// Advance one contract by one frame. Pure arithmetic, no allocation beyond
/// the (stack-backed) event list. Regime precedence: a crash latch overrides
/// everything; warp vs normal is re-evaluated each frame from live delta.
pub fn advance(contract: &Contract, state: &mut SimState, dt: f64) -> SmallVec<[SimEvent; 2]> {
    let mut events: SmallVec<[SimEvent; 2]> = SmallVec::new();

    if state.frozen || state.regime == Regime::Crashed {
        return events;
    }

    // Malformed state: freeze in place rather than leaking NaN into the
    // shared snapshot. Contract-scoped, never fatal to the scene.
    if !finite(&state.position) || !finite(&state.velocity) {
        state.frozen = true;
        events.push(SimEvent::Frozen);
        return events;
    }

    // Manual override wins the frame outright; integration resumes from the
    // overridden position next tick.
    if let Some(p) = state.position_override.take() {
        state.position = p;
        return events;
    }

    let delta = contract.greeks.delta;

    // Warp transitions are edge-triggered; exiting resets the pulse/trail state
    let want_warp = delta.abs() > WARP_DELTA;
    match (state.regime, want_warp) {
        (Regime::Normal, true) => {
            state.regime = Regime::Warping;
            state.warp_pulse = 1.0;
            events.push(SimEvent::WarpEntered);
        }
        (Regime::Warping, false) => {
            state.regime = Regime::Normal;
            state.warp_pulse = 0.0;
            events.push(SimEvent::WarpExited);
        }
        _ => {}
    }

    match state.regime {
        Regime::Warping => advance_warp(state, dt),
        Regime::Normal => {
            if delta.abs() < CRASH_DELTA {
                if advance_crash_pull(state, delta, dt) {
                    state.regime = Regime::Crashed;
                    events.push(SimEvent::Crashed);
                }
            } else {
                advance_normal(state, dt);
            }
        }
        Regime::Crashed => unreachable!("crashed contracts return early"),
    }

    events
}

/// Standard regime: inverse-square gravity, fixed-constant thrust while fuel
/// lasts, linear drag, speed clamp, reflection at the minimum safe radius.
fn advance_normal(state: &mut SimState, dt: f64) {
    let mut accel = Vec3::zeros();

    let dist = state.position.norm();
    if dist > ANCHOR_EPSILON {
        accel -= state.position / dist * (GRAVITY_K / (dist * dist));
    }

    if state.fuel > 0.0 {
        accel += state.forward * (state.max_thrust * state.fuel);
        state.fuel = (state.fuel - state.fuel_burn_rate * dt).max(0.0);
    }

    accel -= state.velocity * state.drag_coeff;

    state.velocity += accel * dt;
    let speed = state.velocity.norm();
    if speed > state.max_speed {
        state.velocity *= state.max_speed / speed;
    }

    state.position += state.velocity * dt;

    // Inelastic bounce: kill the inward normal component, clamp to the shell
    let dist = state.position.norm();
    if dist < MIN_SAFE_RADIUS {
        let normal = if dist > ANCHOR_EPSILON {
            state.position / dist
        } else {
            Vec3::x()
        };
        let vn = state.velocity.dot(&normal);
        if vn < 0.0 {
            state.velocity -= normal * ((1.0 + BOUNCE_RESTITUTION) * vn);
        }
        state.position = normal * MIN_SAFE_RADIUS;
    }
}

/// Extreme-ITM regime: approach the spot marker and never exceed the warp
/// radius around it. Normal gravity/thrust integration is suspended.
fn advance_warp(state: &mut SimState, dt: f64) {
    let offset = state.position - state.spot_anchor;
    let dist = offset.norm();

    if dist > WARP_MAX_DISTANCE {
        let inward = -offset / dist;
        state.velocity += inward * (WARP_ACCEL * dt);
    }

    state.velocity -= state.velocity * (state.drag_coeff * dt);
    state.position += state.velocity * dt;

    // Hard bound, regardless of what integration produced
    let offset = state.position - state.spot_anchor;
    let dist = offset.norm();
    if dist > WARP_MAX_DISTANCE {
        state.position = state.spot_anchor + offset / dist * WARP_MAX_DISTANCE;
    }

    state.warp_pulse = (state.warp_pulse - WARP_PULSE_DECAY * dt * state.warp_pulse).max(0.0);
}

/// Deep-OTM regime: strengthening pull toward the spot marker in place of
/// the normal gravity constant. Returns true when contact latches the crash.
fn advance_crash_pull(state: &mut SimState, delta: f64, dt: f64) -> bool {
    let to_anchor = state.spot_anchor - state.position;
    let dist = to_anchor.norm();

    if dist <= CRASH_CONTACT_RADIUS {
        state.position = state.spot_anchor;
        state.velocity = Vec3::zeros();
        return true;
    }

    // Pull strengthens as |delta| -> 0
    let ramp = 1.0 + (CRASH_DELTA - delta.abs()).max(0.0) / CRASH_DELTA * CRASH_PULL_RAMP;
    let mut accel = to_anchor / dist * (CRASH_PULL_BASE * ramp);

    if state.fuel > 0.0 {
        accel += state.forward * (state.max_thrust * state.fuel);
        state.fuel = (state.fuel - state.fuel_burn_rate * dt).max(0.0);
    }

    accel -= state.velocity * state.drag_coeff;

    state.velocity += accel * dt;
    let speed = state.velocity.norm();
    if speed > state.max_speed {
        state.velocity *= state.max_speed / speed;
    }

    state.position += state.velocity * dt;

    // Contact check after integration too, so a fast approach still latches
    if (state.spot_anchor - state.position).norm() <= CRASH_CONTACT_RADIUS {
        state.position = state.spot_anchor;
        state.velocity = Vec3::zeros();
        return true;
    }

    false
}

#[inline]
fn finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}
