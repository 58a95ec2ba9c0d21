//! Versioned scene export/import.
//!
//! The export record is a flat, JSON-serializable snapshot of every live
//! contract plus an opaque camera blob for the rendering layer. Import is
//! all-or-nothing: every record is validated and materialized before the
//! fleet is touched, and a malformed payload is rejected with a reason.

use crate::contract::{Contract, OptionType};
use crate::errors::{EngineError, EngineResult};
use crate::pricing::Greeks;
use crate::sim::{kinematics, Fleet, Regime, Rocket, Vec3};
use uuid::Uuid;

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExportRecord {
    pub version: u32,
    /// Regenerated on every export; the one field that does not round-trip
    pub timestamp: String,
    pub rockets: Vec<RocketRecord>,
    /// Opaque to the core; renderers own its shape
    #[serde(rename = "cameraState", default)]
    pub camera_state: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RocketRecord {
    pub id: Uuid,
    pub ticker: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike: f64,
    pub spot: f64,
    pub quantity: i32,
    #[serde(rename = "timeToExpiryYears")]
    pub t_years: f64,
    #[serde(rename = "impliedVolatility")]
    pub iv: f64,
    #[serde(rename = "entryPremium")]
    pub entry_premium: Option<f64>,
    pub premium: Option<f64>,
    #[serde(rename = "creationPrice")]
    pub creation_price: f64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub greeks: Greeks,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub fuel: f64,
    pub regime: Regime,
    pub frozen: bool,
}

pub fn export_fleet(fleet: &Fleet, camera_state: serde_json::Value) -> ExportRecord {
    let rockets = fleet
        .iter()
        .map(|(_, r)| {
            let c = &r.contract;
            let s = &r.state;
            RocketRecord {
                id: c.id,
                ticker: c.ticker.clone(),
                option_type: c.option_type,
                strike: c.strike,
                spot: c.spot,
                quantity: c.quantity,
                t_years: c.t_years,
                iv: c.iv,
                entry_premium: c.entry,
                premium: c.premium,
                creation_price: c.creation_price,
                created_at: c.created_at,
                greeks: c.greeks,
                position: [s.position.x, s.position.y, s.position.z],
                velocity: [s.velocity.x, s.velocity.y, s.velocity.z],
                fuel: s.fuel,
                regime: s.regime,
                frozen: s.frozen,
            }
        })
        .collect();

    ExportRecord {
        version: EXPORT_VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        rockets,
        camera_state,
    }
}

/// Parse and validate an import payload into ready rockets. The fleet is
/// NOT touched here; the caller swaps the result in only on success.
pub fn import_record(value: serde_json::Value) -> EngineResult<Vec<Rocket>> {
    let obj = value
        .as_object()
        .ok_or_else(|| EngineError::Import("payload is not a JSON object".into()))?;

    if !obj.contains_key("version") {
        return Err(EngineError::Import("missing required field: version".into()));
    }
    match obj.get("rockets") {
        Some(v) if v.is_array() => {}
        Some(_) => return Err(EngineError::Import("rockets must be an array".into())),
        None => return Err(EngineError::Import("missing required field: rockets".into())),
    }

    let record: ExportRecord = serde_json::from_value(value)
        .map_err(|e| EngineError::Import(format!("malformed record: {e}")))?;

    if record.version != EXPORT_VERSION {
        return Err(EngineError::Import(format!(
            "unsupported version {} (expected {EXPORT_VERSION})",
            record.version
        )));
    }

    let mut rockets = Vec::with_capacity(record.rockets.len());
    for (i, rec) in record.rockets.into_iter().enumerate() {
        rockets.push(
            materialize(rec).map_err(|e| EngineError::Import(format!("rocket {i}: {e}")))?,
        );
    }
    Ok(rockets)
}

fn materialize(rec: RocketRecord) -> EngineResult<Rocket> {
    if !(rec.strike.is_finite() && rec.strike > 0.0) {
        return Err(EngineError::InvalidContract(format!("strike: {}", rec.strike)));
    }
    if !(rec.spot.is_finite() && rec.spot > 0.0) {
        return Err(EngineError::InvalidContract(format!("spot: {}", rec.spot)));
    }
    if !(rec.iv.is_finite() && rec.iv > 0.0) {
        return Err(EngineError::InvalidContract(format!("implied volatility: {}", rec.iv)));
    }
    if !(rec.t_years.is_finite() && rec.t_years >= 0.0) {
        return Err(EngineError::InvalidContract(format!("time to expiry: {}", rec.t_years)));
    }
    if rec.ticker.trim().is_empty() {
        return Err(EngineError::InvalidContract("ticker must be non-empty".into()));
    }
    if !(0.0..=1.0).contains(&rec.fuel) {
        return Err(EngineError::InvalidContract(format!("fuel: {}", rec.fuel)));
    }
    if rec.quantity == 0 {
        return Err(EngineError::InvalidContract("quantity must be nonzero".into()));
    }
    if let Some(entry) = rec.entry_premium {
        if !(entry.is_finite() && entry > 0.0) {
            return Err(EngineError::InvalidContract(format!("entry premium: {entry}")));
        }
    }
    if let Some(premium) = rec.premium {
        if !(premium.is_finite() && premium > 0.0) {
            return Err(EngineError::InvalidContract(format!("premium: {premium}")));
        }
    }

    let contract = Contract {
        id: rec.id,
        ticker: rec.ticker.trim().to_uppercase(),
        option_type: rec.option_type,
        strike: rec.strike,
        spot: rec.spot,
        t_years: rec.t_years,
        iv: rec.iv,
        premium: rec.premium,
        entry: rec.entry_premium,
        quantity: rec.quantity,
        creation_price: rec.creation_price,
        greeks: rec.greeks,
        created_at: rec.created_at,
    };

    // Derived kinematic constants are rebuilt from the recorded Greeks, then
    // the recorded live fields are restored on top.
    let mut state = kinematics::spawn_state(&contract);
    state.position = Vec3::new(rec.position[0], rec.position[1], rec.position[2]);
    state.velocity = Vec3::new(rec.velocity[0], rec.velocity[1], rec.velocity[2]);
    state.fuel = rec.fuel;
    state.regime = rec.regime;
    state.frozen = rec.frozen;

    Ok(Rocket { contract, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractParams;

    fn sample_fleet() -> Fleet {
        let mut fleet = Fleet::new(0.05);
        fleet
            .launch(ContractParams {
                ticker: "SPY".into(),
                option_type: OptionType::Call,
                strike: 690.0,
                spot: 690.0,
                t_years: 60.0 / 365.0,
                iv: 0.14,
                entry: Some(0.5),
                quantity: 2,
            })
            .unwrap();
        fleet
            .launch(ContractParams {
                ticker: "QQQ".into(),
                option_type: OptionType::Put,
                strike: 480.0,
                spot: 470.0,
                t_years: 14.0 / 365.0,
                iv: 0.22,
                entry: None,
                quantity: -1,
            })
            .unwrap();
        fleet
    }

    #[test]
    fn test_round_trip_bit_identical_except_timestamp() {
        let mut fleet = sample_fleet();
        // Advance a bit so sim state is non-trivial
        for _ in 0..120 {
            fleet.advance_all(1.0 / 60.0);
        }

        let camera = serde_json::json!({"pos": [0.0, 10.0, 40.0], "fov": 60});
        let exported = export_fleet(&fleet, camera.clone());
        let wire = serde_json::to_value(&exported).unwrap();

        let rockets = import_record(wire.clone()).unwrap();
        let mut restored = Fleet::new(fleet.rate());
        restored.replace_all(rockets);

        let re_exported = export_fleet(&restored, camera);
        let re_wire = serde_json::to_value(&re_exported).unwrap();

        assert_eq!(wire["version"], re_wire["version"]);
        assert_eq!(wire["rockets"], re_wire["rockets"]);
        assert_eq!(wire["cameraState"], re_wire["cameraState"]);
        // Timestamp is explicitly regenerated, everything else round-trips
    }

    #[test]
    fn test_import_rejects_missing_version() {
        let v = serde_json::json!({"rockets": []});
        let err = import_record(v).unwrap_err();
        assert!(err.to_string().contains("version"), "{err}");
    }

    #[test]
    fn test_import_rejects_missing_rockets() {
        let v = serde_json::json!({"version": 1});
        let err = import_record(v).unwrap_err();
        assert!(err.to_string().contains("rockets"), "{err}");
    }

    #[test]
    fn test_import_rejects_unsupported_version() {
        let v = serde_json::json!({"version": 99, "rockets": [], "timestamp": ""});
        assert!(import_record(v).is_err());
    }

    #[test]
    fn test_import_rejects_zero_quantity() {
        let fleet = sample_fleet();
        let mut wire = serde_json::to_value(export_fleet(&fleet, serde_json::Value::Null)).unwrap();
        wire["rockets"][0]["quantity"] = serde_json::json!(0);

        let err = import_record(wire).unwrap_err();
        assert!(err.to_string().contains("quantity"), "{err}");
    }

    #[test]
    fn test_import_rejects_non_positive_entry_premium() {
        let fleet = sample_fleet();
        let mut wire = serde_json::to_value(export_fleet(&fleet, serde_json::Value::Null)).unwrap();
        wire["rockets"][0]["entryPremium"] = serde_json::json!(-1.0);

        let err = import_record(wire).unwrap_err();
        assert!(err.to_string().contains("entry premium"), "{err}");
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let fleet = sample_fleet();
        let mut wire = serde_json::to_value(export_fleet(&fleet, serde_json::Value::Null)).unwrap();
        // Corrupt the second rocket only
        wire["rockets"][1]["strike"] = serde_json::json!(-5.0);

        let err = import_record(wire).unwrap_err();
        assert!(err.to_string().contains("rocket 1"), "{err}");
    }
}
