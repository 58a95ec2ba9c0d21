use crate::contract::{AdjustParams, ContractParams};
use crate::parse;
use crate::state::{AppState, EngineEvent, SceneSnapshot};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// GET /api/scene -- current scene snapshot (from watch channel, no lock)
pub async fn get_scene(State(state): State<Arc<AppState>>) -> Json<SceneSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "frames_advanced": state.counters.frames_advanced.load(Relaxed),
        "prices_received": state.counters.prices_received.load(Relaxed),
        "contracts_launched": state.counters.contracts_launched.load(Relaxed),
        "adjustments_applied": state.counters.adjustments_applied.load(Relaxed),
        "errors_recovered": state.counters.errors_recovered.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}

/// POST /api/contracts -- launch a new rocket from structured params
pub async fn create_contract(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ContractParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    launch(&state, params).await
}

#[derive(serde::Deserialize)]
pub struct ParseBody {
    pub text: String,
}

/// POST /api/contracts/parse -- launch from a free-text contract string
pub async fn parse_contract(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ParseBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    let default_spot = {
        let snap = state.snapshot_rx.borrow();
        if snap.spot > 0.0 {
            snap.spot
        } else {
            state.config.fallback_spot
        }
    };

    match parse::parse_contract(&body.text, default_spot, state.config.default_iv) {
        Ok(params) => launch(&state, params).await,
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn launch(
    state: &Arc<AppState>,
    params: ContractParams,
) -> (StatusCode, Json<serde_json::Value>) {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .engine_tx
        .send(EngineEvent::CreateContract {
            params,
            reply: reply_tx,
        })
        .await;

    if sent.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine unavailable" })),
        );
    }

    match reply_rx.await {
        Ok(Ok(id)) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))),
        Ok(Err(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": reason })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine dropped request" })),
        ),
    }
}

/// PATCH /api/contracts/{id} -- sparse parameter adjustment
pub async fn adjust_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(params): Json<AdjustParams>,
) -> Json<serde_json::Value> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .engine_tx
        .send(EngineEvent::AdjustContract {
            id,
            params,
            reply: reply_tx,
        })
        .await;

    let ok = match sent {
        Ok(()) => reply_rx.await.unwrap_or(false),
        Err(_) => false,
    };
    Json(serde_json::json!({ "ok": ok }))
}

/// DELETE /api/contracts/{id}
pub async fn remove_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<serde_json::Value> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .engine_tx
        .send(EngineEvent::RemoveContract { id, reply: reply_tx })
        .await;

    let ok = match sent {
        Ok(()) => reply_rx.await.unwrap_or(false),
        Err(_) => false,
    };
    Json(serde_json::json!({ "ok": ok }))
}

#[derive(serde::Deserialize, Default)]
pub struct ExportBody {
    #[serde(rename = "cameraState", default)]
    pub camera_state: serde_json::Value,
}

/// POST /api/export -- versioned scene snapshot for save/share
pub async fn export_scene(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ExportBody>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let camera_state = body.map(|Json(b)| b.camera_state).unwrap_or_default();

    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .engine_tx
        .send(EngineEvent::Export {
            camera_state,
            reply: reply_tx,
        })
        .await;

    if sent.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine unavailable" })),
        );
    }

    match reply_rx.await {
        Ok(record) => (StatusCode::OK, Json(record)),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine dropped request" })),
        ),
    }
}

/// POST /api/import -- all-or-nothing scene restore
pub async fn import_scene(
    State(state): State<Arc<AppState>>,
    Json(record): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .engine_tx
        .send(EngineEvent::Import {
            record,
            reply: reply_tx,
        })
        .await;

    if sent.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine unavailable" })),
        );
    }

    match reply_rx.await {
        Ok(Ok(count)) => (StatusCode::OK, Json(serde_json::json!({ "imported": count }))),
        Ok(Err(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": reason })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "engine dropped request" })),
        ),
    }
}
