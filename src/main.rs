mod config;
mod contract;
mod errors;
mod export;
mod feeds;
mod parse;
mod pricing;
mod server;
mod sim;
mod state;

use crate::sim::{Fleet, SimEvent};
use crate::state::*;
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() {
    // Structured logging, line-buffered to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("launchpad engine starting");

    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Bounded event channel into the engine; single-slot mailbox for quotes
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(512);
    let (quote_tx, quote_rx) = watch::channel::<Option<SpotQuote>>(None);

    let app_state = AppState::new(cfg.clone(), engine_tx.clone());

    // ── Spawn tasks ──

    // 1. Spot price feed (stops itself permanently on first failure)
    let feed_state = app_state.clone();
    tokio::spawn(async move {
        feeds::spot::run_spot_feed(feed_state, quote_tx).await;
    });

    // 2. Tick generator at the configured frame rate
    let tick_tx = engine_tx.clone();
    let frame_interval = std::time::Duration::from_secs_f64(1.0 / cfg.frame_rate as f64);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(frame_interval);
        loop {
            interval.tick().await;
            if tick_tx.send(EngineEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    // 3. Engine task (core loop -- this is the hot path)
    let engine_state = app_state.clone();
    let engine_cfg = cfg.clone();
    tokio::spawn(async move {
        run_engine(engine_state, engine_cfg, engine_rx, quote_rx).await;
    });

    // 4. Axum HTTP + WS server for rendering collaborators
    let server_state = app_state.clone();
    let port = cfg.server_port;

    let app = axum::Router::new()
        .route("/api/scene", axum::routing::get(server::routes::get_scene))
        .route("/api/counters", axum::routing::get(server::routes::get_counters))
        .route("/api/contracts", axum::routing::post(server::routes::create_contract))
        .route(
            "/api/contracts/parse",
            axum::routing::post(server::routes::parse_contract),
        )
        .route(
            "/api/contracts/{id}",
            axum::routing::patch(server::routes::adjust_contract)
                .delete(server::routes::remove_contract),
        )
        .route("/api/export", axum::routing::post(server::routes::export_scene))
        .route("/api/import", axum::routing::post(server::routes::import_scene))
        .route("/ws", axum::routing::get(server::ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(server_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

/// Core engine loop. Owns the fleet outright; all Greek recomputation and
/// kinematic integration happen synchronously inside one event at a time.
/// No locks, no IO in the per-frame math.
async fn run_engine(
    state: Arc<AppState>,
    config: config::AppConfig,
    mut rx: mpsc::Receiver<EngineEvent>,
    mut quote_rx: watch::Receiver<Option<SpotQuote>>,
) {
    tracing::info!("engine task started");

    let mut fleet = Fleet::new(config.risk_free_rate);
    let dt = 1.0 / config.frame_rate as f64;

    let mut frame_counter: u64 = 0;
    let mut spot: f64 = 0.0;
    let mut spot_degraded = false;

    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::CreateContract { params, reply } => {
                let result = match fleet.launch(params) {
                    Ok(id) => {
                        state.counters.contracts_launched.fetch_add(1, Ordering::Relaxed);
                        if let Some(rocket) = fleet.get(id) {
                            state.broadcast(WsMessage::RocketLaunched {
                                rocket: RocketSnapshot::from_rocket(rocket),
                            });
                        }
                        Ok(id)
                    }
                    Err(e) => {
                        state.counters.errors_recovered.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "contract rejected");
                        Err(e.to_string())
                    }
                };
                let _ = reply.send(result);
            }

            EngineEvent::AdjustContract { id, params, reply } => {
                let ok = fleet.adjust(id, &params);
                if ok {
                    state.counters.adjustments_applied.fetch_add(1, Ordering::Relaxed);
                } else {
                    tracing::debug!(id = %id, "adjustment refused");
                }
                let _ = reply.send(ok);
            }

            EngineEvent::RemoveContract { id, reply } => {
                let ok = fleet.remove(id);
                if ok {
                    tracing::info!(id = %id, "rocket removed");
                    state.broadcast(WsMessage::RocketRemoved { id });
                }
                let _ = reply.send(ok);
            }

            EngineEvent::Export { camera_state, reply } => {
                let record = export::export_fleet(&fleet, camera_state);
                match serde_json::to_value(&record) {
                    Ok(v) => {
                        let _ = reply.send(v);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "export serialization failed");
                        let _ = reply.send(serde_json::json!({ "error": e.to_string() }));
                    }
                }
            }

            EngineEvent::Import { record, reply } => {
                match export::import_record(record) {
                    Ok(rockets) => {
                        let count = rockets.len();
                        fleet.replace_all(rockets);
                        tracing::info!(count = count, "scene imported");
                        state.broadcast(WsMessage::SceneImported { count });
                        let _ = reply.send(Ok(count));
                    }
                    Err(e) => {
                        state.counters.errors_recovered.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "import rejected");
                        let _ = reply.send(Err(e.to_string()));
                    }
                }
            }

            EngineEvent::Tick => {
                frame_counter += 1;
                state.counters.frames_advanced.fetch_add(1, Ordering::Relaxed);

                // Consume the quote mailbox at tick start: parameter updates
                // from the feed are applied atomically before integration
                if quote_rx.has_changed().unwrap_or(false) {
                    if let Some(quote) = *quote_rx.borrow_and_update() {
                        spot = quote.price;
                        spot_degraded = quote.degraded;
                        state.counters.prices_received.fetch_add(1, Ordering::Relaxed);

                        fleet.apply_spot(&config.spot_feed_symbol, quote.price);

                        let ts = chrono::DateTime::from_timestamp_millis(quote.timestamp_ms)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_default();
                        state.broadcast(WsMessage::SpotPrice {
                            price: quote.price,
                            degraded: quote.degraded,
                            timestamp: ts,
                        });
                    }
                }

                // Advance the whole fleet (hot path, pure computation)
                let events = fleet.advance_all(dt);
                for (id, ev) in events {
                    match ev {
                        SimEvent::WarpEntered => {
                            tracing::info!(id = %id, "entering warp");
                            state.broadcast(WsMessage::RegimeChange {
                                id,
                                regime: sim::Regime::Warping,
                            });
                        }
                        SimEvent::WarpExited => {
                            tracing::info!(id = %id, "leaving warp");
                            state.broadcast(WsMessage::RegimeChange {
                                id,
                                regime: sim::Regime::Normal,
                            });
                        }
                        SimEvent::Crashed => {
                            tracing::info!(id = %id, "crash latched");
                            state.broadcast(WsMessage::RegimeChange {
                                id,
                                regime: sim::Regime::Crashed,
                            });
                        }
                        SimEvent::Frozen => {
                            state.counters.errors_recovered.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(id = %id, "non-finite state, contract frozen");
                            state.broadcast(WsMessage::RocketFrozen { id });
                        }
                    }
                }

                // Publish the scene snapshot (watch channel -- cheap, no lock)
                if frame_counter % 2 == 0 {
                    let snapshot = SceneSnapshot {
                        spot,
                        spot_degraded,
                        timestamp: chrono::Utc::now().to_rfc3339(),
                        frame: frame_counter,
                        rockets: fleet
                            .iter()
                            .map(|(_, r)| RocketSnapshot::from_rocket(r))
                            .collect(),
                    };
                    let _ = state.snapshot_tx.send(snapshot);
                }
            }

            EngineEvent::Shutdown => {
                tracing::info!("shutdown event received");
                break;
            }
        }
    }

    tracing::info!("engine task shutting down");
}
