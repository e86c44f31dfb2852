use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{future, SinkExt, StreamExt};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tower_clash_server::config::{ServerArgs, ServerConfig};
use tower_clash_server::constants::{GUEST_USER_ID, TICK_INTERVAL};
use tower_clash_server::engine::BattleEngine;
use tower_clash_server::hub::OutboundMessage;
use tower_clash_server::profile_store::JsonProfileStore;
use tower_clash_server::server::{drive_session, ServerState, SharedState};
use tower_clash_server::settlement::spawn_settlement_worker;
use tower_clash_server::units::UnitCatalog;
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct AppState {
    game: SharedState,
    profiles: Arc<JsonProfileStore>,
    queue_capacity: usize,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(rename = "userID")]
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_args(ServerArgs::parse());
    config.validate().context("invalid configuration")?;

    let catalog = UnitCatalog::load_or_towers_only(&config.units_path);
    let seed = config.seed.unwrap_or_else(rand::random);
    let engine = BattleEngine::new(catalog, config.engine_options(), seed);

    let profiles = Arc::new(JsonProfileStore::open(config.profiles_path.clone()));
    let settlement_tx = spawn_settlement_worker(profiles.clone());

    let game: SharedState = Arc::new(Mutex::new(ServerState::new(engine, settlement_tx)));
    start_tick_loop(game.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/profile/{id}", get(profile_handler))
        .route("/ws", get(ws_handler))
        .with_state(AppState {
            game: game.clone(),
            profiles,
            queue_capacity: config.queue_capacity,
        });

    let app = if let Some(static_dir) = config.resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        tracing::info!(path = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        tracing::warn!("static file root not found; serving the API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(port = config.port, seed, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(game))
        .await
        .context("server runtime failed")?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal(state: SharedState) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install shutdown handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
    state
        .lock()
        .await
        .hub
        .close_all(1001, "server shutting down");
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn profile_handler(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match app.profiles.get_profile(&id) {
        Some(profile) => Json(profile).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "profile not found" })),
        )
            .into_response(),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let external_id = normalize_user_id(query.user_id.as_deref());
    ws.on_upgrade(move |socket| handle_socket(app, socket, external_id))
}

async fn handle_socket(app: AppState, socket: WebSocket, external_id: String) {
    let session_id = make_id("session");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(app.queue_capacity);
    app.game
        .lock()
        .await
        .admit(session_id.clone(), Some(external_id), tx);

    let (mut ws_sender, ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                return;
            }
        }
        // Queue closed by eviction.
        let _ = ws_sender.close().await;
    });

    let inbound = ws_receiver
        .take_while(|received| {
            future::ready(matches!(received, Ok(message) if !matches!(message, Message::Close(_))))
        })
        .filter_map(|received| {
            future::ready(match received {
                Ok(Message::Text(raw)) => Some(raw.to_string()),
                Ok(Message::Binary(raw)) => String::from_utf8(raw.to_vec()).ok(),
                _ => None,
            })
        });

    drive_session(&app.game, &session_id, inbound, async move {
        let _ = writer.await;
    })
    .await;
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            state.lock().await.tick();
        }
    });
}

fn normalize_user_id(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => GUEST_USER_ID.to_string(),
    }
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{prefix}_{seq}_{suffix}")
}
