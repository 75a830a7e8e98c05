//! Arena Web API
//!
//! 启动: cargo run --bin arena-web --features web
//! 提供最小 REST 接口：启动模拟、查询状态、获取结果。

#![cfg(feature = "web")]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use arena::config::{load_config, ArenaConfig};
use arena::core::{RoundEngine, RunState};
use arena::export::SimulationReport;
use arena::llm::create_generator_from_config;
use arena::observability::init_tracing;
use arena::personas::default_personas;

struct AppState {
    cfg: ArenaConfig,
    status: RwLock<StatusSnapshot>,
    results: RwLock<Option<SimulationReport>>,
    cancel: RwLock<Option<CancellationToken>>,
}

#[derive(Debug, Clone, Serialize)]
struct StatusSnapshot {
    state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    agents: Option<usize>,
    #[serde(default)]
    rounds: Option<u32>,
    #[serde(default)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let cfg = load_config(None).unwrap_or_default();
    let state = Arc::new(AppState {
        cfg,
        status: RwLock::new(StatusSnapshot {
            state: RunState::Idle,
            simulation_id: None,
            error: None,
        }),
        results: RwLock::new(None),
        cancel: RwLock::new(None),
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/config", get(api_config))
        .route("/simulation/start", post(api_start))
        .route("/simulation/stop", post(api_stop))
        .route("/simulation/status", get(api_status))
        .route("/simulation/results", get(api_results))
        .with_state(Arc::clone(&state));

    let port = std::env::var("ARENA_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Arena Web API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "arena",
        "endpoints": [
            "GET /health",
            "GET /config",
            "POST /simulation/start",
            "POST /simulation/stop",
            "GET /simulation/status",
            "GET /simulation/results",
        ],
    }))
}

async fn api_config(State(state): State<Arc<AppState>>) -> Json<ArenaConfig> {
    Json(state.cfg.clone())
}

async fn api_status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.status.read().await.clone())
}

/// POST /simulation/start：后台启动一场模拟；已在运行则 409
async fn api_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<(StatusCode, Json<StatusSnapshot>), (StatusCode, String)> {
    {
        let status = state.status.read().await;
        if matches!(
            status.state,
            RunState::Initializing | RunState::Running | RunState::Finalizing
        ) {
            return Err((
                StatusCode::CONFLICT,
                "simulation already running".to_string(),
            ));
        }
    }

    let mut cfg = state.cfg.clone();
    if let Some(agents) = req.agents {
        cfg.simulation.population = agents;
    }
    if let Some(rounds) = req.rounds {
        cfg.simulation.rounds = rounds;
    }
    if let Some(seed) = req.seed {
        cfg.simulation.seed = Some(seed);
    }

    let generator = create_generator_from_config(&cfg);
    let mut engine = RoundEngine::new(cfg, generator)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    engine
        .initialize(&default_personas())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let started = Utc::now();
    let simulation_id = started.format("%Y%m%d_%H%M%S").to_string();
    let cancel = CancellationToken::new();
    {
        let mut status = state.status.write().await;
        *status = StatusSnapshot {
            state: RunState::Running,
            simulation_id: Some(simulation_id.clone()),
            error: None,
        };
        *state.results.write().await = None;
        *state.cancel.write().await = Some(cancel.clone());
    }

    let task_state = Arc::clone(&state);
    tokio::spawn(async move {
        let run_result = engine.run(&cancel).await;
        let report = SimulationReport::from_engine(&engine, started);
        if let Err(e) = report.save_all(&engine.config().export.dir) {
            tracing::warn!("export failed: {}", e);
        }
        let mut status = task_state.status.write().await;
        status.state = engine.state();
        if let Err(e) = run_result {
            status.error = Some(e.to_string());
        }
        *task_state.results.write().await = Some(report);
        *task_state.cancel.write().await = None;
    });

    let snapshot = state.status.read().await.clone();
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// POST /simulation/stop：请求取消，当前回合跑完后停止
async fn api_stop(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.cancel.read().await.as_ref() {
        Some(token) => {
            token.cancel();
            Ok(StatusCode::ACCEPTED)
        }
        None => Err((StatusCode::CONFLICT, "no simulation running".to_string())),
    }
}

async fn api_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SimulationReport>, (StatusCode, String)> {
    match state.results.read().await.clone() {
        Some(report) => Ok(Json(report)),
        None => Err((StatusCode::NOT_FOUND, "no results yet".to_string())),
    }
}
