use anyhow::Result;
use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use constellation_gen::{
    metadata::{color_for, name_for},
    ConstellationConfig,
};
use sim_session::{SessionObserver, SessionSettings, SimulationSession};

mod routes;

/// Simulation seconds advanced per 50 ms wall tick.
pub const TICK_STEP: f64 = 0.05;

const TICK_WALL_MS: u64 = 50;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<SimulationSession>>,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub risk_tx: broadcast::Sender<RiskUpdate>,
}

/// Payload pushed over the risk feed after each screening pass.
#[derive(Debug, Clone, Serialize)]
pub struct RiskUpdate {
    pub session_id: Uuid,
    pub sim_time: f64,
    pub risk: f64,
    pub collision_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Forwards screening results from inside `tick` onto the broadcast channel.
struct BroadcastObserver {
    tx: broadcast::Sender<RiskUpdate>,
    session_id: Uuid,
    sim_time: f64,
    collision_count: usize,
}

impl SessionObserver for BroadcastObserver {
    fn on_collisions_update(&mut self, events: &[conjunction_screening::CollisionEvent]) {
        self.collision_count = events.len();
    }

    fn on_risk_update(&mut self, score: f64) {
        // Send fails only when no subscriber is connected.
        let _ = self.tx.send(RiskUpdate {
            session_id: self.session_id,
            sim_time: self.sim_time,
            risk: score,
            collision_count: self.collision_count,
            timestamp: Utc::now(),
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "swarm_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = SessionSettings::default();
    let mut session = SimulationSession::new(settings)?;
    for config in default_constellations() {
        session.apply_config(config, 0.0)?;
    }
    tracing::info!(
        "   Seeded {} default constellations",
        session.constellation_ids().len()
    );

    let (risk_tx, _) = broadcast::channel(64);
    let state = AppState {
        session: Arc::new(RwLock::new(session)),
        session_id: Uuid::new_v4(),
        started_at: Utc::now(),
        risk_tx,
    };

    tokio::spawn(tick_loop(state.clone()));

    let api_routes = Router::new()
        .route(
            "/constellations",
            get(routes::list_constellations).put(routes::apply_constellation),
        )
        .route("/constellations/:id", delete(routes::remove_constellation))
        .route("/positions", get(routes::all_positions))
        .route("/positions/:id", get(routes::constellation_positions))
        .route("/collisions", get(routes::list_collisions))
        .route("/risk", get(routes::current_risk))
        .route("/satellites/:id", get(routes::select_satellite))
        .route("/snapshot", get(routes::snapshot))
        .route("/tick", post(routes::manual_tick))
        .with_state(state.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws/risk", get(routes::risk_feed))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive());

    let port = std::env::var("SWARM_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18701".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("🛰️  Swarm Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Drives the shared session at a fixed wall cadence. Screening runs every
/// `detection_interval_ticks` inside the session, so risk updates reach the
/// feed at most twice per second.
async fn tick_loop(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_WALL_MS));
    loop {
        interval.tick().await;
        let mut session = state.session.write().await;
        let now = session.sim_time() + TICK_STEP;
        let mut observer = BroadcastObserver {
            tx: state.risk_tx.clone(),
            session_id: state.session_id,
            sim_time: now,
            collision_count: 0,
        };
        session.tick(now, &mut observer);
    }
}

fn default_constellations() -> Vec<ConstellationConfig> {
    vec![
        ConstellationConfig {
            id: "const-1".to_string(),
            name: name_for(0).to_string(),
            color: color_for(0).to_string(),
            satellite_count: 60,
            zombie_count: 0,
            altitude: 0.5,
            inclination: 0.8,
            speed: 1.0,
            coordinated: true,
            visible: true,
        },
        ConstellationConfig {
            id: "const-2".to_string(),
            name: name_for(1).to_string(),
            color: color_for(1).to_string(),
            satellite_count: 40,
            zombie_count: 5,
            altitude: 0.8,
            inclination: 1.2,
            speed: 0.8,
            coordinated: false,
            visible: true,
        },
    ]
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "swarm-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "session_id": state.session_id,
        "started_at": state.started_at,
    }))
}
