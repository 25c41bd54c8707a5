use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{AppState, BroadcastObserver, TICK_STEP};
use conjunction_screening::CollisionEvent;
use constellation_gen::ConstellationConfig;
use orbital_kinematics::SatellitePosition;
use sim_session::{ConstellationSummary, SelectedSatellite, SessionSnapshot};

#[derive(Serialize)]
pub struct RiskResponse {
    pub risk: f64,
    pub collision_count: usize,
    pub sim_time: f64,
}

#[derive(Serialize)]
pub struct TickResponse {
    pub sim_time: f64,
}

pub async fn list_constellations(State(state): State<AppState>) -> Json<Vec<ConstellationSummary>> {
    let session = state.session.read().await;
    Json(session.snapshot().constellations)
}

/// Apply a constellation config record. Invalid records are rejected with the
/// validation message and leave the prior config active.
pub async fn apply_constellation(
    State(state): State<AppState>,
    Json(config): Json<ConstellationConfig>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let now = session.sim_time();
    match session.apply_config(config, now) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

pub async fn remove_constellation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.remove_constellation(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

pub async fn all_positions(State(state): State<AppState>) -> Json<Vec<SatellitePosition>> {
    let session = state.session.read().await;
    let positions = session
        .constellation_ids()
        .iter()
        .filter_map(|id| session.positions_of(id))
        .flat_map(|p| p.iter().cloned())
        .collect();
    Json(positions)
}

pub async fn constellation_positions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SatellitePosition>>, StatusCode> {
    let session = state.session.read().await;
    session
        .positions_of(&id)
        .map(|p| Json(p.to_vec()))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn list_collisions(State(state): State<AppState>) -> Json<Vec<CollisionEvent>> {
    let session = state.session.read().await;
    Json(session.collisions().to_vec())
}

pub async fn current_risk(State(state): State<AppState>) -> Json<RiskResponse> {
    let session = state.session.read().await;
    Json(RiskResponse {
        risk: session.risk(),
        collision_count: session.collisions().len(),
        sim_time: session.sim_time(),
    })
}

pub async fn select_satellite(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<SelectedSatellite>, StatusCode> {
    let session = state.session.read().await;
    session
        .select_satellite(id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn snapshot(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let session = state.session.read().await;
    Json(session.snapshot())
}

/// Advance the session by one simulation step on demand. Composes with the
/// background loop since both derive `now` from the session clock.
pub async fn manual_tick(State(state): State<AppState>) -> Json<TickResponse> {
    let mut session = state.session.write().await;
    let now = session.sim_time() + TICK_STEP;
    let mut observer = BroadcastObserver {
        tx: state.risk_tx.clone(),
        session_id: state.session_id,
        sim_time: now,
        collision_count: 0,
    };
    session.tick(now, &mut observer);
    Json(TickResponse {
        sim_time: session.sim_time(),
    })
}

pub async fn risk_feed(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_risk(socket, state))
}

async fn stream_risk(mut socket: WebSocket, state: AppState) {
    let mut rx = state.risk_tx.subscribe();
    tracing::debug!(session = %state.session_id, "risk feed subscriber connected");
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => {
                    let payload = match serde_json::to_string(&update) {
                        Ok(p) => p,
                        Err(_) => continue,
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "risk feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
    tracing::debug!("risk feed subscriber disconnected");
}
