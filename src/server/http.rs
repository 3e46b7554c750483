//! HTTP and WebSocket surface
//!
//! Routes:
//! - `GET  /api/sensor`     latest reading plus its age, `204` before the first one
//! - `POST /api/sensor`     ingest a reading over HTTP
//! - `GET  /api/ws/sensor`  WebSocket subscription, one text frame per reading
//! - `POST /api/optimize`   drying analysis against the latest reading
//! - `GET  /api/stats`      hub counters

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::analysis::{
    AnalysisInput, Analyzer, DryingProfile, OptimizationRequest, OptimizationResponse,
};
use crate::error::Result;
use crate::hub::{BroadcastHub, DeviceMessage, Reading};
use crate::stats::HubStatsSnapshot;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub analyzer: Arc<dyn Analyzer>,
    pub profile: Arc<DryingProfile>,
}

impl AppState {
    pub fn new(hub: Arc<BroadcastHub>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            hub,
            analyzer,
            profile: Arc::new(DryingProfile::default()),
        }
    }
}

/// Error body in the `{"detail": ...}` shape viewers already expect
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

/// Body of `GET /api/sensor`
#[derive(Debug, Serialize)]
pub struct SensorSnapshot {
    #[serde(flatten)]
    pub reading: Reading,
    pub age_seconds: f64,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensor", get(get_sensor).post(post_sensor))
        .route("/api/ws/sensor", get(ws_sensor))
        .route("/api/optimize", post(optimize))
        .route("/api/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the router on `addr` until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

pub async fn get_sensor(State(state): State<AppState>) -> Response {
    match state.hub.snapshots().current() {
        Some(snapshot) => Json(SensorSnapshot {
            age_seconds: snapshot.age_secs(),
            reading: Reading::clone(&snapshot.reading),
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn post_sensor(
    State(state): State<AppState>,
    Json(message): Json<DeviceMessage>,
) -> std::result::Result<Json<Reading>, ApiError> {
    let reading = Reading::received_now(message);

    state
        .hub
        .ingest(reading.clone())
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(reading))
}

pub async fn optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizationRequest>,
) -> std::result::Result<Json<OptimizationResponse>, ApiError> {
    let snapshot = state.hub.snapshots().current().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Optimization error: Make sure the sensors are properly connected",
        )
    })?;

    let input = AnalysisInput::new(request, snapshot, DryingProfile::clone(&state.profile));

    match state.analyzer.analyse(&input).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::warn!(error = %e, crop = %input.request.crop, "Analysis failed");
            Ok(Json(OptimizationResponse::fallback()))
        }
    }
}

pub async fn stats(State(state): State<AppState>) -> Json<HubStatsSnapshot> {
    Json(state.hub.stats().await)
}

async fn ws_sensor(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| relay_to_socket(socket, peer, state.hub))
}

/// Forward hub frames to one WebSocket until either side goes away
async fn relay_to_socket(mut socket: WebSocket, peer: SocketAddr, hub: Arc<BroadcastHub>) {
    let mut subscription = match hub.subscribe(peer.to_string()).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Subscribe failed");
            return;
        }
    };
    let id = subscription.id();

    loop {
        tokio::select! {
            frame = subscription.recv() => match frame {
                Some(frame) => {
                    if socket.send(Message::Text(frame.as_text().to_string())).await.is_err() {
                        break;
                    }
                }
                // Pruned by the hub
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(id).await;
}
