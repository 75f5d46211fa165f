// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod config;
mod dynamo_store;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lambda_http::run as lambda_run;
use mafia_common::{GameResult, RolesMode, WinTally};
use serde::{Deserialize, Serialize};
use session_engine::{
    CheckResult, CommandOutcome, EngineError, GameEngine, HostAction, InMemorySessionStore,
    LiveGameRegistry, LiveGameView, SessionStore, phase::NightReport,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{config::HostConfig, dynamo_store::DynamoSessionStore};

#[derive(Clone)]
struct AppState {
    engine: Arc<GameEngine>,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateSessionRequest {
    player_count: usize,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AddPlayerRequest {
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AssignRolesRequest {
    #[serde(default)]
    roles_mode: Option<RolesMode>,
}

#[derive(Debug, Clone, Deserialize)]
struct TargetRequest {
    target: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VoteRequest {
    voter: String,
    target: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LynchRequest {
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CommandResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    message: String,
    available_actions: Vec<HostAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<LiveGameView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deck: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    night: Option<NightReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<GameResult>,
}

impl CommandResponse {
    fn accepted(outcome: CommandOutcome) -> Self {
        Self {
            accepted: true,
            reason: None,
            message: outcome.message,
            available_actions: outcome
                .state
                .as_ref()
                .map(|state| state.available_actions.clone())
                .unwrap_or_else(|| vec![HostAction::Reset]),
            state: outcome.state,
            check: outcome.check,
            deck: outcome.deck,
            night: outcome.night,
            result: outcome.result,
        }
    }

    /// Benign no-op: the command was understood but changed nothing.
    fn notice(error: &EngineError, state: Option<LiveGameView>) -> Self {
        Self {
            accepted: false,
            reason: Some(error.reason_code()),
            message: error.user_message(),
            available_actions: state
                .as_ref()
                .map(|state| state.available_actions.clone())
                .unwrap_or_default(),
            state,
            check: None,
            deck: None,
            night: None,
            result: None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "host_service=debug,session_engine=debug,tower_http=info".to_string()
        }))
        .init();

    let config = HostConfig::from_env()?;
    let catalog = config.load_catalog()?;
    let store: Arc<dyn SessionStore> = match &config.dynamo {
        Some(settings) => {
            info!(table = %settings.table_name, "using DynamoDB session store");
            Arc::new(DynamoSessionStore::connect(settings).await)
        }
        None => {
            info!("no DynamoDB configured; using in-memory session store");
            Arc::new(InMemorySessionStore::new())
        }
    };
    info!(
        win_rule = ?config.engine.win_rule,
        sync_timeout_ms = config.engine.sync_timeout.as_millis() as u64,
        seeded = config.engine.shuffle_seed.is_some(),
        "engine configured"
    );

    let state = AppState {
        engine: Arc::new(GameEngine::new(
            Arc::new(catalog),
            Arc::new(LiveGameRegistry::new()),
            store,
            config.engine.clone(),
        )),
    };

    let app = build_router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running host-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = config.bind_addr;
    info!(%bind_addr, "host-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/stats", get(stats_handler))
        .route(
            "/v1/conversations/{conversation_id}/session",
            post(create_session_handler)
                .get(snapshot_handler)
                .delete(reset_handler),
        )
        .route(
            "/v1/conversations/{conversation_id}/players",
            post(add_player_handler),
        )
        .route(
            "/v1/conversations/{conversation_id}/roles",
            post(assign_roles_handler),
        )
        .route("/v1/conversations/{conversation_id}/start", post(start_handler))
        .route(
            "/v1/conversations/{conversation_id}/night/inspect",
            post(inspect_handler),
        )
        .route(
            "/v1/conversations/{conversation_id}/night/kill",
            post(night_kill_handler),
        )
        .route(
            "/v1/conversations/{conversation_id}/night/heal",
            post(heal_handler),
        )
        .route(
            "/v1/conversations/{conversation_id}/advance",
            post(advance_handler),
        )
        .route("/v1/conversations/{conversation_id}/votes", post(vote_handler))
        .route("/v1/conversations/{conversation_id}/lynch", post(lynch_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "host-service"}))
}

async fn create_session_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let host = request.host.as_deref().unwrap_or("host");
    let result = state
        .engine
        .create_session(
            &conversation_id,
            request.player_count,
            request.mode.as_deref(),
            host,
        )
        .await;
    respond(&state, &conversation_id, result).await
}

async fn snapshot_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<LiveGameView>, ApiError> {
    Ok(Json(state.engine.snapshot(&conversation_id).await?))
}

async fn reset_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state.engine.reset(&conversation_id).await;
    respond(&state, &conversation_id, result).await
}

async fn add_player_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<AddPlayerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state
        .engine
        .add_player(&conversation_id, &request.name)
        .await;
    respond(&state, &conversation_id, result).await
}

async fn assign_roles_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<AssignRolesRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let roles_mode = request.roles_mode.unwrap_or(RolesMode::Random);
    let result = state
        .engine
        .assign_roles(&conversation_id, roles_mode)
        .await;
    respond(&state, &conversation_id, result).await
}

async fn start_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state.engine.start(&conversation_id).await;
    respond(&state, &conversation_id, result).await
}

async fn inspect_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state
        .engine
        .inspect(&conversation_id, &request.target)
        .await;
    respond(&state, &conversation_id, result).await
}

async fn night_kill_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state
        .engine
        .night_kill(&conversation_id, &request.target)
        .await;
    respond(&state, &conversation_id, result).await
}

async fn heal_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state.engine.heal(&conversation_id, &request.target).await;
    respond(&state, &conversation_id, result).await
}

async fn advance_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state.engine.advance_phase(&conversation_id).await;
    respond(&state, &conversation_id, result).await
}

async fn vote_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state
        .engine
        .cast_vote(&conversation_id, &request.voter, &request.target)
        .await;
    respond(&state, &conversation_id, result).await
}

async fn lynch_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<LynchRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = state
        .engine
        .lynch(&conversation_id, request.target.as_deref())
        .await;
    respond(&state, &conversation_id, result).await
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<WinTally>, ApiError> {
    let tally = state.engine.stats().await.map_err(|error| {
        warn!(error = %error, "failed to load win tally");
        ApiError::internal("Win statistics are unavailable right now.")
    })?;
    Ok(Json(tally))
}

async fn respond(
    state: &AppState,
    conversation_id: &str,
    result: Result<CommandOutcome, EngineError>,
) -> Result<Json<CommandResponse>, ApiError> {
    match result {
        Ok(outcome) => Ok(Json(CommandResponse::accepted(outcome))),
        Err(error) if error.is_notice() => {
            info!(conversation_id, reason = error.reason_code(), "command was a no-op");
            let snapshot = state.engine.snapshot(conversation_id).await.ok();
            Ok(Json(CommandResponse::notice(&error, snapshot)))
        }
        Err(error) => Err(error.into()),
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    reason: Option<&'static str>,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            reason: None,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidPlayerCount { .. }
            | EngineError::UnknownMode(_)
            | EngineError::PlayerNotFound(_)
            | EngineError::TargetNotAlive(_)
            | EngineError::DuplicatePlayer(_) => StatusCode::BAD_REQUEST,
            EngineError::WrongPhase { .. }
            | EngineError::ActionUnavailable(_)
            | EngineError::RolesNotAssigned
            | EngineError::AlreadyAssigned
            | EngineError::AlreadyFinished
            | EngineError::AlreadyStarted => StatusCode::CONFLICT,
            EngineError::NoPhasesConfigured
            | EngineError::EmptyRoleCatalog
            | EngineError::UnknownRole(_)
            | EngineError::PersistenceSyncFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if error.is_configuration() {
            warn!(error = %error, "catalog configuration problem");
        }
        Self {
            status,
            reason: Some(error.reason_code()),
            message: error.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message, "reason": self.reason})),
        )
            .into_response()
    }
}
