use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    draft::Connector,
    error::ApiError,
    gateway::GenerationGateway,
    models::{ProjectInput, SavePayload},
    wizard::{DraftEdit, PendingGeneration, SchemaModificationRequest, Wizard, WizardError},
};

pub struct Session {
    pub wizard: Wizard,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(input: ProjectInput) -> Self {
        let now = Utc::now();
        Self { wizard: Wizard::new(input), created_at: now, updated_at: now }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub gateway: Arc<dyn GenerationGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { store: Arc::default(), gateway }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    #[serde(flatten)]
    pub wizard: Wizard,
    /// Relationships that resolved to a table, for drawing the schema diagram.
    pub connectors: Vec<Connector>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InputEdit {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchemaPromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/wizard", post(create_wizard))
        .route("/api/wizard/:id", get(get_wizard).delete(abandon_wizard))
        .route("/api/wizard/:id/input", axum::routing::patch(edit_input))
        .route("/api/wizard/:id/advance", post(advance))
        .route("/api/wizard/:id/regenerate", post(regenerate))
        .route("/api/wizard/:id/retry", post(retry))
        .route("/api/wizard/:id/edits", post(apply_edit))
        .route("/api/wizard/:id/schema/prompt", post(modify_schema))
        .route("/api/wizard/:id/save", post(save))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("wizard session {} not found", id))
}

fn view(state: &AppState, id: Uuid) -> Result<Json<SessionView>, ApiError> {
    let guard = state.store.read();
    let session = guard.get(&id).ok_or_else(|| not_found(id))?;
    Ok(Json(SessionView {
        id,
        wizard: session.wizard.clone(),
        connectors: session.wizard.draft().connectors(),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }))
}

/// Runs `f` against the session with the write lock held. Never hold the lock across a gateway call.
fn with_session<T>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut Wizard) -> Result<T, WizardError>,
) -> Result<T, ApiError> {
    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or_else(|| not_found(id))?;
    let result = f(&mut session.wizard)?;
    session.touch();
    Ok(result)
}

/// Dispatches a prepared generation on its own task with the lock released, then merges into the
/// session if it is still open. The task outlives the request, so a client that hangs up never
/// leaves the session loading.
fn spawn_generation(state: &AppState, id: Uuid, pending: PendingGeneration) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        let step = pending.step.number();
        let outcome = pending.request.dispatch(state.gateway.as_ref()).await;
        let mut guard = state.store.write();
        match guard.get_mut(&id) {
            Some(session) => {
                session.wizard.finish(pending, outcome);
                session.touch();
            }
            None => warn!("Session {} closed before its step {} result arrived; dropping it", id, step),
        }
    })
}

fn spawn_schema_modification(state: &AppState, id: Uuid, request: SchemaModificationRequest) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        let outcome = request.dispatch(state.gateway.as_ref()).await;
        let mut guard = state.store.write();
        match guard.get_mut(&id) {
            Some(session) => {
                session.wizard.finish_schema_modification(outcome);
                session.touch();
            }
            None => warn!("Session {} closed before its schema modification arrived; dropping it", id),
        }
    })
}

async fn join(handle: JoinHandle<()>) -> Result<(), ApiError> {
    handle.await.map_err(|e| ApiError::InternalError(format!("generation task failed: {}", e)))
}

async fn run_generation(
    state: &AppState,
    id: Uuid,
    pending: Option<PendingGeneration>,
) -> Result<Json<SessionView>, ApiError> {
    if let Some(pending) = pending {
        join(spawn_generation(state, id, pending)).await?;
    }
    view(state, id)
}

pub async fn create_wizard(
    State(state): State<AppState>,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let id = Uuid::new_v4();
    tracing::info!("🚀 Starting blueprint wizard {} for: {}", id, input.purpose);

    let mut session = Session::new(input);
    let pending = session.wizard.begin_initialize()?;
    state.store.write().insert(id, session);

    let view = run_generation(&state, id, pending).await?;
    Ok((StatusCode::CREATED, view))
}

pub async fn get_wizard(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    view(&state, id)
}

pub async fn abandon_wizard(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.write().remove(&id).ok_or_else(|| not_found(id))?;
    info!("🗑️ Abandoned wizard {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn edit_input(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<InputEdit>,
) -> Result<Json<SessionView>, ApiError> {
    let pending = with_session(&state, id, |wizard| {
        if wizard.edit_input(&body.field, body.value)? {
            wizard.begin_initialize()
        } else {
            Ok(None)
        }
    })?;
    run_generation(&state, id, pending).await
}

pub async fn advance(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let pending = with_session(&state, id, Wizard::begin_advance)?;
    run_generation(&state, id, pending).await
}

pub async fn regenerate(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let pending = with_session(&state, id, Wizard::begin_regenerate)?;
    run_generation(&state, id, Some(pending)).await
}

pub async fn retry(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let pending = with_session(&state, id, Wizard::begin_retry)?;
    run_generation(&state, id, Some(pending)).await
}

pub async fn apply_edit(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(edit): Json<DraftEdit>,
) -> Result<Json<SessionView>, ApiError> {
    let changed = with_session(&state, id, |wizard| wizard.apply_edit(edit))?;
    if !changed {
        tracing::debug!("Edit on wizard {} changed nothing", id);
    }
    view(&state, id)
}

#[axum::debug_handler]
pub async fn modify_schema(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SchemaPromptRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let request = with_session(&state, id, |wizard| wizard.begin_schema_modification(body.prompt))?;
    if let Some(request) = request {
        join(spawn_schema_modification(&state, id, request)).await?;
    }
    view(&state, id)
}

pub async fn save(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SavePayload>, ApiError> {
    let mut guard = state.store.write();
    let session = guard.get(&id).ok_or_else(|| not_found(id))?;
    let payload = session.wizard.save()?;
    guard.remove(&id);
    info!(
        "📦 Handing off blueprint {}: {} pages, {} apis, {} tables",
        id,
        payload.pages.len(),
        payload.apis.as_ref().map_or(0, Vec::len),
        payload.database_schema.as_ref().map_or(0, Vec::len)
    );
    Ok(Json(payload))
}
