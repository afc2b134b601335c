use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{ParameterOverrides, RecommendationParameters},
    services::{Engine, GridTile, NavigationOutcome},
};

use super::AppState;

pub const LOWEST_CLUSTER_MESSAGE: &str = "already on the lowest cluster";
pub const HIGHEST_CLUSTER_MESSAGE: &str = "already on the highest cluster";
pub const NO_SUCH_CLUSTER_MESSAGE: &str = "no such cluster in the current grid";

/// Partial parameters from the request body
///
/// An empty body means "all defaults"; anything else must be valid JSON of
/// the right shape, otherwise the request is rejected with 400.
#[derive(Debug, Default)]
pub struct Overrides(pub ParameterOverrides);

#[async_trait]
impl<S> FromRequest<S> for Overrides
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let Json(overrides) = Json::<ParameterOverrides>::from_bytes(&bytes)
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        Ok(Self(overrides))
    }
}

// Response types

#[derive(Debug, Serialize)]
pub struct VideoIdsResponse {
    pub ids: Vec<String>,
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct GridResponse {
    pub tiles: Vec<GridTile>,
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct DownResponse {
    pub id: String,
    pub down: bool,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub branch: String,
    pub path: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub outcome: NavigationOutcome,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RedrawResponse {
    pub pending: bool,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub branch: String,
}

/// Fills unspecified fields from the engine's defaults
fn resolve(engine: &Engine, Overrides(overrides): Overrides) -> RecommendationParameters {
    engine.defaults().merged(&overrides)
}

fn choose_message(outcome: NavigationOutcome, at_leaf: bool) -> Option<&'static str> {
    match (outcome, at_leaf) {
        (NavigationOutcome::Success, _) => None,
        (NavigationOutcome::Boundary, true) => Some(LOWEST_CLUSTER_MESSAGE),
        (NavigationOutcome::Boundary, false) => Some(NO_SUCH_CLUSTER_MESSAGE),
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// POST /api/v1/videos
///
/// Clustering balances are fixed per engine; changing them goes through `/refresh`.
pub async fn get_video_ids(
    State(state): State<AppState>,
    body: Overrides,
) -> AppResult<Json<VideoIdsResponse>> {
    let mut slot = state.slot.write().await;
    let engine = slot.engine_mut()?;
    let params = resolve(engine, body);

    let ids = engine.get_video_ids(&params)?;
    Ok(Json(VideoIdsResponse {
        ids,
        branch: engine.current_branch_label(),
    }))
}

/// POST /api/v1/grid
pub async fn render_grid(
    State(state): State<AppState>,
    body: Overrides,
) -> AppResult<Json<GridResponse>> {
    let (ids, branch, resolver) = {
        let mut slot = state.slot.write().await;
        let engine = slot.engine_mut()?;
        let params = resolve(engine, body);
        let ids = engine.get_video_ids(&params)?;
        (ids, engine.current_branch_label(), engine.resolver())
    };

    // probing happens without holding the engine lock
    let tiles = resolver.tiles(ids).await;
    Ok(Json(GridResponse { tiles, branch }))
}

/// GET /api/v1/videos/:id/title
pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<TitleResponse>> {
    let slot = state.slot.read().await;
    let title = slot
        .engine()?
        .get_title(&id)
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?
        .to_string();

    Ok(Json(TitleResponse { id, title }))
}

/// GET /api/v1/videos/:id/down
pub async fn is_down(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DownResponse>> {
    let resolver = state.slot.read().await.engine()?.resolver();
    let down = resolver.is_down(&id).await?;
    Ok(Json(DownResponse { id, down }))
}

/// GET /api/v1/navigation
pub async fn get_position(State(state): State<AppState>) -> AppResult<Json<PositionResponse>> {
    let slot = state.slot.read().await;
    let engine = slot.engine()?;
    Ok(Json(PositionResponse {
        branch: engine.current_branch_label(),
        path: engine.path().to_vec(),
    }))
}

/// POST /api/v1/navigation/choose/:index
pub async fn choose_column(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> AppResult<Json<NavigationResponse>> {
    let mut slot = state.slot.write().await;
    let engine = slot.engine_mut()?;
    let at_leaf = engine.at_leaf();
    let outcome = engine.choose_column(index);

    Ok(Json(NavigationResponse {
        outcome,
        branch: engine.current_branch_label(),
        message: choose_message(outcome, at_leaf),
    }))
}

/// POST /api/v1/navigation/back
pub async fn go_back(State(state): State<AppState>) -> AppResult<Json<NavigationResponse>> {
    let mut slot = state.slot.write().await;
    let engine = slot.engine_mut()?;
    let outcome = engine.go_back();

    Ok(Json(NavigationResponse {
        outcome,
        branch: engine.current_branch_label(),
        message: (!outcome.is_success()).then_some(HIGHEST_CLUSTER_MESSAGE),
    }))
}

/// POST /api/v1/prefetch
///
/// Answers as soon as the probes are scheduled.
pub async fn prefetch(
    State(state): State<AppState>,
    body: Overrides,
) -> AppResult<StatusCode> {
    let slot = state.slot.read().await;
    let engine = slot.engine()?;
    let params = resolve(engine, body);

    // the handle is dropped; results land in the cache and the redraw flag
    engine.fetch_videos(&params)?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/redraw
pub async fn take_redraw(State(state): State<AppState>) -> Json<RedrawResponse> {
    Json(RedrawResponse {
        pending: state.take_redraw(),
    })
}

/// POST /api/v1/refresh
pub async fn refresh(
    State(state): State<AppState>,
    body: Overrides,
) -> AppResult<Json<RefreshResponse>> {
    let Overrides(overrides) = body;
    let base = match state.slot.read().await.engine() {
        Ok(engine) => engine.defaults().clone(),
        Err(_) => state.defaults.clone(),
    };

    let branch = state.refresh(base.merged(&overrides)).await?;
    Ok(Json(RefreshResponse { branch }))
}
