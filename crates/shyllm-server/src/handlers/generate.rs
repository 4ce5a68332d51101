//! One-shot generation handler.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::HeaderMap,
    Json,
};
use tracing::Instrument;
use uuid::Uuid;

use super::auth::{authorize, AuthParams};
use crate::{
    error::ServerError,
    models::{GenerateBody, GenerateResponse},
    state::AppState,
};

/// Handle `POST /generate`.
///
/// Rejections happen in a fixed order: API key, readiness, payload. Nothing
/// reaches the model host until all three pass.
pub async fn handle_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<AuthParams>, QueryRejection>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ServerError> {
    let Query(auth) = query?;
    authorize(&state.config, &headers, &auth)?;
    let host = state.host()?;
    let Json(body) = payload?;
    let request = body.into_request(&state.config)?;

    let request_id = Uuid::new_v4();
    let prompt = request.prompt.clone();
    let result = host
        .generate(request)
        .instrument(tracing::info_span!("generate", %request_id))
        .await;
    state.observe(&result);

    Ok(Json(GenerateResponse::new(host.model_id(), prompt, result?)))
}
