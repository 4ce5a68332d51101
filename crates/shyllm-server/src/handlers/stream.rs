//! Plain-text streaming of generated chunks.
//!
//! The response status is only committed once the first chunk exists, so
//! validation, queue timeouts and backend errors before any output still map to
//! their proper status codes. After that, a failure just ends the body early.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use shyllm_engine::{GenerationError, GenerationResponse};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;
use uuid::Uuid;

use super::auth::{authorize, AuthParams};
use crate::{error::ServerError, models::GenerateBody, state::AppState};

const CHUNK_BUFFER: usize = 32;

type Worker = JoinHandle<Option<Result<GenerationResponse, GenerationError>>>;

/// Handle `POST /stream`.
pub async fn handle_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<AuthParams>, QueryRejection>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Query(auth) = query?;
    authorize(&state.config, &headers, &auth)?;
    let host = state.host()?;
    let Json(body) = payload?;
    let request = body.into_request(&state.config)?;

    let request_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(CHUNK_BUFFER);
    let cancel = CancellationToken::new();
    // Dropping this (handler or body dropped) abandons the generation.
    let guard = cancel.clone().drop_guard();

    let worker_state = state.clone();
    let worker: Worker = tokio::spawn(
        async move {
            tokio::select! {
                result = host.generate_streaming(request, tx) => {
                    worker_state.observe(&result);
                    Some(result)
                }
                _ = cancel.cancelled() => None,
            }
        }
        .instrument(tracing::info_span!("stream", %request_id)),
    );

    let Some(first) = rx.recv().await else {
        // The worker finished without producing output.
        return match finish(worker).await {
            Some(Ok(_)) => Ok(text_response(Body::empty())),
            Some(Err(err)) => Err(err.into()),
            None => Err(GenerationError::Unavailable.into()),
        };
    };

    let chunks = body_stream(first, rx, worker, guard);
    Ok(text_response(Body::from_stream(chunks)))
}

fn body_stream(
    first: String,
    mut rx: mpsc::Receiver<String>,
    worker: Worker,
    guard: DropGuard,
) -> impl Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        let _guard = guard;
        yield Ok(first);
        while let Some(chunk) = rx.recv().await {
            yield Ok(chunk);
        }
        if let Some(Err(err)) = finish(worker).await {
            tracing::warn!(error = %err, "stream ended early");
        }
    }
}

async fn finish(worker: Worker) -> Option<Result<GenerationResponse, GenerationError>> {
    match worker.await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, "stream worker failed");
            None
        }
    }
}

fn text_response(body: Body) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    )
        .into_response()
}
