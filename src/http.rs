//! HTTP surface: route registration and request/response mapping.

use crate::application::pipeline::PipelineService;
use crate::error::PipelineError;
use crate::ports::storage::ObjectStore;
use crate::ports::transcoder::Transcoder;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAudio {
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioReady {
    pub hls_url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router<S, T>(pipeline: Arc<PipelineService<S, T>>) -> Router
where
    S: ObjectStore + 'static,
    T: Transcoder + 'static,
{
    Router::new()
        .route("/request-audio", post(request_audio::<S, T>))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

async fn request_audio<S, T>(
    State(pipeline): State<Arc<PipelineService<S, T>>>,
    Json(body): Json<RequestAudio>,
) -> Result<Json<AudioReady>, (StatusCode, Json<ErrorBody>)>
where
    S: ObjectStore + 'static,
    T: Transcoder + 'static,
{
    match pipeline.process(&body.file_name).await {
        Ok(hls_url) => Ok(Json(AudioReady { hls_url })),
        Err(PipelineError::ClientInput(error)) => {
            Err((StatusCode::BAD_REQUEST, Json(ErrorBody { error })))
        }
        // Stage and cause are already logged by the pipeline; the caller
        // only gets a coarse failure.
        Err(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: String::from("error during processing"),
            }),
        )),
    }
}
