use crate::{
    pipeline::{DecodeError, FrameError, FrameInput, PipelineConfig, PipelineError},
    server::SharedState,
    telemetry::ROUTE_UPLOAD,
};
use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub status: String,
    pub image: String,
    pub count: usize,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No image file in request")]
    MissingFile,
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("Image processing failed: {0}")]
    Pipeline(#[from] PipelineError),
}

impl From<FrameError> for UploadError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Decode(e) => UploadError::Decode(e),
            FrameError::Pipeline(e) => UploadError::Pipeline(e),
        }
    }
}

impl UploadError {
    fn outcome(&self) -> &'static str {
        match self {
            UploadError::MissingFile | UploadError::Multipart(_) => "bad_request",
            UploadError::Decode(_) => "decode_error",
            UploadError::Pipeline(_) => "pipeline_error",
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::MissingFile | UploadError::Decode(_) => StatusCode::BAD_REQUEST,
            UploadError::Multipart(e) => e.status(),
            UploadError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "status": "error",
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[instrument(skip_all)]
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let result = annotate_upload(&state, &mut multipart).await;

    match &result {
        Ok(response) => {
            tracing::info!(count = response.count, "Upload annotated");
            state.metrics.record_upload("success");
        }
        Err(UploadError::Pipeline(e)) => {
            tracing::error!("Upload failed: {}", e);
            state.metrics.record_upload("pipeline_error");
        }
        Err(e) => {
            tracing::warn!("Upload rejected: {}", e);
            state.metrics.record_upload(e.outcome());
        }
    }

    result.map(Json)
}

async fn annotate_upload(
    state: &SharedState,
    multipart: &mut Multipart,
) -> Result<UploadResponse, UploadError> {
    let bytes = read_file_field(multipart).await?;
    let started = Instant::now();

    let image = state.pipeline.decode(FrameInput::Raw(bytes)).await?;
    let output = state
        .pipeline
        .process(image, &PipelineConfig::quality())
        .await?;

    state
        .metrics
        .record_pipeline_duration(started.elapsed().as_millis() as u64, ROUTE_UPLOAD);

    Ok(UploadResponse {
        status: "success".to_string(),
        image: output.data_uri,
        count: output.count,
    })
}

/// Takes the field named `file`, or failing that the first field that
/// carries a file name.
async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, UploadError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
        if fallback.is_none() && field.file_name().is_some() {
            fallback = Some(field.bytes().await?);
        }
    }

    fallback.ok_or(UploadError::MissingFile)
}
