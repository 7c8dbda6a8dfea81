use crate::detection::Detections;
use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    Output(String),
    #[error("Inference task failed: {0}")]
    Task(String),
}

/// Per-call overrides. `None` falls back to the model defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InferenceParams {
    pub confidence_threshold: Option<f32>,
    pub input_size: Option<u32>,
}

/// Detection capability shared by every pipeline run. Implementations must
/// tolerate concurrent calls.
#[async_trait]
pub trait ModelService: Send + Sync + 'static {
    async fn predict(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detections, ModelError>;
}
