use yolo_detection::InferenceParams;

/// Per-call pipeline parameters. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// `None` keeps the model's configured threshold.
    pub confidence_threshold: Option<f32>,
    /// Square inference resolution; `None` keeps the model's native size.
    pub inference_size: Option<u32>,
    /// Exact output `(width, height)`; `None` keeps the input resolution.
    pub output_size: Option<(u32, u32)>,
    pub jpeg_quality: u8,
}

impl PipelineConfig {
    /// Single-shot uploads: full resolution, model defaults.
    pub const fn quality() -> Self {
        Self {
            confidence_threshold: None,
            inference_size: None,
            output_size: None,
            jpeg_quality: 75,
        }
    }

    /// Streaming: trades fidelity for turnaround time.
    pub const fn low_latency() -> Self {
        Self {
            confidence_threshold: Some(0.5),
            inference_size: Some(320),
            output_size: Some((320, 240)),
            jpeg_quality: 50,
        }
    }

    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            confidence_threshold: self.confidence_threshold,
            input_size: self.inference_size,
        }
    }
}
