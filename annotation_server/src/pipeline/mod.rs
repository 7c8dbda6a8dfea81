//! Decode, detect, annotate, normalise, resize and re-encode one frame.
//!
//! The steps are split in two halves so callers can tell a frame that never
//! decoded ([`DecodeError`], recoverable) from a failure after decoding
//! ([`PipelineError`]).

mod annotate;
mod codec;
mod config;
mod envelope;
mod error;
mod raster;

#[cfg(test)]
pub(crate) mod testing;

pub use annotate::{Annotator, BoxAnnotator};
pub use codec::{decode_image, encode_jpeg, resize_exact};
pub use config::PipelineConfig;
pub use envelope::{decode_envelope, encode_data_uri, JPEG_DATA_URI_PREFIX};
pub use error::{DecodeError, FrameError, PipelineError};
pub use raster::{ChannelOrder, RasterImage};

use bytes::Bytes;
use std::sync::Arc;
use tracing::instrument;
use yolo_detection::{Detections, ModelService};

/// One inbound frame: a base64 data-URI envelope, or raw container bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameInput {
    Envelope(String),
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data_uri: String,
    pub count: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct FramePipeline {
    model: Arc<dyn ModelService>,
    annotator: Arc<dyn Annotator>,
}

impl FramePipeline {
    pub fn new(model: Arc<dyn ModelService>) -> Result<Self, PipelineError> {
        Ok(Self::with_annotator(model, Arc::new(BoxAnnotator::new()?)))
    }

    pub fn with_annotator(model: Arc<dyn ModelService>, annotator: Arc<dyn Annotator>) -> Self {
        Self { model, annotator }
    }

    /// Decodes on the blocking pool. A payload that yields no image comes
    /// back as [`FrameError::Decode`]; only a failed task is a
    /// [`FrameError::Pipeline`].
    pub async fn decode(&self, input: FrameInput) -> Result<RasterImage, FrameError> {
        let image = tokio::task::spawn_blocking(move || decode_frame(&input))
            .await
            .map_err(PipelineError::from)??;
        Ok(image)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn process(
        &self,
        image: RasterImage,
        config: &PipelineConfig,
    ) -> Result<PipelineOutput, PipelineError> {
        let rgb = image
            .as_rgb()
            .ok_or(PipelineError::ChannelOrder("detection input"))?;
        let detections = self.model.predict(rgb, &config.inference_params()).await?;
        let count = detections.len();

        let annotator = self.annotator.clone();
        let config = *config;
        let (jpeg, width, height) = tokio::task::spawn_blocking(move || {
            render(annotator.as_ref(), &image, &detections, &config)
        })
        .await??;

        tracing::debug!(count, width, height, bytes = jpeg.len(), "frame rendered");

        Ok(PipelineOutput {
            data_uri: encode_data_uri(&jpeg),
            count,
            width,
            height,
        })
    }

    pub async fn run(
        &self,
        input: &FrameInput,
        config: &PipelineConfig,
    ) -> Result<PipelineOutput, FrameError> {
        let image = self.decode(input.clone()).await?;
        Ok(self.process(image, config).await?)
    }
}

fn decode_frame(input: &FrameInput) -> Result<RasterImage, DecodeError> {
    match input {
        FrameInput::Envelope(text) => decode_image(&decode_envelope(text)?),
        FrameInput::Raw(bytes) => decode_image(bytes),
    }
}

fn render(
    annotator: &dyn Annotator,
    image: &RasterImage,
    detections: &Detections,
    config: &PipelineConfig,
) -> Result<(Vec<u8>, u32, u32), PipelineError> {
    let annotated = annotator.annotate(image, detections).to_rgb();
    let output = match config.output_size {
        Some((width, height)) => resize_exact(&annotated, width, height),
        None => annotated,
    };
    let jpeg = encode_jpeg(&output, config.jpeg_quality)?;
    Ok((jpeg, output.width(), output.height()))
}
