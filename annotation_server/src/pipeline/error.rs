use thiserror::Error;
use yolo_detection::ModelError;

/// A frame that yields no image. Recoverable: streaming skips the frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Empty payload")]
    EmptyPayload,
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unrecognised image container: {0}")]
    Format(std::io::Error),
    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure after a frame decoded. Fatal to a streaming session.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Detection failed: {0}")]
    Detection(#[from] ModelError),
    #[error("Expected an RGB image at {0}")]
    ChannelOrder(&'static str),
    #[error("JPEG encode failed: {0}")]
    Encode(image::ImageError),
    #[error("Failed to load label font: {0}")]
    Font(String),
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
