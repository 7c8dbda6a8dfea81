mod detection;
mod labels;
mod model_service;
mod ort_service;

pub mod config;

pub use detection::{non_max_suppression, BoundingBox, Detection, Detections};
pub use labels::{load_yolo_labels, ClassLabels, ColorLabel};
pub use model_service::{InferenceParams, ModelError, ModelService};
pub use ort_service::OrtModelService;
