use crate::{
    config::{ModelConfig, Validatable},
    detection::{non_max_suppression, BoundingBox, Detection, Detections},
    labels::ClassLabels,
    model_service::{InferenceParams, ModelError, ModelService},
};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayView2, ArrayViewD, Axis, Ix2, Ix4, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Channels of an end-to-end export row: x1, y1, x2, y2, score, class.
const END_TO_END_ROW: usize = 6;

fn transform_image(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let size = input_size as usize;
    let img = image::imageops::resize(image, input_size, input_size, FilterType::Triangle);

    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Maps model-space coordinates back to the source image.
struct OutputContext<'a> {
    labels: &'a ClassLabels,
    scale_x: f32,
    scale_y: f32,
    img_width: f32,
    img_height: f32,
    min_probability: f32,
}

impl OutputContext<'_> {
    fn detection(&self, bbox: BoundingBox, class_id: usize, confidence: f32) -> Detection {
        let bbox = BoundingBox {
            x1: bbox.x1 * self.scale_x,
            y1: bbox.y1 * self.scale_y,
            x2: bbox.x2 * self.scale_x,
            y2: bbox.y2 * self.scale_y,
        }
        .clamp(self.img_width, self.img_height);
        let (label, color) = self.labels.lookup(class_id);

        Detection {
            bbox,
            class_id,
            label,
            confidence,
            color,
        }
    }
}

fn first_batch<'a>(output: &'a ArrayViewD<f32>) -> Option<ArrayView2<'a, f32>> {
    if output.ndim() != 3 {
        return None;
    }
    output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .ok()
}

/// `[1, 4 + classes, candidates]`: centre/size boxes followed by class scores.
fn decode_raw_output(
    output: &ArrayViewD<f32>,
    ctx: &OutputContext,
    iou_threshold: f32,
) -> Result<Detections, ModelError> {
    let view = first_batch(output)
        .filter(|view| view.shape()[0] > 4)
        .ok_or_else(|| {
            ModelError::Output(format!(
                "expected [1, 4 + classes, candidates], got {:?}",
                output.shape()
            ))
        })?;

    let mut boxes = Vec::new();
    for candidate in view.axis_iter(Axis(1)) {
        let (class_id, prob) = candidate
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        if prob < ctx.min_probability {
            continue;
        }

        let (xc, yc, w, h) = (candidate[0], candidate[1], candidate[2], candidate[3]);
        let bbox = BoundingBox {
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        };
        boxes.push(ctx.detection(bbox, class_id, prob));
    }

    Ok(non_max_suppression(boxes, iou_threshold))
}

/// `[1, candidates, 6]`: already suppressed corner boxes.
fn decode_end_to_end_output(
    output: &ArrayViewD<f32>,
    ctx: &OutputContext,
) -> Result<Detections, ModelError> {
    let view = first_batch(output)
        .filter(|view| view.shape()[1] == END_TO_END_ROW)
        .ok_or_else(|| {
            ModelError::Output(format!(
                "expected [1, candidates, 6], got {:?}",
                output.shape()
            ))
        })?;

    let mut detections: Detections = view
        .axis_iter(Axis(0))
        .filter(|row| row[4] >= ctx.min_probability)
        .map(|row| {
            let bbox = BoundingBox {
                x1: row[0],
                y1: row[1],
                x2: row[2],
                y2: row[3],
            };
            ctx.detection(bbox, row[5].max(0.0) as usize, row[4])
        })
        .collect();

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(detections)
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    labels: Arc<ClassLabels>,
    min_probability: f32,
    iou_threshold: f32,
    input_size: u32,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig, labels: ClassLabels) -> Result<Self, ModelError> {
        model_config.validate().map_err(ModelError::Load)?;

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Load(e.to_string()))?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            labels: Arc::new(labels),
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            input_size: model_config.input_size,
        })
    }

    fn run_inference(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detections, ModelError> {
        let input_size = params.input_size.unwrap_or(self.input_size);
        let input = transform_image(image, input_size);

        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(format!("failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let output = ArrayViewD::from_shape(IxDyn(&dims), data)
            .map_err(|e| ModelError::Output(format!("invalid tensor shape: {}", e)))?;

        let ctx = OutputContext {
            labels: &self.labels,
            scale_x: image.width() as f32 / input_size as f32,
            scale_y: image.height() as f32 / input_size as f32,
            img_width: image.width() as f32,
            img_height: image.height() as f32,
            min_probability: params.confidence_threshold.unwrap_or(self.min_probability),
        };

        if dims.len() == 3 && dims[2] == END_TO_END_ROW {
            decode_end_to_end_output(&output, &ctx)
        } else {
            decode_raw_output(&output, &ctx, self.iou_threshold)
        }
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detections, ModelError> {
        let service = self.clone();
        let image = image.clone();
        let params = *params;

        let detections = tokio::task::spawn_blocking(move || service.run_inference(&image, &params))
            .await
            .map_err(|e| ModelError::Task(e.to_string()))??;

        tracing::debug!("Returning {} detections", detections.len());
        Ok(detections)
    }
}
