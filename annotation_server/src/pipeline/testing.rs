use super::{codec::encode_jpeg, raster::RasterImage, FramePipeline};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::sync::Arc;
use yolo_detection::{
    BoundingBox, Detection, Detections, InferenceParams, ModelError, ModelService,
};

/// Returns `count` fixed detections inside the frame, whatever the input.
pub(crate) struct StubModel {
    pub count: usize,
}

#[async_trait]
impl ModelService for StubModel {
    async fn predict(
        &self,
        image: &RgbImage,
        _params: &InferenceParams,
    ) -> Result<Detections, ModelError> {
        let (w, h) = (image.width() as f32, image.height() as f32);
        Ok((0..self.count)
            .map(|i| Detection {
                bbox: BoundingBox {
                    x1: w * 0.1,
                    y1: h * 0.1 + i as f32,
                    x2: w * 0.9,
                    y2: h * 0.9,
                },
                class_id: i,
                label: format!("object{}", i),
                confidence: 0.9,
                color: [0, 255, 0],
            })
            .collect())
    }
}

pub(crate) struct FailingModel;

#[async_trait]
impl ModelService for FailingModel {
    async fn predict(
        &self,
        _image: &RgbImage,
        _params: &InferenceParams,
    ) -> Result<Detections, ModelError> {
        Err(ModelError::Inference("device lost".to_string()))
    }
}

pub(crate) fn stub_pipeline(count: usize) -> FramePipeline {
    FramePipeline::new(Arc::new(StubModel { count })).unwrap()
}

pub(crate) fn jpeg_frame(width: u32, height: u32) -> Vec<u8> {
    let raster = RasterImage::from_rgb(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));
    encode_jpeg(&raster, 90).unwrap()
}
