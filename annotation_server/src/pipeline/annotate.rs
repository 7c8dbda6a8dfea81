use super::{error::PipelineError, raster::RasterImage};
use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use yolo_detection::{Detection, Detections};

const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
const BOX_THICKNESS: i32 = 2;
const LABEL_PADDING: i32 = 2;
const MIN_FONT_PX: f32 = 12.0;
const MAX_FONT_PX: f32 = 48.0;
const TEXT_COLOR_BGR: [u8; 3] = [255, 255, 255];

/// Draws detections onto a frame.
///
/// Implementations work on a copy and leave `image` untouched. The output is
/// always BGR regardless of the input order, so callers must normalise it
/// with [`RasterImage::to_rgb`] before encoding.
pub trait Annotator: Send + Sync + 'static {
    fn annotate(&self, image: &RasterImage, detections: &Detections) -> RasterImage;
}

/// Box, label background and `"<label> <score>"` text per detection.
#[derive(Clone)]
pub struct BoxAnnotator {
    font: FontArc,
}

impl BoxAnnotator {
    pub fn new() -> Result<Self, PipelineError> {
        let font = FontArc::try_from_slice(FONT_DATA)
            .map_err(|e| PipelineError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    fn draw_detection(&self, buffer: &mut image::RgbImage, detection: &Detection, scale: PxScale) {
        let (width, height) = (buffer.width() as i32, buffer.height() as i32);
        let color = bgr(detection.color);

        let x1 = (detection.bbox.x1.round() as i32).clamp(0, width - 1);
        let y1 = (detection.bbox.y1.round() as i32).clamp(0, height - 1);
        let x2 = (detection.bbox.x2.round() as i32).clamp(0, width - 1);
        let y2 = (detection.bbox.y2.round() as i32).clamp(0, height - 1);

        for inset in 0..BOX_THICKNESS {
            let w = x2 - x1 - 2 * inset + 1;
            let h = y2 - y1 - 2 * inset + 1;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(buffer, rect, color);
        }

        let text = format!("{} {:.2}", detection.label, detection.confidence);
        let (text_width, text_height) = text_size(scale, &self.font, &text);
        let label_width = text_width as i32 + 2 * LABEL_PADDING;
        let label_height = text_height as i32 + 2 * LABEL_PADDING;

        // Above the box when there is room, otherwise just inside its top edge.
        let label_y = if y1 - label_height >= 0 {
            y1 - label_height
        } else {
            y1
        };
        let background = Rect::at(x1, label_y).of_size(label_width as u32, label_height as u32);
        draw_filled_rect_mut(buffer, background, color);
        draw_text_mut(
            buffer,
            Rgb(TEXT_COLOR_BGR),
            x1 + LABEL_PADDING,
            label_y + LABEL_PADDING,
            scale,
            &self.font,
            &text,
        );
    }
}

impl Annotator for BoxAnnotator {
    fn annotate(&self, image: &RasterImage, detections: &Detections) -> RasterImage {
        let canvas = image.to_bgr();
        let mut buffer = canvas.into_buffer();
        if buffer.width() == 0 || buffer.height() == 0 {
            return RasterImage::from_bgr(buffer);
        }
        let scale = font_scale(buffer.width(), buffer.height());

        for detection in detections {
            self.draw_detection(&mut buffer, detection, scale);
        }

        RasterImage::from_bgr(buffer)
    }
}

fn font_scale(width: u32, height: u32) -> PxScale {
    PxScale::from((width.min(height) as f32 / 24.0).clamp(MIN_FONT_PX, MAX_FONT_PX))
}

fn bgr(color: [u8; 3]) -> Rgb<u8> {
    let [r, g, b] = color;
    Rgb([b, g, r])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::raster::ChannelOrder;
    use image::RgbImage;
    use yolo_detection::BoundingBox;

    fn annotator() -> BoxAnnotator {
        BoxAnnotator::new().unwrap()
    }

    fn detection() -> Detection {
        Detection {
            bbox: BoundingBox {
                x1: 20.0,
                y1: 30.0,
                x2: 80.0,
                y2: 90.0,
            },
            class_id: 0,
            label: "person".to_string(),
            confidence: 0.91,
            color: [255, 0, 0],
        }
    }

    #[test]
    fn test_annotate_leaves_input_untouched() {
        let input = RasterImage::from_rgb(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])));
        let before = input.as_bytes().to_vec();

        let output = annotator().annotate(&input, &vec![detection()]);

        assert_eq!(input.as_bytes(), before.as_slice());
        assert_ne!(output.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_annotate_emits_bgr_colours() {
        let input = RasterImage::from_rgb(RgbImage::new(100, 100));

        let output = annotator().annotate(&input, &vec![detection()]);

        assert_eq!(output.order(), ChannelOrder::Bgr);
        // Left edge of the box, below the label: red in RGB is [0, 0, 255] in BGR.
        assert_eq!(output.buffer().get_pixel(20, 60).0, [0, 0, 255]);
        assert_eq!(output.to_rgb().buffer().get_pixel(20, 60).0, [255, 0, 0]);
    }

    #[test]
    fn test_annotate_without_detections_only_reorders() {
        let input = RasterImage::from_rgb(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));

        let output = annotator().annotate(&input, &Vec::new());

        assert_eq!(output.to_rgb(), input);
    }

    #[test]
    fn test_annotate_clamps_boxes_outside_the_frame() {
        let input = RasterImage::from_rgb(RgbImage::new(10, 10));
        let mut det = detection();
        det.bbox = BoundingBox {
            x1: -50.0,
            y1: -50.0,
            x2: 500.0,
            y2: 500.0,
        };

        let output = annotator().annotate(&input, &vec![det]);

        assert_eq!((output.width(), output.height()), (10, 10));
    }

    #[test]
    fn test_labels_keep_lowercase_text() {
        let input = RasterImage::from_rgb(RgbImage::new(200, 200));
        let mut lower = detection();
        lower.color = [0, 0, 0];
        let mut upper = lower.clone();
        upper.label = "PERSON".to_string();

        let lower = annotator().annotate(&input, &vec![lower]);
        let upper = annotator().annotate(&input, &vec![upper]);

        // Text is white on a black label, so differing glyph pixels show the case survives.
        assert_ne!(lower.as_bytes(), upper.as_bytes());
        assert!(lower.as_bytes().iter().any(|&b| b > 0));
    }
}
