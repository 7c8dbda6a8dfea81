use crate::config::{LabelsConfig, Validatable};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const UNKNOWN_COLOR: [u8; 3] = [128, 128, 128];

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ColorLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone)]
pub struct ClassLabels {
    class_labels: Vec<ColorLabel>,
}

impl ClassLabels {
    pub fn new(class_labels: Vec<ColorLabel>) -> Self {
        Self { class_labels }
    }

    pub fn from_config(labels_cfg: &LabelsConfig) -> Result<Self, String> {
        labels_cfg.validate()?;
        load_yolo_labels(&labels_cfg.get_path())
            .map(Self::new)
            .map_err(|e| format!("Failed to load labels: {}", e))
    }

    /// COCO class names with a generated palette.
    pub fn coco() -> Self {
        let class_labels = COCO_CLASSES
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let [red, green, blue] = palette_color(i);
                ColorLabel {
                    label: label.to_string(),
                    red,
                    green,
                    blue,
                }
            })
            .collect();
        Self { class_labels }
    }

    pub fn lookup(&self, class_id: usize) -> (String, [u8; 3]) {
        match self.class_labels.get(class_id) {
            Some(color_label) => (
                color_label.label.clone(),
                [color_label.red, color_label.green, color_label.blue],
            ),
            None => (format!("class {}", class_id), UNKNOWN_COLOR),
        }
    }

    pub fn len(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_labels.is_empty()
    }
}

fn palette_color(index: usize) -> [u8; 3] {
    // Spread hues with the golden angle so neighbouring ids differ.
    let hue = (index as f32 * 137.508) % 360.0;
    let sector = (hue / 60.0) as u32;
    let f = hue / 60.0 - sector as f32;
    let up = (255.0 * f) as u8;
    let down = (255.0 * (1.0 - f)) as u8;
    match sector {
        0 => [255, up, 0],
        1 => [down, 255, 0],
        2 => [0, 255, up],
        3 => [0, down, 255],
        4 => [up, 0, 255],
        _ => [255, 0, down],
    }
}

pub fn load_yolo_labels(filepath: &Path) -> io::Result<Vec<ColorLabel>> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

fn parse_labels<R: BufRead>(reader: R) -> io::Result<Vec<ColorLabel>> {
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let label = parts[0].trim().to_string();
        let red = parse_channel(parts[1], "red")?;
        let green = parse_channel(parts[2], "green")?;
        let blue = parse_channel(parts[3], "blue")?;

        color_labels.push(ColorLabel {
            label,
            red,
            green,
            blue,
        });
    }

    Ok(color_labels)
}

fn parse_channel(value: &str, name: &str) -> io::Result<u8> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} value: {}", name, value.trim()),
        )
    })
}
