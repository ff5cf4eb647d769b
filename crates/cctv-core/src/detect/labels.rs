use std::path::Path;

use crate::error::Result;

/// Class names of the 80-class COCO set, in YOLO id order.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

pub fn coco_labels() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Read class names, one per line. Blank lines are skipped.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path)?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Look up a class name, falling back to `class{id}` for ids past the table.
pub fn class_name(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class{class_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn coco_table_order() {
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES[79], "toothbrush");
    }

    #[test]
    fn unknown_id_gets_placeholder_name() {
        let labels = coco_labels();
        assert_eq!(class_name(&labels, 16), "dog");
        assert_eq!(class_name(&labels, 91), "class91");
    }

    #[test]
    fn load_labels_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classes.txt");
        std::fs::write(&path, "helmet\n\n  vest \nperson\n").unwrap();
        assert_eq!(load_labels(&path).unwrap(), vec!["helmet", "vest", "person"]);
    }
}
