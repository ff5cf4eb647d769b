pub mod camera;
pub mod detections;
pub mod stream;
