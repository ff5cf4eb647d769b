use cctv_core::log::DetectionLog;
use std::path::Path;

use super::load_config;
use crate::output::{print_json, print_table};

pub fn run(config_path: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let log = DetectionLog::open(&config.log.path, config.log.capacity);
    let records = log.recent(limit);

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No detections logged in {}.", log.path().display());
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.timestamp.clone(),
                r.camera_idx.to_string(),
                r.class_name.clone(),
                format!("{:.1}%", r.confidence * 100.0),
            ]
        })
        .collect();
    print_table(&["TIMESTAMP", "CAMERA", "CLASS", "CONFIDENCE"], rows);
    Ok(())
}
