use cctv_core::camera::{available_cameras, backend_for};
use std::path::Path;

use super::{load_config, parse_backend};
use crate::output::{print_json, print_table};

pub fn run(config_path: &Path, backend: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(backend) = backend {
        config.camera.backend = parse_backend(backend)?;
    }

    let camera_backend = backend_for(&config.camera)?;
    let cameras = available_cameras(camera_backend.as_ref(), config.camera.scan_limit);

    if json {
        return print_json(&serde_json::json!({
            "backend": camera_backend.name(),
            "cameras": cameras,
        }));
    }

    if cameras.is_empty() {
        println!(
            "No cameras found (backend: {}, scanned 0..{}).",
            camera_backend.name(),
            config.camera.scan_limit
        );
        return Ok(());
    }

    let rows = cameras
        .iter()
        .map(|idx| vec![idx.to_string(), camera_backend.name().to_string()])
        .collect();
    print_table(&["INDEX", "BACKEND"], rows);
    Ok(())
}
