pub mod cameras;
pub mod config;
pub mod log;
pub mod serve;

use anyhow::Context;
use cctv_core::config::{BackendKind, Config, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};

/// `--config` / `CCTV_CONFIG`, falling back to `./cctv.yaml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

pub fn parse_backend(value: &str) -> anyhow::Result<BackendKind> {
    value.parse::<BackendKind>().map_err(anyhow::Error::msg)
}
