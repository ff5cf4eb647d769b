use cctv_core::config::WarnLevel;
use std::path::Path;

use super::{load_config, parse_backend};

/// Command-line overrides applied on top of the config file.
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend: Option<String>,
}

pub fn run(config_path: &Path, overrides: Overrides, open_browser: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(backend) = overrides.backend.as_deref() {
        config.camera.backend = parse_backend(backend)?;
    }

    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors; run `cctv config check`");
    }

    tracing::info!(
        config = %config_path.display(),
        backend = %config.camera.backend,
        "starting cctv"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(cctv_server::serve(config, open_browser))
}
