mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cctv",
    about = "Camera streaming server with YOLO object detection",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./cctv.yaml)
    #[arg(long, global = true, env = "CCTV_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the streaming server
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides server.port)
        #[arg(long, short = 'p')]
        port: Option<u16>,
        /// Camera backend: v4l or test-pattern (overrides camera.backend)
        #[arg(long)]
        backend: Option<String>,
        /// Open the control page in a browser
        #[arg(long)]
        open: bool,
    },

    /// Probe for available cameras
    Cameras {
        /// Camera backend: v4l or test-pattern (overrides camera.backend)
        #[arg(long)]
        backend: Option<String>,
    },

    /// Show recent detections from the detection log
    Log {
        /// Number of records to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Inspect and initialize the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cmd::config_path(cli.config.as_deref());

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            backend,
            open,
        } => cmd::serve::run(
            &config_path,
            cmd::serve::Overrides {
                host,
                port,
                backend,
            },
            open,
        ),
        Commands::Cameras { backend } => {
            cmd::cameras::run(&config_path, backend.as_deref(), cli.json)
        }
        Commands::Log { limit } => cmd::log::run(&config_path, limit, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
