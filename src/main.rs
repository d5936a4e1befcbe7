mod app;
mod channel;
mod check;
mod colors;
mod config;
mod dispatch;
mod draw;
mod error;
mod icon;
mod layout;
mod protocol;
mod render;
mod session;
mod settings;
mod style;
mod terminal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use layout::{EmptyCells, Viewport};
use session::SessionOptions;
use settings::{Settings, DEFAULT_PORT};
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "macrodeck")]
#[command(author = "Macrodeck Developers")]
#[command(version = "0.1.0")]
#[command(about = "macrodeck: a terminal macro pad for a macrodeck server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server and show its button grid
    Connect {
        /// Server host (default: settings file, then 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Answer the password prompt automatically
        #[arg(short = 'P', long)]
        password: Option<String>,

        /// Use wss:// and https://
        #[arg(long)]
        secure: bool,

        /// Minimum time between two presses of one button (milliseconds)
        #[arg(short, long)]
        cooldown_ms: Option<u64>,

        /// Do not look up button icons
        #[arg(long)]
        no_icons: bool,

        /// What to draw in cells without a button
        #[arg(long, value_enum)]
        empty_cells: Option<EmptyCells>,

        /// Log at debug level
        #[arg(short, long)]
        debug: bool,

        /// Log file (default: <cache dir>/macrodeck/macrodeck.log)
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Seconds per UI frame
        #[arg(short, long)]
        time: Option<f32>,
    },

    /// Validate a config.json offline and print the resulting grids
    Check {
        /// Path to the config document
        file: PathBuf,

        /// Viewport width in layout units
        #[arg(long, default_value = "800")]
        width: u32,

        /// Viewport height in layout units
        #[arg(long, default_value = "480")]
        height: u32,

        /// What to draw in cells without a button
        #[arg(long, value_enum)]
        empty_cells: Option<EmptyCells>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            host,
            port,
            password,
            secure,
            cooldown_ms,
            no_icons,
            empty_cells,
            debug,
            log_file,
            time,
        } => {
            init_logging(log_file, debug)?;
            let settings = Settings::load();

            let address = channel::ServerAddress {
                host: host
                    .or_else(|| settings.server.host.clone())
                    .unwrap_or_else(|| "127.0.0.1".to_string()),
                port: port.or(settings.server.port).unwrap_or(DEFAULT_PORT),
                secure: secure || settings.server.secure,
            };
            let cooldown = Duration::from_millis(cooldown_ms.unwrap_or(settings.ui.cooldown_ms));
            let config = app::ClientConfig {
                session: SessionOptions {
                    policy: settings.layout_policy(empty_cells),
                    cooldown,
                    password: password.or_else(|| settings.server.password.clone()),
                },
                icons: settings.ui.icons && !no_icons,
                frame_time: time.unwrap_or(settings.ui.frame_time),
                address,
            };

            info!("macrodeck starting, server {}", config.address.websocket_url());
            app::run(config)?;
            info!("macrodeck exiting");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { file, width, height, empty_cells } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let policy = Settings::load().layout_policy(empty_cells);
            let report = check::check_document(&raw, Viewport::new(width, height), &policy);
            print!("{}", report.text);
            Ok(if report.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: Option<PathBuf>, debug: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("macrodeck")
            .join("macrodeck.log"),
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(if debug { Level::DEBUG } else { Level::INFO })
        .init();
    Ok(())
}
