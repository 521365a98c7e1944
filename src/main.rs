//! framewm binary: connect to X11 and the decoration service, then run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use framewm::config::Config;
use framewm::decorations::{self, RpcDecorations};
use framewm::x11::X11Display;
use framewm::WindowManager;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/framewm/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decoration service socket (default: /tmp/framewm-decorations$DISPLAY.sock)
    #[arg(long)]
    decorations_socket: Option<PathBuf>,

    /// Command that starts the decoration service
    #[arg(long)]
    decorations_command: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let cli = Cli::parse();
    log::info!("Starting framewm");

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone()),
        None => Config::load(),
    };

    let display = X11Display::connect(None).context("Failed to set up the X11 display")?;

    let socket = cli
        .decorations_socket
        .or_else(|| config.general.decorations_socket.as_deref().map(|s| {
            PathBuf::from(shellexpand::tilde(s).into_owned())
        }))
        .unwrap_or_else(decorations::socket_path);
    let command = cli
        .decorations_command
        .or_else(|| config.general.decorations_command.clone());
    let service = RpcDecorations::connect(&socket, command.as_deref())
        .with_context(|| format!("Failed to reach the decoration service at {}", socket.display()))?;

    let mut wm = WindowManager::new(display, service, &config)?;
    wm.run()?;

    log::info!("framewm exiting");
    Ok(())
}
