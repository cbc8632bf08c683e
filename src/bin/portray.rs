//! portray - command-line front end
//!
//! Resolves profiles and renders avatars against the live services, for
//! checking configuration and connectivity.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use portray::avatar::PACK_NAME;
use portray::{MemoryAssetRegistry, Portray, PortrayConfig, PortraitView};
use tracing::info;

/// Portray CLI
#[derive(Parser)]
#[command(name = "portray")]
#[command(version = portray::PKG_VERSION)]
#[command(about = "Profile and avatar cache client")]
struct Args {
    /// Config file (default: ~/.config/portray/config.toml if present)
    #[arg(short, long, env = "PORTRAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up a profile by name
    Profile {
        /// Player name (case-insensitive)
        name: String,
    },

    /// Render and publish a player's avatar
    Avatar {
        /// Player name (case-insensitive)
        name: String,
        /// View to render: face, front, back or avatar
        #[arg(short, long, default_value = "avatar")]
        view: PortraitView,
        /// Write the rendered image to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = PortrayConfig::load(args.config.as_deref())?;
    let assets = Arc::new(MemoryAssetRegistry::new());
    let service = Portray::builder()
        .from_config(&config)
        .assets(assets.clone())
        .build()?;

    info!(version = %portray::version_string(), "portray starting");

    match args.command {
        Command::Profile { name } => match service.profiles().fetch_by_name(&name).await? {
            Some(profile) => {
                println!("{}", serde_json::to_string_pretty(&profile.record())?);
            }
            None => {
                eprintln!("no profile named {name}");
                std::process::exit(1);
            }
        },
        Command::Avatar { name, view, out } => {
            let Some(profile) = service.profiles().fetch_by_name(&name).await? else {
                eprintln!("no profile named {name}");
                std::process::exit(1);
            };
            let Some(path) = service.avatars().fetch(profile.id(), view).await? else {
                eprintln!("renderer produced no {view} image for {}", profile.username());
                std::process::exit(1);
            };
            println!("{PACK_NAME}/{path}");

            if let Some(out) = out {
                let asset = assets
                    .get(PACK_NAME, &path)
                    .ok_or("avatar asset was removed before it could be written")?;
                std::fs::write(&out, &asset.data)?;
                println!(
                    "wrote {} bytes to {} (sha256 {})",
                    asset.data.len(),
                    out.display(),
                    asset.hash
                );
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
