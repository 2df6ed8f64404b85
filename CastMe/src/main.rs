//! CastMe: play Subsonic albums on a Chromecast or the local speakers.

mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cmconfig::Config;
use cmcontrol::{ChromecastBackend, LocalBackend, PlayQueue, Player};
use cmsubsonic::SubsonicClient;

#[derive(Parser)]
#[command(
    name = "castme",
    version,
    about = "Subsonic album playback on Chromecast or local audio"
)]
struct Args {
    /// Backend to start on, overriding the configured default
    backend: Option<String>,

    /// Read the configuration from this file instead of the usual places
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a commented configuration template and exit
    #[arg(long)]
    init: bool,

    /// More detailed logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.init {
        let path = Config::write_template()?;
        println!("Wrote a configuration template to {}", path.display());
        println!("Edit it, then run castme again.");
        return Ok(());
    }

    // rust_cast leaves picking the TLS crypto backend to the application.
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    );

    let config = Config::load(args.config.as_deref())
        .context("Could not load the configuration (run `castme --init` to create one)")?;

    let catalog = SubsonicClient::new(&config.subsonic_server, &config.user, &config.password);
    let queue = Arc::new(PlayQueue::new());
    let mut player = Player::new(Box::new(catalog), Arc::clone(&queue));

    let local = LocalBackend::new(Arc::clone(&queue))
        .context("Could not start the local audio backend")?;
    player.register("local", Box::new(local));

    // The Chromecast may be off or away; start anyway and let the user
    // switch to it later once it answers discovery.
    match ChromecastBackend::new(&config.chromecast_friendly_name, Arc::clone(&queue)) {
        Ok(cast) => {
            info!(device = config.chromecast_friendly_name, "Chromecast connected");
            player.register("chromecast", Box::new(cast));
        }
        Err(err) => {
            warn!(
                device = config.chromecast_friendly_name,
                error = %err,
                "Chromecast unavailable, only local playback will work"
            );
        }
    }

    let backend = args.backend.as_deref().unwrap_or(&config.default_backend);
    player
        .select(backend)
        .with_context(|| format!("Backend '{backend}' is not available"))?;

    shell::run(&mut player)?;
    Ok(())
}
