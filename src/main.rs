//! Playback CLI

use std::path::Path;
use std::process;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use playback::config::Config;
use playback::{Cassette, Player};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Playback v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: playback <command> <record-name> [config.toml]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  record    Proxy to the upstream and record exchanges");
        eprintln!("  replay    Serve recorded exchanges back");
        eprintln!();
        eprintln!("The config file defaults to ./playback.toml");
        process::exit(1);
    }

    let command = args[1].clone();
    let record_name = args[2].clone();
    let config_path = args.get(3).map_or("playback.toml", String::as_str);

    if command != "record" && command != "replay" {
        eprintln!("Unknown command: {command}");
        eprintln!("Run 'playback' for usage information.");
        process::exit(1);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_file(Path::new(config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot load {config_path}: {e}");
            process::exit(1);
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
    if let Err(e) = runtime.block_on(run(&config, &command, &record_name)) {
        error!("{e}");
        process::exit(1);
    }
}

async fn run(config: &Config, command: &str, record_name: &str) -> playback::Result<()> {
    let cassette = Cassette::new(&config.cassette)?;
    let mut player = Player::new(&config.base_address, &config.remote_address)?;
    player.load(cassette).await;
    player.start().await?;

    match command {
        "record" => player.record(record_name).await?,
        _ => player.play(record_name).await?,
    }

    info!(
        "{} '{record_name}' on {} against {} (Ctrl-C to stop)",
        if command == "record" { "Recording" } else { "Replaying" },
        config.base_address,
        config.remote_address
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(playback::PlaybackError::Io)?;
    info!("Shutting down");
    player.close().await
}
