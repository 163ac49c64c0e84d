// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cueplayer::audio;
use cueplayer::config;
use cueplayer::controller::{self, Controller, Driver};
use cueplayer::engine::PlaybackEngine;
use cueplayer::fetch::{FetchJob, FetchOutcome};
use cueplayer::player::SamplePlayer;
use cueplayer::state::PlayerState;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A cue-point sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Starts the player with audio output, MIDI note input and the OSC wheel.
    Start {
        /// The path to the player config.
        config_path: String,
        /// An audio file to load on startup.
        sample: Option<String>,
        /// A state file to restore on startup and save on exit.
        #[arg(short, long)]
        state: Option<String>,
    },
    /// Runs a search with the configured helper and prints the results.
    Search {
        /// The path to the player config.
        config_path: String,
        /// What to search for.
        term: String,
    },
    /// Prints a saved state file.
    Inspect {
        /// The path to the state file.
        state_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = controller::midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start {
            config_path,
            sample,
            state,
        } => {
            start(
                Path::new(&config_path),
                sample.map(PathBuf::from),
                state.map(PathBuf::from),
            )
            .await?
        }
        Commands::Search { config_path, term } => {
            let player_config = config::Player::deserialize(Path::new(&config_path))?;
            let poll_interval = player_config.poll_interval()?;
            let mut job = FetchJob::with_shell(player_config.fetch_settings());
            job.start_search(&term)?;

            let results = loop {
                if let Some(FetchOutcome::Search { results, .. }) = job.poll() {
                    break results;
                }
                tokio::time::sleep(poll_interval).await;
            };

            if results.is_empty() {
                println!("No results found for {}.", term);
                return Ok(());
            }

            println!("Results (count: {}):", results.len());
            for (index, result) in results.iter().enumerate() {
                println!("{}. {} [{}]", index, result.label(), result.id);
            }
        }
        Commands::Inspect { state_path } => {
            let state = PlayerState::read_file(Path::new(&state_path))?;
            print!("{}", serde_yml::to_string(&state.summary())?);
        }
    }

    Ok(())
}

/// Runs the player until interrupted.
async fn start(
    config_path: &Path,
    sample: Option<PathBuf>,
    state_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let player_config = config::Player::deserialize(config_path)?;
    let options = player_config.engine_options()?;
    let (engine, handle) = PlaybackEngine::with_handle(options.clone());

    let device = audio::get_device(player_config.audio())?;
    let stream = device.start(engine, player_config.audio())?;

    let mut player = SamplePlayer::new(
        "cueplayer",
        handle,
        options.sample_rate,
        options.cue_points,
        FetchJob::with_shell(player_config.fetch_settings()),
    );
    if let Some(state_path) = state_path.as_ref().filter(|path| path.is_file()) {
        player.load_state(PlayerState::read_file(state_path)?);
        info!(path = ?state_path, "Restored state");
    }
    if let Some(sample) = sample {
        let name = sample
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        player.load_file_async(&sample, &name);
    }

    let mut drivers: Vec<Arc<dyn Driver>> = Vec::new();
    if let Some(osc) = player_config.osc() {
        drivers.push(controller::osc::Driver::new(osc)?);
    }
    if let Some(midi) = player_config.midi() {
        drivers.push(Arc::new(controller::midi::Driver::new(midi)));
    }

    let mut controller = Controller::new(player, drivers, player_config.poll_interval()?);
    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");
    controller.shutdown();
    let player = controller.join().await?;

    if let Some(state_path) = state_path {
        match player.save_state().write_file(&state_path) {
            Ok(()) => info!(path = ?state_path, "Saved state"),
            Err(e) => warn!(path = ?state_path, err = %e, "Unable to save state"),
        }
    }
    stream.stop();
    Ok(())
}
