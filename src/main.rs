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
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use padgenie::audio::{self, synth::Instrument};
use padgenie::config;
use padgenie::console;
use padgenie::generator::ContourOracle;
use padgenie::input;
use padgenie::scale::ScaleResolver;
use padgenie::session::{Session, SessionCommand};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A gamepad-driven generative melody player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start a playing session.
    Start {
        /// The path to the session config.
        config_path: String,
        /// Overrides the configured instrument.
        #[arg[short, long]]
        instrument: Option<String>,
        /// Don't read commands from stdin.
        #[arg[long]]
        no_console: bool,
    },
    /// Verifies a session config and prints what it resolves to.
    Verify {
        /// The path to the session config.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the connected gamepads.
    Gamepads {},
    /// Lists the available instruments.
    Instruments {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config_path,
            instrument,
            no_console,
        } => {
            let session_config = config::Session::deserialize(&PathBuf::from(&config_path))?;
            let input = input::get_source(session_config.input())?;
            let device = audio::get_device(session_config.audio())?;
            let oracle = Box::new(ContourOracle::new(session_config.generator()));
            let session = Session::new(&session_config, input, device, oracle)?;
            if let Some(instrument) = instrument {
                session.select_instrument(&instrument)?;
            }

            let (commands_tx, commands_rx) = mpsc::channel(8);
            let ctrl_c_tx = commands_tx.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupted, shutting down.");
                        let _ = ctrl_c_tx.send(SessionCommand::Shutdown).await;
                    }
                    Err(e) => warn!(err = %e, "Unable to listen for ctrl-c."),
                }
            });
            let _console = (!no_console).then(|| console::monitor_stdin(commands_tx));

            session.run(commands_rx).await;
        }
        Commands::Verify { config_path } => {
            let session_config = config::Session::deserialize(&PathBuf::from(&config_path))?;
            let resolver = ScaleResolver::from_config(session_config.scales())?;
            let input = session_config.input();
            let generator = session_config.generator();
            let audio = session_config.audio();

            println!("Config {} is valid.", config_path);
            println!(
                "\nInput: {} at {}Hz, sustain on {}",
                input.device(),
                input.tick_rate_hz(),
                input.sustain()
            );
            println!("Buttons:");
            for binding in input.buttons() {
                println!(
                    "- {} (bucket {}, scale {})",
                    binding.button,
                    binding.bucket,
                    resolver.resolve(binding.button)
                );
            }
            println!(
                "\nAudio: {} playing {}, release {:?} per unit of sustain plus {:?}",
                audio.device(),
                audio.instrument(),
                audio.fade_time_unit()?,
                audio.safety_margin()?
            );
            println!(
                "Generator: {} keys from MIDI note {}, temperature {}",
                generator.key_count(),
                generator.lowest_midi_note(),
                generator.temperature()
            );
        }
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
        Commands::Gamepads {} => {
            let gamepads = input::list_gamepads()?;

            if gamepads.is_empty() {
                println!("No gamepads found.");
                return Ok(());
            }

            println!("Gamepads:");
            for gamepad in gamepads {
                println!("- {}", gamepad);
            }
        }
        Commands::Instruments {} => {
            println!("Instruments:");
            for instrument in Instrument::ALL {
                println!("- {}", instrument.name());
            }
        }
    }

    Ok(())
}
