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
use std::{error::Error, io, thread, time::Duration};

use midir::{MidiInput, MidiInputPort};
use midly::{live::LiveEvent, MidiMessage};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Level};

use super::Event;
use crate::config;

/// How often the input thread checks whether the controller has gone away.
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A controller that feeds notes from a MIDI input into the player.
pub struct Driver {
    /// The configured device name, matched as a substring of port names.
    device: String,
}

impl Driver {
    pub fn new(config: &config::Midi) -> Self {
        Driver {
            device: config.device().to_string(),
        }
    }
}

/// Lists the names of MIDI input ports.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("cueplayer input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Finds the single input port whose name contains `name`.
fn find_port(input: &MidiInput, name: &str) -> Result<MidiInputPort, Box<dyn Error>> {
    let mut matches = Vec::new();
    for port in input.ports() {
        let port_name = input.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|(name, _)| name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }
    matches
        .pop()
        .map(|(_, port)| port)
        .ok_or_else(|| format!("no device found with name {}", name).into())
}

/// Maps a raw MIDI message to a note event. Note-on with velocity 0 is a
/// note-off.
pub(super) fn note_event(raw_event: &[u8]) -> Option<Event> {
    match LiveEvent::parse(raw_event).ok()? {
        LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } => Some(Event::Note {
            pitch: key.as_int() as i32,
            velocity: vel.as_int() as i32,
        }),
        LiveEvent::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        } => Some(Event::Note {
            pitch: key.as_int() as i32,
            velocity: 0,
        }),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let device = self.device.clone();

        // The midir connection is kept on a blocking thread for as long as the
        // controller is listening.
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI Driver");
            let _enter = span.enter();

            let input = MidiInput::new("cueplayer input")
                .map_err(|e| io::Error::other(e.to_string()))?;
            let port = find_port(&input, &device).map_err(|e| io::Error::other(e.to_string()))?;
            let callback_tx = events_tx.clone();
            let _connection = input
                .connect(
                    &port,
                    "cueplayer note input",
                    move |_, raw_event, _| {
                        let Some(event) = note_event(raw_event) else {
                            return;
                        };
                        debug!(event = ?event, "Received MIDI event.");
                        if let Err(e) = callback_tx.blocking_send(event) {
                            error!(err = e.to_string(), "Error sending MIDI event to controller.");
                        }
                    },
                    (),
                )
                .map_err(|e| io::Error::other(e.to_string()))?;
            info!(device, "Watching MIDI events.");

            while !events_tx.is_closed() {
                thread::sleep(CLOSE_POLL_INTERVAL);
            }
            info!("Controller closed, stopping MIDI driver.");
            Ok(())
        })
    }
}
