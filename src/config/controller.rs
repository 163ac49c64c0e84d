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
use serde::Deserialize;

const DEFAULT_OSC_PORT: u16 = 12345;
const DEFAULT_GRAB_ADDRESS: &str = "/wheel/z";
const DEFAULT_POSITION_ADDRESS: &str = "/wheel/x";
const DEFAULT_FADER_ADDRESS: &str = "/Fader/x";

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Midi {
    /// The MIDI input device.
    device: String,
}

impl Midi {
    pub fn new(device: &str) -> Midi {
        Midi {
            device: device.to_string(),
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }
}

/// A YAML representation of the OSC controller configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Osc {
    /// The UDP port to listen on (default: 12345)
    port: Option<u16>,
    /// Address whose first argument grabs (> 0) or releases the wheel.
    grab_address: Option<String>,
    /// Address carrying the wheel position.
    position_address: Option<String>,
    /// Address carrying the speed fader position.
    fader_address: Option<String>,
}

impl Osc {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_OSC_PORT)
    }

    pub fn grab_address(&self) -> String {
        self.grab_address
            .clone()
            .unwrap_or(DEFAULT_GRAB_ADDRESS.to_string())
    }

    pub fn position_address(&self) -> String {
        self.position_address
            .clone()
            .unwrap_or(DEFAULT_POSITION_ADDRESS.to_string())
    }

    pub fn fader_address(&self) -> String {
        self.fader_address
            .clone()
            .unwrap_or(DEFAULT_FADER_ADDRESS.to_string())
    }
}
