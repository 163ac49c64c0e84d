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
use std::path::PathBuf;

use serde::Deserialize;

use crate::fetch::{FetchCommands, FetchSettings};

/// A YAML representation of the search/download helper configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Fetch {
    /// Directory for downloads and search scratch files (default: data)
    data_dir: Option<String>,
    /// Log helper output while it runs (default: false)
    show_process_output: Option<bool>,
    /// Maximum number of search results kept (default: 10)
    max_search_results: Option<usize>,
    search_command: Option<String>,
    download_command: Option<String>,
    result_locator: Option<String>,
}

impl Fetch {
    /// Fills the job settings, keeping defaults for anything unset.
    pub fn settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        let commands = FetchCommands {
            search: self
                .search_command
                .clone()
                .unwrap_or(defaults.commands.search),
            download: self
                .download_command
                .clone()
                .unwrap_or(defaults.commands.download),
            result_locator: self
                .result_locator
                .clone()
                .unwrap_or(defaults.commands.result_locator),
        };
        FetchSettings {
            data_dir: self
                .data_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            show_process_output: self
                .show_process_output
                .unwrap_or(defaults.show_process_output),
            max_search_results: self
                .max_search_results
                .unwrap_or(defaults.max_search_results),
            commands,
        }
    }
}
