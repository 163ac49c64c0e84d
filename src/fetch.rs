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

//! Search and download jobs run through an external helper process.
//!
//! A job is driven from the control loop by calling [`FetchJob::poll`]. Only
//! one job runs at a time: starting a new one kills the old helper and
//! discards its results. Search results are discovered by listing a scratch
//! directory the helper writes descriptor files into.

mod job;
mod process;
mod results;

use std::path::PathBuf;

pub use job::{FetchCommands, FetchJob, FetchOutcome, FetchSettings, JobKind};
#[cfg(test)]
pub(crate) use job::tests::{fake_job, FakeLauncher};
pub use process::{ChildProcess, HelperProcess, ProcessLauncher, ShellLauncher};
pub use results::{
    parse_result_filename, FsResultDirectory, ResultDirectory, SearchResult, SearchResults,
    RESULT_SUFFIX,
};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to launch helper `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scratch directory {path}: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no search result at index {0}")]
    NoSuchResult(usize),
}
