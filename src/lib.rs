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
//! A cue-point sample player: notes trigger regions of a sample with click-free
//! transitions, and samples can be searched for and downloaded in the
//! background.

pub mod audio;
pub mod config;
pub mod controller;
pub mod cue;
pub mod declick;
pub mod engine;
pub mod envelope;
pub mod fetch;
pub mod module;
pub mod player;
pub mod sample;
pub mod scheduler;
pub mod state;
#[cfg(test)]
mod testutil;
