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

//! Sample data, decoding, and shared sample banks.
//!
//! Samples are decoded entirely into memory. Decoding a file can happen on a
//! background thread, during which the sample reports itself as loading and
//! plays nothing.

pub mod bank;
mod error;
pub mod loader;
mod resource;

pub use bank::SampleBank;
pub use error::SampleError;
pub use resource::{AudioData, Ownership, Sample, SampleData};
