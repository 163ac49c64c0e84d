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

//! A named collection of samples that other modules can borrow from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::error::SampleError;
use super::loader;
use super::resource::{AudioData, SampleData};
use crate::module::Module;

/// Owns sample data and hands out shared references to it.
pub struct SampleBank {
    name: String,
    samples: Vec<Arc<SampleData>>,
    /// Index into `samples` by source path.
    by_path: HashMap<PathBuf, usize>,
}

impl SampleBank {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            samples: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Adds already decoded audio and returns its index.
    pub fn add(&mut self, name: &str, audio: AudioData) -> usize {
        self.samples
            .push(Arc::new(SampleData::from_audio(name, audio)));
        self.samples.len() - 1
    }

    /// Decodes a file into the bank. Returns the cached index if the path has
    /// already been loaded.
    pub fn load(&mut self, path: &Path) -> Result<usize, SampleError> {
        if let Some(index) = self.by_path.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(*index);
        }

        info!(path = ?path, bank = self.name, "Loading sample into bank");
        let audio = loader::decode_file(path, |_| {})?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sample")
            .to_string();
        let index = self.add(&name, audio);
        self.by_path.insert(path.to_path_buf(), index);
        Ok(index)
    }

    /// Loads every file in `paths`, stopping at the first failure.
    pub fn load_all(&mut self, paths: &[PathBuf]) -> Result<(), SampleError> {
        for path in paths {
            self.load(path)?;
        }
        info!(
            bank = self.name,
            samples = self.samples.len(),
            memory_kb = self.total_memory_usage() / 1024,
            "Sample bank loaded"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Shared data for the sample at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<SampleData>> {
        self.samples.get(index).cloned()
    }

    /// Names of the samples, in index order.
    pub fn names(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.name()).collect()
    }

    /// Returns the total memory used by the bank's samples.
    pub fn total_memory_usage(&self) -> usize {
        self.samples
            .iter()
            .filter_map(|s| s.audio())
            .map(|a| a.memory_size())
            .sum()
    }
}

impl Module for SampleBank {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_sample_bank(&self) -> Option<&SampleBank> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_bank_capability() {
        let mut bank = SampleBank::new("drums");
        bank.add("kick", AudioData::new(vec![vec![0.5; 4]], 48000));
        let module: &dyn Module = &bank;
        let found = module.as_sample_bank().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.names(), vec!["kick"]);
        assert_eq!(found.total_memory_usage(), 16);
    }

    #[test]
    fn test_load_is_cached() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("snare.wav");
        write_wav(path.clone(), vec![vec![1_i32, 2, 3]], 44100)?;

        let mut bank = SampleBank::new("bank");
        let first = bank.load(&path)?;
        let second = bank.load(&path)?;
        assert_eq!(first, second);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get(first).unwrap().name(), "snare");
        assert!(bank.get(5).is_none());
        Ok(())
    }
}
