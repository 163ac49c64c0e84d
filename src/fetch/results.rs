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

//! Search result descriptors and their discovery.

use std::fs;
use std::path::{Path, PathBuf};

use super::FetchError;

/// Suffix of the descriptor files the helper writes for each search hit.
pub const RESULT_SUFFIX: &str = ".info.json";

/// Separator between title, duration and id in a descriptor file name.
const FIELD_DELIMITER: &str = "#";

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub name: String,
    pub length_seconds: f32,
    pub id: String,
}

impl SearchResult {
    /// A display label such as `(3:07) title`.
    pub fn label(&self) -> String {
        let total = self.length_seconds.max(0.0) as u64;
        format!("({}:{:02}) {}", total / 60, total % 60, self.name)
    }
}

/// Parses a descriptor file name of the form `title#duration#id.info.json`.
/// The title may itself contain the delimiter. Returns `None` if fewer than
/// three fields are present. An unparsable duration reads as zero.
pub fn parse_result_filename(file_name: &str) -> Option<SearchResult> {
    let stem = file_name.strip_suffix(RESULT_SUFFIX).unwrap_or(file_name);
    let tokens: Vec<&str> = stem.split(FIELD_DELIMITER).collect();
    if tokens.len() < 3 {
        return None;
    }
    let n = tokens.len();
    Some(SearchResult {
        name: tokens[..n - 2].join(FIELD_DELIMITER),
        length_seconds: tokens[n - 2].trim().parse().unwrap_or(0.0),
        id: tokens[n - 1].to_string(),
    })
}

/// An ordered result list, deduplicated by id with the first occurrence kept.
#[derive(Clone, Debug, Default)]
pub struct SearchResults {
    results: Vec<SearchResult>,
    capacity: Option<usize>,
}

impl SearchResults {
    /// A list that keeps at most `capacity` results.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Adds a result unless its id is already present or the list is full.
    /// Returns true if it was added.
    pub fn insert(&mut self, result: SearchResult) -> bool {
        if self.capacity.is_some_and(|cap| self.results.len() >= cap) {
            return false;
        }
        if self.results.iter().any(|existing| existing.id == result.id) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn get(&self, index: usize) -> Option<&SearchResult> {
        self.results.get(index)
    }

    pub fn as_slice(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

/// Where search descriptors appear.
pub trait ResultDirectory: Send {
    /// Empties the directory before a new search.
    fn reset(&mut self) -> Result<(), FetchError>;

    /// Names of the descriptor files currently present.
    fn list(&self) -> Result<Vec<String>, FetchError>;

    /// The path to hand to the helper.
    fn path(&self) -> &Path;
}

/// A scratch directory on disk.
#[derive(Clone, Debug)]
pub struct FsResultDirectory {
    path: PathBuf,
}

impl FsResultDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn error(&self, source: std::io::Error) -> FetchError {
        FetchError::ScratchDir {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultDirectory for FsResultDirectory {
    fn reset(&mut self) -> Result<(), FetchError> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path).map_err(|e| self.error(e))?;
        }
        fs::create_dir_all(&self.path).map_err(|e| self.error(e))
    }

    fn list(&self) -> Result<Vec<String>, FetchError> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(|e| self.error(e))? {
            let entry = entry.map_err(|e| self.error(e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(RESULT_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
