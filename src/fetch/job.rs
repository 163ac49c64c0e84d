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

//! The one-at-a-time background job state machine.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::process::{HelperProcess, ProcessLauncher, ShellLauncher};
use super::results::{
    parse_result_filename, FsResultDirectory, ResultDirectory, SearchResult, SearchResults,
};
use super::FetchError;

/// Name of the scratch directory for search descriptors, under the data dir.
const SEARCH_DIR: &str = "search_temp";

/// The file the download helper writes before conversion.
const DOWNLOAD_NAME: &str = "download.m4a";

/// The converted file that gets loaded.
const CONVERTED_NAME: &str = "download.wav";

/// Bytes of helper output logged per poll.
const OUTPUT_CHUNK: usize = 512;

/// Helper command line templates. Placeholders in braces are substituted
/// before launch.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchCommands {
    /// Uses `{term}`, `{count}` and `{dir}`.
    pub search: String,
    /// Uses `{locator}` and `{output}`.
    pub download: String,
    /// Turns a search result `{id}` into a download locator.
    pub result_locator: String,
}

impl Default for FetchCommands {
    fn default() -> Self {
        Self {
            search: "yt-dlp \"ytsearch{count}:{term}\" --no-playlist --write-info-json --skip-download -o \"{dir}/%(title)s#%(duration)s#%(id)s.%(ext)s\"".to_string(),
            download: "yt-dlp \"{locator}\" --extract-audio --audio-format wav --audio-quality 0 --no-progress -o \"{output}\"".to_string(),
            result_locator: "https://www.youtube.com/watch?v={id}".to_string(),
        }
    }
}

/// Substitutes `{name}` placeholders.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

#[derive(Clone, Debug)]
pub struct FetchSettings {
    pub data_dir: PathBuf,
    pub show_process_output: bool,
    pub max_search_results: usize,
    pub commands: FetchCommands,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            show_process_output: false,
            max_search_results: 10,
            commands: FetchCommands::default(),
        }
    }
}

/// What the job is doing.
#[derive(Clone, Debug, PartialEq)]
pub enum JobKind {
    Idle,
    Searching { term: String },
    Downloading { output: PathBuf, title: String },
}

/// The one-shot result of a finished job.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Search {
        term: String,
        results: Vec<SearchResult>,
    },
    /// `file` is the downloaded file, or None if the helper produced nothing.
    Download {
        title: String,
        file: Option<PathBuf>,
    },
}

/// Runs at most one search or download helper.
pub struct FetchJob {
    settings: FetchSettings,
    launcher: Box<dyn ProcessLauncher>,
    results_dir: Box<dyn ResultDirectory>,
    process: Option<Box<dyn HelperProcess>>,
    kind: JobKind,
    results: SearchResults,
}

impl FetchJob {
    pub fn new(
        settings: FetchSettings,
        launcher: Box<dyn ProcessLauncher>,
        results_dir: Box<dyn ResultDirectory>,
    ) -> Self {
        let results = SearchResults::with_capacity(settings.max_search_results);
        Self {
            settings,
            launcher,
            results_dir,
            process: None,
            kind: JobKind::Idle,
            results,
        }
    }

    /// A job that runs helpers through the shell and scans a scratch
    /// directory under the data directory.
    pub fn with_shell(settings: FetchSettings) -> Self {
        let dir = FsResultDirectory::new(settings.data_dir.join(SEARCH_DIR));
        Self::new(settings, Box::new(ShellLauncher), Box::new(dir))
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Whether a helper is in flight.
    pub fn is_busy(&self) -> bool {
        self.process.is_some()
    }

    pub fn results(&self) -> &[SearchResult] {
        self.results.as_slice()
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Kills the helper in flight, if any, without producing an outcome.
    pub fn cancel(&mut self) {
        if let Some(mut process) = self.process.take() {
            info!(job = ?self.kind, "Killing previous helper");
            process.kill();
        }
        self.kind = JobKind::Idle;
    }

    fn launch(&mut self, command: String, kind: JobKind) -> Result<(), FetchError> {
        info!(command, "Running helper");
        let process = self.launcher.launch(&command)?;
        self.process = Some(process);
        self.kind = kind;
        Ok(())
    }

    /// Starts a search, replacing any job in flight.
    pub fn start_search(&mut self, term: &str) -> Result<(), FetchError> {
        self.cancel();
        self.results.clear();
        self.results_dir.reset()?;

        let count = self.settings.max_search_results.to_string();
        let dir = self.results_dir.path().to_string_lossy().into_owned();
        let command = render(
            &self.settings.commands.search,
            &[("term", term), ("count", &count), ("dir", &dir)],
        );
        self.launch(
            command,
            JobKind::Searching {
                term: term.to_string(),
            },
        )
    }

    /// Starts a download, replacing any job in flight. Stale output from an
    /// earlier download is removed first.
    pub fn start_download(&mut self, locator: &str, title: &str) -> Result<(), FetchError> {
        self.cancel();
        self.results.clear();

        let download = self.settings.data_dir.join(DOWNLOAD_NAME);
        let converted = self.settings.data_dir.join(CONVERTED_NAME);
        for stale in [&download, &converted] {
            remove_stale(stale)?;
        }
        fs::create_dir_all(&self.settings.data_dir).map_err(|source| FetchError::ScratchDir {
            path: self.settings.data_dir.clone(),
            source,
        })?;

        let output = download.to_string_lossy().into_owned();
        let command = render(
            &self.settings.commands.download,
            &[("locator", locator), ("output", &output)],
        );
        self.launch(
            command,
            JobKind::Downloading {
                output: converted,
                title: title.to_string(),
            },
        )
    }

    /// Downloads the search result at `index`. The result list is cleared.
    pub fn download_result(&mut self, index: usize) -> Result<(), FetchError> {
        let result = self
            .results
            .get(index)
            .cloned()
            .ok_or(FetchError::NoSuchResult(index))?;
        let locator = render(
            &self.settings.commands.result_locator,
            &[("id", &result.id)],
        );
        self.start_download(&locator, &result.name)
    }

    /// Advances the job. Returns the outcome exactly once, on the poll that
    /// observes the helper has exited.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        let process = self.process.as_mut()?;

        if self.settings.show_process_output {
            let output = process.read_output(OUTPUT_CHUNK);
            if !output.is_empty() {
                info!(output = %String::from_utf8_lossy(&output), "Helper output");
            }
        }

        if matches!(self.kind, JobKind::Searching { .. }) {
            match self.results_dir.list() {
                Ok(names) => {
                    for name in names {
                        if let Some(result) = parse_result_filename(&name) {
                            if self.results.insert(result.clone()) {
                                debug!(name = result.name, id = result.id, "Search result");
                            }
                        }
                    }
                }
                Err(e) => warn!(err = %e, "Unable to list search results"),
            }
        }

        if process.is_running() {
            return None;
        }

        let output = process.read_all_output();
        info!(output = %output, "Helper finished");
        self.process = None;
        match std::mem::replace(&mut self.kind, JobKind::Idle) {
            JobKind::Idle => None,
            JobKind::Searching { term } => Some(FetchOutcome::Search {
                term,
                results: self.results.as_slice().to_vec(),
            }),
            JobKind::Downloading { output, title } => Some(FetchOutcome::Download {
                title,
                file: output.is_file().then_some(output),
            }),
        }
    }
}

fn remove_stale(path: &Path) -> Result<(), FetchError> {
    if path.is_file() {
        fs::remove_file(path).map_err(|source| FetchError::ScratchDir {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub launched: Vec<String>,
        pub killed: usize,
        pub running: bool,
        pub output: Vec<u8>,
    }

    /// Launches processes whose lifetime the test controls.
    #[derive(Clone, Default)]
    pub(crate) struct FakeLauncher {
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeLauncher {
        pub fn finish(&self) {
            self.state.lock().running = false;
        }
    }

    struct FakeProcess {
        state: Arc<Mutex<FakeState>>,
        killed: bool,
    }

    impl HelperProcess for FakeProcess {
        fn read_output(&mut self, max: usize) -> Vec<u8> {
            let mut state = self.state.lock();
            let take = max.min(state.output.len());
            state.output.drain(..take).collect()
        }

        fn is_running(&mut self) -> bool {
            !self.killed && self.state.lock().running
        }

        fn read_all_output(&mut self) -> String {
            String::from_utf8_lossy(&std::mem::take(&mut self.state.lock().output)).into_owned()
        }

        fn kill(&mut self) {
            self.killed = true;
            self.state.lock().killed += 1;
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(&self, command: &str) -> Result<Box<dyn HelperProcess>, FetchError> {
            let mut state = self.state.lock();
            state.launched.push(command.to_string());
            state.running = true;
            Ok(Box::new(FakeProcess {
                state: self.state.clone(),
                killed: false,
            }))
        }
    }

    /// A result directory backed by a shared list of names.
    #[derive(Clone)]
    pub(crate) struct MemoryResultDirectory {
        pub names: Arc<Mutex<Vec<String>>>,
        path: PathBuf,
    }

    impl MemoryResultDirectory {
        pub fn new() -> Self {
            Self {
                names: Arc::new(Mutex::new(Vec::new())),
                path: PathBuf::from("/scratch"),
            }
        }

        pub fn add(&self, name: &str) {
            self.names.lock().push(name.to_string());
        }
    }

    impl ResultDirectory for MemoryResultDirectory {
        fn reset(&mut self) -> Result<(), FetchError> {
            self.names.lock().clear();
            Ok(())
        }

        fn list(&self) -> Result<Vec<String>, FetchError> {
            Ok(self.names.lock().clone())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    pub(crate) fn fake_job(
        data_dir: &Path,
    ) -> (FetchJob, FakeLauncher, MemoryResultDirectory) {
        let launcher = FakeLauncher::default();
        let dir = MemoryResultDirectory::new();
        let settings = FetchSettings {
            data_dir: data_dir.to_path_buf(),
            max_search_results: 3,
            ..Default::default()
        };
        let job = FetchJob::new(settings, Box::new(launcher.clone()), Box::new(dir.clone()));
        (job, launcher, dir)
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render("get {id} to {id}/{x}", &[("id", "a1"), ("x", "y")]),
            "get a1 to a1/y"
        );
    }

    #[test]
    fn test_search_completes_once() {
        let tempdir = tempfile::tempdir().unwrap();
        let (mut job, launcher, dir) = fake_job(tempdir.path());
        job.start_search("duck quack").unwrap();
        let command = launcher.state.lock().launched[0].clone();
        assert!(command.contains("ytsearch3:duck quack"));
        assert!(command.contains("/scratch/"));

        dir.add("Duck#12#id1.info.json");
        assert_eq!(job.poll(), None);
        dir.add("Duck again#30#id1.info.json");
        dir.add("Quack#5#id2.info.json");
        dir.add("garbage.info.json");
        assert_eq!(job.poll(), None);
        assert_eq!(job.results().len(), 2);
        assert_eq!(job.results()[0].name, "Duck");

        launcher.finish();
        let outcome = job.poll().unwrap();
        match outcome {
            FetchOutcome::Search { term, results } => {
                assert_eq!(term, "duck quack");
                assert_eq!(results.len(), 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(job.poll(), None);
        assert_eq!(job.kind(), &JobKind::Idle);
        assert!(!job.is_busy());
    }

    #[test]
    fn test_zero_results() {
        let tempdir = tempfile::tempdir().unwrap();
        let (mut job, launcher, _dir) = fake_job(tempdir.path());
        job.start_search("nothing").unwrap();
        launcher.finish();
        assert_eq!(
            job.poll(),
            Some(FetchOutcome::Search {
                term: "nothing".to_string(),
                results: Vec::new(),
            })
        );
    }

    #[test]
    fn test_new_job_kills_previous() {
        let tempdir = tempfile::tempdir().unwrap();
        let (mut job, launcher, dir) = fake_job(tempdir.path());
        job.start_search("first").unwrap();
        dir.add("A#1#a.info.json");
        job.poll();
        assert_eq!(job.results().len(), 1);

        job.start_download("http://example.com/x", "x").unwrap();
        assert_eq!(launcher.state.lock().killed, 1);
        assert_eq!(launcher.state.lock().launched.len(), 2);
        assert!(job.results().is_empty());
        assert!(matches!(job.kind(), JobKind::Downloading { .. }));

        launcher.finish();
        // Only the download reports; the killed search never does.
        assert!(matches!(
            job.poll(),
            Some(FetchOutcome::Download { file: None, .. })
        ));
        assert_eq!(job.poll(), None);
    }

    #[test]
    fn test_download_finds_file_and_clears_stale() {
        let tempdir = tempfile::tempdir().unwrap();
        let converted = tempdir.path().join(CONVERTED_NAME);
        fs::write(&converted, b"stale").unwrap();

        let (mut job, launcher, _dir) = fake_job(tempdir.path());
        job.start_download("http://example.com/x", "My Title").unwrap();
        assert!(!converted.exists());
        let command = launcher.state.lock().launched[0].clone();
        assert!(command.contains(DOWNLOAD_NAME));

        fs::write(&converted, b"new").unwrap();
        launcher.finish();
        assert_eq!(
            job.poll(),
            Some(FetchOutcome::Download {
                title: "My Title".to_string(),
                file: Some(converted),
            })
        );
    }

    #[test]
    fn test_download_result_by_index() {
        let tempdir = tempfile::tempdir().unwrap();
        let (mut job, launcher, dir) = fake_job(tempdir.path());
        job.start_search("term").unwrap();
        dir.add("Song#10#vid9.info.json");
        launcher.finish();
        job.poll();

        assert!(matches!(
            job.download_result(4),
            Err(FetchError::NoSuchResult(4))
        ));
        job.download_result(0).unwrap();
        assert!(job.results().is_empty());
        let command = launcher.state.lock().launched[1].clone();
        assert!(command.contains("watch?v=vid9"));
        assert_eq!(
            job.kind(),
            &JobKind::Downloading {
                output: tempdir.path().join(CONVERTED_NAME),
                title: "Song".to_string(),
            }
        );
    }

    #[test]
    fn test_output_is_drained_when_shown() {
        let tempdir = tempfile::tempdir().unwrap();
        let (mut job, launcher, _dir) = fake_job(tempdir.path());
        job.settings.show_process_output = true;
        job.start_search("x").unwrap();
        launcher.state.lock().output = vec![b'a'; 1000];
        job.poll();
        assert_eq!(launcher.state.lock().output.len(), 1000 - OUTPUT_CHUNK);
    }
}
