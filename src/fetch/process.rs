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

//! Helper process plumbing.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::FetchError;

/// How long output readers may keep running once the helper has exited.
const READER_GRACE: Duration = Duration::from_millis(200);

/// A running helper process. All methods must return promptly.
pub trait HelperProcess: Send {
    /// Takes up to `max` bytes of captured output without blocking.
    fn read_output(&mut self, max: usize) -> Vec<u8>;

    /// Whether the process is still running.
    fn is_running(&mut self) -> bool;

    /// Takes everything captured so far. Once the process has exited this is
    /// the rest of its output.
    fn read_all_output(&mut self) -> String;

    /// Terminates the process.
    fn kill(&mut self);
}

/// Starts helper processes from a command line.
pub trait ProcessLauncher: Send {
    fn launch(&self, command: &str) -> Result<Box<dyn HelperProcess>, FetchError>;
}

/// Runs commands through the platform shell.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellLauncher;

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, command: &str) -> Result<Box<dyn HelperProcess>, FetchError> {
        Ok(Box::new(ChildProcess::spawn(command)?))
    }
}

/// A child process whose stdout and stderr are collected by reader threads.
pub struct ChildProcess {
    child: Child,
    output: Arc<Mutex<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
    running: bool,
    /// When the helper was seen to exit, while its readers still drain.
    exited_at: Option<Instant>,
}

impl ChildProcess {
    pub fn spawn(command: &str) -> Result<Self, FetchError> {
        let mut shell = if cfg!(windows) {
            let mut shell = Command::new("cmd");
            shell.arg("/C");
            shell
        } else {
            let mut shell = Command::new("sh");
            shell.arg("-c");
            shell
        };
        let mut child = shell
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FetchError::Launch {
                command: command.to_string(),
                source,
            })?;

        let output = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(Self::collect(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(Self::collect(stderr, output.clone()));
        }
        debug!(command, pid = child.id(), "Helper started");

        Ok(Self {
            child,
            output,
            readers,
            running: true,
            exited_at: None,
        })
    }

    fn collect<R: Read + Send + 'static>(mut stream: R, output: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut buffer = [0u8; 1024];
            loop {
                match stream.read(&mut buffer) {
                    Ok(0) => return,
                    Ok(read) => output.lock().extend_from_slice(&buffer[..read]),
                    Err(e) => {
                        debug!(err = %e, "Helper output closed");
                        return;
                    }
                }
            }
        })
    }

    /// Joins the output readers once they have all finished, or gives up on
    /// them once the grace period has passed. A reader held open by a
    /// grandchild process is left running. Never waits.
    fn readers_done(&mut self, exited_at: Instant) -> bool {
        let drained = self.readers.iter().all(|r| r.is_finished());
        if !drained && exited_at.elapsed() < READER_GRACE {
            return false;
        }
        for reader in self.readers.drain(..) {
            if reader.is_finished() && reader.join().is_err() {
                warn!("Helper output reader panicked");
            }
        }
        true
    }
}

impl HelperProcess for ChildProcess {
    fn read_output(&mut self, max: usize) -> Vec<u8> {
        let mut output = self.output.lock();
        let take = max.min(output.len());
        output.drain(..take).collect()
    }

    fn is_running(&mut self) -> bool {
        if !self.running {
            return false;
        }
        if let Some(exited_at) = self.exited_at {
            // Reported as running until the rest of the output is in.
            self.running = !self.readers_done(exited_at);
            return self.running;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(status = %status, "Helper exited");
                let exited_at = Instant::now();
                self.exited_at = Some(exited_at);
                self.running = !self.readers_done(exited_at);
                self.running
            }
            Ok(None) => true,
            Err(e) => {
                warn!(err = %e, "Unable to query helper state");
                self.running = false;
                false
            }
        }
    }

    fn read_all_output(&mut self) -> String {
        let bytes = std::mem::take(&mut *self.output.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn kill(&mut self) {
        if !self.running {
            return;
        }
        if self.exited_at.is_none() {
            if let Err(e) = self.child.kill() {
                debug!(err = %e, "Helper already gone");
            }
            let _ = self.child.wait();
        }
        self.running = false;
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::eventually;

    #[test]
    fn test_collects_output_until_exit() {
        let mut process = ShellLauncher.launch("echo hello; echo oops 1>&2").unwrap();
        let mut running = true;
        for _ in 0..300 {
            running = process.is_running();
            if !running {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!running);
        let output = process.read_all_output();
        assert!(output.contains("hello"));
        assert!(output.contains("oops"));
        assert!(process.read_all_output().is_empty());
    }

    #[test]
    fn test_read_output_is_capped() {
        let mut process = ChildProcess::spawn("printf 'abcdefgh'").unwrap();
        let output = process.output.clone();
        eventually(|| output.lock().len() == 8, "output never arrived");
        assert_eq!(process.read_output(3), b"abc".to_vec());
        assert_eq!(process.read_output(100), b"defgh".to_vec());
    }

    #[test]
    fn test_exit_check_never_waits_on_held_output() {
        // The background sleep keeps stdout open after the shell exits.
        let mut process = ChildProcess::spawn("sleep 2 & echo started").unwrap();
        let start = Instant::now();
        let mut running = true;
        while running && start.elapsed() < Duration::from_secs(5) {
            let call = Instant::now();
            running = process.is_running();
            assert!(call.elapsed() < Duration::from_millis(50));
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!running);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(process.read_all_output().contains("started"));
    }

    #[test]
    fn test_kill() {
        let mut process = ChildProcess::spawn("sleep 30").unwrap();
        assert!(process.is_running());
        process.kill();
        assert!(!process.is_running());
    }
}
