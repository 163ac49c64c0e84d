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
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Sender};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::fetch::FetchOutcome;
use crate::module::{Module, NoteEvent};
use crate::player::SamplePlayer;

pub mod midi;
pub mod osc;

/// Size of the channel between drivers and the control loop.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Controller events that will trigger behavior in the player.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The wheel was touched (true) or let go (false).
    WheelGrab(bool),

    /// The wheel moved to a new absolute position.
    WheelPosition(f32),

    /// The speed fader moved, 0..1.
    Fader(f32),

    /// A note arrived. Velocity 0 is a note-off.
    Note { pitch: i32, velocity: i32 },
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies one controller event to the player.
pub fn apply_event(player: &mut SamplePlayer, event: Event) {
    match event {
        Event::WheelGrab(grabbed) => player.wheel_grabbed(grabbed),
        Event::WheelPosition(position) => player.wheel_moved(position),
        Event::Fader(position) => player.fader_moved(position),
        Event::Note { pitch, velocity } => {
            // Live notes start on the first frame of the next block.
            let time_ms = player.engine().status().next_block_ms();
            if let Some(receiver) = player.as_note_receiver() {
                receiver.play_note(NoteEvent::new(time_ms, pitch, velocity));
            }
        }
    }
}

/// Runs the control loop: drains controller events and polls the player at
/// a fixed interval until shut down.
pub struct Controller {
    handle: JoinHandle<SamplePlayer>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Controller {
    /// Creates a new controller with the given drivers.
    pub fn new(
        player: SamplePlayer,
        drivers: Vec<Arc<dyn Driver>>,
        poll_interval: Duration,
    ) -> Controller {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        Controller {
            handle: tokio::spawn(
                Controller::run(player, drivers, poll_interval, shutdown_rx)
                    .instrument(span!(Level::INFO, "controller")),
            ),
            shutdown: Some(shutdown_tx),
        }
    }

    /// Asks the control loop to stop. Events already received are applied
    /// first.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// Join will block until the controller finishes and hands back the player.
    pub async fn join(&mut self) -> Result<SamplePlayer, JoinError> {
        (&mut self.handle).await
    }

    async fn run(
        mut player: SamplePlayer,
        drivers: Vec<Arc<dyn Driver>>,
        poll_interval: Duration,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> SamplePlayer {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let join_handles: Vec<JoinHandle<Result<(), io::Error>>> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            drivers = join_handles.len(),
            poll_interval = ?poll_interval,
            "Controller started."
        );

        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                event = events_rx.recv(), if events_open => match event {
                    Some(event) => apply_event(&mut player, event),
                    None => {
                        info!("All event monitors stopped.");
                        events_open = false;
                    }
                },
                _ = &mut shutdown_rx => {
                    info!("Controller closing.");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(outcome) = player.poll() {
                        report_outcome(&player, &outcome);
                    }
                }
            }
        }

        // Input threads notice the closed channel; network listeners are
        // stopped outright.
        drop(events_rx);
        for join_handle in join_handles {
            if join_handle.is_finished() {
                match join_handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
                    Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
                }
            } else {
                join_handle.abort();
            }
        }
        player
    }
}

/// Logs a finished fetch job the way a user would want to see it.
pub fn report_outcome(player: &SamplePlayer, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Search { term, results } => {
            info!(term, count = results.len(), "Search finished");
            for (index, result) in results.iter().enumerate() {
                info!(index, result = result.label(), "Search result");
            }
        }
        FetchOutcome::Download { title, file } => {
            info!(title, file = ?file, "Download finished");
        }
    }
    if let Some(e) = player.error() {
        warn!(err = e, "Player error");
    }
}
