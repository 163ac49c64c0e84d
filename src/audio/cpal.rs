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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::renderer::BlockRenderer;
use crate::audio::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use crate::config;
use crate::engine::PlaybackEngine;

/// How often the output thread checks whether it should stop.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A small wrapper around a cpal::Device. Used for storing some extra
/// data that makes opening the output stream more convenient.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// Sample formats the device accepts for output.
    formats: Vec<cpal::SampleFormat>,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// A running output stream. Dropping it stops the stream.
pub struct OutputStream {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream {
    /// Stops the stream and waits for the output thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// f32 callback: render straight into the device buffer.
fn create_f32_callback(
    mut renderer: BlockRenderer,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        renderer.fill(data, channels);
    }
}

/// Integer callback: render into scratch space and convert.
fn create_converting_callback<T>(
    mut renderer: BlockRenderer,
    channels: usize,
    block_size: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    // Sized for a few blocks so that typical device buffers never allocate.
    let mut scratch = vec![0.0f32; block_size * channels * 4];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let scratch = &mut scratch[..data.len()];
        renderer.fill(scratch, channels);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Lists cpal devices that can play audio.
    pub fn list() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };

                let mut max_channels = 0;
                let mut formats = Vec::new();
                for output_config in output_configs {
                    max_channels = max_channels.max(output_config.channels());
                    if !formats.contains(&output_config.sample_format()) {
                        formats.push(output_config.sample_format());
                    }
                }

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        formats,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        match Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(device) => {
                if device.max_channels < config.channels() {
                    return Err(format!(
                        "{} channels requested, audio device {} only has {}",
                        config.channels(),
                        device.name,
                        device.max_channels
                    )
                    .into());
                }
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `engine` in this device's output callback until the returned
    /// stream is dropped.
    pub fn start(
        &self,
        engine: PlaybackEngine,
        config: &config::Audio,
    ) -> Result<OutputStream, Box<dyn Error>> {
        let channels = config.channels();
        let sample_rate = config.sample_rate();
        let block_size = config.buffer_size();
        let format = [
            cpal::SampleFormat::F32,
            cpal::SampleFormat::I32,
            cpal::SampleFormat::I16,
        ]
        .into_iter()
        .find(|format| self.formats.contains(format))
        .ok_or_else(|| format!("device {} has no supported sample format", self.name))?;

        let renderer = BlockRenderer::new(engine, block_size, channels as usize, sample_rate);
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(block_size as u32),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let device = self.device.clone();
        let name = self.name.clone();
        let thread_stop = stop.clone();

        // cpal streams are not Send on every platform, so the stream lives
        // on its own thread for its whole life.
        let thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output (cpal)");
            let _enter = span.enter();

            let err_fn = |err| error!("CPAL output stream error: {}", err);
            let channel_count = channels as usize;
            let stream_result = match format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &stream_config,
                    create_f32_callback(renderer, channel_count),
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i32>(renderer, channel_count, block_size),
                    err_fn,
                    None,
                ),
                _ => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i16>(renderer, channel_count, block_size),
                    err_fn,
                    None,
                ),
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create CPAL stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start CPAL stream: {}", e)));
                return;
            }
            info!(
                device = name,
                channels,
                sample_rate,
                block_size,
                format = ?format,
                "CPAL output stream started"
            );
            let _ = ready_tx.send(Ok(()));

            while !thread_stop.load(Ordering::Relaxed) {
                thread::sleep(STOP_POLL_INTERVAL);
            }
            info!(device = name, "CPAL output stream stopped");
        });

        let mut output = OutputStream {
            stop,
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(output),
            Ok(Err(e)) => {
                output.shutdown();
                Err(e.into())
            }
            Err(_) => {
                output.shutdown();
                Err("audio output thread exited before starting".into())
            }
        }
    }
}
