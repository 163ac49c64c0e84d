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

//! Whole-file decoding into planar f32 channels.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::error::SampleError;
use super::resource::AudioData;

/// Decodes an entire audio file (WAV, MP3, FLAC, etc.) into memory at its
/// native sample rate. `progress` is called with the fraction decoded so far
/// when the container reports a frame count, and with 1.0 at the end.
pub fn decode_file<F>(path: &Path, mut progress: F) -> Result<AudioData, SampleError>
where
    F: FnMut(f32),
{
    let file = File::open(path).map_err(|e| {
        SampleError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let file_path = path.to_string_lossy().to_string();
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SampleError::NoAudioTrack(file_path.clone()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| SampleError::UnknownSampleRate(file_path.clone()))?;
    let total_frames = params.n_frames;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(&params, &decoder_opts)?;

    let mut channels: Vec<Vec<f32>> = match params.channels {
        Some(c) => vec![Vec::new(); c.count()],
        None => Vec::new(),
    };
    if let Some(frames) = total_frames {
        for channel in channels.iter_mut() {
            channel.reserve(frames as usize);
        }
    }

    while let Some(packet) = next_packet(format_reader.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        append_planar(decoded, &mut channels);

        if let (Some(total), Some(first)) = (total_frames, channels.first()) {
            if total > 0 {
                progress((first.len() as f64 / total as f64).min(1.0) as f32);
            }
        }
    }

    progress(1.0);
    let audio = AudioData::new(channels, sample_rate);
    debug!(
        path = ?path,
        frames = audio.len_frames(),
        channels = audio.num_channels(),
        "Decoded file"
    );
    Ok(audio)
}

/// Reads the next packet, treating end of stream as `None`.
fn next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, SampleError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        // Some readers report the end of a stream as a decode error.
        Err(SymphoniaError::DecodeError(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appends a decoded buffer of any sample type to the planar channels.
fn append_planar(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    match decoded {
        AudioBufferRef::F32(buf) => append_with(&buf, channels, |s| s),
        AudioBufferRef::F64(buf) => append_with(&buf, channels, |s| s as f32),
        AudioBufferRef::S8(buf) => append_with(&buf, channels, |s| s as f32 / (1i64 << 7) as f32),
        AudioBufferRef::S16(buf) => {
            append_with(&buf, channels, |s| s as f32 / (1i64 << 15) as f32)
        }
        AudioBufferRef::S24(buf) => {
            append_with(&buf, channels, |s| s.inner() as f32 / (1i64 << 23) as f32)
        }
        AudioBufferRef::S32(buf) => {
            append_with(&buf, channels, |s| s as f32 / (1i64 << 31) as f32)
        }
        AudioBufferRef::U8(buf) => {
            append_with(&buf, channels, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U16(buf) => {
            append_with(&buf, channels, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => append_with(&buf, channels, |s| {
            (s.inner() as f32 / ((1u32 << 24) - 1) as f32) * 2.0 - 1.0
        }),
        AudioBufferRef::U32(buf) => {
            append_with(&buf, channels, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0)
        }
    }
}

fn append_with<T, F>(buf: &AudioBuffer<T>, channels: &mut Vec<Vec<f32>>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let count = buf.spec().channels.count();
    if channels.len() < count {
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        channels.resize(count, vec![0.0; frames]);
    }
    for (ch, plane) in buf.planes().planes().iter().enumerate().take(count) {
        channels[ch].extend(plane[..buf.frames()].iter().map(|s| convert(*s)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_wav() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("stereo.wav");
        write_wav(
            path.clone(),
            vec![vec![1_i32, 2, 3, 4], vec![-1_i32, -2, -3, -4]],
            44100,
        )?;

        let mut last_progress = 0.0;
        let audio = decode_file(&path, |p| last_progress = p)?;
        assert_eq!(audio.num_channels(), 2);
        assert_eq!(audio.len_frames(), 4);
        assert_eq!(audio.sample_rate(), 44100);
        assert!(audio.channel(0)[0] > 0.0);
        assert!(audio.channel(1)[0] < 0.0);
        assert_eq!(last_progress, 1.0);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = decode_file(Path::new("/nonexistent/file.wav"), |_| {});
        assert!(matches!(result, Err(SampleError::IoError(_))));
    }
}
