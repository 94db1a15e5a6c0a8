//! Container probing: duration, sample rate and channel count.
//!
//! Used for stream lengths the decoder cannot report up front and by the
//! CLI's `info` command. Never touches an audio device.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::debug;
use symphonia::core::{
    audio::{Channels, Layout},
    codecs::{CodecParameters, CODEC_TYPE_NULL},
    errors::Error,
    formats::{FormatOptions, FormatReader},
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};

use crate::error::BackendError;

/// Stream properties of the first decodable audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: Option<u32>,
    /// Exact length in frames, when known.
    pub n_frames: Option<u64>,
    pub duration: Option<Duration>,
}

impl AudioInfo {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

/// Probe `path`, falling back to a packet scan when the header carries no
/// frame count (typical for Ogg/Vorbis and some MP3 files).
pub fn probe_file(path: &Path) -> Result<AudioInfo, BackendError> {
    let mut format = open_format(path)?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BackendError::Decode("no supported audio tracks".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| BackendError::Decode("unknown sample rate".to_string()))?;
    let channels = channel_count(&params);

    let mut n_frames = params.n_frames;
    let mut duration = duration_from_params(&params);
    if duration.is_none() {
        debug!("no frame count in '{}', scanning packets", path.display());
        let end_ts = scan_end_timestamp(format.as_mut(), track_id);
        if end_ts > 0 {
            duration = Some(ts_to_duration(end_ts, params.time_base, sample_rate));
            if params.time_base.is_none() {
                n_frames = Some(end_ts);
            }
        }
    }

    Ok(AudioInfo {
        sample_rate,
        channels,
        bits_per_sample: params.bits_per_sample,
        n_frames,
        duration,
    })
}

/// Length only, `None` when the file cannot be probed.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    match probe_file(path) {
        Ok(info) => info.duration,
        Err(err) => {
            debug!("duration probe failed for '{}': {}", path.display(), err);
            None
        }
    }
}

fn open_format(path: &Path) -> Result<Box<dyn FormatReader>, BackendError> {
    let mut hints: Vec<Option<String>> = Vec::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hints.push(Some(ext.to_lowercase()));
    }
    // Always try without a hint as a fallback.
    hints.push(None);

    let mut last_error: Option<Error> = None;
    for hint in hints {
        let source = Box::new(File::open(path)?) as Box<dyn MediaSource>;
        match probe_with_hint(source, hint.as_deref()) {
            Ok(format) => return Ok(format),
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error
        .map(BackendError::from)
        .unwrap_or_else(|| BackendError::Decode("unsupported format".to_string())))
}

fn probe_with_hint(
    source: Box<dyn MediaSource>,
    extension_hint: Option<&str>,
) -> Result<Box<dyn FormatReader>, Error> {
    let mut hint = Hint::new();
    if let Some(extension_str) = extension_hint {
        hint.with_extension(extension_str);
    }

    let mss = MediaSourceStream::new(source, Default::default());
    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map(|probed| probed.format)
}

fn duration_from_params(params: &CodecParameters) -> Option<Duration> {
    let frames = params.n_frames?;
    let sample_rate = params.sample_rate?;
    Some(ts_to_duration(
        params.start_ts + frames,
        params.time_base,
        sample_rate,
    ))
}

fn ts_to_duration(ts: u64, time_base: Option<TimeBase>, sample_rate: u32) -> Duration {
    match time_base {
        Some(tb) => {
            let time = tb.calc_time(ts);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
        None => Duration::from_secs_f64(ts as f64 / sample_rate as f64),
    }
}

/// Timestamp just past the last packet of `track_id`.
fn scan_end_timestamp(format: &mut dyn FormatReader, track_id: u32) -> u64 {
    let mut end = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            end = end.max(packet.ts() + packet.dur());
        }
    }
    end
}

fn channel_count(params: &CodecParameters) -> u16 {
    let from_layout = match params.channel_layout {
        Some(Layout::Mono) => 1,
        Some(Layout::Stereo) => 2,
        Some(Layout::TwoPointOne) => 3,
        Some(Layout::FivePointOne) => 6,
        _ => 0,
    };
    if from_layout != 0 {
        return from_layout;
    }
    params
        .channels
        .unwrap_or(Channels::FRONT_CENTRE)
        .iter()
        .count() as u16
}
