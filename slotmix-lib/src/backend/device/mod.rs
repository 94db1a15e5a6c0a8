//! Production backend on top of `rodio`.
//!
//! One output stream is opened at init. Every loaded sound gets its own
//! `Sink` on the stream's mixer, fed by a [`voice::VoiceSource`] that wraps
//! either a streaming `Decoder` (BGM) or a fully decoded `SamplesBuffer`
//! (SE). Pause and playback rate go through the sink; everything else goes
//! through the voice's shared controls.

mod voice;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use self::voice::{AtomicF32, VoiceControls, VoiceSource};
use super::{FadeSchedule, MixingBackend};
use crate::error::BackendError;
use crate::probe;
use crate::settings::BackendSettings;

/// A sound living on the output mixer.
pub struct RodioSound {
    sink: Sink,
    controls: Arc<VoiceControls>,
    source_rate: u32,
    length: Option<Duration>,
    path: PathBuf,
}

impl RodioSound {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Native sample rate of the decoded file.
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }
}

/// Mixing backend driving the default output device.
pub struct RodioBackend {
    settings: BackendSettings,
    stream: Option<OutputStream>,
    sample_rate: u32,
    master: Arc<AtomicF32>,
}

impl RodioBackend {
    /// Open the default output device, retrying per `settings`.
    pub fn init(settings: BackendSettings) -> Result<Self, BackendError> {
        let mut stream = open_output_stream_with_retry(&settings)?;
        stream.log_on_drop(false);
        let sample_rate = stream.config().sample_rate();
        info!("output stream open at {} Hz", sample_rate);

        Ok(Self {
            settings,
            stream: Some(stream),
            sample_rate,
            master: Arc::new(AtomicF32::new(1.0)),
        })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn mixer(&self) -> Result<&Mixer, BackendError> {
        self.stream
            .as_ref()
            .map(OutputStream::mixer)
            .ok_or_else(|| BackendError::OutputStream("output stream is shut down".to_string()))
    }

    /// Put `source` on its own paused sink.
    fn attach<S>(
        &self,
        source: S,
        path: &Path,
        length: Option<Duration>,
    ) -> Result<RodioSound, BackendError>
    where
        S: Source + Send + 'static,
    {
        let mixer = self.mixer()?;
        let controls = Arc::new(VoiceControls::new(Arc::clone(&self.master)));
        let source_rate = source.sample_rate();
        let voice = VoiceSource::new(
            source,
            Arc::clone(&controls),
            self.settings.refresh_frames(),
        );

        let sink = Sink::connect_new(mixer);
        sink.pause();
        sink.append(voice);

        Ok(RodioSound {
            sink,
            controls,
            source_rate,
            length,
            path: path.to_path_buf(),
        })
    }

}

impl MixingBackend for RodioBackend {
    type Sound = RodioSound;

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn load_stream(&mut self, path: &Path) -> Result<RodioSound, BackendError> {
        let decoder = open_decoder(path)?;
        let length = decoder
            .total_duration()
            .or_else(|| probe::probe_duration(path));
        debug!(
            "streaming '{}' ({} Hz, {} ch, {:?})",
            path.display(),
            decoder.sample_rate(),
            decoder.channels(),
            length
        );
        self.attach(decoder, path, length)
    }

    fn load_buffer(&mut self, path: &Path) -> Result<RodioSound, BackendError> {
        let decoder = open_decoder(path)?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.collect();
        if samples.is_empty() {
            return Err(BackendError::Decode(format!(
                "'{}' decoded to no samples",
                path.display()
            )));
        }

        let frames = samples.len() / channels.max(1) as usize;
        let length = Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64);
        debug!(
            "buffered '{}' ({} frames, {} Hz, {} ch)",
            path.display(),
            frames,
            sample_rate,
            channels
        );
        let buffer = SamplesBuffer::new(channels, sample_rate, samples);
        self.attach(buffer, path, Some(length))
    }

    fn unload(&mut self, sound: RodioSound) {
        sound.sink.stop();
    }

    fn start(&mut self, sound: &RodioSound) {
        if sound.controls.take_finished() {
            sound.controls.request_seek(0);
        }
        sound.controls.set_playing(true);
        sound.sink.play();
    }

    fn stop(&mut self, sound: &RodioSound) {
        sound.sink.pause();
        sound.controls.set_playing(false);
    }

    fn seek(&mut self, sound: &RodioSound, frame: u64) {
        let source_frame = rescale_frame(frame, self.sample_rate, sound.source_rate);
        sound.controls.request_seek(source_frame);
    }

    fn set_volume(&mut self, sound: &RodioSound, volume: f32) {
        sound.controls.set_volume(volume);
    }

    fn set_pitch(&mut self, sound: &RodioSound, pitch: f32) {
        if pitch.is_finite() && pitch > 0.0 {
            sound.sink.set_speed(pitch);
        } else {
            debug!("ignoring non-positive pitch {}", pitch);
        }
    }

    fn set_pan(&mut self, sound: &RodioSound, pan: f32) {
        sound.controls.set_pan(pan);
    }

    fn set_loop(&mut self, sound: &RodioSound, looping: bool) {
        sound.controls.set_looping(looping);
    }

    fn schedule_fade(&mut self, sound: &RodioSound, fade: FadeSchedule) {
        sound.controls.schedule_fade(fade);
    }

    fn cursor_seconds(&self, sound: &RodioSound) -> Option<f32> {
        if sound.source_rate == 0 {
            return None;
        }
        Some((sound.controls.cursor_frames() as f64 / sound.source_rate as f64) as f32)
    }

    fn length_seconds(&self, sound: &RodioSound) -> Option<f32> {
        sound.length.map(|length| length.as_secs_f32())
    }

    fn is_playing(&self, sound: &RodioSound) -> bool {
        sound.controls.is_playing()
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master.store(volume);
    }

    fn shutdown(&mut self) {
        if self.stream.take().is_some() {
            info!("output stream closed");
        }
    }
}

/// Engine-rate frame to a frame index at `source_rate`, saturating at
/// `u64::MAX`.
fn rescale_frame(frame: u64, engine_rate: u32, source_rate: u32) -> u64 {
    if engine_rate == source_rate {
        return frame;
    }
    let scaled = frame as u128 * source_rate as u128 / engine_rate.max(1) as u128;
    scaled.min(u64::MAX as u128) as u64
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, BackendError> {
    let file = File::open(path)?;
    Decoder::try_from(file).map_err(|err| BackendError::Decode(err.to_string()))
}

/// Open the default output stream with bounded retry behavior.
fn open_output_stream_with_retry(settings: &BackendSettings) -> Result<OutputStream, BackendError> {
    let attempts = settings.open_retries.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt < attempts {
                    warn!(
                        "open_default_stream attempt {}/{} failed: {}",
                        attempt, attempts, err
                    );
                    thread::sleep(Duration::from_millis(settings.open_retry_ms));
                }
            }
        }
    }

    error!(
        "failed to open default output stream after {} attempts: {}",
        attempts, last_error
    );
    Err(BackendError::OutputStream(format!(
        "no output device after {} attempts: {}",
        attempts, last_error
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_converts_between_rates() {
        assert_eq!(rescale_frame(44_100, 44_100, 44_100), 44_100);
        assert_eq!(rescale_frame(44_100, 44_100, 48_000), 48_000);
        assert_eq!(rescale_frame(96_000, 48_000, 22_050), 44_100);
    }

    #[test]
    fn rescale_saturates_instead_of_wrapping() {
        assert_eq!(rescale_frame(u64::MAX, 44_100, 96_000), u64::MAX);
        assert_eq!(rescale_frame(u64::MAX / 2, 22_050, 48_000), u64::MAX);
        assert_eq!(rescale_frame(7, 0, 48_000), 7 * 48_000);
    }
}
