//! Mixing backend capability.
//!
//! The engine never decodes or mixes audio itself. Everything sample-accurate
//! (decode, resample, volume/pitch/pan, fade curves, looping, the playback
//! cursor) is delegated to a [`MixingBackend`]. The backend runs its own
//! real-time callback and is responsible for making per-sound parameters safe
//! to write from the control thread while that callback reads them.
//!
//! - [`device`] is the production implementation, built on `rodio`.
//! - [`mock`] records calls and simulates playback on a virtual clock.

pub mod device;
pub mod mock;

use std::path::Path;

use crate::error::BackendError;

/// A linear volume ramp handed to the backend.
///
/// `start` may be [`FadeSchedule::FROM_CURRENT`], in which case the ramp
/// begins at whatever volume the sound has at the moment the fade is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSchedule {
    pub start: f32,
    pub end: f32,
    pub duration_ms: u64,
}

impl FadeSchedule {
    /// Sentinel start volume meaning "the current instantaneous volume".
    pub const FROM_CURRENT: f32 = -1.0;

    pub fn new(start: f32, end: f32, duration_ms: u64) -> Self {
        Self {
            start,
            end,
            duration_ms,
        }
    }

    /// Ramp `0.0 -> 1.0`.
    pub fn fade_in(duration_ms: u64) -> Self {
        Self::new(0.0, 1.0, duration_ms)
    }

    /// Ramp from the current volume down to silence.
    pub fn fade_out(duration_ms: u64) -> Self {
        Self::new(Self::FROM_CURRENT, 0.0, duration_ms)
    }

    pub fn starts_from_current(&self) -> bool {
        self.start < 0.0
    }

    /// Resolve the sentinel against the sound's current volume.
    pub fn resolved_start(&self, current: f32) -> f32 {
        if self.starts_from_current() {
            current
        } else {
            self.start
        }
    }
}

/// Capability interface the engine drives.
///
/// Construction (`init`) is backend specific and therefore not part of the
/// trait. Mutators are fire-and-forget; queries return `None` when the
/// backend cannot answer (for example an unknown stream length).
pub trait MixingBackend {
    /// Backend-owned sound object. Each slot exclusively owns one.
    type Sound;

    /// Engine output sample rate, used to convert seconds to frames.
    fn sample_rate(&self) -> u32;

    /// Open a file for incremental, background decoding.
    fn load_stream(&mut self, path: &Path) -> Result<Self::Sound, BackendError>;

    /// Decode a file fully into memory.
    fn load_buffer(&mut self, path: &Path) -> Result<Self::Sound, BackendError>;

    /// Destroy a sound object. It is never used again afterwards.
    fn unload(&mut self, sound: Self::Sound);

    /// Start (or continue) playback from the current cursor.
    fn start(&mut self, sound: &Self::Sound);

    /// Halt playback, keeping the cursor where it is.
    fn stop(&mut self, sound: &Self::Sound);

    /// Move the cursor to `frame`, expressed at [`Self::sample_rate`].
    fn seek(&mut self, sound: &Self::Sound, frame: u64);

    fn set_volume(&mut self, sound: &Self::Sound, volume: f32);

    /// Playback-rate multiplier, `1.0` is normal speed.
    fn set_pitch(&mut self, sound: &Self::Sound, pitch: f32);

    /// Stereo balance, `-1.0` left to `1.0` right.
    fn set_pan(&mut self, sound: &Self::Sound, pan: f32);

    fn set_loop(&mut self, sound: &Self::Sound, looping: bool);

    fn schedule_fade(&mut self, sound: &Self::Sound, fade: FadeSchedule);

    fn cursor_seconds(&self, sound: &Self::Sound) -> Option<f32>;

    fn length_seconds(&self, sound: &Self::Sound) -> Option<f32>;

    fn is_playing(&self, sound: &Self::Sound) -> bool;

    /// Global output gain applied after every sound.
    fn set_master_volume(&mut self, volume: f32);

    /// Release the output device. Called once, after every sound is unloaded.
    fn shutdown(&mut self);
}
