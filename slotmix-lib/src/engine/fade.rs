//! Fade and crossfade scheduling for BGM.
//!
//! Ramps are handed to the backend and run on its clock. The engine issues
//! the schedule calls and returns immediately; it never waits for a ramp.

use log::debug;

use super::{dispatch, AudioEngine};
use crate::backend::{FadeSchedule, MixingBackend};
use crate::handle::SoundId;

/// Fade length in whole milliseconds. Negative or NaN lengths become 0.
pub(crate) fn fade_duration_ms(seconds: f32) -> u64 {
    (seconds as f64 * 1000.0).round() as u64
}

impl<B: MixingBackend> AudioEngine<B> {
    /// Ramp `0.0 -> 1.0` over `seconds` and start playback.
    ///
    /// The ramp is scheduled before the start so the first audible frame is
    /// already at volume 0.
    pub fn bgm_fade_in(&mut self, id: SoundId, seconds: f32) {
        let fade = FadeSchedule::fade_in(fade_duration_ms(seconds));
        dispatch(&mut self.backend, &self.bgm, id, "bgm_fade_in", |b, s| {
            b.schedule_fade(s, fade);
            b.start(s);
        });
    }

    /// Ramp from the current volume to `0.0` over `seconds`.
    ///
    /// Playback keeps running (silently) after the ramp ends; stop the sound
    /// separately if that is wanted.
    pub fn bgm_fade_out(&mut self, id: SoundId, seconds: f32) {
        let fade = FadeSchedule::fade_out(fade_duration_ms(seconds));
        dispatch(&mut self.backend, &self.bgm, id, "bgm_fade_out", |b, s| {
            b.schedule_fade(s, fade)
        });
    }

    /// Fade `from` out while `to` restarts from frame 0 and fades in.
    ///
    /// Both ramps share the same length but run independently on the backend.
    /// An invalid handle on either side only skips that half.
    pub fn bgm_crossfade(&mut self, from: SoundId, to: SoundId, seconds: f32) {
        let duration_ms = fade_duration_ms(seconds);
        debug!("crossfade {} -> {} over {} ms", from, to, duration_ms);

        dispatch(&mut self.backend, &self.bgm, from, "bgm_crossfade", |b, s| {
            b.schedule_fade(s, FadeSchedule::fade_out(duration_ms))
        });
        dispatch(&mut self.backend, &self.bgm, to, "bgm_crossfade", |b, s| {
            b.seek(s, 0);
            b.set_volume(s, 0.0);
            b.schedule_fade(s, FadeSchedule::fade_in(duration_ms));
            b.start(s);
        });
    }
}
