//! Streaming background-music surface.

use std::path::Path;

use log::info;

use super::{dispatch, query, seconds_to_frame, AudioEngine};
use crate::backend::MixingBackend;
use crate::error::EngineError;
use crate::handle::SoundId;

impl<B: MixingBackend> AudioEngine<B> {
    /// Open `path` for streaming into the first free BGM slot.
    ///
    /// The new sound loops by default and starts stopped at frame 0.
    pub fn try_bgm_load(&mut self, path: impl AsRef<Path>) -> Result<SoundId, EngineError> {
        let path = path.as_ref();
        let backend = &mut self.backend;
        let id = self
            .bgm
            .allocate(path, |path| backend.load_stream(path))?;
        if let Some(sound) = self.bgm.get(id) {
            self.backend.set_loop(sound, true);
        }
        info!("bgm {} loaded from '{}'", id, path.display());
        Ok(id)
    }

    /// Like [`Self::try_bgm_load`], returning [`SoundId::NONE`] on failure.
    pub fn bgm_load(&mut self, path: impl AsRef<Path>) -> SoundId {
        self.try_bgm_load(path).unwrap_or(SoundId::NONE)
    }

    /// Start playback from the current cursor.
    pub fn bgm_play(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_play", |b, s| {
            b.start(s)
        });
    }

    /// Stop playback and rewind to frame 0.
    pub fn bgm_stop(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_stop", |b, s| {
            b.stop(s);
            b.seek(s, 0);
        });
    }

    /// Stop playback, keeping the cursor.
    pub fn bgm_pause(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_pause", |b, s| {
            b.stop(s)
        });
    }

    /// Continue playback from where [`Self::bgm_pause`] left it.
    pub fn bgm_resume(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_resume", |b, s| {
            b.start(s)
        });
    }

    pub fn bgm_set_loop(&mut self, id: SoundId, looping: bool) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_set_loop", |b, s| {
            b.set_loop(s, looping)
        });
    }

    /// Set the linear volume. Out-of-range values reach the backend as is.
    pub fn bgm_set_volume(&mut self, id: SoundId, volume: f32) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_set_volume", |b, s| {
            b.set_volume(s, volume)
        });
    }

    /// Set the playback rate (`1.0` normal, `0.5` half speed, `2.0` double).
    pub fn bgm_set_pitch(&mut self, id: SoundId, pitch: f32) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_set_pitch", |b, s| {
            b.set_pitch(s, pitch)
        });
    }

    /// Set stereo pan: `-1.0` left, `0.0` center, `1.0` right.
    pub fn bgm_set_pan(&mut self, id: SoundId, pan: f32) {
        dispatch(&mut self.backend, &self.bgm, id, "bgm_set_pan", |b, s| {
            b.set_pan(s, pan)
        });
    }

    /// Move the cursor to `seconds`, converted at the engine sample rate.
    pub fn bgm_seek(&mut self, id: SoundId, seconds: f32) {
        let frame = seconds_to_frame(seconds, self.backend.sample_rate());
        dispatch(&mut self.backend, &self.bgm, id, "bgm_seek", |b, s| {
            b.seek(s, frame)
        });
    }

    /// Cursor in seconds, `0.0` if the handle is invalid or the query fails.
    pub fn bgm_position(&self, id: SoundId) -> f32 {
        query(&self.backend, &self.bgm, id, |b, s| b.cursor_seconds(s))
            .flatten()
            .unwrap_or(0.0)
    }

    /// Total length in seconds, `0.0` if invalid or unknown.
    pub fn bgm_duration(&self, id: SoundId) -> f32 {
        query(&self.backend, &self.bgm, id, |b, s| b.length_seconds(s))
            .flatten()
            .unwrap_or(0.0)
    }

    pub fn bgm_is_playing(&self, id: SoundId) -> bool {
        query(&self.backend, &self.bgm, id, |b, s| b.is_playing(s)).unwrap_or(false)
    }

    /// Destroy the sound and free its slot for reuse.
    pub fn bgm_free(&mut self, id: SoundId) {
        if let Some(sound) = self.bgm.release(id) {
            self.backend.unload(sound);
            info!("bgm {} freed", id);
        }
    }
}
