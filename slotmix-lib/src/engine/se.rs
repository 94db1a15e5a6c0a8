//! In-memory sound-effect surface.
//!
//! Each SE handle owns exactly one backend voice. Playing it again restarts
//! that voice from the top instead of layering a second copy; overlapping the
//! same effect needs one handle per simultaneous instance.

use std::path::Path;

use log::info;

use super::{dispatch, query, AudioEngine};
use crate::backend::MixingBackend;
use crate::error::EngineError;
use crate::handle::SoundId;

impl<B: MixingBackend> AudioEngine<B> {
    /// Decode `path` fully into memory in the first free SE slot.
    pub fn try_se_load(&mut self, path: impl AsRef<Path>) -> Result<SoundId, EngineError> {
        let path = path.as_ref();
        let backend = &mut self.backend;
        let id = self.se.allocate(path, |path| backend.load_buffer(path))?;
        info!("se {} loaded from '{}'", id, path.display());
        Ok(id)
    }

    /// Like [`Self::try_se_load`], returning [`SoundId::NONE`] on failure.
    pub fn se_load(&mut self, path: impl AsRef<Path>) -> SoundId {
        self.try_se_load(path).unwrap_or(SoundId::NONE)
    }

    /// Rewind to frame 0 and start, retriggering a voice that is still sounding.
    pub fn se_play(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.se, id, "se_play", |b, s| {
            b.seek(s, 0);
            b.start(s);
        });
    }

    /// [`Self::se_play`] with the volume set first.
    pub fn se_play_with_volume(&mut self, id: SoundId, volume: f32) {
        dispatch(
            &mut self.backend,
            &self.se,
            id,
            "se_play_with_volume",
            |b, s| {
                b.set_volume(s, volume);
                b.seek(s, 0);
                b.start(s);
            },
        );
    }

    /// Stop the voice and rewind it.
    pub fn se_stop(&mut self, id: SoundId) {
        dispatch(&mut self.backend, &self.se, id, "se_stop", |b, s| {
            b.stop(s);
            b.seek(s, 0);
        });
    }

    pub fn se_set_volume(&mut self, id: SoundId, volume: f32) {
        dispatch(&mut self.backend, &self.se, id, "se_set_volume", |b, s| {
            b.set_volume(s, volume)
        });
    }

    pub fn se_set_pitch(&mut self, id: SoundId, pitch: f32) {
        dispatch(&mut self.backend, &self.se, id, "se_set_pitch", |b, s| {
            b.set_pitch(s, pitch)
        });
    }

    pub fn se_set_pan(&mut self, id: SoundId, pan: f32) {
        dispatch(&mut self.backend, &self.se, id, "se_set_pan", |b, s| {
            b.set_pan(s, pan)
        });
    }

    pub fn se_set_loop(&mut self, id: SoundId, looping: bool) {
        dispatch(&mut self.backend, &self.se, id, "se_set_loop", |b, s| {
            b.set_loop(s, looping)
        });
    }

    pub fn se_is_playing(&self, id: SoundId) -> bool {
        query(&self.backend, &self.se, id, |b, s| b.is_playing(s)).unwrap_or(false)
    }

    /// Cursor in seconds, `0.0` if the handle is invalid or the query fails.
    pub fn se_position(&self, id: SoundId) -> f32 {
        query(&self.backend, &self.se, id, |b, s| b.cursor_seconds(s))
            .flatten()
            .unwrap_or(0.0)
    }

    /// Length of the buffered sample in seconds, `0.0` if invalid.
    pub fn se_duration(&self, id: SoundId) -> f32 {
        query(&self.backend, &self.se, id, |b, s| b.length_seconds(s))
            .flatten()
            .unwrap_or(0.0)
    }

    pub fn se_free(&mut self, id: SoundId) {
        if let Some(sound) = self.se.release(id) {
            self.backend.unload(sound);
            info!("se {} freed", id);
        }
    }
}
