//! Handle-based audio engine.
//!
//! `AudioEngine` owns a [`MixingBackend`] and two fixed slot tables, one per
//! [`SoundCategory`]. Every control call validates its handle against the
//! table of its own category and is silently ignored when the handle is not
//! live; queries fall back to `0.0` / `false`. Only loading reports failure,
//! through a `0` handle or the `try_*` variants.
//!
//! The category-specific surfaces are split across submodules:
//! - [`bgm`] streaming playback (play/pause/seek/position).
//! - [`se`] in-memory one-shots with retrigger semantics.
//! - [`fade`] fade-in/out and crossfade scheduling.

mod bgm;
mod fade;
mod se;

use log::{debug, info};

use crate::backend::MixingBackend;
use crate::error::EngineError;
use crate::handle::{SoundCategory, SoundId};
use crate::slots::{SlotTable, BGM_CAPACITY, SE_CAPACITY};

/// Value reported by [`AudioEngine::master_volume`].
///
/// The backend capability has no master-volume getter, so the engine does not
/// pretend to know the current value.
pub const MASTER_VOLUME_READBACK: f32 = 1.0;

/// Audio engine over a mixing backend.
pub struct AudioEngine<B: MixingBackend> {
    backend: B,
    bgm: SlotTable<B::Sound, BGM_CAPACITY>,
    se: SlotTable<B::Sound, SE_CAPACITY>,
}

impl<B: MixingBackend> AudioEngine<B> {
    /// Create an empty engine that takes ownership of `backend`.
    pub fn new(backend: B) -> Self {
        info!(
            "audio engine ready ({} Hz, {} bgm / {} se slots)",
            backend.sample_rate(),
            BGM_CAPACITY,
            SE_CAPACITY
        );
        Self {
            backend,
            bgm: SlotTable::new(SoundCategory::Bgm),
            se: SlotTable::new(SoundCategory::Se),
        }
    }

    /// Tear the engine down: free every slot, then shut the backend down.
    ///
    /// Dropping the engine does the same; this only makes the intent explicit
    /// at call sites.
    pub fn destroy(self) {
        drop(self);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Engine sample rate used for seconds-to-frame conversion.
    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    /// Scale the whole output. Forwarded unclamped.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.backend.set_master_volume(volume);
    }

    /// Always [`MASTER_VOLUME_READBACK`]; master volume is write-only.
    pub fn master_volume(&self) -> f32 {
        MASTER_VOLUME_READBACK
    }

    /// Stop and rewind every live sound of both categories.
    pub fn stop_all(&mut self) {
        for sound in self.bgm.iter_live().chain(self.se.iter_live()) {
            self.backend.stop(sound);
            self.backend.seek(sound, 0);
        }
    }

    pub fn bgm_live_count(&self) -> usize {
        self.bgm.live_count()
    }

    pub fn se_live_count(&self) -> usize {
        self.se.live_count()
    }

    pub fn bgm_capacity(&self) -> usize {
        self.bgm.capacity()
    }

    pub fn se_capacity(&self) -> usize {
        self.se.capacity()
    }

    /// Check a BGM handle without acting on it.
    pub fn validate_bgm(&self, id: SoundId) -> Result<(), EngineError> {
        self.bgm.validate(id).map(|_| ())
    }

    /// Check an SE handle without acting on it.
    pub fn validate_se(&self, id: SoundId) -> Result<(), EngineError> {
        self.se.validate(id).map(|_| ())
    }

    fn teardown(&mut self) {
        let live = self.bgm.live_count() + self.se.live_count();
        for sound in self.bgm.drain() {
            self.backend.unload(sound);
        }
        for sound in self.se.drain() {
            self.backend.unload(sound);
        }
        self.backend.shutdown();
        info!("audio engine destroyed ({} live sounds released)", live);
    }
}

impl<B: MixingBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run `op` against the sound behind `id`, or log and skip it.
fn dispatch<B, const N: usize, R>(
    backend: &mut B,
    table: &SlotTable<B::Sound, N>,
    id: SoundId,
    op: &'static str,
    f: impl FnOnce(&mut B, &B::Sound) -> R,
) -> Option<R>
where
    B: MixingBackend,
{
    match table.get(id) {
        Some(sound) => Some(f(backend, sound)),
        None => {
            debug!("{}: ignoring invalid {} handle {}", op, table.category(), id);
            None
        }
    }
}

/// Read-only counterpart of [`dispatch`] for queries.
fn query<B, const N: usize, R>(
    backend: &B,
    table: &SlotTable<B::Sound, N>,
    id: SoundId,
    f: impl FnOnce(&B, &B::Sound) -> R,
) -> Option<R>
where
    B: MixingBackend,
{
    table.get(id).map(|sound| f(backend, sound))
}

/// `frame = seconds × sample_rate`; negative or NaN input lands on frame 0.
fn seconds_to_frame(seconds: f32, sample_rate: u32) -> u64 {
    (seconds as f64 * sample_rate as f64) as u64
}
