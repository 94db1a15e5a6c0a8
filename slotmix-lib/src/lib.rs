//! # Slotmix Library
//!
//! A small real-time mixing engine for games and players: streaming
//! background music (BGM) and in-memory sound effects (SE) addressed through
//! plain numeric handles, with volume, pitch, pan, looping, seeking, fades and
//! crossfades.
//!
//! ```no_run
//! let mut engine = slotmix_lib::create().expect("no audio device");
//! let theme = engine.bgm_load("theme.ogg");
//! engine.bgm_fade_in(theme, 2.0);
//! ```
//!
//! The engine is generic over a [`MixingBackend`]. [`RodioBackend`] plays to
//! the default output device; [`MockBackend`] records calls and simulates
//! playback for tests.

pub mod backend;
pub mod engine;
pub mod error;
pub mod handle;
pub mod probe;
pub mod settings;
pub mod slots;

pub use backend::device::{RodioBackend, RodioSound};
pub use backend::mock::{BackendCall, MockBackend, MockJournal};
pub use backend::{FadeSchedule, MixingBackend};
pub use engine::{AudioEngine, MASTER_VOLUME_READBACK};
pub use error::{BackendError, EngineError};
pub use handle::{SoundCategory, SoundId};
pub use settings::BackendSettings;
pub use slots::{BGM_CAPACITY, SE_CAPACITY};

/// Engine playing through the default output device.
pub type RodioEngine = AudioEngine<RodioBackend>;

/// Create an engine on the default output device with default settings.
pub fn create() -> Result<RodioEngine, EngineError> {
    create_with_settings(BackendSettings::default())
}

/// Create an engine on the default output device.
pub fn create_with_settings(settings: BackendSettings) -> Result<RodioEngine, EngineError> {
    let backend = RodioBackend::init(settings)?;
    Ok(AudioEngine::new(backend))
}
