//! In-process backend that records every call and simulates playback.
//!
//! `MockBackend` never touches an audio device. Files are registered up front
//! with their length; loading anything else fails the way a missing file
//! would. Time only moves when [`MockBackend::advance`] is called, which makes
//! cursor, looping and fade behaviour deterministic in tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;

use super::{FadeSchedule, MixingBackend};
use crate::error::BackendError;

const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    LoadStream { path: PathBuf, key: u64 },
    LoadBuffer { path: PathBuf, key: u64 },
    Unload(u64),
    Start(u64),
    Stop(u64),
    Seek(u64, u64),
    SetVolume(u64, f32),
    SetPitch(u64, f32),
    SetPan(u64, f32),
    SetLoop(u64, bool),
    ScheduleFade(u64, FadeSchedule),
    SetMasterVolume(f32),
    Shutdown,
}

impl BackendCall {
    /// Sound key the call targets, if any.
    pub fn key(&self) -> Option<u64> {
        match self {
            Self::LoadStream { key, .. } | Self::LoadBuffer { key, .. } => Some(*key),
            Self::Unload(key)
            | Self::Start(key)
            | Self::Stop(key)
            | Self::Seek(key, _)
            | Self::SetVolume(key, _)
            | Self::SetPitch(key, _)
            | Self::SetPan(key, _)
            | Self::SetLoop(key, _)
            | Self::ScheduleFade(key, _) => Some(*key),
            Self::SetMasterVolume(_) | Self::Shutdown => None,
        }
    }
}

/// Shared view of the calls a [`MockBackend`] has received.
///
/// Stays readable after the backend itself was consumed by an engine teardown.
#[derive(Debug, Clone, Default)]
pub struct MockJournal {
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl MockJournal {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls targeting a single sound.
    pub fn calls_for(&self, key: u64) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.key() == Some(key))
            .collect()
    }

    /// Key assigned to the most recent successful load of `path`.
    pub fn key_for(&self, path: impl AsRef<Path>) -> Option<u64> {
        let path = path.as_ref();
        self.calls().into_iter().rev().find_map(|call| match call {
            BackendCall::LoadStream { path: p, key } | BackendCall::LoadBuffer { path: p, key }
                if p == path =>
            {
                Some(key)
            }
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, call: BackendCall) {
        trace!("mock backend: {:?}", call);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Sound object handed out by the mock.
#[derive(Debug, PartialEq, Eq)]
pub struct MockSound {
    key: u64,
}

impl MockSound {
    pub fn key(&self) -> u64 {
        self.key
    }
}

/// Snapshot of a simulated voice.
#[derive(Debug, Clone, PartialEq)]
pub struct MockVoiceState {
    pub path: PathBuf,
    pub streaming: bool,
    pub playing: bool,
    pub looping: bool,
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub cursor_frames: u64,
    pub length_seconds: Option<f32>,
    pub fade: Option<MockFade>,
}

/// A ramp in flight on a simulated voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockFade {
    pub from: f32,
    pub to: f32,
    pub total_ms: u64,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Copy)]
enum MockFile {
    Audio { length_seconds: Option<f32> },
    Undecodable,
}

/// Recording, simulating [`MixingBackend`].
#[derive(Debug)]
pub struct MockBackend {
    sample_rate: u32,
    files: HashMap<PathBuf, MockFile>,
    voices: HashMap<u64, MockVoiceState>,
    next_key: u64,
    master_volume: f32,
    shut_down: bool,
    journal: MockJournal,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            files: HashMap::new(),
            voices: HashMap::new(),
            next_key: 1,
            master_volume: 1.0,
            shut_down: false,
            journal: MockJournal::default(),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Register a loadable file of the given length.
    pub fn with_file(mut self, path: impl Into<PathBuf>, length_seconds: f32) -> Self {
        self.files.insert(
            path.into(),
            MockFile::Audio {
                length_seconds: Some(length_seconds),
            },
        );
        self
    }

    /// Register a loadable stream whose length cannot be determined.
    pub fn with_unknown_length(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(
            path.into(),
            MockFile::Audio {
                length_seconds: None,
            },
        );
        self
    }

    /// Register a file that exists but fails to decode.
    pub fn with_undecodable(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into(), MockFile::Undecodable);
        self
    }

    pub fn journal(&self) -> MockJournal {
        self.journal.clone()
    }

    pub fn voice(&self, key: u64) -> Option<&MockVoiceState> {
        self.voices.get(&key)
    }

    /// Number of sound objects currently alive in the backend.
    pub fn live_voices(&self) -> usize {
        self.voices.len()
    }

    /// Last value passed to `set_master_volume`.
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Move the virtual clock forward, advancing every playing voice.
    ///
    /// Fades only progress while their voice is playing, the same as a real
    /// mixer that only evaluates ramps for voices it pulls samples from.
    pub fn advance(&mut self, seconds: f32) {
        let sample_rate = self.sample_rate as f64;
        let dt = seconds.max(0.0) as f64;
        for voice in self.voices.values_mut() {
            if !voice.playing {
                continue;
            }
            advance_fade(voice, dt * 1000.0);

            let moved = (dt * sample_rate * voice.pitch.max(0.0) as f64) as u64;
            let mut cursor = voice.cursor_frames.saturating_add(moved);
            if let Some(length) = voice.length_seconds {
                let length_frames = (length as f64 * sample_rate) as u64;
                if length_frames > 0 && cursor >= length_frames {
                    if voice.looping {
                        cursor %= length_frames;
                    } else {
                        cursor = length_frames;
                        voice.playing = false;
                    }
                }
            }
            voice.cursor_frames = cursor;
        }
    }

    fn load(&mut self, path: &Path, streaming: bool) -> Result<MockSound, BackendError> {
        let length_seconds = match self.files.get(path) {
            Some(MockFile::Audio { length_seconds }) => *length_seconds,
            Some(MockFile::Undecodable) => {
                return Err(BackendError::Decode(format!(
                    "unsupported codec in '{}'",
                    path.display()
                )))
            }
            None => {
                return Err(BackendError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("'{}' not found", path.display()),
                )))
            }
        };

        let key = self.next_key;
        self.next_key += 1;
        self.voices.insert(
            key,
            MockVoiceState {
                path: path.to_path_buf(),
                streaming,
                playing: false,
                looping: false,
                volume: 1.0,
                pitch: 1.0,
                pan: 0.0,
                cursor_frames: 0,
                length_seconds,
                fade: None,
            },
        );
        let path = path.to_path_buf();
        self.journal.push(if streaming {
            BackendCall::LoadStream { path, key }
        } else {
            BackendCall::LoadBuffer { path, key }
        });
        Ok(MockSound { key })
    }

    fn voice_mut(&mut self, sound: &MockSound) -> Option<&mut MockVoiceState> {
        self.voices.get_mut(&sound.key)
    }
}

fn advance_fade(voice: &mut MockVoiceState, elapsed_ms: f64) {
    let Some(mut fade) = voice.fade else {
        return;
    };
    fade.elapsed_ms += elapsed_ms;
    if fade.elapsed_ms >= fade.total_ms as f64 {
        voice.volume = fade.to;
        voice.fade = None;
    } else {
        let t = (fade.elapsed_ms / fade.total_ms as f64) as f32;
        voice.volume = fade.from + (fade.to - fade.from) * t;
        voice.fade = Some(fade);
    }
}

impl MixingBackend for MockBackend {
    type Sound = MockSound;

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn load_stream(&mut self, path: &Path) -> Result<MockSound, BackendError> {
        self.load(path, true)
    }

    fn load_buffer(&mut self, path: &Path) -> Result<MockSound, BackendError> {
        self.load(path, false)
    }

    fn unload(&mut self, sound: MockSound) {
        self.voices.remove(&sound.key);
        self.journal.push(BackendCall::Unload(sound.key));
    }

    fn start(&mut self, sound: &MockSound) {
        let sample_rate = self.sample_rate as f64;
        if let Some(voice) = self.voice_mut(sound) {
            // A one-shot that ran to its end restarts from the top.
            if !voice.looping && !voice.playing {
                if let Some(length) = voice.length_seconds {
                    let end = (length as f64 * sample_rate) as u64;
                    if end > 0 && voice.cursor_frames >= end {
                        voice.cursor_frames = 0;
                    }
                }
            }
            voice.playing = true;
        }
        self.journal.push(BackendCall::Start(sound.key));
    }

    fn stop(&mut self, sound: &MockSound) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.playing = false;
        }
        self.journal.push(BackendCall::Stop(sound.key));
    }

    fn seek(&mut self, sound: &MockSound, frame: u64) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.cursor_frames = frame;
        }
        self.journal.push(BackendCall::Seek(sound.key, frame));
    }

    fn set_volume(&mut self, sound: &MockSound, volume: f32) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.volume = volume;
            voice.fade = None;
        }
        self.journal.push(BackendCall::SetVolume(sound.key, volume));
    }

    fn set_pitch(&mut self, sound: &MockSound, pitch: f32) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.pitch = pitch;
        }
        self.journal.push(BackendCall::SetPitch(sound.key, pitch));
    }

    fn set_pan(&mut self, sound: &MockSound, pan: f32) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.pan = pan;
        }
        self.journal.push(BackendCall::SetPan(sound.key, pan));
    }

    fn set_loop(&mut self, sound: &MockSound, looping: bool) {
        if let Some(voice) = self.voice_mut(sound) {
            voice.looping = looping;
        }
        self.journal.push(BackendCall::SetLoop(sound.key, looping));
    }

    fn schedule_fade(&mut self, sound: &MockSound, fade: FadeSchedule) {
        if let Some(voice) = self.voice_mut(sound) {
            let from = fade.resolved_start(voice.volume);
            if fade.duration_ms == 0 {
                voice.volume = fade.end;
                voice.fade = None;
            } else {
                voice.volume = from;
                voice.fade = Some(MockFade {
                    from,
                    to: fade.end,
                    total_ms: fade.duration_ms,
                    elapsed_ms: 0.0,
                });
            }
        }
        self.journal.push(BackendCall::ScheduleFade(sound.key, fade));
    }

    fn cursor_seconds(&self, sound: &MockSound) -> Option<f32> {
        self.voices
            .get(&sound.key)
            .map(|voice| (voice.cursor_frames as f64 / self.sample_rate as f64) as f32)
    }

    fn length_seconds(&self, sound: &MockSound) -> Option<f32> {
        self.voices
            .get(&sound.key)
            .and_then(|voice| voice.length_seconds)
    }

    fn is_playing(&self, sound: &MockSound) -> bool {
        self.voices
            .get(&sound.key)
            .map(|voice| voice.playing)
            .unwrap_or(false)
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
        self.journal.push(BackendCall::SetMasterVolume(volume));
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
        self.journal.push(BackendCall::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_fails_as_not_found() {
        let mut backend = MockBackend::new();
        match backend.load_stream(Path::new("nope.ogg")) {
            Err(BackendError::Io(err)) => assert_eq!(err.kind(), ErrorKind::NotFound),
            other => panic!("expected io error, got {:?}", other),
        }
        assert!(backend.journal().calls().is_empty());
    }

    #[test]
    fn advance_wraps_looping_voice() {
        let mut backend = MockBackend::new().with_file("loop.ogg", 2.0);
        let sound = backend.load_stream(Path::new("loop.ogg")).unwrap();
        backend.set_loop(&sound, true);
        backend.start(&sound);
        backend.advance(2.5);
        let position = backend.cursor_seconds(&sound).unwrap();
        assert!((position - 0.5).abs() < 1e-3, "position was {}", position);
        assert!(backend.is_playing(&sound));
    }

    #[test]
    fn advance_ends_one_shot_voice() {
        let mut backend = MockBackend::new().with_file("hit.wav", 0.25);
        let sound = backend.load_buffer(Path::new("hit.wav")).unwrap();
        backend.start(&sound);
        backend.advance(1.0);
        assert!(!backend.is_playing(&sound));
        assert_eq!(backend.cursor_seconds(&sound), Some(0.25));
    }

    #[test]
    fn advance_after_huge_seek_clamps_to_the_end() {
        let mut backend = MockBackend::new().with_file("bgm.ogg", 2.0);
        let sound = backend.load_stream(Path::new("bgm.ogg")).unwrap();
        backend.start(&sound);
        backend.seek(&sound, u64::MAX);
        backend.advance(1.0);
        assert!(!backend.is_playing(&sound));
        assert_eq!(backend.cursor_seconds(&sound), Some(2.0));
    }

    #[test]
    fn fade_ramps_linearly_while_playing() {
        let mut backend = MockBackend::new().with_file("bgm.ogg", 60.0);
        let sound = backend.load_stream(Path::new("bgm.ogg")).unwrap();
        backend.schedule_fade(&sound, FadeSchedule::fade_in(2000));
        backend.start(&sound);
        assert_eq!(backend.voice(sound.key()).unwrap().volume, 0.0);
        backend.advance(1.0);
        assert!((backend.voice(sound.key()).unwrap().volume - 0.5).abs() < 1e-4);
        backend.advance(1.0);
        assert_eq!(backend.voice(sound.key()).unwrap().volume, 1.0);
        assert!(backend.voice(sound.key()).unwrap().fade.is_none());
    }

    #[test]
    fn set_volume_cancels_fade() {
        let mut backend = MockBackend::new().with_file("bgm.ogg", 60.0);
        let sound = backend.load_stream(Path::new("bgm.ogg")).unwrap();
        backend.set_volume(&sound, 0.8);
        backend.schedule_fade(&sound, FadeSchedule::fade_out(1000));
        assert_eq!(backend.voice(sound.key()).unwrap().volume, 0.8);
        backend.set_volume(&sound, 0.3);
        backend.start(&sound);
        backend.advance(2.0);
        assert_eq!(backend.voice(sound.key()).unwrap().volume, 0.3);
    }
}
