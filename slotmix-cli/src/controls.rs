use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{info, warn};
use slotmix_lib::{AudioEngine, MixingBackend, SoundId, BGM_CAPACITY, SE_CAPACITY};

const SEEK_STEP_SECONDS: f32 = 5.0;
const MASTER_STEP: f32 = 0.05;
const PAN_STEP: f32 = 0.1;
const FADE_OUT_SECONDS: f32 = 2.0;

pub struct StatusSnapshot {
    pub text: String,
}

pub struct StatusArgs {
    pub track_name: String,
    pub track_index: usize,
    pub track_count: usize,
    pub time: f64,
    pub duration: f64,
    pub playing: bool,
    pub master_volume: f32,
    pub pan: f32,
    pub pitch: f32,
    pub bgm_live: usize,
    pub se_live: usize,
}

pub fn status_text(args: StatusArgs) -> StatusSnapshot {
    let state = if args.playing { "▶ Playing" } else { "⏸ Paused" };
    let current = format_time(args.time);
    let total = format_time(args.duration);
    let percent = if args.duration > 0.0 {
        (args.time / args.duration * 100.0).min(100.0)
    } else {
        0.0
    };
    let text = format!(
        "{}   {} / {}   ({:>5.1}%)\nTrack {}/{}: {}\nMaster: {:>3.0}% | pan: {:+.1} | pitch: {:.2}x | slots: bgm {}/{} se {}/{}",
        state,
        current,
        total,
        percent,
        args.track_index + 1,
        args.track_count,
        args.track_name,
        args.master_volume * 100.0,
        args.pan,
        args.pitch,
        args.bgm_live,
        BGM_CAPACITY,
        args.se_live,
        SE_CAPACITY
    );

    StatusSnapshot { text }
}

/// Something the user asked for from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    TogglePause,
    Seek(f32),
    NextTrack,
    FadeOut,
    Effect(usize),
    MasterVolume(f32),
    Pan(f32),
}

pub fn action_for_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Left => Some(Action::Seek(-SEEK_STEP_SECONDS)),
        KeyCode::Right => Some(Action::Seek(SEEK_STEP_SECONDS)),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::NextTrack),
        KeyCode::Char('f') | KeyCode::Char('F') => Some(Action::FadeOut),
        KeyCode::Char(c @ '1'..='9') => Some(Action::Effect(c as usize - '1' as usize)),
        KeyCode::Char('=') | KeyCode::Char('+') => Some(Action::MasterVolume(MASTER_STEP)),
        KeyCode::Char('-') => Some(Action::MasterVolume(-MASTER_STEP)),
        KeyCode::Char('[') => Some(Action::Pan(-PAN_STEP)),
        KeyCode::Char(']') => Some(Action::Pan(PAN_STEP)),
        _ => None,
    }
}

/// A loaded file and its engine handle.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub id: SoundId,
    pub name: String,
}

/// Playback state of one `slotmix play` run.
pub struct Session<B: MixingBackend> {
    engine: AudioEngine<B>,
    tracks: Vec<Loaded>,
    effects: Vec<Loaded>,
    current: usize,
    master_volume: f32,
    pan: f32,
    pitch: f32,
    crossfade_seconds: f32,
}

impl<B: MixingBackend> Session<B> {
    /// Load every track and effect. Files that fail to load are skipped;
    /// at least one track must load.
    pub fn load(
        mut engine: AudioEngine<B>,
        track_paths: &[String],
        effect_paths: &[String],
    ) -> Result<Self, String> {
        let tracks = load_all(track_paths, |path| engine.try_bgm_load(path));
        if tracks.is_empty() {
            return Err("no playable background music".to_string());
        }
        let effects = load_all(effect_paths, |path| engine.try_se_load(path));

        Ok(Self {
            engine,
            tracks,
            effects,
            current: 0,
            master_volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            crossfade_seconds: 2.0,
        })
    }

    pub fn engine(&self) -> &AudioEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine<B> {
        &mut self.engine
    }

    pub fn current_track(&self) -> &Loaded {
        &self.tracks[self.current]
    }

    pub fn set_crossfade_seconds(&mut self, seconds: f32) {
        self.crossfade_seconds = seconds.max(0.0);
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.max(0.0);
        self.engine.set_master_volume(self.master_volume);
    }

    /// Apply the pitch to every track.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        for track in &self.tracks {
            self.engine.bgm_set_pitch(track.id, pitch);
        }
    }

    /// Start the first track, optionally from `seek` and with a fade-in.
    pub fn start(&mut self, seek: Option<f32>, fade_in: f32) {
        let id = self.current_track().id;
        if let Some(seconds) = seek {
            self.engine.bgm_seek(id, seconds);
        }
        if fade_in > 0.0 {
            self.engine.bgm_fade_in(id, fade_in);
        } else {
            self.engine.bgm_play(id);
        }
        info!("playing {}", self.current_track().name);
    }

    /// Play the current track once instead of looping it.
    pub fn play_once(&mut self) {
        let id = self.current_track().id;
        self.engine.bgm_set_loop(id, false);
    }

    pub fn is_playing(&self) -> bool {
        self.engine.bgm_is_playing(self.current_track().id)
    }

    /// Apply `action`; returns `false` when the session should end.
    pub fn apply(&mut self, action: Action) -> bool {
        let id = self.current_track().id;
        match action {
            Action::Quit => {
                self.engine.stop_all();
                return false;
            }
            Action::TogglePause => {
                if self.engine.bgm_is_playing(id) {
                    self.engine.bgm_pause(id);
                } else {
                    self.engine.bgm_resume(id);
                }
            }
            Action::Seek(delta) => {
                let duration = self.engine.bgm_duration(id);
                let mut target = (self.engine.bgm_position(id) + delta).max(0.0);
                if duration > 0.0 {
                    target = target.min(duration);
                }
                self.engine.bgm_seek(id, target);
            }
            Action::NextTrack => self.next_track(),
            Action::FadeOut => self.engine.bgm_fade_out(id, FADE_OUT_SECONDS),
            Action::Effect(index) => match self.effects.get(index) {
                Some(effect) => self.engine.se_play(effect.id),
                None => warn!("no sound effect bound to key {}", index + 1),
            },
            Action::MasterVolume(delta) => {
                self.set_master_volume(self.master_volume + delta);
            }
            Action::Pan(delta) => {
                self.pan = (self.pan + delta).clamp(-1.0, 1.0);
                self.engine.bgm_set_pan(id, self.pan);
            }
        }
        true
    }

    /// Crossfade from the current track into the next one, wrapping around.
    fn next_track(&mut self) {
        if self.tracks.len() < 2 {
            return;
        }
        let from = self.current_track().id;
        self.current = (self.current + 1) % self.tracks.len();
        let to = self.current_track().id;
        self.engine.bgm_set_pan(to, self.pan);
        self.engine
            .bgm_crossfade(from, to, self.crossfade_seconds);
        info!("crossfading to {}", self.current_track().name);
    }

    pub fn status(&self) -> StatusArgs {
        let track = self.current_track();
        StatusArgs {
            track_name: track.name.clone(),
            track_index: self.current,
            track_count: self.tracks.len(),
            time: self.engine.bgm_position(track.id) as f64,
            duration: self.engine.bgm_duration(track.id) as f64,
            playing: self.engine.bgm_is_playing(track.id),
            master_volume: self.master_volume,
            pan: self.pan,
            pitch: self.pitch,
            bgm_live: self.engine.bgm_live_count(),
            se_live: self.engine.se_live_count(),
        }
    }
}

fn load_all<F, E>(paths: &[String], mut load: F) -> Vec<Loaded>
where
    F: FnMut(&str) -> Result<SoundId, E>,
    E: std::fmt::Display,
{
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match load(path) {
            Ok(id) => loaded.push(Loaded {
                id,
                name: display_name(path),
            }),
            Err(err) => warn!("skipping {}: {}", path, err),
        }
    }
    loaded
}

fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Poll the keyboard once; returns `false` when the user quits.
pub fn handle_key_event<B: MixingBackend>(session: &mut Session<B>) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            if let Some(action) = action_for_key(key.code) {
                return session.apply(action);
            }
        }
    }

    true
}

/// `HH:MM:SS` for a position in seconds.
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0).floor() as u32;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
