//! Per-sound source adapter and the control block it shares with the engine.
//!
//! [`VoiceSource`] wraps a decoded `rodio` source and runs on the output
//! stream's thread. It renders stereo frames and applies volume, pan, master
//! gain, fades, loop rewinds and seek requests. The control thread writes
//! those parameters into [`VoiceControls`]; the audio thread re-reads them
//! every `refresh_frames` frames and publishes its cursor back.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use rodio::source::{SeekError, Source};

use crate::backend::FadeSchedule;

const NO_SEEK: u64 = u64::MAX;
const OUTPUT_CHANNELS: u16 = 2;

/// `f32` stored as raw bits in an `AtomicU32`.
#[derive(Debug)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Linear volume ramp measured against wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VolumeRamp {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
}

impl VolumeRamp {
    pub(crate) fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            started: Instant::now(),
            duration,
        }
    }

    /// Volume after `elapsed`, and whether the ramp has completed.
    pub(crate) fn value_after(&self, elapsed: Duration) -> (f32, bool) {
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        (self.from + (self.to - self.from) * t, false)
    }

    pub(crate) fn value_now(&self) -> (f32, bool) {
        self.value_after(self.started.elapsed())
    }
}

/// Balance pan law: the far side is attenuated linearly, the near side stays
/// at unity. Center leaves both channels untouched.
pub(crate) fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Parameters shared between the control thread and one [`VoiceSource`].
#[derive(Debug)]
pub(crate) struct VoiceControls {
    playing: AtomicBool,
    finished: AtomicBool,
    looping: AtomicBool,
    volume: AtomicF32,
    pan: AtomicF32,
    cursor_frames: AtomicU64,
    pending_seek: AtomicU64,
    ramp: Mutex<Option<VolumeRamp>>,
    master: Arc<AtomicF32>,
}

impl VoiceControls {
    pub(crate) fn new(master: Arc<AtomicF32>) -> Self {
        Self {
            playing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            volume: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
            cursor_frames: AtomicU64::new(0),
            pending_seek: AtomicU64::new(NO_SEEK),
            ramp: Mutex::new(None),
            master,
        }
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Whether the source ran off its end since the last call.
    pub(crate) fn take_finished(&self) -> bool {
        self.finished.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub(crate) fn set_pan(&self, pan: f32) {
        self.pan.store(pan);
    }

    /// Set the volume, cancelling any ramp in flight.
    pub(crate) fn set_volume(&self, volume: f32) {
        let mut ramp = self.ramp.lock().unwrap_or_else(PoisonError::into_inner);
        *ramp = None;
        self.volume.store(volume);
    }

    /// Instantaneous volume, following a ramp in flight.
    pub(crate) fn current_volume(&self) -> f32 {
        let ramp = self.ramp.lock().unwrap_or_else(PoisonError::into_inner);
        match *ramp {
            Some(ramp) => ramp.value_now().0,
            None => self.volume.load(),
        }
    }

    pub(crate) fn schedule_fade(&self, fade: FadeSchedule) {
        let from = fade.resolved_start(self.current_volume());
        if fade.duration_ms == 0 {
            self.set_volume(fade.end);
            return;
        }
        let mut ramp = self.ramp.lock().unwrap_or_else(PoisonError::into_inner);
        *ramp = Some(VolumeRamp::new(
            from,
            fade.end,
            Duration::from_millis(fade.duration_ms),
        ));
        self.volume.store(from);
    }

    /// Ask the audio thread to move to `frame` (in source frames).
    ///
    /// The readback cursor jumps immediately; the source follows before it
    /// renders its next frame.
    pub(crate) fn request_seek(&self, frame: u64) {
        let frame = frame.min(NO_SEEK - 1);
        self.pending_seek.store(frame, Ordering::Release);
        self.cursor_frames.store(frame, Ordering::Relaxed);
        self.finished.store(false, Ordering::Release);
    }

    pub(crate) fn cursor_frames(&self) -> u64 {
        self.cursor_frames.load(Ordering::Relaxed)
    }
}

/// Stereo voice rendering an inner source under shared controls.
///
/// The voice never ends on its own. When a one-shot runs out it marks the
/// controls finished, stops playing and renders silence until a seek revives
/// it, so its sink can be restarted without re-appending.
///
/// A stopped voice renders silence without pulling its inner source. The sink
/// applies a pause only on its next periodic callback, and the cursor must not
/// drift in between.
///
/// The output rate is fixed at construction. Sources whose rate changes
/// between spans keep playing at the first span's rate; channel count is
/// re-read on every frame.
pub(crate) struct VoiceSource<S> {
    inner: S,
    controls: Arc<VoiceControls>,
    sample_rate: u32,
    refresh_frames: usize,
    frames_until_refresh: usize,
    cursor: u64,
    ended: bool,
    looping: bool,
    last_volume: f32,
    gains: [f32; 2],
    frame: [f32; 2],
    channel: usize,
}

impl<S: Source> VoiceSource<S> {
    pub(crate) fn new(inner: S, controls: Arc<VoiceControls>, refresh_frames: usize) -> Self {
        let sample_rate = inner.sample_rate().max(1);
        Self {
            inner,
            controls,
            sample_rate,
            refresh_frames: refresh_frames.max(1),
            frames_until_refresh: 0,
            cursor: 0,
            ended: false,
            looping: false,
            last_volume: 1.0,
            gains: [1.0; 2],
            frame: [0.0; 2],
            channel: 0,
        }
    }

    fn apply_pending_seek(&mut self) {
        if self.controls.pending_seek.load(Ordering::Acquire) == NO_SEEK {
            return;
        }
        let seek = self.controls.pending_seek.swap(NO_SEEK, Ordering::AcqRel);
        if seek != NO_SEEK {
            self.seek_frame(seek);
            self.controls
                .cursor_frames
                .store(self.cursor, Ordering::Relaxed);
        }
    }

    fn refresh(&mut self) {
        self.controls
            .cursor_frames
            .store(self.cursor, Ordering::Relaxed);

        let volume = match self.controls.ramp.try_lock() {
            Ok(mut guard) => {
                let active = *guard;
                match active {
                    Some(ramp) => {
                        let (value, done) = ramp.value_now();
                        if done {
                            self.controls.volume.store(value);
                            *guard = None;
                        }
                        value
                    }
                    None => self.controls.volume.load(),
                }
            }
            // Control thread is mid-update; keep the previous value.
            Err(_) => self.last_volume,
        };
        self.last_volume = volume;

        let gain = volume * self.controls.master.load();
        let (left, right) = pan_gains(self.controls.pan.load());
        self.gains = [gain * left, gain * right];
        self.looping = self.controls.is_looping();
        self.frames_until_refresh = self.refresh_frames;
    }

    fn seek_frame(&mut self, frame: u64) {
        let pos = Duration::from_secs_f64(frame as f64 / self.sample_rate as f64);
        match self.inner.try_seek(pos) {
            Ok(()) => {
                self.cursor = frame;
                self.ended = false;
            }
            Err(err) => debug!("voice seek to frame {} failed: {}", frame, err),
        }
    }

    fn read_frame(&mut self) -> [f32; 2] {
        if self.ended {
            return [0.0; 2];
        }
        if let Some(frame) = self.pull_frame() {
            self.cursor += 1;
            return frame;
        }
        if self.looping {
            self.seek_frame(0);
            if let Some(frame) = self.pull_frame() {
                self.cursor += 1;
                return frame;
            }
        }
        self.finish();
        [0.0; 2]
    }

    /// Next input frame folded to stereo. Mono is duplicated, channels past
    /// the second are dropped.
    fn pull_frame(&mut self) -> Option<[f32; 2]> {
        let channels = self.inner.channels().max(1);
        let first = self.inner.next()?;
        if channels == 1 {
            return Some([first, first]);
        }
        let second = self.inner.next().unwrap_or(first);
        for _ in 2..channels {
            self.inner.next();
        }
        Some([first, second])
    }

    fn finish(&mut self) {
        self.ended = true;
        self.controls
            .cursor_frames
            .store(self.cursor, Ordering::Relaxed);
        self.controls.playing.store(false, Ordering::Relaxed);
        self.controls.finished.store(true, Ordering::Release);
    }
}

impl<S: Source> Iterator for VoiceSource<S> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.channel == 0 {
            self.apply_pending_seek();
            if self.frames_until_refresh == 0 {
                self.refresh();
            }
            self.frames_until_refresh -= 1;
            self.frame = if self.controls.is_playing() {
                self.read_frame()
            } else {
                [0.0; 2]
            };
        }
        let sample = self.frame[self.channel] * self.gains[self.channel];
        self.channel ^= 1;
        Some(sample)
    }
}

impl<S: Source> Source for VoiceSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.inner.try_seek(pos)?;
        self.cursor = (pos.as_secs_f64() * self.sample_rate as f64) as u64;
        self.ended = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::buffer::SamplesBuffer;

    fn controls() -> Arc<VoiceControls> {
        let controls = Arc::new(VoiceControls::new(Arc::new(AtomicF32::new(1.0))));
        controls.set_playing(true);
        controls
    }

    fn mono(samples: Vec<f32>) -> SamplesBuffer {
        SamplesBuffer::new(1, 1_000, samples)
    }

    fn left_channel(voice: &mut impl Iterator<Item = f32>, frames: usize) -> Vec<f32> {
        voice
            .take(frames * 2)
            .step_by(2)
            .collect()
    }

    #[test]
    fn pan_law_keeps_center_at_unity() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
        assert_eq!(pan_gains(7.0), (0.0, 1.0));
        assert_eq!(pan_gains(f32::NAN), (1.0, 1.0));
    }

    #[test]
    fn hard_left_silences_right_channel() {
        let controls = controls();
        controls.set_pan(-1.0);
        let voice = VoiceSource::new(mono(vec![0.5; 8]), Arc::clone(&controls), 4);
        let samples: Vec<f32> = voice.take(8).collect();
        assert_eq!(samples, vec![0.5, 0.0, 0.5, 0.0, 0.5, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn volume_and_master_scale_output() {
        let master = Arc::new(AtomicF32::new(0.5));
        let controls = Arc::new(VoiceControls::new(Arc::clone(&master)));
        controls.set_playing(true);
        controls.set_volume(0.5);
        let mut voice = VoiceSource::new(mono(vec![1.0; 4]), controls, 1);
        assert_eq!(voice.next(), Some(0.25));
        master.store(1.0);
        voice.next();
        assert_eq!(voice.next(), Some(0.5));
    }

    #[test]
    fn stereo_input_keeps_channel_order() {
        let buffer = SamplesBuffer::new(2, 1_000, vec![0.1, 0.2, 0.3, 0.4]);
        let voice = VoiceSource::new(buffer, controls(), 2);
        let samples: Vec<f32> = voice.take(4).collect();
        assert_eq!(samples, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn one_shot_tracks_cursor_and_finishes() {
        let controls = controls();
        controls.set_playing(true);
        let mut voice = VoiceSource::new(mono(vec![0.25; 10]), Arc::clone(&controls), 1);

        let _ = left_channel(&mut voice, 5);
        let _ = left_channel(&mut voice, 1);
        assert_eq!(controls.cursor_frames(), 5);
        assert!(controls.is_playing());

        let tail = left_channel(&mut voice, 6);
        assert_eq!(tail, vec![0.25, 0.25, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(controls.cursor_frames(), 10);
        assert!(!controls.is_playing());
        assert!(controls.take_finished());
        assert!(!controls.take_finished());
    }

    #[test]
    fn looping_rewinds_to_the_start() {
        let controls = controls();
        controls.set_looping(true);
        let mut voice = VoiceSource::new(mono(vec![0.1, 0.2, 0.3]), Arc::clone(&controls), 1);
        assert_eq!(
            left_channel(&mut voice, 5),
            vec![0.1, 0.2, 0.3, 0.1, 0.2]
        );
        assert!(!controls.take_finished());
    }

    #[test]
    fn seek_request_revives_a_finished_voice() {
        let controls = controls();
        let mut voice = VoiceSource::new(mono(vec![0.5, 0.6]), Arc::clone(&controls), 1);
        assert_eq!(left_channel(&mut voice, 3), vec![0.5, 0.6, 0.0]);
        assert!(controls.take_finished());

        controls.request_seek(0);
        assert_eq!(controls.cursor_frames(), 0);
        assert_eq!(left_channel(&mut voice, 1), vec![0.0]);
        assert_eq!(controls.cursor_frames(), 0);

        controls.set_playing(true);
        assert_eq!(left_channel(&mut voice, 2), vec![0.5, 0.6]);
    }

    #[test]
    fn stopped_voice_holds_cursor_while_sink_drains() {
        let controls = controls();
        let ramp: Vec<f32> = (1..=2_000).map(|i| i as f32).collect();
        let mut voice = VoiceSource::new(mono(ramp), Arc::clone(&controls), 64);

        let _ = left_channel(&mut voice, 1_000);
        controls.set_playing(false);
        controls.request_seek(0);

        let tail = left_channel(&mut voice, 240);
        assert!(tail.iter().all(|sample| *sample == 0.0));
        assert_eq!(controls.cursor_frames(), 0);

        controls.set_playing(true);
        assert_eq!(left_channel(&mut voice, 2), vec![1.0, 2.0]);
    }

    #[test]
    fn seek_applies_before_the_next_refresh() {
        let controls = controls();
        let mut voice = VoiceSource::new(mono(vec![0.1, 0.2, 0.3, 0.4]), Arc::clone(&controls), 64);
        assert_eq!(left_channel(&mut voice, 1), vec![0.1]);
        controls.request_seek(3);
        assert_eq!(left_channel(&mut voice, 1), vec![0.4]);
    }

    #[test]
    fn oversized_seek_stays_pending() {
        let controls = controls();
        controls.request_seek(u64::MAX);
        assert_eq!(controls.cursor_frames(), u64::MAX - 1);
        assert_eq!(
            controls.pending_seek.load(Ordering::Relaxed),
            u64::MAX - 1
        );
    }

    /// One mono span followed by a stereo span.
    struct SpanSwitch {
        samples: Vec<f32>,
        pos: usize,
        mono_len: usize,
    }

    impl Iterator for SpanSwitch {
        type Item = f32;

        fn next(&mut self) -> Option<f32> {
            let sample = self.samples.get(self.pos).copied();
            self.pos += 1;
            sample
        }
    }

    impl Source for SpanSwitch {
        fn current_span_len(&self) -> Option<usize> {
            if self.pos < self.mono_len {
                Some(self.mono_len - self.pos)
            } else {
                Some(self.samples.len().saturating_sub(self.pos))
            }
        }

        fn channels(&self) -> u16 {
            if self.pos < self.mono_len {
                1
            } else {
                2
            }
        }

        fn sample_rate(&self) -> u32 {
            1_000
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn channel_count_follows_the_current_span() {
        let source = SpanSwitch {
            samples: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            pos: 0,
            mono_len: 2,
        };
        let voice = VoiceSource::new(source, controls(), 4);
        let samples: Vec<f32> = voice.take(8).collect();
        assert_eq!(samples, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn ramp_interpolates_linearly() {
        let ramp = VolumeRamp::new(0.0, 1.0, Duration::from_secs(2));
        assert_eq!(ramp.value_after(Duration::ZERO), (0.0, false));
        let (mid, done) = ramp.value_after(Duration::from_secs(1));
        assert!((mid - 0.5).abs() < 1e-6);
        assert!(!done);
        assert_eq!(ramp.value_after(Duration::from_secs(2)), (1.0, true));
        assert_eq!(ramp.value_after(Duration::from_secs(5)), (1.0, true));
    }

    #[test]
    fn fade_out_starts_from_current_volume() {
        let controls = controls();
        controls.set_volume(0.4);
        controls.schedule_fade(FadeSchedule::fade_out(60_000));
        assert!((controls.current_volume() - 0.4).abs() < 0.01);

        controls.set_volume(0.9);
        assert_eq!(controls.current_volume(), 0.9);
    }

    #[test]
    fn zero_length_fade_jumps_to_end() {
        let controls = controls();
        controls.schedule_fade(FadeSchedule::new(0.2, 0.7, 0));
        assert_eq!(controls.current_volume(), 0.7);
    }
}
