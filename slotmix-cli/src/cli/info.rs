//! `slotmix info`: probe a file without opening an audio device.

use std::path::Path;

use slotmix_lib::probe::{self, AudioInfo};
use slotmix_lib::BackendError;

use crate::controls::format_time;

/// Probe `file_path` and print its stream properties.
pub fn run_info(file_path: &str) -> Result<i32, BackendError> {
    let info = probe::probe_file(Path::new(file_path))?;
    print!("{}", render(file_path, &info));
    Ok(0)
}

fn render(file_path: &str, info: &AudioInfo) -> String {
    let mut out = format!("file: {}\n", file_path);
    out.push_str(&format!("sample_rate: {}\n", info.sample_rate));
    out.push_str(&format!("channels: {}\n", info.channels));
    if let Some(bits) = info.bits_per_sample {
        out.push_str(&format!("bits_per_sample: {}\n", bits));
    }
    if let Some(frames) = info.n_frames {
        out.push_str(&format!("frames: {}\n", frames));
    }
    match info.duration {
        Some(duration) => out.push_str(&format!(
            "duration: {:.3}s ({})\n",
            duration.as_secs_f64(),
            format_time(duration.as_secs_f64())
        )),
        None => out.push_str("duration: unknown\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn renders_known_and_unknown_fields() {
        let info = AudioInfo {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: None,
            n_frames: Some(96_000),
            duration: Some(Duration::from_secs(2)),
        };
        let text = render("a.wav", &info);
        assert!(text.contains("sample_rate: 48000\n"));
        assert!(text.contains("frames: 96000\n"));
        assert!(text.contains("duration: 2.000s (00:00:02)\n"));
        assert!(!text.contains("bits_per_sample"));

        let unknown = AudioInfo {
            duration: None,
            ..info
        };
        assert!(render("a.ogg", &unknown).contains("duration: unknown"));
    }
}
