use std::{error::Error, fs, io, str::FromStr, thread::sleep, time::Duration};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};
use slotmix_lib::{BackendSettings, MixingBackend};

use crate::controls::{self, Session};
use crate::logging::{self, LogBuffer};
use crate::{cli, ui};

type CliResult<T> = Result<T, Box<dyn Error>>;

const QUIET_POLL_MS: u64 = 100;
const TUI_FRAME_MS: u64 = 50;

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> CliResult<i32> {
    match args.subcommand() {
        Some(("info", sub)) => {
            let file_path = required(sub, "INPUT")?;
            Ok(cli::info::run_info(file_path)?)
        }
        Some(("create", sub)) => match sub.subcommand() {
            Some(("settings-json", _)) => {
                let json = serde_json::to_string_pretty(&BackendSettings::default())?;
                println!("{}", json);
                Ok(0)
            }
            _ => Err("unknown create target".into()),
        },
        Some(("play", sub)) => play(sub, log_buffer),
        _ => Err("missing subcommand".into()),
    }
}

fn play(args: &ArgMatches, log_buffer: LogBuffer) -> CliResult<i32> {
    let settings = load_settings(args)?;
    let tracks: Vec<String> = args
        .get_many::<String>("BGM")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let effects: Vec<String> = args
        .get_many::<String>("se")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let gain = parse_arg::<f32>(args, "gain")?.unwrap_or(100.0);
    let fade_in = parse_arg::<f32>(args, "fade-in")?.unwrap_or(0.0);
    let crossfade = parse_arg::<f32>(args, "crossfade")?.unwrap_or(2.0);
    let seek = parse_arg::<f32>(args, "seek")?;
    let pitch = parse_arg::<f32>(args, "pitch")?.unwrap_or(1.0);
    let quiet = args.get_flag("quiet");

    info!("starting slotmix with {} track(s)", tracks.len());
    let engine = slotmix_lib::create_with_settings(settings)?;
    let mut session = Session::load(engine, &tracks, &effects)?;
    session.set_master_volume(gain / 100.0);
    session.set_crossfade_seconds(crossfade);
    session.set_pitch(pitch);

    if quiet {
        session.play_once();
        session.start(seek, fade_in);
        while session.is_playing() {
            sleep(Duration::from_millis(QUIET_POLL_MS));
        }
        return Ok(0);
    }

    session.start(seek, fade_in);
    run_tui(&mut session, &effects, log_buffer);
    Ok(0)
}

fn run_tui<B: MixingBackend>(session: &mut Session<B>, effects: &[String], log_buffer: LogBuffer) {
    let effect_names: Vec<String> = effects
        .iter()
        .map(|path| {
            std::path::Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone())
        })
        .collect();

    let _raw_mode = RawModeGuard::enable().ok();
    let _stderr_capture = logging::capture_stderr(log_buffer.clone());
    let mut terminal = {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    };

    // UI / input loop.
    loop {
        if let Some(term) = terminal.as_mut() {
            let status = controls::status_text(session.status());
            let log_lines = logging::snapshot(&log_buffer);
            ui::draw_status(term, &status, &effect_names, &log_lines);
        }

        if !controls::handle_key_event(session) {
            break;
        }

        sleep(Duration::from_millis(TUI_FRAME_MS));
    }

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }
}

fn load_settings(args: &ArgMatches) -> CliResult<BackendSettings> {
    match args.get_one::<String>("settings") {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|err| format!("cannot read settings '{}': {}", path, err))?;
            let settings = BackendSettings::from_json(&json)
                .map_err(|err| format!("invalid settings '{}': {}", path, err))?;
            info!("loaded settings from {}", path);
            Ok(settings)
        }
        None => Ok(BackendSettings::default()),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> CliResult<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument {}", name).into())
}

fn parse_arg<T>(args: &ArgMatches, name: &str) -> CliResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match args.get_one::<String>(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| format!("invalid --{} '{}': {}", name, raw, err).into()),
        None => Ok(None),
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
