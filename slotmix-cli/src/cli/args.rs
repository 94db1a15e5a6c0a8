//! CLI argument definitions for `slotmix`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("slotmix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Audition BGM and SE through the slotmix engine")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("settings")
                .long("settings")
                .global(true)
                .value_name("PATH")
                .help("Path to a BackendSettings JSON file"),
        )
        .subcommand(
            Command::new("play")
                .about("Play background music with an interactive TUI")
                .arg(
                    Arg::new("BGM")
                        .help("Background music files, crossfaded in order with `n`")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                )
                .arg(
                    Arg::new("se")
                        .long("se")
                        .value_name("FILE")
                        .action(ArgAction::Append)
                        .help("Sound effect triggered by keys 1-9 (repeatable)"),
                )
                .arg(
                    Arg::new("gain")
                        .long("gain")
                        .short('g')
                        .value_name("GAIN")
                        .default_value("100")
                        .help("Master volume in percent"),
                )
                .arg(
                    Arg::new("fade-in")
                        .long("fade-in")
                        .value_name("SECONDS")
                        .default_value("0")
                        .help("Fade the first track in over this many seconds"),
                )
                .arg(
                    Arg::new("crossfade")
                        .long("crossfade")
                        .value_name("SECONDS")
                        .default_value("2.0")
                        .help("Crossfade length used when switching tracks"),
                )
                .arg(
                    Arg::new("seek")
                        .long("seek")
                        .short('s')
                        .value_name("TIME")
                        .help("Start the first track at the given time in seconds"),
                )
                .arg(
                    Arg::new("pitch")
                        .long("pitch")
                        .short('p')
                        .value_name("RATE")
                        .default_value("1.0")
                        .help("Playback rate of the background music"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("No TUI; play the first track once and exit"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Print duration, sample rate and channels of an audio file")
                .arg(
                    Arg::new("INPUT")
                        .help("The input file path")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(
                    Command::new("settings-json")
                        .about("Print the default BackendSettings JSON payload"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_collects_tracks_and_effects() {
        let matches = build_cli()
            .try_get_matches_from([
                "slotmix", "play", "a.ogg", "b.ogg", "--se", "hit.wav", "--se", "coin.wav",
            ])
            .expect("valid args");
        let (name, play) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "play");

        let tracks: Vec<&String> = play.get_many::<String>("BGM").expect("tracks").collect();
        assert_eq!(tracks, ["a.ogg", "b.ogg"]);
        let effects: Vec<&String> = play.get_many::<String>("se").expect("effects").collect();
        assert_eq!(effects, ["hit.wav", "coin.wav"]);
        assert_eq!(play.get_one::<String>("gain").map(String::as_str), Some("100"));
        assert!(!play.get_flag("quiet"));
    }

    #[test]
    fn settings_is_global() {
        let matches = build_cli()
            .try_get_matches_from(["slotmix", "info", "a.wav", "--settings", "s.json"])
            .expect("valid args");
        let info = matches.subcommand_matches("info").expect("info matches");
        assert_eq!(
            info.get_one::<String>("settings").map(String::as_str),
            Some("s.json")
        );
    }

    #[test]
    fn play_requires_a_track() {
        assert!(build_cli()
            .try_get_matches_from(["slotmix", "play"])
            .is_err());
    }
}
