//! Command-line surface: argument parsing and the non-playback commands.

pub mod args;
pub mod info;
