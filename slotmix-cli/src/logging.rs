//! Ring-buffer logger feeding the TUI log panel.
//!
//! `RUST_LOG` picks the level (`info` by default). Set `SLOTMIX_LOG_STDERR`
//! to anything but `0` to also echo every line to stderr.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

const LOG_CAPACITY: usize = 500;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct SharedLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}", record.level(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }

        push_line(&self.buffer, line);
    }

    fn flush(&self) {}
}

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();
static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

pub fn init() -> LogBuffer {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))))
        .clone();

    let level = std::env::var("RUST_LOG")
        .map(|level| parse_level(&level))
        .unwrap_or(LevelFilter::Info);

    let echo_stderr = std::env::var("SLOTMIX_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger = SharedLogger {
        level,
        buffer: buffer.clone(),
        echo_stderr,
    };

    let logger_ref = LOGGER.get_or_init(|| logger);
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }

    buffer
}

fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn push_line(buffer: &LogBuffer, line: String) {
    let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    if buffer.len() >= LOG_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

/// Restores the original stderr on drop and waits for the reader to drain.
pub struct StderrCaptureGuard {
    saved_fd: RawFd,
    stderr_fd: RawFd,
    reader: Option<JoinHandle<()>>,
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        // Replacing fd 2 drops the last write end of the pipe, so the reader
        // sees EOF and exits.
        redirect(self.saved_fd, self.stderr_fd);
        close_fds(&[self.saved_fd]);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

/// Redirect the process stderr into the log buffer until the guard drops.
///
/// Audio backends print device chatter straight to fd 2, which would tear
/// through the TUI.
pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCaptureGuard> {
    let stderr_fd = io::stderr().as_raw_fd();
    let (read_fd, write_fd) = open_pipe()?;

    // SAFETY: `stderr_fd` is open for the life of the process.
    let saved_fd = unsafe { libc::dup(stderr_fd) };
    if saved_fd < 0 {
        close_fds(&[read_fd, write_fd]);
        return None;
    }
    if !redirect(write_fd, stderr_fd) {
        close_fds(&[read_fd, write_fd, saved_fd]);
        return None;
    }
    close_fds(&[write_fd]);

    Some(StderrCaptureGuard {
        saved_fd,
        stderr_fd,
        reader: Some(spawn_line_reader(read_fd, buffer)),
    })
}

fn open_pipe() -> Option<(RawFd, RawFd)> {
    let mut fds = [0; 2];
    // SAFETY: `fds` has room for the two descriptors `pipe` writes.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return None;
    }
    Some((fds[0], fds[1]))
}

/// Point `target` at whatever `source` refers to.
fn redirect(source: RawFd, target: RawFd) -> bool {
    // SAFETY: both descriptors are owned by the caller.
    unsafe { libc::dup2(source, target) >= 0 }
}

fn close_fds(fds: &[RawFd]) {
    for &fd in fds {
        // SAFETY: callers only pass descriptors they own and no longer use.
        unsafe {
            libc::close(fd);
        }
    }
}

/// Forward every non-blank line read from `read_fd` into `buffer` until EOF.
/// Invalid UTF-8 is replaced rather than ending the reader.
fn spawn_line_reader(read_fd: RawFd, buffer: LogBuffer) -> JoinHandle<()> {
    thread::spawn(move || {
        // SAFETY: the reader thread takes sole ownership of `read_fd`.
        let file = unsafe { File::from_raw_fd(read_fd) };
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        while matches!(reader.read_until(b'\n', &mut bytes), Ok(read) if read > 0) {
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim_end();
            if !line.is_empty() {
                push_line(&buffer, format!("[stderr] {}", line));
            }
            bytes.clear();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn buffer_keeps_most_recent_lines() {
        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));
        for index in 0..LOG_CAPACITY + 3 {
            push_line(&buffer, format!("line {}", index));
        }
        let lines = snapshot(&buffer);
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert_eq!(lines[0], "line 3");
        assert_eq!(lines.last().map(String::as_str), Some("line 502"));
    }

    #[test]
    fn line_reader_forwards_lines_until_eof() {
        use std::io::Write;

        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));
        let (read_fd, write_fd) = open_pipe().expect("pipe");
        let reader = spawn_line_reader(read_fd, buffer.clone());

        let mut writer = unsafe { File::from_raw_fd(write_fd) };
        writer
            .write_all(b"ALSA lib pcm.c: underrun\n\n  \nbad \xff byte\r\nno newline")
            .expect("write");
        drop(writer);
        reader.join().expect("reader thread");

        assert_eq!(
            snapshot(&buffer),
            vec![
                "[stderr] ALSA lib pcm.c: underrun".to_string(),
                "[stderr] bad \u{fffd} byte".to_string(),
                "[stderr] no newline".to_string(),
            ]
        );
    }
}
