//! Implements a terminal and file system logger for the Warden Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub use crossbeam_channel::SendError;
use crossbeam_channel::Sender;
use owo_colors::{OwoColorize, Stream};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use warden_threads::{AutoJoin, Consumer, HandledThread, SenderThread};

/// The handle returned by [`install`]; dropping it flushes and joins the logging thread.
pub type LogThread = AutoJoin<Consumer<Message, std::io::Result<()>>, std::io::Result<()>>;

/// The logging thread's sender channel.
static SENDER: OnceLock<Sender<Message>> = OnceLock::new();

/// Sends a message to the logging thread.
///
/// Messages sent before [`install`] is called are discarded.
fn send(message: Message) -> Result<(), SendError<Message>> {
    SENDER.get().map_or(Ok(()), |sender| sender.send(message))
}

/// Queues a log.
///
/// # Errors
///
/// This function will return an error if the logging thread is closed.
pub fn queue(kind: Level, text: impl Display) -> Result<(), SendError<Message>> {
    self::send(Message::Queue(Log::new(Time::now(), kind, text)))
}

/// Flushes the logger queue.
///
/// # Errors
///
/// This function will return an error if the logging thread is closed.
pub fn flush() -> Result<(), SendError<Message>> {
    self::send(Message::Flush)
}

/// Closes the logging thread.
///
/// Once closed, the thread cannot be re-installed and every later log returns an error.
///
/// # Errors
///
/// This function will return an error if the logging thread is already closed.
pub fn close() -> Result<(), SendError<Message>> {
    self::send(Message::Close)
}

/// Spawns and installs the logging thread.
///
/// The returned handle must be kept alive for as long as logs should be written.
///
/// # Errors
///
/// This function will return an error if the thread could not be spawned or a logging thread is
/// already installed.
pub fn install(config: Config, dir: impl AsRef<Path>) -> std::io::Result<LogThread> {
    let mut logger = Logger::new(config, dir);
    let timeout = Duration::from_millis(logger.config.stale_time);

    let thread = Consumer::spawn("logger", move |receiver| {
        use crossbeam_channel::RecvTimeoutError::{Disconnected, Timeout};

        loop {
            match receiver.recv_timeout(timeout) {
                Ok(Message::Queue(log)) if !logger.config.disabled() => logger.queue(log)?,
                Ok(Message::Flush) | Err(Timeout) if !logger.is_empty() => logger.flush()?,
                Ok(Message::Close) | Err(Disconnected) => {
                    drop(receiver);

                    return logger.flush();
                }
                _ => {}
            }
        }
    })?;

    if SENDER.set(thread.clone_sender()).is_err() {
        thread.send(Message::Close).ok();
        drop(thread.join());

        return Err(std::io::Error::new(std::io::ErrorKind::AlreadyExists, "the logger is already installed"));
    }

    Ok(thread.auto_cleaned(|thread| {
        thread.send(Message::Close).ok();
    }))
}

/// A message sent to the logging thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Queues a log.
    Queue(Log),
    /// Flushes the queue.
    Flush,
    /// Flushes the queue and stops the thread.
    Close,
}

/// The logging thread's state.
#[derive(Debug)]
pub struct Logger {
    /// The logger's configuration.
    config: Config,
    /// The log file path.
    path: Box<Path>,
    /// Logs waiting to be flushed.
    queue: Vec<Log>,
}

impl Logger {
    /// The time format used for log file names.
    pub const FILENAME_FORMAT: &'static [FormatItem<'static>] = format_description!(
        version = 2,
        "[year repr:last_two][month padding:zero repr:numerical][day padding:zero]-[hour \
         padding:zero repr:24][minute padding:zero][second padding:zero]"
    );

    /// Creates a new [`Logger`] that writes into a timestamped file within the given directory.
    #[must_use]
    pub fn new(config: Config, dir: impl AsRef<Path>) -> Self {
        let time = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let file = time.format(Self::FILENAME_FORMAT).unwrap_or_else(|_| time.unix_timestamp().to_string());
        let path = dir.as_ref().join(file).with_extension("txt").into_boxed_path();

        Self { config, path, queue: Vec::with_capacity(config.queue_size) }
    }

    /// Returns the path of this logger's output file.
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns whether the queue is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.config.queue_size
    }

    /// Queues a log, flushing once the queue is full.
    ///
    /// # Errors
    ///
    /// This function will return an error if a flush fails.
    pub fn queue(&mut self, log: Log) -> std::io::Result<()> {
        self.queue.push(log);

        if self.is_full() { self.flush() } else { Ok(()) }
    }

    /// Writes every queued log to the console and the log file.
    ///
    /// # Errors
    ///
    /// This function will return an error if a log could not be written.
    pub fn flush(&mut self) -> std::io::Result<()> {
        let colored = self.config.support_color();
        let logs = self.queue.drain(..).collect::<Vec<_>>();

        if self.config.print {
            let mut out = std::io::stdout().lock();
            let mut err = std::io::stderr().lock();

            for log in &logs {
                let text = log.display(colored.then(|| log.stream()));

                if log.kind.error { writeln!(err, "{text}") } else { writeln!(out, "{text}") }?;
            }
        }

        if self.config.write && !logs.is_empty() {
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let mut file = File::options().append(true).create(true).open(&self.path)?;

            for log in &logs {
                writeln!(file, "{}", log.display(None))?;
            }
        }

        Ok(())
    }
}

/// A logger configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Whether logs are printed to the console.
    pub print: bool,
    /// Whether logs are written to a file.
    pub write: bool,
    /// Whether console output is colored.
    pub color: bool,
    /// How many logs are queued before flushing.
    pub queue_size: usize,
    /// How many milliseconds may pass before a non-empty queue is flushed.
    pub stale_time: u64,
}

impl Config {
    /// Returns whether logging is disabled entirely.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        !(self.print || self.write) || self.queue_size == 0
    }

    /// Returns whether console colors should be used.
    #[must_use]
    pub const fn support_color(&self) -> bool {
        self.print && self.color
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { print: true, write: true, color: true, queue_size: 8, stale_time: 2_500 }
    }
}

/// A log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// When the log was created.
    pub time: Time,
    /// The log's level.
    pub kind: Level,
    /// The log's text.
    pub text: Box<str>,
}

impl Log {
    /// Creates a new [`Log`].
    pub fn new(time: Time, kind: Level, text: impl Display) -> Self {
        Self { time, kind, text: text.to_string().into_boxed_str() }
    }

    /// Returns the console stream this log should be printed to.
    #[must_use]
    pub const fn stream(&self) -> Stream {
        if self.kind.error { Stream::Stderr } else { Stream::Stdout }
    }

    /// Formats this log, coloring it for the given stream if one is provided.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let time = self.time.display(color_stream);
        let kind = self.kind.display(color_stream);

        format!("{time} {kind} {}", self.text)
    }
}

/// A log timestamp.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Time {
    inner: OffsetDateTime,
}

impl Time {
    /// The time format used for log headers.
    pub const FORMAT: &'static [FormatItem<'static>] = format_description!(
        version = 2,
        "\\[[day padding:zero]-[month padding:zero repr:numerical]-[year repr:last_two] [hour \
         padding:zero repr:24]:[minute padding:zero]:[second padding:zero]\\]"
    );

    /// Creates a new [`Time`].
    #[must_use]
    pub const fn new(inner: OffsetDateTime) -> Self {
        Self { inner }
    }

    /// Returns the current local time, or UTC if the local offset is unknown.
    #[must_use]
    pub fn now() -> Self {
        Self::new(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
    }

    /// Formats this timestamp, dimming it for the given stream if one is provided.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let text = self.inner.format(Self::FORMAT).unwrap_or_else(|_| self.inner.to_string());

        if let Some(stream) = color_stream {
            text.if_supports_color(stream, |s| s.dimmed()).to_string()
        } else {
            text
        }
    }
}

/// A log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Level {
    /// The level's name.
    pub name: &'static str,
    /// Whether the level is printed to standard error.
    pub error: bool,
    /// Colors a string with the level's color.
    pub color: fn(&String) -> String,
}

impl Level {
    /// Creates a new [`Level`].
    pub const fn new(name: &'static str, error: bool, color: fn(&String) -> String) -> Self {
        Self { name, error, color }
    }

    /// Formats this level, coloring it for the given stream if one is provided.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let text = format!("({})", self.name);

        if let Some(stream) = color_stream {
            text.if_supports_color(stream, self.color).to_string()
        } else {
            text
        }
    }
}

/// Defines log levels.
macro_rules! levels {
    {$($const:ident($name:literal, $error:literal, $color:ident)),* $(,)?} => {
        impl Level {$(
            #[doc = concat!("The ", $name, " logging level.")]
            pub const $const: Self = Self::new($name, $error, |s| ::owo_colors::OwoColorize::$color(s).to_string());
        )*}
    };
}

levels! {
    DEBUG("debug", false, bright_purple),
    INFO("info", false, bright_blue),
    WARN("warn", true, bright_yellow),
    ERROR("error", true, bright_red),
}

/// Outputs a debug log in debug builds.
///
/// ```
/// warden_logger::debug!("this is a debug log").ok();
/// ```
#[macro_export]
macro_rules! debug {
    ($($args:tt)+) => {
        if ::std::cfg!(debug_assertions) {
            $crate::queue($crate::Level::DEBUG, ::std::format_args!($($args)+))
        } else {
            ::std::result::Result::<(), $crate::SendError<$crate::Message>>::Ok(())
        }
    };
}

/// Outputs an info log.
///
/// ```
/// warden_logger::info!("this is an info log").ok();
/// ```
#[macro_export]
macro_rules! info {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::INFO, ::std::format_args!($($args)+))
    };
}

/// Outputs a warning log.
///
/// ```
/// warden_logger::warn!("this is a warning log").ok();
/// ```
#[macro_export]
macro_rules! warn {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::WARN, ::std::format_args!($($args)+))
    };
}

/// Outputs an error log.
///
/// ```
/// warden_logger::error!("this is an error log").ok();
/// ```
#[macro_export]
macro_rules! error {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::ERROR, ::std::format_args!($($args)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(write: bool) -> Config {
        Config { print: false, write, color: false, queue_size: 2, stale_time: 100 }
    }

    #[test]
    fn logs_before_install_are_dropped() {
        assert!(queue(Level::INFO, "nobody is listening").is_ok());
    }

    #[test]
    fn full_queue_flushes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = Logger::new(config(true), dir.path());

        logger.queue(Log::new(Time::now(), Level::INFO, "first")).unwrap();
        assert!(!logger.path().exists());

        logger.queue(Log::new(Time::now(), Level::ERROR, "second")).unwrap();
        assert!(logger.is_empty());

        let text = std::fs::read_to_string(logger.path()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("(info) first"));
        assert!(lines[1].ends_with("(error) second"));
    }

    #[test]
    fn disabled_writer_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = Logger::new(config(false), dir.path());

        logger.queue(Log::new(Time::now(), Level::WARN, "quiet")).unwrap();
        logger.flush().unwrap();

        assert!(logger.is_empty());
        assert!(!logger.path().exists());
    }

    #[test]
    fn uncolored_display_has_no_escapes() {
        let log = Log::new(Time::now(), Level::WARN, "plain");

        assert!(!log.display(None).contains('\u{1b}'));
        assert!(matches!(log.stream(), Stream::Stderr));
    }
}
