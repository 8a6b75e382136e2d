//! Tracing subscriber setup: console formatter, file layer, and initialisation.
//!
//! Background runs (`sync` at startup, `watch`) have no terminal, so the log
//! file is appended across runs rather than replaced.  It is started afresh
//! once it grows past [`MAX_LOG_BYTES`].
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use super::utils::{log_file_path, strip_ansi};

const STAGE_TARGET: &str = "opencode_sync::stage";

/// Size past which the log file is truncated at the start of a run.
const MAX_LOG_BYTES: u64 = 512 * 1024;

/// How an event is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(metadata: &tracing::Metadata<'_>) -> Self {
        match *metadata.level() {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO if metadata.target() == STAGE_TARGET => Self::Stage,
            tracing::Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    const fn file_tag(self) -> &'static str {
        match self {
            Self::Stage => "==>",
            Self::Error => "    [error]",
            Self::Warn => "    [warn]",
            Self::Info => "   ",
            Self::Debug => "    [debug]",
        }
    }
}

/// The `message` field of an event.
fn event_message(event: &tracing::Event<'_>) -> String {
    struct Message(String);

    impl tracing::field::Visit for Message {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0.clear();
                let _ = write!(self.0, "{value:?}");
            }
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            if field.name() == "message" {
                value.clone_into(&mut self.0);
            }
        }
    }

    let mut message = Message(String::new());
    event.record(&mut message);
    message.0
}

fn file_line(kind: Kind, time: &str, msg: &str) -> String {
    format!("[{time}] {} {}", kind.file_tag(), strip_ansi(msg))
}

fn run_header(command: &str, version: &str, started: &str, pid: u32) -> String {
    format!("--- opencode-sync {version} {command} (pid {pid}) started {started} ---\n")
}

/// Open `path` for appending, starting over when it is larger than `limit`.
fn open_log(path: &Path, limit: u64) -> Option<fs::File> {
    let oversized = fs::metadata(path).is_ok_and(|m| m.len() > limit);
    let mut options = fs::OpenOptions::new();
    options.create(true);
    if oversized {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path).ok()
}

/// A [`tracing_subscriber::Layer`] that appends every event, ANSI codes
/// stripped, to the per-command log file.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open the log file for `command` and write a run header.
    ///
    /// Returns `None` if the cache directory or the file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let mut file = open_log(&path, MAX_LOG_BYTES)?;
        let version = option_env!("OPENCODE_SYNC_VERSION")
            .unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let started = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        file.write_all(run_header(command, version, &started, std::process::id()).as_bytes())
            .ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let time = chrono::Utc::now().format("%H:%M:%S").to_string();
        let line = file_line(Kind::of(event.metadata()), &time, &event_message(event));
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "{line}");
        }
    }
}

/// Console style: bold stage arrows, indented info lines, coloured warnings
/// and errors.  Colour is dropped when `NO_COLOR` is set.
struct ConsoleFormatter {
    color: bool,
}

impl ConsoleFormatter {
    fn from_env() -> Self {
        Self {
            color: std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty()),
        }
    }

    fn render(&self, kind: Kind, msg: &str) -> String {
        if !self.color {
            return match kind {
                Kind::Stage => format!("==> {msg}"),
                Kind::Error => format!("ERROR {msg}"),
                Kind::Warn => format!("WARN  {msg}"),
                Kind::Info | Kind::Debug => format!("  {msg}"),
            };
        }
        match kind {
            Kind::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Kind::Error => format!("\x1b[31mERROR\x1b[0m {msg}"),
            Kind::Warn => format!("\x1b[33mWARN\x1b[0m  {msg}"),
            Kind::Info => format!("  {msg}"),
            Kind::Debug => format!("  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let line = self.render(Kind::of(event.metadata()), &event_message(event));
        writeln!(writer, "{line}")
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout.  All events
/// down to `debug` are also appended to
/// `$XDG_CACHE_HOME/opencode-sync/<command>.log`.  `RUST_LOG` overrides the
/// console level when set.  Call once, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter::from_env())
        .with_writer(make_writer)
        .with_filter(console_filter);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_lines_are_tagged_and_plain() {
        assert_eq!(
            file_line(Kind::Warn, "10:00:00", "\x1b[33mlow\x1b[0m disk"),
            "[10:00:00]     [warn] low disk"
        );
        assert_eq!(file_line(Kind::Stage, "10:00:00", "Pull"), "[10:00:00] ==> Pull");
        assert_eq!(file_line(Kind::Info, "10:00:00", "ok"), "[10:00:00]     ok");
    }

    #[test]
    fn header_names_run() {
        assert_eq!(
            run_header("watch", "1.2.3", "2026-01-02 03:04:05 UTC", 42),
            "--- opencode-sync 1.2.3 watch (pid 42) started 2026-01-02 03:04:05 UTC ---\n"
        );
    }

    #[test]
    fn log_is_appended_across_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sync.log");
        writeln!(open_log(&path, 1024).unwrap(), "first").unwrap();
        writeln!(open_log(&path, 1024).unwrap(), "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn oversized_log_starts_over() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sync.log");
        fs::write(&path, "x".repeat(64)).unwrap();
        writeln!(open_log(&path, 16).unwrap(), "fresh").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn plain_console_has_no_escapes() {
        let plain = ConsoleFormatter { color: false };
        assert_eq!(plain.render(Kind::Error, "boom"), "ERROR boom");
        assert_eq!(plain.render(Kind::Stage, "Push"), "==> Push");
        let colored = ConsoleFormatter { color: true };
        assert_eq!(strip_ansi(&colored.render(Kind::Warn, "w")), "WARN  w");
    }
}
