//! Diagnostic logging for the CLI.
//!
//! indicatif draws its bar on stderr, and so does the subscriber. Each event
//! is buffered and written inside [`ProgressBar::suspend`], so log lines land
//! above the bar instead of through it. The level defaults to `warn` and can
//! be raised through `RUST_LOG` (for example `RUST_LOG=framecheck_core=debug`).

use indicatif::ProgressBar;
use std::io::{self, Write};
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "warn";

pub fn init(progress_bar: &ProgressBar) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(SuspendingStderr::new(progress_bar.clone()));

    Registry::default()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
}

/// Hands out one [`EventWriter`] per event.
#[derive(Clone)]
struct SuspendingStderr {
    progress_bar: ProgressBar,
}

impl SuspendingStderr {
    fn new(progress_bar: ProgressBar) -> Self {
        Self { progress_bar }
    }
}

impl<'a> MakeWriter<'a> for SuspendingStderr {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            progress_bar: self.progress_bar.clone(),
            buffer: Vec::new(),
        }
    }
}

/// Collects one formatted event and writes it to stderr on flush or drop.
struct EventWriter {
    progress_bar: ProgressBar,
    buffer: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let event = std::mem::take(&mut self.buffer);
        self.progress_bar
            .suspend(|| io::stderr().lock().write_all(&event))
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
