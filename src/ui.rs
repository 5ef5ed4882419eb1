//! Terminal UI: progress bars and messages that coexist with logging.

use std::{borrow::Cow, io, sync::Arc, time::Duration};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Shared UI state.
///
/// Cheap to clone; every clone draws to the same [`MultiProgress`], so
/// progress bars from concurrent pipeline stages stack instead of clobbering
/// each other.
#[derive(Clone)]
pub struct Ui {
    multi_progress: Arc<MultiProgress>,
}

/// Configuration for a progress bar or spinner.
pub struct ProgressConfig<'a> {
    /// Emoji shown as the bar's prefix.
    pub emoji: &'a str,
    /// Message shown while running.
    pub msg: &'a str,
    /// Message shown when done.
    pub done_msg: &'a str,
}

impl Ui {
    /// Create a new UI drawing to stderr.
    pub fn init() -> Ui {
        Ui {
            multi_progress: Arc::new(MultiProgress::new()),
        }
    }

    /// Create a new UI for unit tests.
    #[cfg(test)]
    pub fn init_for_tests() -> Ui {
        Ui {
            multi_progress: Arc::new(MultiProgress::with_draw_target(
                ProgressDrawTarget::hidden(),
            )),
        }
    }

    /// Hide all progress bars completely, for when actual output is going to
    /// stdout.
    pub fn hide_progress_bars(&self) {
        self.multi_progress
            .set_draw_target(ProgressDrawTarget::hidden());
    }

    /// Get a writer that can be used to log to stderr without garbling any
    /// running progress bars.
    pub fn get_stderr_writer(&self) -> SafeStderrWriter {
        SafeStderrWriter { ui: self.clone() }
    }

    /// Get a reference to our progress bars.
    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }

    /// Display a short status message to the user.
    pub fn display_message(&self, emoji: &str, msg: &str) {
        let _ = self.multi_progress.println(format!("{emoji} {msg}"));
    }

    /// Create a new progress bar tracking `len` items.
    pub fn new_progress_bar(&self, config: &ProgressConfig<'_>, len: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("  {prefix:3}{msg:25} {pos:>4}/{len:4} {elapsed_precise} {wide_bar:.cyan/blue} {eta_precise}")
            .expect("bad progress bar template");
        self.attach(ProgressBar::new(len).with_style(style), config)
    }

    /// Create a new spinner, for work of unknown length.
    pub fn new_spinner(&self, config: &ProgressConfig<'_>) -> ProgressBar {
        let style = ProgressStyle::default_spinner()
            .template("{spinner} {prefix:3}{msg}")
            .expect("bad spinner template");
        self.attach(ProgressBar::new_spinner().with_style(style), config)
    }

    /// Create a progress bar when the stream length is known, and a spinner
    /// otherwise.
    pub fn new_from_size_hint(
        &self,
        config: &ProgressConfig<'_>,
        size_hint: (usize, Option<usize>),
    ) -> ProgressBar {
        match size_hint {
            (_, Some(len)) if len > 0 => self.new_progress_bar(
                config,
                u64::try_from(len).expect("size hint too large"),
            ),
            _ => self.new_spinner(config),
        }
    }

    /// Register a bar with our [`MultiProgress`] and apply common settings.
    fn attach(&self, pb: ProgressBar, config: &ProgressConfig<'_>) -> ProgressBar {
        let pb = self.multi_progress.add(pb);
        #[cfg(test)]
        pb.set_draw_target(ProgressDrawTarget::hidden());
        pb.set_prefix(config.emoji.to_owned());
        pb.set_message(config.msg.to_owned());
        pb.enable_steady_tick(Duration::from_millis(250));
        pb.with_finish(indicatif::ProgressFinish::WithMessage(Cow::Owned(
            config.done_msg.to_owned(),
        )))
    }
}

/// A `stderr` writer that suspends progress bar drawing around each write, so
/// log lines and bars don't interleave. Handed to `tracing` at startup.
#[derive(Clone)]
pub struct SafeStderrWriter {
    ui: Ui,
}

impl io::Write for SafeStderrWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ui.multi_progress().suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ui.multi_progress().suspend(|| io::stderr().flush())
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_vectored(bufs))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_all(buf))
    }

    fn write_fmt(&mut self, fmt: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_fmt(fmt))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SafeStderrWriter {
    type Writer = SafeStderrWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
