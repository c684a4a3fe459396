use log::LevelFilter;

pub use crate::traits::Progress;

const BAR_TEMPLATE: &str = "{bar:60.cyan/cyan} {msg} {pos}/{len} [{elapsed}]";

impl Progress for indicatif::ProgressBar {
    fn inc(&self, i: u64) {
        indicatif::ProgressBar::inc(self, i)
    }

    fn finish(&self) {
        indicatif::ProgressBar::finish(self)
    }
}

impl Progress for logbar::ProgressBar {
    fn inc(&self, i: u64) {
        logbar::ProgressBar::inc(self, i as usize)
    }

    fn finish(&self) {
        logbar::ProgressBar::finish(self)
    }
}

/// Progress indicator that does nothing
pub struct NoProgress {}
impl Progress for NoProgress {
    fn inc(&self, _i: u64) {}

    fn finish(&self) {}
}

/// Don't show any progress indicator
pub const NO_PROGRESS: NoProgress = NoProgress {};

/// Progress over jobs or file transfers
///
/// On an interactive terminal this is an `indicatif` bar, otherwise a
/// `logbar`. Nothing is shown unless the log level is exactly `info`.
/// Logging is suspended until the bar is finished.
pub struct ProgressBar {
    bar: Box<dyn Progress + Send + Sync>,
    // log level to restore once the bar is finished
    suspended_level: Option<LevelFilter>,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            bar: Box::new(NO_PROGRESS),
            suspended_level: None,
        }
    }
}

impl Progress for ProgressBar {
    fn inc(&self, i: u64) {
        self.bar.inc(i);
    }

    fn finish(&self) {
        self.bar.finish();
        if let Some(level) = self.suspended_level {
            log::set_max_level(level);
        }
    }
}

impl ProgressBar {
    /// A new progress bar with the given maximum progress and message
    pub fn new(len: u64, message: &str) -> Self {
        if len == 0 || log::max_level().to_level() != Some(log::Level::Info) {
            ProgressBar::default()
        } else if console::Term::stderr().features().is_attended() {
            ProgressBar::indicatif(len, message)
        } else {
            ProgressBar::logbar(len, message)
        }
    }

    fn indicatif(len: u64, message: &str) -> Self {
        let bar = indicatif::ProgressBar::new(len);
        if let Ok(style) =
            indicatif::ProgressStyle::default_bar().template(BAR_TEMPLATE)
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_owned());
        ProgressBar {
            bar: Box::new(bar),
            suspended_level: Some(suspend_logging()),
        }
    }

    fn logbar(len: u64, message: &str) -> Self {
        let style = logbar::Style::new().indicator('█');
        eprintln!("{}", message);
        let bar = logbar::ProgressBar::with_style(len as usize, style);
        ProgressBar {
            bar: Box::new(bar),
            suspended_level: Some(suspend_logging()),
        }
    }
}

fn suspend_logging() -> LevelFilter {
    let level = log::max_level();
    log::set_max_level(LevelFilter::Off);
    level
}
