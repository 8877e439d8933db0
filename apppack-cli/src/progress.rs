//! Spinner for stack waits

use std::sync::Mutex;
use std::time::Duration;

use apppack_core::ProgressReporter;
use apppack_core::stack::StackResource;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Default)]
pub struct SpinnerReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(message: &str) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressReporter for SpinnerReporter {
    fn start(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.take() {
                previous.finish_and_clear();
            }
            *guard = Some(Self::spinner(message));
        }
    }

    fn update(&self, message: &str) {
        self.with_bar(|bar| bar.set_message(message.to_string()));
    }

    fn failure(&self, resource: &StackResource) {
        let line = format!(
            "{} {}: {}",
            "✗".red().bold(),
            resource.logical_id.bold(),
            resource.reason.as_deref().unwrap_or("no reason given").red()
        );
        match self.bar.lock().ok().as_deref().and_then(Option::as_ref) {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn finish(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
        eprintln!("{} {}", "✓".green().bold(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_without_start() {
        let reporter = SpinnerReporter::new();
        reporter.update("ignored");
        reporter.finish("done");
        assert!(reporter.bar.lock().unwrap().is_none());
    }

    #[test]
    fn test_start_replaces_spinner() {
        let reporter = SpinnerReporter::new();
        reporter.start("creating apppack-account");
        reporter.start("creating apppack-region-us-east-1");
        assert!(reporter.bar.lock().unwrap().is_some());
        reporter.finish("created");
        assert!(reporter.bar.lock().unwrap().is_none());
    }
}
