use std::cell::RefCell;
use std::io::{self, Write};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::control::{ProgressEvent, ProgressSink};
use crate::gdc::SiteSummary;
use crate::pipeline::{AllSitesSummary, SiteOutcome};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_sites(sites: &[SiteSummary]) -> io::Result<()> {
        Self::print_json(&sites)
    }

    pub fn print_site(outcome: &SiteOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    pub fn print_all_sites(summary: &AllSitesSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Renders pipeline loops as terminal progress bars on stderr.
pub struct BarSink {
    bars: MultiProgress,
    bar: RefCell<Option<ProgressBar>>,
}

impl BarSink {
    /// Bars are drawn through `bars`, which the log writer shares.
    pub fn new(bars: MultiProgress) -> Self {
        Self {
            bars,
            bar: RefCell::new(None),
        }
    }

    fn make_bar(&self, total: u64, label: &str) -> ProgressBar {
        let bar = self.bars.add(ProgressBar::new(total));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl ProgressSink for BarSink {
    fn event(&self, event: ProgressEvent) {
        let mut slot = self.bar.borrow_mut();
        match event {
            ProgressEvent::Phase(_) => {}
            ProgressEvent::Begin { label, total } => {
                if let Some(previous) = slot.take() {
                    previous.finish_and_clear();
                }
                *slot = Some(self.make_bar(total, &label));
            }
            ProgressEvent::Tick { message } => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message(message);
                    bar.inc(1);
                }
            }
            ProgressEvent::End => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                    self.bars.remove(&bar);
                }
            }
        }
    }
}

/// Log sink for `tracing` that hides active bars while a line is written.
#[derive(Clone)]
pub struct LogWriter {
    bars: MultiProgress,
}

impl LogWriter {
    pub fn new(bars: MultiProgress) -> Self {
        Self { bars }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bars.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
