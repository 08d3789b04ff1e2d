//! Live per-strategy status lines and report formatting.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pdfcrack_attack::Progress;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:<12} {pos:>12} tried  {msg}";
const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:<12} [{bar:30.cyan/blue}] {percent:>3}% {pos}/{len}  {msg}";

/// One status line per running strategy. Drawn on stderr and hidden when it is not a terminal.
pub struct StatusBoard {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Vec::new(),
        }
    }

    /// Add a line for `name`; `total` turns the spinner into a bar.
    pub fn add(&mut self, name: &str, total: Option<u64>) -> StatusLine {
        let bar = match total {
            Some(total) if total < u64::MAX => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            _ => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                    bar.set_style(style);
                }
                bar
            }
        };
        let bar = self.multi.add(bar);
        bar.set_prefix(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        self.bars.push(bar.clone());
        StatusLine { bar }
    }

    pub fn finish(&self) {
        for bar in &self.bars {
            bar.finish_and_clear();
        }
    }
}

#[derive(Clone)]
pub struct StatusLine {
    bar: ProgressBar,
}

impl StatusLine {
    /// Progress observer that updates this line.
    pub fn observer(&self) -> impl Fn(Progress) + Send + Sync + 'static {
        let bar = self.bar.clone();
        move |progress: Progress| {
            bar.set_position(progress.attempts);
            bar.set_message(format!(
                "{} p/s  last: {}",
                format_rate(progress.rate),
                truncate(&progress.current, 20)
            ));
        }
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs / 60) % 60)
    }
}

pub fn format_rate(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}k", rate / 1_000.0)
    } else {
        format!("{rate:.0}")
    }
}

/// Render recovered password bytes. Non-UTF-8 passwords (Latin-1, PDFDocEncoding) are shown
/// lossily with the exact bytes in hex alongside.
pub fn display_password(password: &[u8]) -> String {
    match std::str::from_utf8(password) {
        Ok(text) => text.to_string(),
        Err(_) => format!(
            "{} (hex: {})",
            String::from_utf8_lossy(password),
            hex::encode(password)
        ),
    }
}

/// Shorten `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
