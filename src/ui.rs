use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_flag(ui_flag: &str, is_tty: bool) -> Self {
        let mode = match ui_flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Progress over a batch of images; finishes with a summary on drop.
    pub fn batch(&self, total: usize) -> BatchProgress {
        let bar = if self.pretty() {
            let bar = ProgressBar::new(total as u64);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message("detecting objects…");
            Some(bar)
        } else {
            eprintln!("==> detecting objects in {} image(s)", total);
            None
        };
        BatchProgress {
            start: Instant::now(),
            bar,
            done: std::sync::atomic::AtomicUsize::new(0),
            total,
        }
    }
}

pub struct BatchProgress {
    start: Instant,
    bar: Option<ProgressBar>,
    done: std::sync::atomic::AtomicUsize,
    total: usize,
}

impl BatchProgress {
    pub fn image_done(&self, label: &str) {
        let done = self
            .done
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        match &self.bar {
            Some(bar) => {
                bar.inc(1);
                bar.set_message(label.to_string());
            }
            None => eprintln!("  [{}/{}] {}", done, self.total, label),
        }
    }
}

impl Drop for BatchProgress {
    fn drop(&mut self) {
        let message = format!(
            "✔ {} image(s) ({})",
            self.total,
            format_duration(self.start.elapsed())
        );
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
