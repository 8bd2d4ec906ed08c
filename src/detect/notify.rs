use std::sync::mpsc::Sender;

/// Severity of a user-facing advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Destructive,
}

/// Short user-visible advisory (title + description + severity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    /// Advisory shown when the service falls back to simulated detections.
    pub fn simulated_detection() -> Self {
        Self {
            title: "Usando detección simulada".to_string(),
            description: "Error en la API de IA. Usando objetos de ejemplo.".to_string(),
            severity: Severity::Destructive,
        }
    }
}

/// Fire-and-forget notification sink.
///
/// Implementations must return promptly and must not panic; delivery
/// failures are swallowed.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => log::info!("{}: {}", notice.title, notice.description),
            Severity::Warning | Severity::Destructive => {
                log::warn!("{}: {}", notice.title, notice.description)
            }
        }
    }
}

/// Pushes notices onto an unbounded channel for a UI thread to drain.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: Sender<Notice>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<Notice>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Receiver may be gone; the advisory is best-effort.
        let _ = self.tx.send(notice);
    }
}
