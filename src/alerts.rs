//! User-facing notifications and confirmation prompts.

use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertLevel {
    Success,
    Info,
    Warning,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub detail: Option<String>,
}

pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: Alert);

    fn success(&self, message: &str) {
        self.alert(Alert {
            level: AlertLevel::Success,
            message: message.to_string(),
            detail: None,
        });
    }

    fn warning(&self, message: &str) {
        self.alert(Alert {
            level: AlertLevel::Warning,
            message: message.to_string(),
            detail: None,
        });
    }

    fn danger(&self, message: &str, detail: Option<String>) {
        self.alert(Alert {
            level: AlertLevel::Danger,
            message: message.to_string(),
            detail,
        });
    }
}

/// Forwards alerts to the tracing subscriber.
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, alert: Alert) {
        let detail = alert.detail.as_deref().unwrap_or("");
        match alert.level {
            AlertLevel::Success | AlertLevel::Info => tracing::info!(detail, "{}", alert.message),
            AlertLevel::Warning => tracing::warn!(detail, "{}", alert.message),
            AlertLevel::Danger => tracing::error!(detail, "{}", alert.message),
        }
    }
}

/// Keeps every alert; used by the CLI to print a summary and by tests.
#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlerts {
    pub fn take(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.alerts.lock().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(alert);
    }
}

/// Synchronous yes/no step in front of destructive actions.
pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Confirms everything (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        true
    }
}
