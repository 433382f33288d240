//! User-facing collaborators of the move pipeline: transient notifications
//! and the self-evaluation flow opener.

use std::str::FromStr;

use tracing::{debug, error, info, warn};

use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::Info | Self::Success => "dialog-information",
            Self::Warning => "dialog-warning",
            Self::Error => "dialog-error",
        }
    }
}

/// Sink for dismissible, auto-expiring messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Routes the user into the out-of-band self-evaluation step for a task.
pub trait SelfEvaluationOpener: Send + Sync {
    fn open_self_evaluation(&self, task_id: &TaskId);
}

/// Notification backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationBackend {
    /// No notifications
    None,
    /// Written to the log only
    #[default]
    Log,
    /// System notifications only (via notify-rust)
    System,
    /// Both log and system notifications
    Both,
}

impl NotificationBackend {
    /// Parse backend from settings value (case-insensitive)
    pub fn from_settings_value(s: &str) -> Option<Self> {
        Self::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Log => "log",
            Self::System => "system",
            Self::Both => "both",
        }
    }
}

impl FromStr for NotificationBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "log" => Ok(Self::Log),
            "system" => Ok(Self::System),
            "both" => Ok(Self::Both),
            _ => Err(()),
        }
    }
}

fn backend_targets(backend: NotificationBackend) -> (bool, bool) {
    match backend {
        NotificationBackend::None => (false, false),
        NotificationBackend::Log => (true, false),
        NotificationBackend::System => (false, true),
        NotificationBackend::Both => (true, true),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackendNotifier {
    backend: NotificationBackend,
    display_duration_ms: u64,
}

impl BackendNotifier {
    pub fn new(backend: NotificationBackend, display_duration_ms: u64) -> Self {
        Self {
            backend,
            display_duration_ms,
        }
    }
}

impl Notifier for BackendNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        let (send_log, send_system) = backend_targets(self.backend);
        if !send_log && !send_system {
            debug!(message, "notification skipped (backend is none)");
            return;
        }

        if send_log {
            match severity {
                Severity::Info | Severity::Success => {
                    info!(severity = severity.as_str(), "{message}")
                }
                Severity::Warning => warn!(severity = severity.as_str(), "{message}"),
                Severity::Error => error!(severity = severity.as_str(), "{message}"),
            }
        }

        if send_system {
            send_system_notification(message, severity, self.display_duration_ms);
        }
    }
}

fn send_system_notification(message: &str, severity: Severity, display_duration_ms: u64) {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let timeout_ms = display_duration_ms.min(u32::MAX as u64) as u32;
        debug!(message, timeout_ms, "sending system notification");

        let notification_result = notify_rust::Notification::new()
            .summary("Objective Board")
            .body(message)
            .icon(severity.icon())
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show();

        if let Err(err) = notification_result {
            warn!(error = %err, "failed to send system notification");
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = (severity, display_duration_ms);
        debug!(message, "system notifications not supported on this OS");
    }
}

/// Opens the self-evaluation page in a browser when a URL template is
/// configured; otherwise prints what the user has to do.
#[derive(Debug, Clone, Default)]
pub struct BrowserSelfEvaluation {
    url_template: String,
}

impl BrowserSelfEvaluation {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    pub fn url_for(&self, task_id: &TaskId) -> Option<String> {
        let template = self.url_template.trim();
        if template.is_empty() {
            return None;
        }
        let encoded = urlencoding::encode(task_id.as_str());
        Some(template.replace("{task_id}", &encoded))
    }
}

impl SelfEvaluationOpener for BrowserSelfEvaluation {
    fn open_self_evaluation(&self, task_id: &TaskId) {
        info!(%task_id, "opening self-evaluation flow");

        let Some(url) = self.url_for(task_id) else {
            eprintln!("Task {task_id} needs a self-evaluation before it can be marked done.");
            return;
        };

        if let Err(err) = open::that(&url) {
            warn!(%task_id, %url, error = %err, "failed to launch browser");
            eprintln!("Complete the self-evaluation for task {task_id} at {url}");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) messages: Mutex<Vec<(String, Severity)>>,
    }

    impl RecordingNotifier {
        pub(crate) fn take(&self) -> Vec<(String, Severity)> {
            std::mem::take(&mut *self.messages.lock().expect("notifier lock"))
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, severity: Severity) {
            self.messages
                .lock()
                .expect("notifier lock")
                .push((message.to_string(), severity));
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSelfEvaluation {
        pub(crate) opened: Mutex<Vec<TaskId>>,
    }

    impl RecordingSelfEvaluation {
        pub(crate) fn take(&self) -> Vec<TaskId> {
            std::mem::take(&mut *self.opened.lock().expect("opener lock"))
        }
    }

    impl SelfEvaluationOpener for RecordingSelfEvaluation {
        fn open_self_evaluation(&self, task_id: &TaskId) {
            self.opened
                .lock()
                .expect("opener lock")
                .push(task_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("log", Some(NotificationBackend::Log))]
    #[case("LOG", Some(NotificationBackend::Log))]
    #[case(" system ", Some(NotificationBackend::System))]
    #[case("Both", Some(NotificationBackend::Both))]
    #[case("none", Some(NotificationBackend::None))]
    #[case("tmux", None)]
    #[case("", None)]
    fn backend_parses_settings_value(
        #[case] raw: &str,
        #[case] expected: Option<NotificationBackend>,
    ) {
        assert_eq!(NotificationBackend::from_settings_value(raw), expected);
    }

    #[test]
    fn backend_roundtrips_through_as_str() {
        for backend in [
            NotificationBackend::None,
            NotificationBackend::Log,
            NotificationBackend::System,
            NotificationBackend::Both,
        ] {
            assert_eq!(
                NotificationBackend::from_settings_value(backend.as_str()),
                Some(backend)
            );
        }
        assert_eq!(NotificationBackend::default(), NotificationBackend::Log);
    }

    #[test]
    fn backend_targets_split_log_and_system() {
        assert_eq!(backend_targets(NotificationBackend::None), (false, false));
        assert_eq!(backend_targets(NotificationBackend::Log), (true, false));
        assert_eq!(backend_targets(NotificationBackend::System), (false, true));
        assert_eq!(backend_targets(NotificationBackend::Both), (true, true));
    }

    #[test]
    fn self_evaluation_url_fills_task_id() {
        let opener = BrowserSelfEvaluation::new("https://goals.example/tasks/{task_id}/evaluate");
        assert_eq!(
            opener.url_for(&TaskId::new("task 7")).as_deref(),
            Some("https://goals.example/tasks/task%207/evaluate")
        );
        assert_eq!(BrowserSelfEvaluation::new("  ").url_for(&TaskId::new("x")), None);
    }

    #[test]
    fn log_only_notifier_does_not_panic_without_subscriber() {
        BackendNotifier::new(NotificationBackend::Log, 4_000)
            .notify("Failed to move task", Severity::Error);
        BackendNotifier::new(NotificationBackend::None, 4_000)
            .notify("ignored", Severity::Info);
    }
}
