use async_trait::async_trait;
use aw_alerting::{Alert, Notifier};
use aw_models::AwError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Keeps every alert it is handed; can be switched to fail on demand.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), AwError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AwError::NotificationError {
                reason: "relay unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
