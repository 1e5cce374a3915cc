use tracing::info;

/// Outbound sink for human-readable notifications (offline alerts, scheduler
/// reports). Delivery to a chat transport is a presentation concern; the
/// default implementation records them on the operator console.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(notification = %message, "notification emitted");
    }
}
