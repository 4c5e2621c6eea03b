use crate::domain::errors::DomainError;
use crate::domain::ports::Notifier;

/// Hands outbound messages to the process log instead of a mail gateway.
/// The real delivery collaborator is external; subjects and bodies arrive
/// here fully rendered.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DomainError> {
        log::info!(
            "outbound notification to {recipient}: {subject} ({} chars)",
            body.len()
        );
        Ok(())
    }
}
