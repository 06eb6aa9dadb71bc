//! The external transport capability object (spec §4.5: "the Communicator
//! does not implement SMTP/chat protocols"). `server` wires a concrete
//! transport in; a logging no-op is provided as the default for contexts
//! that have no real transport configured.

use async_trait::async_trait;

use crate::error::CommunicatorError;

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), CommunicatorError>;
}

/// Default transport: logs the rendered message instead of delivering it.
/// Never fails, so it never models what a real transport's failure modes
/// (timeouts, 5xx) look like -- swap in a real implementation for those.
pub struct LoggingTransport;

#[async_trait]
impl NotificationTransport for LoggingTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), CommunicatorError> {
        tracing::info!(recipient, subject, body, "dispatching notification (logging transport)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_transport_never_fails() {
        let transport = LoggingTransport;
        assert!(transport.send("a@example.com", "subj", "body").await.is_ok());
    }
}
