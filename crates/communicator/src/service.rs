//! `Dispatch(event)` (spec §4.5): render the named template, rate-limit
//! per recipient, hand the message to the configured transport, retrying
//! transient failures with backoff up to a configurable cap.

use std::sync::Arc;
use std::time::Duration;

use cash_common::domain::{CommunicationKind, DeliveryStatus};
use cash_common::ids::TransactionId;

use crate::error::CommunicatorError;
use crate::ratelimit::RateLimiter;
use crate::template::{render, TemplateRegistry};
use crate::transport::NotificationTransport;

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub transaction_id: Option<TransactionId>,
    pub kind: CommunicationKind,
    pub recipient: String,
    pub template_name: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub delivery_id: uuid::Uuid,
    pub status: DeliveryStatus,
    pub rendered_subject: Option<String>,
    pub rendered_body: Option<String>,
    pub error: Option<String>,
}

pub struct Communicator {
    registry: Box<dyn TemplateRegistry>,
    transport: Arc<dyn NotificationTransport>,
    rate_limiter: RateLimiter,
    max_attempts: u32,
    max_total_wait: Duration,
}

impl Communicator {
    pub fn new(
        registry: Box<dyn TemplateRegistry>,
        transport: Arc<dyn NotificationTransport>,
        rate_limit_per_minute: u32,
        max_attempts: u32,
        max_total_wait: Duration,
    ) -> Self {
        Communicator {
            registry,
            transport,
            rate_limiter: RateLimiter::new(rate_limit_per_minute),
            max_attempts,
            max_total_wait,
        }
    }

    #[tracing::instrument(skip(self, request), fields(template = %request.template_name, recipient = %request.recipient))]
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome, CommunicatorError> {
        let delivery_id = uuid::Uuid::new_v4();

        let template = self
            .registry
            .get(&request.template_name)
            .ok_or_else(|| CommunicatorError::TemplateNotFound(request.template_name.clone()))?;

        let (subject, body) = render(&template, &request.data)?;

        if !self.rate_limiter.try_acquire(&request.recipient) {
            return Ok(DispatchOutcome {
                delivery_id,
                status: DeliveryStatus::Queued,
                rendered_subject: Some(subject),
                rendered_body: Some(body),
                error: None,
            });
        }

        let transport = self.transport.clone();
        let recipient = request.recipient.clone();
        let subject_for_retry = subject.clone();
        let body_for_retry = body.clone();

        let result = cash_common::backoff::retry_with_backoff(
            self.max_attempts,
            self.max_total_wait,
            |_e: &CommunicatorError| true,
            || {
                let transport = transport.clone();
                let recipient = recipient.clone();
                let subject = subject_for_retry.clone();
                let body = body_for_retry.clone();
                async move { transport.send(&recipient, &subject, &body).await }
            },
        )
        .await;

        match result {
            Ok(()) => Ok(DispatchOutcome {
                delivery_id,
                status: DeliveryStatus::Sent,
                rendered_subject: Some(subject),
                rendered_body: Some(body),
                error: None,
            }),
            Err(e) => Ok(DispatchOutcome {
                delivery_id,
                status: DeliveryStatus::Failed,
                rendered_subject: Some(subject),
                rendered_body: Some(body),
                error: Some(e.to_string()),
            }),
        }
    }
}


impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator").finish_non_exhaustive()
    }
}
