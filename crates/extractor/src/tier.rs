//! Layout and Cloud tiers (spec §4.1 steps 2-3): both model an external,
//! fallible capability behind one trait so the cascade (`service.rs`) does
//! not care which concrete backend served a given tier. Grounded on the
//! teacher's `reqwest`-based HTTP clients (`trade`/`commons` talk to
//! Esplora/BitMEX the same way) generalized to a pluggable capability.

use async_trait::async_trait;
use cash_common::domain::ExtractorTierKind;

use crate::error::ExtractorError;

pub struct TierInput<'a> {
    pub document_uris: &'a [String],
    pub remittance_text: &'a str,
}

pub struct TierOutput {
    pub ids: Vec<String>,
    pub confidence: f64,
    pub cost_estimate: f64,
}

#[async_trait]
pub trait ExtractorTier: Send + Sync {
    fn kind(&self) -> ExtractorTierKind;

    async fn run(&self, input: TierInput<'_>) -> Result<TierOutput, ExtractorError>;
}

/// HTTP-backed tier calling an external layout/form-recognition service.
/// A conforming extractor implementation may ship with only the Pattern
/// tier (spec §9); this is the optional enrichment for Layout/Cloud.
pub struct HttpTier {
    kind: ExtractorTierKind,
    client: reqwest::Client,
    endpoint: String,
    cost_per_call: f64,
}

impl HttpTier {
    pub fn new(kind: ExtractorTierKind, client: reqwest::Client, endpoint: impl Into<String>, cost_per_call: f64) -> Self {
        HttpTier { kind, client, endpoint: endpoint.into(), cost_per_call }
    }
}

#[derive(serde::Serialize)]
struct TierRequest<'a> {
    document_uris: &'a [String],
    remittance_text: &'a str,
}

#[derive(serde::Deserialize)]
struct TierResponse {
    invoice_ids: Vec<String>,
    confidence: f64,
}

#[async_trait]
impl ExtractorTier for HttpTier {
    fn kind(&self) -> ExtractorTierKind {
        self.kind
    }

    async fn run(&self, input: TierInput<'_>) -> Result<TierOutput, ExtractorError> {
        let body = TierRequest {
            document_uris: input.document_uris,
            remittance_text: input.remittance_text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractorError::TierUnavailable(self.kind, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractorError::TierUnavailable(
                self.kind,
                format!("status {}", response.status()),
            ));
        }

        let parsed: TierResponse = response
            .json()
            .await
            .map_err(|e| ExtractorError::TierUnavailable(self.kind, e.to_string()))?;

        Ok(TierOutput {
            ids: parsed.invoice_ids,
            confidence: parsed.confidence,
            cost_estimate: self.cost_per_call,
        })
    }
}
