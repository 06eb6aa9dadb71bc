//! The cascading tier dispatcher (spec §4.1): pattern tier first (never
//! fails), then layout, then cloud, stopping at the first tier whose
//! confidence clears the threshold. `tier_preference != Auto` pins a single
//! tier and surfaces its failure rather than falling through.

use std::time::{Duration, Instant};

use cash_common::domain::{DocumentParseResult, ExtractorTierKind, PerDocumentResult, TierPreference};

use crate::error::ExtractorError;
use crate::pattern;
use crate::tier::{ExtractorTier, TierInput};

const TIER_TIMEOUT: Duration = Duration::from_secs(30);
const TIER_MAX_ATTEMPTS: u32 = 3; // first attempt + 2 retries, spec §4.1.

pub struct ExtractRequest {
    pub document_uris: Vec<String>,
    pub remittance_text: String,
    pub client_id: String,
    pub tier_preference: TierPreference,
    pub confidence_threshold: f64,
}

/// `EX`'s capability seam: a conforming implementation may wire in only the
/// pattern tier (spec §9) by passing empty `layout`/`cloud`.
pub struct Extractor {
    layout: Option<Box<dyn ExtractorTier>>,
    cloud: Option<Box<dyn ExtractorTier>>,
}

impl Extractor {
    pub fn new(layout: Option<Box<dyn ExtractorTier>>, cloud: Option<Box<dyn ExtractorTier>>) -> Self {
        Extractor { layout, cloud }
    }

    pub fn pattern_only() -> Self {
        Extractor { layout: None, cloud: None }
    }

    #[tracing::instrument(skip(self, req), fields(client_id = %req.client_id))]
    pub async fn extract(&self, req: ExtractRequest) -> Result<DocumentParseResult, ExtractorError> {
        let start = Instant::now();

        match req.tier_preference {
            TierPreference::Pattern => {
                return Ok(self.pattern_result(&req, start));
            }
            TierPreference::Layout => {
                let tier = self
                    .layout
                    .as_ref()
                    .ok_or_else(|| ExtractorError::TierUnavailable(ExtractorTierKind::Layout, "not configured".into()))?;
                return self.run_forced_tier(tier.as_ref(), &req, start).await;
            }
            TierPreference::Cloud => {
                let tier = self
                    .cloud
                    .as_ref()
                    .ok_or_else(|| ExtractorError::TierUnavailable(ExtractorTierKind::Cloud, "not configured".into()))?;
                return self.run_forced_tier(tier.as_ref(), &req, start).await;
            }
            TierPreference::Auto => {}
        }

        let pattern_result = self.pattern_result(&req, start);
        if pattern_result.confidence >= req.confidence_threshold.max(0.85) {
            return Ok(pattern_result);
        }

        let mut last_result = pattern_result;
        let mut attempted = 0u8;
        let mut unavailable = 0u8;

        for tier in [self.layout.as_deref(), self.cloud.as_deref()].into_iter().flatten() {
            attempted += 1;
            match retry_tier(tier, &req).await {
                Ok(output) => {
                    let confidence = output.confidence;
                    let result = DocumentParseResult {
                        extracted_invoice_ids: output.ids,
                        confidence,
                        tier_used: tier.kind(),
                        cost_estimate: output.cost_estimate,
                        processing_time_ms: elapsed_ms(start),
                        per_document: per_document(&req),
                    };
                    if confidence >= req.confidence_threshold {
                        return Ok(result);
                    }
                    last_result = result;
                }
                Err(_) => {
                    unavailable += 1;
                }
            }
        }

        if attempted > 0 && unavailable == attempted {
            // Every configured optional tier failed: propagate unavailability
            // but keep the earlier tiers' output available to the caller
            // (spec §4.1 "Final failure ... with partial results").
            return Err(ExtractorError::AllTiersUnavailable(last_result));
        }

        Ok(last_result)
    }

    fn pattern_result(&self, req: &ExtractRequest, start: Instant) -> DocumentParseResult {
        let hits = pattern::scan(&req.remittance_text);
        let confidence = pattern::confidence(&hits);
        DocumentParseResult {
            extracted_invoice_ids: hits.ids,
            confidence,
            tier_used: ExtractorTierKind::Pattern,
            cost_estimate: 0.0,
            processing_time_ms: elapsed_ms(start),
            per_document: per_document(req),
        }
    }

    async fn run_forced_tier(
        &self,
        tier: &dyn ExtractorTier,
        req: &ExtractRequest,
        start: Instant,
    ) -> Result<DocumentParseResult, ExtractorError> {
        let output = retry_tier(tier, req).await?;
        Ok(DocumentParseResult {
            extracted_invoice_ids: output.ids,
            confidence: output.confidence,
            tier_used: tier.kind(),
            cost_estimate: output.cost_estimate,
            processing_time_ms: elapsed_ms(start),
            per_document: per_document(req),
        })
    }
}

async fn retry_tier(
    tier: &dyn ExtractorTier,
    req: &ExtractRequest,
) -> Result<crate::tier::TierOutput, ExtractorError> {
    cash_common::backoff::retry_with_backoff(
        TIER_MAX_ATTEMPTS,
        TIER_TIMEOUT,
        |_e: &ExtractorError| true,
        || {
            tier.run(TierInput {
                document_uris: &req.document_uris,
                remittance_text: &req.remittance_text,
            })
        },
    )
    .await
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn per_document(req: &ExtractRequest) -> Vec<PerDocumentResult> {
    req.document_uris
        .iter()
        .map(|uri| PerDocumentResult {
            document_uri: uri.clone(),
            extracted_ids: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::tier::TierOutput;

    struct StubTier {
        kind: ExtractorTierKind,
        calls: Arc<AtomicUsize>,
        result: Result<TierOutput, String>,
    }

    #[async_trait]
    impl ExtractorTier for StubTier {
        fn kind(&self) -> ExtractorTierKind {
            self.kind
        }

        async fn run(&self, _input: TierInput<'_>) -> Result<TierOutput, ExtractorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(o) => Ok(TierOutput {
                    ids: o.ids.clone(),
                    confidence: o.confidence,
                    cost_estimate: o.cost_estimate,
                }),
                Err(_) => Err(ExtractorError::TierUnavailable(self.kind, "stub failure".into())),
            }
        }
    }

    fn req(text: &str) -> ExtractRequest {
        ExtractRequest {
            document_uris: vec![],
            remittance_text: text.to_owned(),
            client_id: "c1".to_owned(),
            tier_preference: TierPreference::Auto,
            confidence_threshold: 0.85,
        }
    }

    #[tokio::test]
    async fn pattern_tier_short_circuits_when_confident() {
        let extractor = Extractor::pattern_only();
        let result = extractor
            .extract(req("Payment for INV-2024-1234"))
            .await
            .unwrap();
        assert_eq!(result.tier_used, ExtractorTierKind::Pattern);
        assert_eq!(result.cost_estimate, 0.0);
    }

    #[tokio::test]
    async fn falls_through_to_layout_when_pattern_unconfident() {
        let layout = Box::new(StubTier {
            kind: ExtractorTierKind::Layout,
            calls: Arc::new(AtomicUsize::new(0)),
            result: Ok(TierOutput { ids: vec!["INV-9".into()], confidence: 0.9, cost_estimate: 0.01 }),
        });
        let extractor = Extractor::new(Some(layout), None);
        let result = extractor
            .extract(req("wire transfer, no reference"))
            .await
            .unwrap();
        assert_eq!(result.tier_used, ExtractorTierKind::Layout);
        assert_eq!(result.extracted_invoice_ids, vec!["INV-9"]);
    }

    #[tokio::test]
    async fn empty_extraction_has_zero_confidence_but_timing_set() {
        let extractor = Extractor::pattern_only();
        let result = extractor.extract(req("no reference here")).await.unwrap();
        assert!(result.extracted_invoice_ids.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn all_tiers_unavailable_propagates_error() {
        let layout = Box::new(StubTier {
            kind: ExtractorTierKind::Layout,
            calls: Arc::new(AtomicUsize::new(0)),
            result: Err("down".into()),
        });
        let cloud = Box::new(StubTier {
            kind: ExtractorTierKind::Cloud,
            calls: Arc::new(AtomicUsize::new(0)),
            result: Err("down".into()),
        });
        let extractor = Extractor::new(Some(layout), Some(cloud));
        let result = extractor.extract(req("no reference here")).await;
        assert!(matches!(result, Err(ExtractorError::AllTiersUnavailable(_))));
    }

    #[tokio::test]
    async fn forced_single_tier_reports_failure_without_fallthrough() {
        let layout = Box::new(StubTier {
            kind: ExtractorTierKind::Layout,
            calls: Arc::new(AtomicUsize::new(0)),
            result: Err("down".into()),
        });
        let extractor = Extractor::new(Some(layout), None);
        let mut r = req("INV-2024-1234");
        r.tier_preference = TierPreference::Layout;
        let result = extractor.extract(r).await;
        assert!(result.is_err());
    }
}
