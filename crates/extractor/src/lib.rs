//! Document Intelligence extractor (EX), spec §4.1: given remittance text
//! and/or documents, returns candidate invoice identifiers with a
//! confidence score via a cost-tiered cascade (pattern -> layout -> cloud).

pub mod error;
pub mod normalize;
pub mod pattern;
pub mod service;
pub mod tier;

pub use error::ExtractorError;
pub use service::{ExtractRequest, Extractor};
pub use tier::{ExtractorTier, HttpTier, TierInput, TierOutput};
