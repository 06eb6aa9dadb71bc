//! Matcher policy, spec §4.3.

use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherPolicy {
    /// Absolute tolerance on exact-match comparisons (default 0.0, spec §4.3).
    pub amount_tolerance_pct: f64,
    /// Abs. currency amount under which short remainders are auto-written-off.
    pub short_write_off_threshold: Money,
    /// Maximum payment amount for autonomous posting; above this the result
    /// is forced to `requires_human_review=true` regardless of match class.
    pub auto_apply_ceiling: Option<Money>,
    /// If true and `customer_identifier` is absent or mismatched, downgrade
    /// to `RequiresReview`.
    pub require_customer_match: bool,
    /// If false, multi-invoice allocations require exact sum match (rule 3
    /// is skipped and rule 4/5 never partially allocate beyond one invoice).
    pub allow_partial_allocation: bool,
    /// If true, only rules 2/3 (perfect matches) qualify for autonomous
    /// posting; everything else is forced to `RequiresReview` (§6 config).
    pub perfect_match_only: bool,
}

impl Default for MatcherPolicy {
    fn default() -> Self {
        MatcherPolicy {
            amount_tolerance_pct: 0.0,
            short_write_off_threshold: Money::zero(),
            auto_apply_ceiling: None,
            require_customer_match: false,
            allow_partial_allocation: true,
            perfect_match_only: false,
        }
    }
}
