//! The cascading allocation algorithm (spec §4.3). Pure, deterministic, no
//! I/O — grounded on the teacher's `orderbook::trading` matching functions
//! (pure price/quantity matching over in-memory order lists), generalized
//! here to invoice allocation with an explicit post-condition check.

use cash_common::domain::{
    DiscrepancyCode, Invoice, MatchResult, PaymentTransaction, ProcessingStatus, ALGORITHM_VERSION,
};
use cash_common::ids::CustomerId;
use cash_common::money::Money;
use cash_common::policy::MatcherPolicy;
use cash_common::InvoicePaymentMatch;

use crate::error::MatchError;

/// What the Orchestrator should do next with a completed `MatchResult`,
/// spec §4.3 "Next-action recommendation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    PostThenConfirmOptional,
    PostThenCustomerClarification,
    PostNoCommunication,
    PostThenInternalAlert,
    NoPostInternalAlert,
}

#[derive(Debug, Clone)]
pub struct MatchInput<'a> {
    pub payment: &'a PaymentTransaction,
    /// Whether any candidate ids were extracted at all (distinguishes
    /// discrepancy `InvalidInvoice` from `None` in rule 6).
    pub had_candidates: bool,
    pub invoices: Vec<Invoice>,
    pub policy: &'a MatcherPolicy,
}

#[derive(Debug, Clone)]
pub struct MatchOutput {
    pub result: MatchResult,
    pub matches: Vec<InvoicePaymentMatch>,
    pub next_action: NextAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    CurrencyMismatch,
    PerfectOneToOne,
    PerfectOneToN,
    SequentialShort,
    OverpaymentWrittenOff,
    OverpaymentEscalated,
    NoCandidates,
}

pub fn allocate(input: MatchInput<'_>) -> Result<MatchOutput, MatchError> {
    let start = std::time::Instant::now();
    let payment_amount = input.payment.amount;

    let (rule, status, discrepancy, confidence, matches) = run_cascade(&input);

    let applied_total: Money = matches.iter().map(|m| m.amount_applied).sum();
    let unapplied_amount = payment_amount
        .checked_sub(applied_total)
        .ok_or_else(|| MatchError::InvariantViolation("unapplied amount underflowed".into()))?;

    verify_invariants(payment_amount, applied_total, unapplied_amount, &matches, &input.invoices)?;

    let (status, requires_human_review) =
        apply_policy_gates(input.policy, payment_amount, input.payment.customer_identifier.as_ref(), &input.invoices, rule, status);

    let next_action = next_action_for(status, discrepancy, requires_human_review);

    let result = MatchResult {
        transaction_id: input.payment.transaction_id.clone(),
        status,
        unapplied_amount,
        discrepancy_code: discrepancy,
        confidence,
        algorithm_version: ALGORITHM_VERSION.to_owned(),
        log_entry: log_entry_for(rule, &matches, unapplied_amount),
        requires_human_review,
        processing_time_ms: start.elapsed().as_millis() as u64,
    };

    Ok(MatchOutput { result, matches, next_action })
}

fn run_cascade(
    input: &MatchInput<'_>,
) -> (Rule, ProcessingStatus, DiscrepancyCode, f64, Vec<InvoicePaymentMatch>) {
    let payment_amount = input.payment.amount;

    if input.invoices.is_empty() {
        let discrepancy = if input.had_candidates {
            DiscrepancyCode::InvalidInvoice
        } else {
            DiscrepancyCode::None
        };
        return (Rule::NoCandidates, ProcessingStatus::Unmatched, discrepancy, 0.0, Vec::new());
    }

    // Rule 1: currency guard.
    if input
        .invoices
        .iter()
        .any(|inv| inv.currency != input.payment.currency)
    {
        return (
            Rule::CurrencyMismatch,
            ProcessingStatus::Unmatched,
            DiscrepancyCode::CurrencyMismatch,
            0.0,
            Vec::new(),
        );
    }

    let tolerance = tolerance_amount(input.policy, payment_amount);

    // Rule 2: perfect 1:1 -- exactly one candidate whose amount_due equals
    // the payment amount within tolerance.
    let exact_matches: Vec<&Invoice> = input
        .invoices
        .iter()
        .filter(|inv| within_tolerance(inv.amount_due, payment_amount, tolerance))
        .collect();
    if exact_matches.len() == 1 {
        let inv = exact_matches[0];
        let m = vec![InvoicePaymentMatch {
            invoice_id: inv.invoice_id.clone(),
            erp_system: inv.erp_system.clone(),
            amount_applied: inv.amount_due,
        }];
        return (Rule::PerfectOneToOne, ProcessingStatus::Matched, DiscrepancyCode::None, 0.99, m);
    }

    // Rule 3: perfect 1:N -- sum of all candidates' amount_due equals the
    // payment amount exactly. Policy-gated: `allow_partial_allocation =
    // false` means a payment never spreads across more than one invoice.
    let sum_due: Money = input.invoices.iter().map(|inv| inv.amount_due).sum();
    if input.policy.allow_partial_allocation && within_tolerance(sum_due, payment_amount, tolerance) {
        let mut sorted = sorted_candidates(&input.invoices);
        sorted.sort_by(|a, b| a.invoice_id.cmp(&b.invoice_id));
        let m: Vec<InvoicePaymentMatch> = sorted
            .iter()
            .map(|inv| InvoicePaymentMatch {
                invoice_id: inv.invoice_id.clone(),
                erp_system: inv.erp_system.clone(),
                amount_applied: inv.amount_due,
            })
            .collect();
        return (Rule::PerfectOneToN, ProcessingStatus::Matched, DiscrepancyCode::None, 0.95, m);
    }

    // Rules 4/5 below only ever touch more than one invoice when the policy
    // allows it; otherwise they're restricted to the single oldest-due
    // candidate (doc comment on `MatcherPolicy::allow_partial_allocation`).
    let sorted = sorted_candidates(&input.invoices);
    let candidates: &[Invoice] =
        if input.policy.allow_partial_allocation { &sorted } else { &sorted[..1.min(sorted.len())] };
    let candidate_sum: Money = candidates.iter().map(|inv| inv.amount_due).sum();

    if candidate_sum.as_decimal() > payment_amount.as_decimal() {
        // Rule 4: sequential short-payment fill, oldest-first.
        let mut remaining = payment_amount;
        let mut matches = Vec::new();
        for inv in candidates {
            if remaining.is_zero() {
                break;
            }
            let apply = if remaining.as_decimal() >= inv.amount_due.as_decimal() {
                inv.amount_due
            } else {
                remaining
            };
            if apply.is_zero() {
                continue;
            }
            matches.push(InvoicePaymentMatch {
                invoice_id: inv.invoice_id.clone(),
                erp_system: inv.erp_system.clone(),
                amount_applied: apply,
            });
            remaining = remaining
                .checked_sub(apply)
                .expect("apply is bounded by remaining");
        }
        return (
            Rule::SequentialShort,
            ProcessingStatus::PartiallyMatched,
            DiscrepancyCode::ShortPayment,
            0.85,
            matches,
        );
    }

    // Rule 5: over-payment -- all candidates can be fully paid.
    let remainder = payment_amount
        .checked_sub(candidate_sum)
        .expect("candidate_sum < payment_amount in this branch");
    let matches: Vec<InvoicePaymentMatch> = candidates
        .iter()
        .map(|inv| InvoicePaymentMatch {
            invoice_id: inv.invoice_id.clone(),
            erp_system: inv.erp_system.clone(),
            amount_applied: inv.amount_due,
        })
        .collect();

    if remainder.as_decimal() <= input.policy.short_write_off_threshold.as_decimal() {
        (
            Rule::OverpaymentWrittenOff,
            ProcessingStatus::Matched,
            DiscrepancyCode::OverPayment,
            0.80,
            matches,
        )
    } else {
        (
            Rule::OverpaymentEscalated,
            ProcessingStatus::PartiallyMatched,
            DiscrepancyCode::OverPayment,
            0.70,
            matches,
        )
    }
}

/// Oldest-first with `invoice_id` tie-break: nulls-last due dates, spec §4.3.
fn sorted_candidates(invoices: &[Invoice]) -> Vec<Invoice> {
    let mut v = invoices.to_vec();
    v.sort_by(|a, b| match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.invoice_id.cmp(&b.invoice_id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.invoice_id.cmp(&b.invoice_id),
    });
    v
}

fn tolerance_amount(policy: &MatcherPolicy, payment_amount: Money) -> Money {
    if policy.amount_tolerance_pct <= 0.0 {
        return Money::zero();
    }
    let pct = rust_decimal::Decimal::try_from(policy.amount_tolerance_pct).unwrap_or_default();
    Money::new(payment_amount.as_decimal() * pct / rust_decimal::Decimal::from(100))
}

fn within_tolerance(a: Money, b: Money, tolerance: Money) -> bool {
    let diff = (a.as_decimal() - b.as_decimal()).abs();
    diff <= tolerance.as_decimal()
}

fn apply_policy_gates(
    policy: &MatcherPolicy,
    payment_amount: Money,
    customer_identifier: Option<&CustomerId>,
    invoices: &[Invoice],
    rule: Rule,
    status: ProcessingStatus,
) -> (ProcessingStatus, bool) {
    if status == ProcessingStatus::Unmatched {
        return (status, true);
    }

    let mut requires_review = false;

    if policy.require_customer_match {
        let mismatched = match customer_identifier {
            None => true,
            Some(cust) => invoices.iter().any(|inv| &inv.customer_id != cust),
        };
        if mismatched {
            requires_review = true;
        }
    }

    if let Some(ceiling) = policy.auto_apply_ceiling {
        if payment_amount.as_decimal() > ceiling.as_decimal() {
            requires_review = true;
        }
    }

    if policy.perfect_match_only && !matches!(rule, Rule::PerfectOneToOne | Rule::PerfectOneToN) {
        requires_review = true;
    }

    if requires_review {
        (ProcessingStatus::RequiresReview, true)
    } else {
        (status, false)
    }
}

fn next_action_for(status: ProcessingStatus, discrepancy: DiscrepancyCode, requires_review: bool) -> NextAction {
    if requires_review || status == ProcessingStatus::RequiresReview || status == ProcessingStatus::Unmatched {
        return NextAction::NoPostInternalAlert;
    }
    match (status, discrepancy) {
        (ProcessingStatus::Matched, DiscrepancyCode::None) => NextAction::PostThenConfirmOptional,
        (ProcessingStatus::Matched, DiscrepancyCode::OverPayment) => NextAction::PostNoCommunication,
        (ProcessingStatus::PartiallyMatched, DiscrepancyCode::ShortPayment) => {
            NextAction::PostThenCustomerClarification
        }
        (ProcessingStatus::PartiallyMatched, DiscrepancyCode::OverPayment) => {
            NextAction::PostThenInternalAlert
        }
        _ => NextAction::NoPostInternalAlert,
    }
}

fn log_entry_for(rule: Rule, matches: &[InvoicePaymentMatch], unapplied: Money) -> String {
    format!(
        "rule={rule:?} invoices_applied={count} unapplied={unapplied}",
        rule = rule,
        count = matches.len(),
        unapplied = unapplied,
    )
}

fn verify_invariants(
    payment_amount: Money,
    applied_total: Money,
    unapplied_amount: Money,
    matches: &[InvoicePaymentMatch],
    invoices: &[Invoice],
) -> Result<(), MatchError> {
    let reconstructed = applied_total
        .checked_add(unapplied_amount)
        .ok_or_else(|| MatchError::InvariantViolation("amount overflow".into()))?;
    if reconstructed != payment_amount {
        return Err(MatchError::InvariantViolation(format!(
            "applied {applied_total} + unapplied {unapplied_amount} != payment {payment_amount}"
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for m in matches {
        if !m.amount_applied.as_decimal().is_sign_positive() || m.amount_applied.is_zero() {
            return Err(MatchError::InvariantViolation(format!(
                "invoice {} has non-positive amount_applied",
                m.invoice_id
            )));
        }
        let invoice = invoices
            .iter()
            .find(|inv| inv.invoice_id == m.invoice_id && inv.erp_system == m.erp_system);
        if let Some(invoice) = invoice {
            if m.amount_applied.as_decimal() > invoice.amount_due.as_decimal() {
                return Err(MatchError::InvariantViolation(format!(
                    "invoice {} over-allocated: {} > amount_due {}",
                    m.invoice_id, m.amount_applied, invoice.amount_due
                )));
            }
        }
        if !seen.insert((m.invoice_id.clone(), m.erp_system.clone())) {
            return Err(MatchError::InvariantViolation(format!(
                "invoice {} allocated twice",
                m.invoice_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cash_common::domain::InvoiceStatus;
    use cash_common::ids::{CustomerId, ErpSystem, InvoiceId};
    use cash_common::ids::TransactionId;
    use cash_common::money::Currency;
    use time::OffsetDateTime;

    use super::*;

    fn money(s: &str) -> Money {
        Money::parse_canonical(s).unwrap()
    }

    fn eur() -> Currency {
        Currency::parse("EUR").unwrap()
    }

    fn txn(id: &str, amount: &str) -> PaymentTransaction {
        PaymentTransaction {
            transaction_id: TransactionId::new(id),
            source_account_ref: "ACC-1".to_owned(),
            amount: money(amount),
            currency: eur(),
            value_date: OffsetDateTime::now_utc(),
            raw_remittance_data: String::new(),
            customer_identifier: None,
            associated_document_uris: Vec::new(),
            processing_status: cash_common::domain::ProcessingStatus::Processing,
        }
    }

    fn invoice(id: &str, amount_due: &str, due_date: Option<OffsetDateTime>) -> Invoice {
        Invoice {
            invoice_id: InvoiceId::new(id),
            erp_system: ErpSystem::new("netsuite"),
            customer_id: CustomerId::new("CUST-1"),
            original_amount: money(amount_due),
            amount_due: money(amount_due),
            currency: eur(),
            status: InvoiceStatus::Open,
            due_date,
            erp_record_id: format!("erp-{id}"),
            fetched_at: OffsetDateTime::now_utc(),
        }
    }

    fn policy() -> MatcherPolicy {
        MatcherPolicy::default()
    }

    // S1: perfect 1:1 match.
    #[test]
    fn s1_perfect_one_to_one() {
        let payment = txn("TXN-001", "1000.00");
        let p = policy();
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV-12345", "1000.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::Matched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::None);
        assert_eq!(out.result.unapplied_amount, Money::zero());
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].amount_applied, money("1000.00"));
        assert_eq!(out.next_action, NextAction::PostThenConfirmOptional);
    }

    // S2: perfect 1:N match.
    #[test]
    fn s2_perfect_one_to_n() {
        let payment = txn("TXN-002", "1500.00");
        let p = policy();
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV-1", "600.00", None), invoice("INV-2", "900.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::Matched);
        assert_eq!(out.result.unapplied_amount, Money::zero());
        assert_eq!(out.matches.len(), 2);
        let total: Money = out.matches.iter().map(|m| m.amount_applied).sum();
        assert_eq!(total, money("1500.00"));
    }

    // S3: short payment, sequential fill oldest-first.
    #[test]
    fn s3_sequential_short_fill() {
        let d1 = OffsetDateTime::parse(
            "2024-01-01T00:00:00Z",
            &time::format_description::well_known::Rfc3339,
        )
        .unwrap();
        let d2 = OffsetDateTime::parse(
            "2024-02-01T00:00:00Z",
            &time::format_description::well_known::Rfc3339,
        )
        .unwrap();
        let payment = txn("TXN-003", "800.00");
        let p = policy();
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![
                invoice("INV-B", "500.00", Some(d2)),
                invoice("INV-A", "500.00", Some(d1)),
            ],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::PartiallyMatched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::ShortPayment);
        assert_eq!(out.result.unapplied_amount, Money::zero());
        assert_eq!(out.matches[0].invoice_id, InvoiceId::new("INV-A"));
        assert_eq!(out.matches[0].amount_applied, money("500.00"));
        assert_eq!(out.matches[1].invoice_id, InvoiceId::new("INV-B"));
        assert_eq!(out.matches[1].amount_applied, money("300.00"));
        assert_eq!(out.next_action, NextAction::PostThenCustomerClarification);
    }

    // S4: over-payment below write-off threshold.
    #[test]
    fn s4_overpayment_written_off() {
        let payment = txn("TXN-004", "1005.00");
        let mut p = policy();
        p.short_write_off_threshold = money("10.00");
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV", "1000.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::Matched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::OverPayment);
        // Conservation invariant (spec §8.1) takes precedence: the 5.00
        // remainder is never silently dropped from the ledger.
        assert_eq!(out.result.unapplied_amount, money("5.00"));
        assert_eq!(out.next_action, NextAction::PostNoCommunication);
    }

    // S5: over-payment above threshold.
    #[test]
    fn s5_overpayment_escalated() {
        let payment = txn("TXN-005", "1200.00");
        let mut p = policy();
        p.short_write_off_threshold = money("10.00");
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV", "1000.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::PartiallyMatched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::OverPayment);
        assert_eq!(out.result.unapplied_amount, money("200.00"));
        assert_eq!(out.next_action, NextAction::PostThenInternalAlert);
    }

    // S6: unmatched, no extractor hits.
    #[test]
    fn s6_unmatched_no_candidates() {
        let payment = txn("TXN-006", "500.00");
        let p = policy();
        let input = MatchInput { payment: &payment, had_candidates: false, invoices: vec![], policy: &p };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::Unmatched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::None);
        assert_eq!(out.result.unapplied_amount, money("500.00"));
        assert_eq!(out.next_action, NextAction::NoPostInternalAlert);
    }

    #[test]
    fn candidates_but_none_found_in_erp_is_invalid_invoice() {
        let payment = txn("TXN-006b", "500.00");
        let p = policy();
        let input = MatchInput { payment: &payment, had_candidates: true, invoices: vec![], policy: &p };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::InvalidInvoice);
    }

    // S7: currency mismatch.
    #[test]
    fn s7_currency_mismatch() {
        let payment = txn("TXN-007", "1000.00");
        let mut payment = payment;
        payment.currency = Currency::parse("USD").unwrap();
        let p = policy();
        let mut inv = invoice("INV-EU", "1000.00", None);
        inv.currency = eur();
        let input = MatchInput { payment: &payment, had_candidates: true, invoices: vec![inv], policy: &p };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::Unmatched);
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::CurrencyMismatch);
        assert_eq!(out.result.confidence, 0.0);
        assert_eq!(out.next_action, NextAction::NoPostInternalAlert);
    }

    #[test]
    fn require_customer_match_downgrades_to_review() {
        let payment = txn("TXN-008", "1000.00");
        let mut p = policy();
        p.require_customer_match = true;
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV", "1000.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::RequiresReview);
        assert!(out.result.requires_human_review);
        assert_eq!(out.next_action, NextAction::NoPostInternalAlert);
    }

    #[test]
    fn auto_apply_ceiling_forces_review() {
        let payment = txn("TXN-009", "1000.00");
        let mut p = policy();
        p.auto_apply_ceiling = Some(money("500.00"));
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV", "1000.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::RequiresReview);
    }

    #[test]
    fn allow_partial_allocation_false_restricts_to_one_invoice() {
        let payment = txn("TXN-010b", "1500.00");
        let mut p = policy();
        p.allow_partial_allocation = false;
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV-1", "600.00", None), invoice("INV-2", "900.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        // Would be a perfect 1:N match (rule 3) if partial allocation were
        // allowed; with it disabled only the oldest-due candidate is touched.
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].invoice_id, InvoiceId::new("INV-1"));
        assert_eq!(out.result.discrepancy_code, DiscrepancyCode::OverPayment);
    }

    #[test]
    fn perfect_match_only_downgrades_short_payment() {
        let payment = txn("TXN-010", "800.00");
        let mut p = policy();
        p.perfect_match_only = true;
        let input = MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: vec![invoice("INV-A", "500.00", None), invoice("INV-B", "500.00", None)],
            policy: &p,
        };
        let out = allocate(input).unwrap();
        assert_eq!(out.result.status, ProcessingStatus::RequiresReview);
    }

    #[test]
    fn confidence_ordering_matched_over_partial_over_unmatched() {
        // spec §9: assert ordering, not exact magnitudes.
        let p = policy();

        let perfect_txn = txn("A", "1000.00");
        let perfect = allocate(MatchInput {
            payment: &perfect_txn,
            had_candidates: true,
            invoices: vec![invoice("I1", "1000.00", None)],
            policy: &p,
        })
        .unwrap();

        let short_txn = txn("B", "400.00");
        let short = allocate(MatchInput {
            payment: &short_txn,
            had_candidates: true,
            invoices: vec![invoice("I2", "1000.00", None)],
            policy: &p,
        })
        .unwrap();

        let unmatched_txn = txn("C", "400.00");
        let unmatched = allocate(MatchInput {
            payment: &unmatched_txn,
            had_candidates: false,
            invoices: vec![],
            policy: &p,
        })
        .unwrap();

        assert!(perfect.result.confidence > short.result.confidence);
        assert!(short.result.confidence > unmatched.result.confidence);
    }

    #[test]
    fn determinism_same_input_same_output() {
        let payment = txn("TXN-011", "800.00");
        let p = policy();
        let invoices = vec![invoice("INV-A", "500.00", None), invoice("INV-B", "500.00", None)];
        let r1 = allocate(MatchInput {
            payment: &payment,
            had_candidates: true,
            invoices: invoices.clone(),
            policy: &p,
        })
        .unwrap();
        let r2 = allocate(MatchInput { payment: &payment, had_candidates: true, invoices, policy: &p })
            .unwrap();
        assert_eq!(r1.result.status, r2.result.status);
        assert_eq!(r1.result.unapplied_amount, r2.result.unapplied_amount);
        assert_eq!(
            r1.matches.iter().map(|m| m.amount_applied).collect::<Vec<_>>(),
            r2.matches.iter().map(|m| m.amount_applied).collect::<Vec<_>>()
        );
    }

    proptest::proptest! {
        #[test]
        fn amount_conservation_holds(due1 in 1i64..100_000, due2 in 1i64..100_000, paid in 1i64..200_000) {
            let payment = txn("PROP", &format!("{}.00", paid));
            let p = policy();
            let invoices = vec![
                invoice("INV-A", &format!("{}.00", due1), None),
                invoice("INV-B", &format!("{}.00", due2), None),
            ];
            if let Ok(out) = allocate(MatchInput { payment: &payment, had_candidates: true, invoices, policy: &p }) {
                let applied: Money = out.matches.iter().map(|m| m.amount_applied).sum();
                proptest::prop_assert_eq!(applied + out.result.unapplied_amount, payment.amount);
            }
        }
    }

}
