// Property-based tests for due-date-ordered repayment allocation

use chrono::{NaiveDate, NaiveDateTime};
use loanbook::core::{AppError, Currency};
use loanbook::loans::{Loan, RepaymentAllocator, RepaymentStatus, ScheduleCalculator, ScheduledRepayment};
use proptest::prelude::*;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 2, 20)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn schedules_for(amount: i64, terms: i32) -> Vec<ScheduledRepayment> {
    let processed_at = NaiveDate::from_ymd_opt(2020, 1, 20).unwrap();
    let loan = Loan::new(
        "user-1".to_string(),
        amount,
        Currency::VND,
        terms,
        processed_at,
        processed_at.and_hms_opt(0, 0, 0).unwrap(),
    )
    .unwrap();
    ScheduleCalculator::calculate_schedules(&loan, now()).unwrap()
}

#[test]
fn test_exact_first_installment() {
    let mut schedules = schedules_for(5000, 3);

    let allocation = RepaymentAllocator::allocate(&mut schedules, 1666, now()).unwrap();

    assert_eq!(allocation.applied.len(), 1);
    assert_eq!(allocation.unapplied, 0);
    assert_eq!(schedules[0].status, RepaymentStatus::Repaid);
    assert_eq!(schedules[1].status, RepaymentStatus::Due);
    assert_eq!(schedules[2].status, RepaymentStatus::Due);
    assert_eq!(RepaymentAllocator::outstanding_total(&schedules), 3334);
}

#[test]
fn test_spill_into_second_installment() {
    let mut schedules = schedules_for(5000, 3);

    RepaymentAllocator::allocate(&mut schedules, 2000, now()).unwrap();

    assert_eq!(schedules[0].outstanding_amount, 0);
    assert_eq!(schedules[1].outstanding_amount, 1332);
    assert_eq!(schedules[1].status, RepaymentStatus::Partial);
    assert_eq!(schedules[2].outstanding_amount, 1668);
    assert_eq!(RepaymentAllocator::outstanding_total(&schedules), 3000);
}

#[test]
fn test_allocation_follows_due_date_not_slice_order() {
    let mut schedules = schedules_for(3000, 3);
    schedules.reverse();

    RepaymentAllocator::allocate(&mut schedules, 1000, now()).unwrap();

    let first = schedules
        .iter()
        .find(|s| s.installment_number == 1)
        .unwrap();
    assert_eq!(first.status, RepaymentStatus::Repaid);
    assert_eq!(RepaymentAllocator::outstanding_total(&schedules), 2000);
}

#[test]
fn test_overpayment_is_reported_unapplied() {
    let mut schedules = schedules_for(5000, 3);

    let allocation = RepaymentAllocator::allocate(&mut schedules, 6000, now()).unwrap();

    assert!(allocation.is_overpaid());
    assert_eq!(allocation.applied_total, 5000);
    assert_eq!(allocation.unapplied, 1000);
    assert!(schedules.iter().all(|s| s.outstanding_amount == 0));
}

/// Zero installments start repaid and the payment lands on the last one
#[test]
fn test_principal_smaller_than_terms() {
    let mut schedules = schedules_for(2, 3);

    let allocation = RepaymentAllocator::allocate(&mut schedules, 1, now()).unwrap();

    assert_eq!(allocation.applied.len(), 1);
    assert_eq!(allocation.applied[0].scheduled_repayment_id, schedules[2].id);
    assert_eq!(schedules[2].outstanding_amount, 1);
    assert_eq!(schedules[2].status, RepaymentStatus::Partial);
    assert_eq!(RepaymentAllocator::outstanding_total(&schedules), 1);
}

#[test]
fn test_zero_amount_rejected() {
    let mut schedules = schedules_for(5000, 3);
    let result = RepaymentAllocator::allocate(&mut schedules, 0, now());
    assert!(matches!(result, Err(AppError::Validation(_))));
}

proptest! {
    /// Any sequence of payments keeps balances non-negative, never touches
    /// repaid installments and conserves every minor unit
    #[test]
    fn prop_allocation_invariants(
        amount in 1i64..10_000_000,
        terms in 1i32..=24,
        payments in prop::collection::vec(1i64..5_000_000, 1..12),
    ) {
        let mut schedules = schedules_for(amount, terms);
        let mut paid_in = 0i64;
        let mut unapplied = 0i64;

        for payment in payments {
            let repaid_before: Vec<ScheduledRepayment> = schedules
                .iter()
                .filter(|s| s.is_repaid())
                .cloned()
                .collect();
            let outstanding_before = RepaymentAllocator::outstanding_total(&schedules);

            let allocation = RepaymentAllocator::allocate(&mut schedules, payment, now()).unwrap();

            prop_assert_eq!(allocation.applied_total + allocation.unapplied, payment);
            prop_assert_eq!(
                allocation.applied_total,
                outstanding_before.min(payment)
            );
            prop_assert!(schedules.iter().all(|s| s.outstanding_amount >= 0));
            prop_assert!(schedules.iter().all(|s| s.outstanding_amount <= s.amount));

            for before in &repaid_before {
                let after = schedules.iter().find(|s| s.id == before.id).unwrap();
                prop_assert_eq!(after, before);
                prop_assert!(allocation
                    .applied
                    .iter()
                    .all(|a| a.scheduled_repayment_id != before.id));
            }

            paid_in += allocation.applied_total;
            unapplied += allocation.unapplied;
        }

        prop_assert_eq!(
            RepaymentAllocator::outstanding_total(&schedules),
            amount - paid_in
        );
        if unapplied > 0 {
            prop_assert!(schedules.iter().all(|s| s.is_repaid()));
        }
    }

    /// An installment is partial only while an earlier one is repaid and
    /// every later one is untouched
    #[test]
    fn prop_at_most_one_partial_installment(
        amount in 1i64..1_000_000,
        terms in 1i32..=12,
        payment in 1i64..1_000_000,
    ) {
        let mut schedules = schedules_for(amount, terms);

        RepaymentAllocator::allocate(&mut schedules, payment, now()).unwrap();

        let partial = schedules
            .iter()
            .filter(|s| s.status == RepaymentStatus::Partial)
            .count();
        prop_assert!(partial <= 1);

        let statuses: Vec<RepaymentStatus> = schedules.iter().map(|s| s.status).collect();
        let first_unpaid = statuses
            .iter()
            .position(|s| *s != RepaymentStatus::Repaid)
            .unwrap_or(statuses.len());
        for status in statuses.iter().skip(first_unpaid + 1) {
            prop_assert_eq!(*status, RepaymentStatus::Due);
        }
    }
}
