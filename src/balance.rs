use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::schemas::{tolerance, Expense, MemberId, Payment};

pub type BalanceMap = HashMap<MemberId, Decimal>;

/// Recompute every member's net balance from the group's raw records.
///
/// Balances are always derived from scratch rather than patched
/// incrementally, so edits and deletes upstream cannot leave drift behind.
/// Members without any activity stay at zero.
pub fn compute_balances(
    members: &[MemberId],
    expenses: &[Expense],
    payments: &[Payment],
) -> Result<BalanceMap> {
    let mut balances: BalanceMap = members
        .iter()
        .map(|id| (id.clone(), Decimal::ZERO))
        .collect();

    for expense in expenses {
        validate_expense(expense, members)?;
        if let Some(balance) = balances.get_mut(&expense.payer) {
            *balance += expense.amount;
        }
        // A payer listed in their own splits nets the difference.
        for split in &expense.splits {
            if let Some(balance) = balances.get_mut(&split.member) {
                *balance -= split.amount;
            }
        }
    }

    for payment in payments {
        validate_payment(payment, members)?;
        if let Some(balance) = balances.get_mut(&payment.payer) {
            *balance += payment.amount;
        }
        if let Some(balance) = balances.get_mut(&payment.payee) {
            *balance -= payment.amount;
        }
    }

    Ok(balances)
}

/// Checks applied both when an expense is recorded and again on every
/// recomputation, so a corrupted stored record cannot poison the balances.
pub fn validate_expense(expense: &Expense, members: &[MemberId]) -> Result<()> {
    if expense.amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount(expense.amount));
    }
    if expense.splits.is_empty() {
        return Err(Error::EmptySplits);
    }
    if !members.contains(&expense.payer) {
        return Err(Error::UnknownMember(expense.payer.clone()));
    }
    let mut split_sum = Decimal::ZERO;
    for split in &expense.splits {
        if split.amount < Decimal::ZERO {
            return Err(Error::NegativeSplit(split.amount));
        }
        if !members.contains(&split.member) {
            return Err(Error::UnknownMember(split.member.clone()));
        }
        split_sum += split.amount;
    }
    if (split_sum - expense.amount).abs() > tolerance() {
        return Err(Error::SplitMismatch {
            total: expense.amount,
            splits: split_sum,
        });
    }
    Ok(())
}

pub fn validate_payment(payment: &Payment, members: &[MemberId]) -> Result<()> {
    if payment.amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount(payment.amount));
    }
    if !members.contains(&payment.payer) {
        return Err(Error::UnknownMember(payment.payer.clone()));
    }
    if !members.contains(&payment.payee) {
        return Err(Error::UnknownMember(payment.payee.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{Category, Split};
    use chrono::Utc;
    use proptest::prelude::*;

    fn rupees(units: i64) -> Decimal {
        Decimal::new(units, 0)
    }

    fn cents(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn member_ids(ids: &[&str]) -> Vec<MemberId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn expense(amount: Decimal, payer: &str, splits: &[(&str, Decimal)]) -> Expense {
        Expense {
            id: "e1".to_string(),
            description: "dinner".to_string(),
            amount,
            category: Category::Food,
            payer: payer.to_string(),
            splits: splits
                .iter()
                .map(|(member, amount)| Split {
                    member: member.to_string(),
                    amount: *amount,
                    paid: false,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn payment(payer: &str, payee: &str, amount: Decimal) -> Payment {
        Payment {
            id: "p1".to_string(),
            payer: payer.to_string(),
            payee: payee.to_string(),
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn equal_three_way_split_paid_by_one_member() {
        let members = member_ids(&["a", "b", "c"]);
        let expenses = [expense(
            rupees(1200),
            "a",
            &[("a", rupees(400)), ("b", rupees(400)), ("c", rupees(400))],
        )];
        let balances = compute_balances(&members, &expenses, &[]).unwrap();
        assert_eq!(balances["a"], rupees(800));
        assert_eq!(balances["b"], rupees(-400));
        assert_eq!(balances["c"], rupees(-400));
    }

    #[test]
    fn inactive_member_stays_at_zero() {
        let members = member_ids(&["a", "b", "c", "idle"]);
        let expenses = [expense(
            rupees(100),
            "a",
            &[("b", rupees(50)), ("c", rupees(50))],
        )];
        let balances = compute_balances(&members, &expenses, &[]).unwrap();
        assert_eq!(balances["idle"], Decimal::ZERO);
        assert_eq!(balances["a"], rupees(100));
    }

    #[test]
    fn uneven_rounding_split_is_accepted_and_sums_to_zero() {
        let members = member_ids(&["a", "b", "c"]);
        let expenses = [expense(
            rupees(1000),
            "a",
            &[
                ("a", cents(333_33)),
                ("b", cents(333_33)),
                ("c", cents(333_34)),
            ],
        )];
        let balances = compute_balances(&members, &expenses, &[]).unwrap();
        let total: Decimal = balances.values().copied().sum();
        assert_eq!(total, Decimal::ZERO);
        assert_eq!(balances["c"], cents(-333_34));
    }

    #[test]
    fn payments_drive_a_group_to_settled() {
        let members = member_ids(&["a", "b", "c"]);
        let expenses = [expense(
            rupees(1200),
            "a",
            &[("a", rupees(400)), ("b", rupees(400)), ("c", rupees(400))],
        )];
        let payments = [payment("b", "a", rupees(400)), payment("c", "a", rupees(400))];
        let balances = compute_balances(&members, &expenses, &payments).unwrap();
        assert!(balances.values().all(|balance| *balance == Decimal::ZERO));
    }

    #[test]
    fn split_referencing_unknown_member_is_rejected() {
        let members = member_ids(&["a", "b"]);
        let expenses = [expense(
            rupees(100),
            "a",
            &[("b", rupees(50)), ("ghost", rupees(50))],
        )];
        let err = compute_balances(&members, &expenses, &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownMember(member) if member == "ghost"));
    }

    #[test]
    fn split_sum_mismatch_is_rejected() {
        let members = member_ids(&["a", "b"]);
        let expenses = [expense(rupees(100), "a", &[("b", rupees(90))])];
        let err = compute_balances(&members, &expenses, &[]).unwrap_err();
        assert!(matches!(err, Error::SplitMismatch { .. }));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let members = member_ids(&["a", "b"]);
        let bad_expense = [expense(rupees(-10), "a", &[("b", rupees(-10))])];
        assert!(matches!(
            compute_balances(&members, &bad_expense, &[]),
            Err(Error::NonPositiveAmount(_))
        ));

        let bad_split = [expense(
            rupees(10),
            "a",
            &[("a", rupees(20)), ("b", rupees(-10))],
        )];
        assert!(matches!(
            compute_balances(&members, &bad_split, &[]),
            Err(Error::NegativeSplit(_))
        ));

        let bad_payment = [payment("a", "b", Decimal::ZERO)];
        assert!(matches!(
            compute_balances(&members, &[], &bad_payment),
            Err(Error::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let members = member_ids(&["a", "b", "c"]);
        let expenses = [
            expense(
                rupees(1200),
                "a",
                &[("a", rupees(400)), ("b", rupees(400)), ("c", rupees(400))],
            ),
            expense(cents(75_50), "b", &[("a", cents(25_50)), ("c", cents(50_00))]),
        ];
        let payments = [payment("c", "a", rupees(100))];
        let first = compute_balances(&members, &expenses, &payments).unwrap();
        let second = compute_balances(&members, &expenses, &payments).unwrap();
        assert_eq!(first, second);
    }

    // Property: however a valid ledger is shaped, balances sum to zero.
    fn split_cents_strategy() -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::vec(0u32..200_000, 1..4)
    }

    proptest! {
        #[test]
        fn balances_always_sum_to_zero(
            ledger in proptest::collection::vec(
                (0usize..4, split_cents_strategy()),
                1..12,
            )
        ) {
            let members = member_ids(&["a", "b", "c", "d"]);
            let expenses: Vec<Expense> = ledger
                .iter()
                .filter(|(_, splits)| splits.iter().sum::<u32>() > 0)
                .map(|(payer, splits)| {
                    let shares: Vec<(&str, Decimal)> = splits
                        .iter()
                        .enumerate()
                        .map(|(i, c)| (["a", "b", "c", "d"][i], cents(*c as i64)))
                        .collect();
                    let total: Decimal = shares.iter().map(|(_, amount)| *amount).sum();
                    expense(total, ["a", "b", "c", "d"][*payer], &shares)
                })
                .collect();
            let balances = compute_balances(&members, &expenses, &[]).unwrap();
            let total: Decimal = balances.values().copied().sum();
            prop_assert_eq!(total, Decimal::ZERO);
        }
    }
}
