//! Turns a balance snapshot into the smallest set of direct payments that
//! settles the whole group.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::balance::BalanceMap;
use crate::error::{Error, Result};
use crate::schemas::{tolerance, MemberId};

/// A proposed direct payment. Never persisted; recomputed on demand from
/// the current balances.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettlementInstruction {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Decimal,
}

#[derive(Clone, Debug)]
struct OpenBalance {
    member: MemberId,
    remaining: Decimal,
}

/// Greedy largest-creditor vs. largest-debtor matching.
///
/// Each round settles `min(remaining, remaining)` between the two largest
/// open balances, which fully clears at least one of them, so a group with
/// N unsettled members needs at most N-1 instructions. `member_order`
/// fixes the tie-break between equal balances, making the plan
/// deterministic for a given snapshot.
pub fn settlement_plan(
    balances: &BalanceMap,
    member_order: &[MemberId],
) -> Result<Vec<SettlementInstruction>> {
    let (mut creditors, mut debtors) = partition(balances, member_order);

    let mut plan = Vec::new();
    while !creditors.is_empty() && !debtors.is_empty() {
        // Stable sort: ties keep their member_order position.
        creditors.sort_by(|a, b| b.remaining.cmp(&a.remaining));
        debtors.sort_by(|a, b| b.remaining.cmp(&a.remaining));

        let amount = creditors[0].remaining.min(debtors[0].remaining);
        plan.push(SettlementInstruction {
            from: debtors[0].member.clone(),
            to: creditors[0].member.clone(),
            amount: amount.round_dp(2),
        });
        creditors[0].remaining -= amount;
        debtors[0].remaining -= amount;

        creditors.retain(|party| party.remaining > tolerance());
        debtors.retain(|party| party.remaining > tolerance());
    }

    // Both partitions must drain together; a leftover means the input
    // balances did not sum to zero.
    let residual: Decimal = creditors
        .iter()
        .chain(debtors.iter())
        .map(|party| party.remaining)
        .sum();
    if residual > tolerance() {
        return Err(Error::UnbalancedLedger(residual));
    }

    Ok(plan)
}

fn partition(
    balances: &BalanceMap,
    member_order: &[MemberId],
) -> (Vec<OpenBalance>, Vec<OpenBalance>) {
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();
    for member in ordered_members(balances, member_order) {
        let balance = balances[&member];
        let party = OpenBalance {
            remaining: balance.abs(),
            member,
        };
        if balance > tolerance() {
            creditors.push(party);
        } else if balance < -tolerance() {
            debtors.push(party);
        }
    }
    (creditors, debtors)
}

// Balances not covered by member_order are appended in sorted order so the
// plan stays deterministic even for a stale order list.
fn ordered_members(balances: &BalanceMap, member_order: &[MemberId]) -> Vec<MemberId> {
    let mut ordered: Vec<MemberId> = member_order
        .iter()
        .filter(|member| balances.contains_key(*member))
        .cloned()
        .collect();
    let mut extras: Vec<MemberId> = balances
        .keys()
        .filter(|member| !member_order.contains(*member))
        .cloned()
        .collect();
    extras.sort_unstable();
    ordered.extend(extras);
    ordered
}
