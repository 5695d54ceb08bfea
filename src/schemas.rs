use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type MemberId = String;

/// Amounts closer to zero than this are treated as settled.
pub fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    /// Display metadata only; all amounts in a group share this currency.
    pub currency: String,
    pub members: Vec<Member>,
    pub expenses: Vec<Expense>,
    pub payments: Vec<Payment>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub role: Role,
    /// Cached net position, overwritten from a full recomputation after
    /// every mutation. Positive means the group owes this member.
    #[serde(default)]
    pub balance: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub category: Category,
    pub payer: MemberId,
    pub splits: Vec<Split>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Split {
    pub member: MemberId,
    pub amount: Decimal,
    /// Per-split settlement bookkeeping; ignored when recomputing balances.
    #[serde(default)]
    pub paid: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Food,
    Travel,
    Rent,
    Utilities,
    Entertainment,
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Payment {
    pub id: String,
    pub payer: MemberId,
    pub payee: MemberId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
