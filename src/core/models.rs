//! Entities persisted by the store

use crate::core::error::Error;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// The balance contribution of `amount` under this type.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(Error::Validation(format!("Invalid transaction type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub r#type: String,
    pub balance: Decimal,
    pub color: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub r#type: TransactionType,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

impl TransactionRecord {
    pub fn signed_amount(&self) -> Decimal {
        self.r#type.signed(self.amount)
    }
}

/// Field values for recording or rewriting a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl NewTransaction {
    pub fn signed_amount(&self) -> Decimal {
        self.r#type.signed(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryConfig {
    pub id: i64,
    pub amount: Decimal,
    pub account_id: i64,
    pub category_id: Option<i64>,
    /// `YYYY-MM` of the last month paid, empty when never paid.
    pub last_paid_month: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalarySettings {
    pub amount: Decimal,
    pub account_id: i64,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub r#type: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub total_invested: Decimal,
    pub current_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub profit_loss: Option<Decimal>,
    pub profit_loss_percent: Option<Decimal>,
    pub notes: Option<String>,
    pub ledger_transaction_id: Option<i64>,
    /// Set once a purchase transaction was linked, even if that transaction is gone.
    pub ledger_linked: bool,
}

/// Caller-owned fields of an investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentInput {
    pub ticker: String,
    pub name: String,
    pub r#type: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub notes: Option<String>,
    /// A price already known to the caller, used to value the position immediately.
    pub current_price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub count: usize,
    pub total_invested: Decimal,
    pub total_current_value: Decimal,
    pub total_profit_loss: Decimal,
    pub total_profit_loss_percent: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub month: String,
    pub total_balance: Decimal,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

/// Income and expenses over an arbitrary date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

impl PeriodTotals {
    pub fn new(income: Decimal, expenses: Decimal) -> Option<Self> {
        Some(Self {
            income,
            expenses,
            net: income.checked_sub(expenses)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyComparison {
    pub current: MonthlyStats,
    pub previous: MonthlyStats,
}

/// One expense with the category it was filed under, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_name: Option<String>,
    pub category_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category_id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub total: Decimal,
}

/// Totals of one `YYYY-MM` month in a balance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}
