//! Derived budget calculations
//!
//! Pure, synchronous functions from a budget draft to display totals.
//! Recomputed on every edit; nothing here is cached or persisted.

use crate::models::BudgetDraft;
use serde::{Deserialize, Serialize};

/// Totals derived from a budget draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub total_expenses: f64,
    pub remaining_balance: f64,
    pub categories: Vec<CategoryShare>,
}

/// One expense category with its proportion of total expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub name: String,
    pub amount: f64,
    /// Fraction of total expenses in [0, 1]. 0 when there are no expenses.
    pub share: f64,
}

/// Treat missing/NaN amounts as 0 for display purposes only. Validation
/// keeps such entries from ever being persisted.
fn display_amount(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Compute totals and per-category shares for a draft.
pub fn summarize(draft: &BudgetDraft) -> BudgetSummary {
    let total_expenses: f64 = draft
        .expenses
        .iter()
        .map(|e| display_amount(e.amount))
        .sum();

    let remaining_balance = display_amount(draft.income) - total_expenses;

    let categories = draft
        .expenses
        .iter()
        .map(|e| {
            let amount = display_amount(e.amount);
            CategoryShare {
                name: e.name.clone(),
                amount,
                share: if total_expenses > 0.0 {
                    amount / total_expenses
                } else {
                    0.0
                },
            }
        })
        .collect();

    BudgetSummary {
        total_expenses,
        remaining_balance,
        categories,
    }
}
