// 📊 Ledger summaries - balance runway, category totals, TZS formatting

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::db::Transaction;
use crate::parser::{Category, ParsedTransaction, TransactionType};

/// Number of most recent transactions used for the daily spend average
pub const RUNWAY_WINDOW: usize = 7;

/// How long the balance lasts at the recent spending rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum DaysUntilBroke {
    NotEnoughData,
    /// No spending in the window
    Unbounded,
    Days(i64),
}

impl fmt::Display for DaysUntilBroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysUntilBroke::NotEnoughData => f.write_str("Not enough data"),
            DaysUntilBroke::Unbounded => f.write_str("∞"),
            DaysUntilBroke::Days(days) => write!(f, "{}", days),
        }
    }
}

/// `recent` must be newest first, as returned by `get_recent_transactions`.
/// The expense total of the newest seven is averaged over seven days.
pub fn days_until_broke(balance: f64, recent: &[Transaction]) -> DaysUntilBroke {
    if recent.len() < RUNWAY_WINDOW {
        return DaysUntilBroke::NotEnoughData;
    }

    let spent: f64 = recent
        .iter()
        .take(RUNWAY_WINDOW)
        .filter(|tx| tx.transaction_type == TransactionType::Expense)
        .map(|tx| tx.amount)
        .sum();

    let daily = spent / RUNWAY_WINDOW as f64;
    if daily <= 0.0 {
        return DaysUntilBroke::Unbounded;
    }

    DaysUntilBroke::Days((balance / daily).floor() as i64)
}

/// Expense totals per category, largest first
pub fn category_totals(transactions: &[Transaction]) -> Vec<(Category, f64)> {
    let mut totals: HashMap<Category, f64> = HashMap::new();

    for tx in transactions
        .iter()
        .filter(|tx| tx.transaction_type == TransactionType::Expense)
    {
        *totals.entry(tx.category).or_insert(0.0) += tx.amount;
    }

    let mut result: Vec<_> = totals.into_iter().collect();
    result.sort_by(|a, b| {
        b.1.total_cmp(&a.1).then_with(|| {
            let pos = |c: &Category| Category::ALL.iter().position(|x| x == c);
            pos(&a.0).cmp(&pos(&b.0))
        })
    });
    result
}

/// Whole shillings with thousand separators: `15000.0` → `15,000`
pub fn format_amount(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.abs());

    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if amount < 0.0 && rounded != "0" {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn format_tzs(amount: f64) -> String {
    format!("TZS {}", format_amount(amount))
}

/// Reply shown after a message is stored, e.g. `✅ Food: TZS 15,000`
pub fn confirmation_message(parsed: &ParsedTransaction) -> String {
    format!("✅ {}: {}", parsed.category.title(), format_tzs(parsed.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(amount: f64, tx_type: TransactionType, category: Category) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u".to_string(),
            amount,
            description: "Test".to_string(),
            category,
            transaction_type: tx_type,
            raw_text: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_runway_needs_a_week_of_data() {
        let recent = vec![tx(1000.0, TransactionType::Expense, Category::Food); 6];
        assert_eq!(days_until_broke(10_000.0, &recent), DaysUntilBroke::NotEnoughData);
    }

    #[test]
    fn test_runway_days() {
        // 7 expenses of 1,000 → 1,000/day; older rows are ignored
        let mut recent = vec![tx(1000.0, TransactionType::Expense, Category::Food); 7];
        recent.push(tx(1_000_000.0, TransactionType::Expense, Category::Bills));

        assert_eq!(days_until_broke(10_500.0, &recent), DaysUntilBroke::Days(10));
    }

    #[test]
    fn test_runway_unbounded_without_spending() {
        let recent = vec![tx(5000.0, TransactionType::Income, Category::Income); 7];
        assert_eq!(days_until_broke(10_000.0, &recent), DaysUntilBroke::Unbounded);
        assert_eq!(DaysUntilBroke::Unbounded.to_string(), "∞");
    }

    #[test]
    fn test_category_totals_expenses_only() {
        let transactions = vec![
            tx(15000.0, TransactionType::Expense, Category::Food),
            tx(5000.0, TransactionType::Expense, Category::Food),
            tx(30000.0, TransactionType::Expense, Category::Transport),
            tx(50000.0, TransactionType::Income, Category::Income),
        ];

        assert_eq!(
            category_totals(&transactions),
            vec![(Category::Transport, 30000.0), (Category::Food, 20000.0)]
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(15000.0), "15,000");
        assert_eq!(format_amount(1234567.4), "1,234,567");
        assert_eq!(format_amount(-50000.0), "-50,000");
    }

    #[test]
    fn test_confirmation_message() {
        let parsed = crate::parser::TransactionParser::default().parse("Lunch 15000");
        assert_eq!(confirmation_message(&parsed), "✅ Food: TZS 15,000");
    }
}
