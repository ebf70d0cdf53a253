// 💬 Transaction Parser - free text → structured transaction
// Four passes over the same lowered text: amount, type, category, description

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::rules::CategoryRules;

/// Description used when nothing is left after stripping amounts
pub const FALLBACK_DESCRIPTION: &str = "Transaction";

/// Checked first: any hit makes the transaction income
const INCOME_WORDS: [&str; 6] = ["received", "paid", "salary", "income", "deposit", "sold"];

const EXPENSE_WORDS: [&str; 6] = ["spent", "bought", "purchased", "paid for", "lunch", "fuel"];

// ============================================================================
// LABELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("unknown category: {0}")]
    Category(String),

    #[error("unknown transaction type: {0}")]
    TransactionType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    /// Accepted in storage, never produced by the parser
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            "transfer" => Ok(TransactionType::Transfer),
            _ => Err(LabelError::TransactionType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Bills,
    Shopping,
    Income,
    Business,
    Family,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Transport,
        Category::Bills,
        Category::Shopping,
        Category::Income,
        Category::Business,
        Category::Family,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Bills => "bills",
            Category::Shopping => "shopping",
            Category::Income => "income",
            Category::Business => "business",
            Category::Family => "family",
            Category::Other => "other",
        }
    }

    /// Display form used in confirmations ("Food", "Transport", ...)
    pub fn title(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Bills => "Bills",
            Category::Shopping => "Shopping",
            Category::Income => "Income",
            Category::Business => "Business",
            Category::Family => "Family",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| LabelError::Category(s.to_string()))
    }
}

// ============================================================================
// PARSED TRANSACTION
// ============================================================================

/// One free-text message turned into a record. Serializes flat:
/// `{amount, type, category, description, raw_text}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: f64,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub category: Category,

    pub description: String,

    pub raw_text: String,
}

// ============================================================================
// AMOUNT PATTERNS
// ============================================================================

/// Amount grammars in priority order. The first one that matches AND converts wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPattern {
    /// `TZS 15,000`
    CurrencyPrefix,
    /// `15,000 TZS`
    CurrencySuffix,
    /// `15k`
    Shorthand,
    /// `15000`, `15,000.00`
    BareNumber,
}

impl AmountPattern {
    pub const PRIORITY: [AmountPattern; 4] = [
        AmountPattern::CurrencyPrefix,
        AmountPattern::CurrencySuffix,
        AmountPattern::Shorthand,
        AmountPattern::BareNumber,
    ];

    fn regex(self) -> &'static Regex {
        static PREFIX: OnceLock<Regex> = OnceLock::new();
        static SUFFIX: OnceLock<Regex> = OnceLock::new();
        static SHORTHAND: OnceLock<Regex> = OnceLock::new();
        static BARE: OnceLock<Regex> = OnceLock::new();

        match self {
            AmountPattern::CurrencyPrefix => {
                PREFIX.get_or_init(|| compile(r"(?i)tzs\s*([\d,]+(?:\.\d{2})?)"))
            }
            AmountPattern::CurrencySuffix => {
                SUFFIX.get_or_init(|| compile(r"(?i)([\d,]+(?:\.\d{2})?)\s*tzs"))
            }
            AmountPattern::Shorthand => SHORTHAND.get_or_init(|| compile(r"(?i)(\d+)\s*k")),
            AmountPattern::BareNumber => BARE.get_or_init(|| compile(r"(\d+(?:,\d+)*(?:\.\d{2})?)")),
        }
    }

    /// Bare numbers stay in the description; everything else is cut out
    pub fn strips_from_description(self) -> bool {
        !matches!(self, AmountPattern::BareNumber)
    }

    /// First match of this pattern, converted. `None` on no match, bad digits or overflow.
    fn capture(self, text: &str) -> Option<f64> {
        let matched = self.regex().captures(text)?.get(1)?.as_str();
        let digits: String = matched
            .chars()
            .filter(|c| *c != ',')
            .map(ascii_digit)
            .collect();

        digits.parse::<f64>().ok().filter(|amount| amount.is_finite())
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid amount regex")
}

/// `\d` also matches non-ASCII decimal digits (`٥`, `５`). Unicode lays those out
/// in runs of ten starting at zero, so the value is the offset into the run.
fn ascii_digit(c: char) -> char {
    if c.is_ascii() || !is_decimal_digit(c) {
        return c;
    }

    let mut start = c as u32;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        start -= 1;
    }

    char::from_digit((c as u32 - start) % 10, 10).unwrap_or(c)
}

fn is_decimal_digit(c: char) -> bool {
    static DIGIT: OnceLock<Regex> = OnceLock::new();
    let mut buf = [0u8; 4];
    DIGIT
        .get_or_init(|| compile(r"^\d$"))
        .is_match(c.encode_utf8(&mut buf))
}

// ============================================================================
// OPTIONS
// ============================================================================

/// How `15k` is read. `Literal` keeps the long-standing behavior (15k → 15).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShorthandMode {
    #[default]
    Literal,
    Thousands,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    pub shorthand: ShorthandMode,
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// What each pass decided, for callers that want more than the defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseDiagnostics {
    /// `None` means the amount is the 0.0 default
    pub amount_pattern: Option<AmountPattern>,
    pub type_keyword: Option<String>,
    pub category_keyword: Option<String>,
    pub fallback_description: bool,
    pub shorthand_mode: Option<ShorthandMode>,
}

impl ParseDiagnostics {
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.amount_pattern {
            None => warnings.push("no amount found, defaulted to 0".to_string()),
            Some(AmountPattern::Shorthand) if self.shorthand_mode == Some(ShorthandMode::Literal) => {
                warnings.push("k shorthand read literally (15k = 15)".to_string())
            }
            _ => {}
        }

        if self.type_keyword.is_none() {
            warnings.push("no type keyword, defaulted to expense".to_string());
        }
        if self.category_keyword.is_none() {
            warnings.push("no category keyword, defaulted to other".to_string());
        }

        warnings
    }

    pub fn is_confident(&self) -> bool {
        self.warnings().is_empty()
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Stateless text classifier. The rule table is injected and never mutated.
#[derive(Debug, Clone)]
pub struct TransactionParser {
    rules: CategoryRules,
    options: ParserOptions,
}

impl TransactionParser {
    pub fn new(rules: CategoryRules) -> Self {
        Self::with_options(rules, ParserOptions::default())
    }

    pub fn with_options(rules: CategoryRules, options: ParserOptions) -> Self {
        TransactionParser { rules, options }
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// Parse free text. Never fails; inconclusive passes fall back to defaults.
    pub fn parse(&self, text: &str) -> ParsedTransaction {
        self.parse_with_diagnostics(text).0
    }

    pub fn parse_with_diagnostics(&self, text: &str) -> (ParsedTransaction, ParseDiagnostics) {
        let normalized = text.trim().to_lowercase();

        let (amount, amount_pattern) = self.extract_amount(&normalized);
        let (transaction_type, type_keyword) = determine_type(&normalized);
        let (category, category_keyword) = match self.rules.classify(&normalized) {
            Some((category, keyword)) => (category, Some(keyword.to_string())),
            None => (Category::Other, None),
        };
        let (description, fallback_description) = clean_description(text);

        tracing::debug!(
            %amount,
            ?amount_pattern,
            %transaction_type,
            %category,
            "parsed transaction text"
        );

        let diagnostics = ParseDiagnostics {
            amount_pattern,
            type_keyword: type_keyword.map(str::to_string),
            category_keyword,
            fallback_description,
            shorthand_mode: (amount_pattern == Some(AmountPattern::Shorthand))
                .then_some(self.options.shorthand),
        };

        let parsed = ParsedTransaction {
            amount,
            transaction_type,
            category,
            description,
            raw_text: text.to_string(),
        };

        (parsed, diagnostics)
    }

    fn extract_amount(&self, normalized: &str) -> (f64, Option<AmountPattern>) {
        for pattern in AmountPattern::PRIORITY {
            if let Some(value) = pattern.capture(normalized) {
                let value = match (pattern, self.options.shorthand) {
                    (AmountPattern::Shorthand, ShorthandMode::Thousands) => value * 1000.0,
                    _ => value,
                };
                if value.is_finite() {
                    return (value, Some(pattern));
                }
            }
        }

        (0.0, None)
    }
}

impl Default for TransactionParser {
    fn default() -> Self {
        Self::new(CategoryRules::builtin())
    }
}

/// Income words win on overlap ("paid lunch" is income)
fn determine_type(normalized: &str) -> (TransactionType, Option<&'static str>) {
    if let Some(word) = INCOME_WORDS.iter().copied().find(|w| normalized.contains(w)) {
        return (TransactionType::Income, Some(word));
    }
    if let Some(word) = EXPENSE_WORDS.iter().copied().find(|w| normalized.contains(w)) {
        return (TransactionType::Expense, Some(word));
    }

    (TransactionType::Expense, None)
}

/// Works on the original-case text. Returns the description and whether the
/// fallback was used.
fn clean_description(text: &str) -> (String, bool) {
    let mut cleaned = text.to_string();
    for pattern in AmountPattern::PRIORITY
        .into_iter()
        .filter(|p| p.strips_from_description())
    {
        cleaned = pattern.regex().replace_all(&cleaned, "").into_owned();
    }

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return (FALLBACK_DESCRIPTION.to_string(), true);
    }

    (capitalize_first(trimmed), false)
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::CategoryRule;

    fn parser() -> TransactionParser {
        TransactionParser::default()
    }

    #[test]
    fn test_empty_input_gets_all_defaults() {
        let parsed = parser().parse("");

        assert_eq!(parsed.amount, 0.0);
        assert_eq!(parsed.transaction_type, TransactionType::Expense);
        assert_eq!(parsed.category, Category::Other);
        assert_eq!(parsed.description, "Transaction");
        assert_eq!(parsed.raw_text, "");
    }

    #[test]
    fn test_lunch_bare_number() {
        let parsed = parser().parse("Lunch 15000");

        assert_eq!(parsed.amount, 15000.0);
        assert_eq!(parsed.transaction_type, TransactionType::Expense);
        assert_eq!(parsed.category, Category::Food);
        // Bare numbers are not stripped from the description
        assert_eq!(parsed.description, "Lunch 15000");
    }

    #[test]
    fn test_currency_prefix_salary() {
        let parsed = parser().parse("TZS 50,000 received salary");

        assert_eq!(parsed.amount, 50000.0);
        assert_eq!(parsed.transaction_type, TransactionType::Income);
        assert_eq!(parsed.category, Category::Income);
        assert_eq!(parsed.description, "Received salary");
        assert_eq!(parsed.raw_text, "TZS 50,000 received salary");
    }

    #[test]
    fn test_spent_on_fuel() {
        let parsed = parser().parse("spent TZS 20,000 on fuel");

        assert_eq!(parsed.amount, 20000.0);
        assert_eq!(parsed.transaction_type, TransactionType::Expense);
        assert_eq!(parsed.category, Category::Transport);
        assert_eq!(parsed.description, "Spent  on fuel");
    }

    #[test]
    fn test_currency_suffix() {
        let parsed = parser().parse("market 12,500.50 tzs");

        assert_eq!(parsed.amount, 12500.5);
        assert_eq!(parsed.category, Category::Shopping);
        assert_eq!(parsed.description, "Market");
    }

    #[test]
    fn test_prefix_beats_shorthand() {
        let parsed = parser().parse("TZS 5000 (15k bonus)");
        assert_eq!(parsed.amount, 5000.0);
    }

    #[test]
    fn test_shorthand_is_literal_by_default() {
        let parsed = parser().parse("Lunch 15k");

        assert_eq!(parsed.amount, 15.0);
        assert_eq!(parsed.description, "Lunch");
    }

    #[test]
    fn test_shorthand_thousands_opt_in() {
        let parser = TransactionParser::with_options(
            CategoryRules::builtin(),
            ParserOptions {
                shorthand: ShorthandMode::Thousands,
            },
        );

        assert_eq!(parser.parse("Lunch 15k").amount, 15000.0);
        // Other grammars are untouched
        assert_eq!(parser.parse("Lunch 15000").amount, 15000.0);
    }

    #[test]
    fn test_conversion_failure_falls_through() {
        // "tzs ," matches the prefix grammar but has no digits
        let parsed = parser().parse("tzs , bus 300");
        assert_eq!(parsed.amount, 300.0);
    }

    #[test]
    fn test_no_amount_defaults_to_zero() {
        let (parsed, diagnostics) = parser().parse_with_diagnostics("dinner with family");

        assert_eq!(parsed.amount, 0.0);
        assert_eq!(diagnostics.amount_pattern, None);
        assert!(!diagnostics.is_confident());
    }

    #[test]
    fn test_income_checked_before_expense() {
        // "paid" is an income word even though "lunch" is an expense word
        let parsed = parser().parse("paid for lunch 8000");
        assert_eq!(parsed.transaction_type, TransactionType::Income);
        assert_eq!(parsed.category, Category::Food);
    }

    #[test]
    fn test_transfer_is_never_produced() {
        for text in ["transfer 5000 to bank", "sent 10k to mom", "TZS 1,000 deposit"] {
            assert_ne!(parser().parse(text).transaction_type, TransactionType::Transfer);
        }
    }

    #[test]
    fn test_category_is_case_insensitive_substring() {
        assert_eq!(parser().parse("CAFE trip").category, Category::Food);
        assert_eq!(parser().parse("new lunchbox").category, Category::Food);
    }

    #[test]
    fn test_category_follows_table_order() {
        // "fuel" (transport) and "bill" (bills): transport is declared first
        assert_eq!(parser().parse("fuel bill 3000").category, Category::Transport);
    }

    #[test]
    fn test_description_keeps_source_casing() {
        let parsed = parser().parse("  bought iPhone case TZS 30,000 ");
        assert_eq!(parsed.description, "Bought iPhone case");
    }

    #[test]
    fn test_description_only_amount_uses_fallback() {
        let (parsed, diagnostics) = parser().parse_with_diagnostics("TZS 7,000");

        assert_eq!(parsed.description, FALLBACK_DESCRIPTION);
        assert!(diagnostics.fallback_description);
    }

    #[test]
    fn test_reparsing_description_is_stable() {
        let first = parser().parse("TZS 50,000 received salary");
        let second = parser().parse(&first.description);

        assert_eq!(second.description, first.description);
        assert_eq!(second.transaction_type, first.transaction_type);
        assert_eq!(second.category, first.category);
    }

    #[test]
    fn test_injected_rules_replace_builtin_table() {
        let rules = CategoryRules::from_rules(vec![CategoryRule::new(
            Category::Business,
            &["duka"],
        )]);
        let parser = TransactionParser::new(rules);

        assert_eq!(parser.parse("duka stock 20000").category, Category::Business);
        assert_eq!(parser.parse("lunch 5000").category, Category::Other);
    }

    #[test]
    fn test_diagnostics_report_decisions() {
        let (_, diagnostics) = parser().parse_with_diagnostics("Lunch 15k");

        assert_eq!(diagnostics.amount_pattern, Some(AmountPattern::Shorthand));
        assert_eq!(diagnostics.type_keyword.as_deref(), Some("lunch"));
        assert_eq!(diagnostics.category_keyword.as_deref(), Some("lunch"));
        assert_eq!(
            diagnostics.warnings(),
            vec!["k shorthand read literally (15k = 15)".to_string()]
        );
    }

    #[test]
    fn test_serializes_flat() {
        let parsed = parser().parse("Lunch 15000");
        let json = serde_json::to_value(&parsed).unwrap();

        assert_eq!(json["amount"], serde_json::json!(15000.0));
        assert_eq!(json["type"], "expense");
        assert_eq!(json["category"], "food");
        assert_eq!(json["description"], "Lunch 15000");
        assert_eq!(json["raw_text"], "Lunch 15000");
    }

    #[test]
    fn test_labels_round_trip_through_strings() {
        assert_eq!("FOOD".parse::<Category>(), Ok(Category::Food));
        assert_eq!("income".parse::<TransactionType>(), Ok(TransactionType::Income));
        assert!("groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_non_ascii_digits() {
        let arabic_indic = parser().parse("TZS ٥٠٠٠ lunch");
        assert_eq!(arabic_indic.amount, 5000.0);
        assert_eq!(arabic_indic.category, Category::Food);
        assert_eq!(arabic_indic.description, "Lunch");

        let fullwidth = parser().parse("lunch １５０００");
        assert_eq!(fullwidth.amount, 15000.0);
        assert_eq!(fullwidth.description, "Lunch １５０００");

        assert_eq!(parser().parse("paid ٢,٥٠٠.٥٠ tzs").amount, 2500.5);
    }

    #[test]
    fn test_overflowing_amount_is_not_converted() {
        let text = format!("lunch {}", "9".repeat(400));
        let (parsed, diagnostics) = parser().parse_with_diagnostics(&text);

        assert_eq!(parsed.amount, 0.0);
        assert_eq!(diagnostics.amount_pattern, None);

        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["amount"], serde_json::json!(0.0));
    }
}
