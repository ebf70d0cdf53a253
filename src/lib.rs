// WMTB - Core Library
// Free-text transaction parsing plus the per-user ledger, for the CLI, TUI and API server

pub mod db;
pub mod parser;
pub mod rules;
pub mod settings;
pub mod summary;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use db::{
    Transaction, MessageRow, ImportReport, DEFAULT_HISTORY_LIMIT,
    open_database, setup_database, add_transaction, insert_transaction,
    get_user_balance, get_recent_transactions, count_transactions,
    load_messages, load_messages_csv, import_messages,
};
pub use parser::{
    TransactionParser, ParsedTransaction, ParseDiagnostics, ParserOptions,
    AmountPattern, ShorthandMode, Category, TransactionType, LabelError,
    FALLBACK_DESCRIPTION,
};
pub use rules::{CategoryRule, CategoryRules};
pub use settings::Settings;
pub use summary::{
    DaysUntilBroke, days_until_broke, category_totals,
    format_amount, format_tzs, confirmation_message,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
