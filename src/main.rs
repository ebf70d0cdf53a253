// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

use wmtb::{
    add_transaction, category_totals, confirmation_message, count_transactions, days_until_broke,
    format_tzs, get_recent_transactions, get_user_balance, import_messages, load_messages_csv,
    open_database, Settings, TransactionParser, DEFAULT_HISTORY_LIMIT,
};

const USAGE: &str = "\
Usage:
  wmtb parse <text...>           Parse a message without storing it
  wmtb add <user> <text...>      Parse and store a message
  wmtb balance <user>            Show the running balance
  wmtb history <user> [limit]    Show recent transactions (newest first)
  wmtb summary <user>            Balance, runway and spending by category
  wmtb import <csv>              Store every user_id,text row of a CSV file
  wmtb ui [user]                 Terminal ledger (default)";

/// User shown by the terminal ledger when none is given
const DEFAULT_USER: &str = "demo-user-123";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let settings = Settings::load().context("Failed to load settings")?;

    let command = args.first().map(String::as_str).unwrap_or("ui");
    if command != "ui" {
        // The terminal ledger owns the screen; everything else logs to stderr
        settings.log.init_tracing();
    }

    let parser = settings.parser.build_parser()?;

    match (command, &args[1.min(args.len())..]) {
        ("parse", text) if !text.is_empty() => run_parse(&parser, &text.join(" ")),
        ("add", [user, text @ ..]) if !text.is_empty() => {
            let conn = open_database(settings.database.path.as_deref())?;
            run_add(&conn, &parser, user, &text.join(" "))
        }
        ("balance", [user]) => {
            let conn = open_database(settings.database.path.as_deref())?;
            println!("{}", format_tzs(get_user_balance(&conn, user)?));
            Ok(())
        }
        ("history", [user, rest @ ..]) if rest.len() <= 1 => {
            let limit = match rest.first() {
                Some(raw) => raw
                    .parse::<u32>()
                    .with_context(|| format!("Invalid limit: {raw}"))?,
                None => DEFAULT_HISTORY_LIMIT,
            };
            let conn = open_database(settings.database.path.as_deref())?;
            run_history(&conn, user, limit)
        }
        ("summary", [user]) => {
            let conn = open_database(settings.database.path.as_deref())?;
            run_summary(&conn, user)
        }
        ("import", [csv_path]) => {
            let conn = open_database(settings.database.path.as_deref())?;
            run_import(&conn, &parser, Path::new(csv_path))
        }
        ("ui", rest) if rest.len() <= 1 => {
            let user = rest.first().map(String::as_str).unwrap_or(DEFAULT_USER);
            let conn = open_database(settings.database.path.as_deref())?;
            run_ui_mode(&conn, &parser, user)
        }
        ("help" | "--help" | "-h", _) => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("unrecognised arguments: {}\n\n{USAGE}", args.join(" ")),
    }
}

fn run_parse(parser: &TransactionParser, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("No text provided");
    }

    let (parsed, diagnostics) = parser.parse_with_diagnostics(text);

    println!("{}", serde_json::to_string_pretty(&parsed)?);
    for warning in diagnostics.warnings() {
        eprintln!("note: {warning}");
    }

    Ok(())
}

fn run_add(conn: &Connection, parser: &TransactionParser, user: &str, text: &str) -> Result<()> {
    if user.trim().is_empty() || text.trim().is_empty() {
        bail!("Missing user_id or text");
    }

    let parsed = parser.parse(text);
    add_transaction(conn, user, &parsed)?;

    println!("{}", confirmation_message(&parsed));
    println!("Balance: {}", format_tzs(get_user_balance(conn, user)?));

    Ok(())
}

fn run_history(conn: &Connection, user: &str, limit: u32) -> Result<()> {
    let transactions = get_recent_transactions(conn, user, limit)?;

    if transactions.is_empty() {
        println!("No transactions for {user}");
        return Ok(());
    }

    for tx in &transactions {
        println!(
            "{}  {:<8} {:<10} {:>16}  {}",
            tx.created_at.format("%Y-%m-%d %H:%M"),
            tx.transaction_type,
            tx.category,
            format_tzs(tx.amount),
            tx.description
        );
    }

    Ok(())
}

fn run_summary(conn: &Connection, user: &str) -> Result<()> {
    let balance = get_user_balance(conn, user)?;
    let recent = get_recent_transactions(conn, user, DEFAULT_HISTORY_LIMIT)?;

    println!("User:              {user}");
    println!("Transactions:      {}", count_transactions(conn, user)?);
    println!("Balance:           {}", format_tzs(balance));
    println!("Days until broke:  {}", days_until_broke(balance, &recent));

    let totals = category_totals(&recent);
    if !totals.is_empty() {
        println!("\nSpending (last {} transactions):", recent.len());
        for (category, total) in totals {
            println!("  {:<10} {:>16}", category.title(), format_tzs(total));
        }
    }

    Ok(())
}

fn run_import(conn: &Connection, parser: &TransactionParser, csv_path: &Path) -> Result<()> {
    let rows = load_messages_csv(csv_path)?;
    let report = import_messages(conn, parser, &rows)?;

    println!("Imported {} messages ({} skipped)", report.inserted, report.skipped);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection, parser: &TransactionParser, user: &str) -> Result<()> {
    let mut app = ui::App::new(conn, parser, user)?;
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: &Connection, _parser: &TransactionParser, _user: &str) -> Result<()> {
    bail!("TUI mode not available; rebuild with `--features tui` or use the CLI commands:\n\n{USAGE}")
}
