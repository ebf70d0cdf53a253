// 🏷️ Category Rules - Rules as Data
// Ordered keyword table mapping free text to a category

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::parser::Category;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category assigned when any keyword is found
    pub category: Category,

    /// Matched as case-insensitive substrings, not whole words
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: Category, keywords: &[&str]) -> Self {
        CategoryRule {
            category,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// First keyword contained in the text, if any
    pub fn matches<'a>(&'a self, text: &str) -> Option<&'a str> {
        let text_lower = text.to_lowercase();

        self.keywords
            .iter()
            .map(String::as_str)
            .find(|keyword| text_lower.contains(keyword))
    }

    fn normalized(self) -> Self {
        let keywords = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        CategoryRule {
            category: self.category,
            keywords,
        }
    }
}

// ============================================================================
// RULE TABLE
// ============================================================================

/// Evaluated in declared order; the first matching rule wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// The table the service ships with
    pub fn builtin() -> Self {
        CategoryRules::from_rules(vec![
            CategoryRule::new(
                Category::Food,
                &["lunch", "dinner", "breakfast", "chakula", "cafe", "restaurant"],
            ),
            CategoryRule::new(
                Category::Transport,
                &["fuel", "petrol", "gas", "transport", "uber", "bolt", "taxi"],
            ),
            CategoryRule::new(
                Category::Bills,
                &["bill", "electricity", "water", "internet", "tv", "subscription"],
            ),
            CategoryRule::new(Category::Shopping, &["shop", "buy", "purchase", "market"]),
            CategoryRule::new(
                Category::Income,
                &["salary", "paid", "received", "income", "mpesa received"],
            ),
            CategoryRule::new(
                Category::Business,
                &["inventory", "wholesale", "stock", "supplies"],
            ),
            CategoryRule::new(
                Category::Family,
                &["school", "medical", "hospital", "family", "mom", "dad"],
            ),
        ])
    }

    /// Load an ordered rule table from a JSON array of `{category, keywords}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        CategoryRules::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let rules: Vec<CategoryRule> =
            serde_json::from_str(content).context("Failed to parse category rules JSON")?;

        Ok(CategoryRules::from_rules(rules))
    }

    /// Keywords are lower-cased and blanks dropped; order is kept as given
    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        CategoryRules {
            rules: rules.into_iter().map(CategoryRule::normalized).collect(),
        }
    }

    /// First category with a keyword in the text, with the keyword that hit
    pub fn classify(&self, text: &str) -> Option<(Category, &str)> {
        self.rules
            .iter()
            .find_map(|rule| rule.matches(text).map(|keyword| (rule.category, keyword)))
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// TESTS
// ============================================================================
