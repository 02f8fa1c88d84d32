//! Seed the quote library and the occasion calendar from YAML files.
//!
//! # Usage
//!
//! ```bash
//! bw-cli seed quotes crates/cli/seeds/quotes.yaml
//! bw-cli seed events crates/cli/seeds/events.yaml
//! ```
//!
//! Rows are inserted as given; running a seed twice duplicates them.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use best_wishes_server::db::RepositoryError;
use best_wishes_server::db::events::EventRepository;
use best_wishes_server::db::quotes::QuoteRepository;
use best_wishes_server::models::event::NewEvent;
use best_wishes_server::models::quote::NewQuote;

use super::{CommandError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
pub struct QuoteSeed {
    pub quotes: Vec<NewQuote>,
}

#[derive(Debug, Deserialize)]
pub struct EventSeed {
    pub events: Vec<NewEvent>,
}

impl QuoteSeed {
    /// One message per unusable entry.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        self.quotes
            .iter()
            .enumerate()
            .filter(|(_, q)| q.text.trim().is_empty())
            .map(|(i, _)| format!("quote #{}: text is empty", i + 1))
            .collect()
    }
}

impl EventSeed {
    /// One message per unusable entry.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name.trim().is_empty())
            .map(|(i, _)| format!("event #{}: name is empty", i + 1))
            .collect()
    }
}

async fn load<T: for<'de> Deserialize<'de>>(file_path: &str) -> Result<T, SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::NotFound(file_path.to_owned()));
    }
    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_yaml::from_str(&content)?)
}

fn check(errors: &[String]) -> Result<(), SeedError> {
    if errors.is_empty() {
        return Ok(());
    }
    error!("Seed file validation failed:");
    for err in errors {
        error!("  - {err}");
    }
    Err(SeedError::Invalid(errors.len()))
}

/// Insert every quote in the file.
///
/// # Errors
///
/// Returns `SeedError` if the file is missing or invalid, or an insert fails.
pub async fn quotes(file_path: &str) -> Result<(), SeedError> {
    let seed: QuoteSeed = load(file_path).await?;
    check(&seed.validate())?;
    info!(quotes = seed.quotes.len(), "Parsed quotes");

    let pool = connect().await?;
    let repo = QuoteRepository::new(&pool);
    for quote in &seed.quotes {
        repo.create(quote).await?;
    }

    info!("Seeding complete! Quotes inserted: {}", seed.quotes.len());
    Ok(())
}

/// Insert every event in the file.
///
/// # Errors
///
/// Returns `SeedError` if the file is missing or invalid, or an insert fails.
pub async fn events(file_path: &str) -> Result<(), SeedError> {
    let seed: EventSeed = load(file_path).await?;
    check(&seed.validate())?;
    info!(events = seed.events.len(), "Parsed events");

    let pool = connect().await?;
    let repo = EventRepository::new(&pool);
    for event in &seed.events {
        repo.create(event).await?;
    }

    info!("Seeding complete! Events inserted: {}", seed.events.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use best_wishes_core::{QuoteCategory, QuoteType};

    use super::*;

    #[test]
    fn test_bundled_quotes_parse() {
        let seed: QuoteSeed = serde_yaml::from_str(include_str!("../../seeds/quotes.yaml")).unwrap();
        assert!(seed.validate().is_empty());
        assert!(seed.quotes.iter().any(|q| q.category == QuoteCategory::Birthday));
        assert!(seed.quotes.iter().any(|q| q.quote_type == QuoteType::Mug));
    }

    #[test]
    fn test_bundled_events_parse() {
        let seed: EventSeed = serde_yaml::from_str(include_str!("../../seeds/events.yaml")).unwrap();
        assert!(seed.validate().is_empty());
        assert!(seed.events.iter().all(|e| e.is_active));
    }

    #[test]
    fn test_blank_quote_flagged() {
        let seed: QuoteSeed = serde_yaml::from_str(
            "quotes:\n  - text: \"  \"\n    category: love\n",
        )
        .unwrap();
        assert_eq!(seed.validate(), vec!["quote #1: text is empty".to_string()]);
        assert_eq!(seed.quotes.first().unwrap().quote_type, QuoteType::Both);
    }
}
