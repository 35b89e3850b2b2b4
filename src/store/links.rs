//! Registry of discovered download links, keyed by category.
//!
//! Link discovery itself happens elsewhere; its output reaches the registry
//! as `category,url` lines (see [`parse_link_list`]) and replaces the stored
//! set wholesale.

use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use url::Url;

use super::StoreError;
use crate::db::Database;
use crate::fetch::FetchRequest;

/// A stored link.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Link {
    /// Unique category tag (e.g. `AllPrintings`).
    pub category: String,
    /// Download URL.
    pub url: String,
    /// UTC timestamp of the `replace_all` that stored it (`YYYY-MM-DDTHH:MM:SSZ`).
    pub discovered_at: String,
}

impl Link {
    /// Builds the fetch request for this link.
    #[must_use]
    pub fn to_fetch_request(&self) -> FetchRequest {
        FetchRequest::new(&self.category, &self.url)
    }
}

/// A link to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    /// Category tag.
    pub category: String,
    /// Download URL.
    pub url: String,
}

impl NewLink {
    /// Creates a link.
    pub fn new(category: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            url: url.into(),
        }
    }
}

/// A line of a link list that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number.
    pub line_number: usize,
    /// The raw line.
    pub content: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of [`parse_link_list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkListParse {
    /// Usable links, in input order.
    pub links: Vec<NewLink>,
    /// Malformed lines.
    pub skipped: Vec<SkippedLine>,
}

/// Parses `category,url` lines. Blank lines and `#` comments are ignored.
#[must_use]
pub fn parse_link_list(text: &str) -> LinkListParse {
    let mut parsed = LinkListParse::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let skip = |reason: &str| SkippedLine {
            line_number: index + 1,
            content: raw.to_string(),
            reason: reason.to_string(),
        };

        let Some((category, url)) = line.split_once(',') else {
            parsed.skipped.push(skip("expected `category,url`"));
            continue;
        };
        let (category, url) = (category.trim(), url.trim());

        if category.is_empty() {
            parsed.skipped.push(skip("empty category"));
            continue;
        }
        match Url::parse(url) {
            Ok(parsed_url) if matches!(parsed_url.scheme(), "http" | "https") => {
                parsed.links.push(NewLink::new(category, url));
            }
            _ => parsed.skipped.push(skip("not an http(s) URL")),
        }
    }

    debug!(
        links = parsed.links.len(),
        skipped = parsed.skipped.len(),
        "parsed link list"
    );
    parsed
}

/// Category → URL registry.
#[derive(Debug, Clone)]
pub struct LinkRegistry {
    db: Database,
}

impl LinkRegistry {
    /// Creates a registry over the given database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replaces every stored link with `links` in one transaction.
    ///
    /// A category listed twice keeps its last URL. Returns the number of
    /// links stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the transaction fails; the
    /// previous links are kept in that case.
    #[instrument(skip(self, links), fields(count = links.len()))]
    pub async fn replace_all(&self, links: &[NewLink]) -> Result<usize, StoreError> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM links").execute(&mut *tx).await?;
        for link in links {
            sqlx::query(
                r"INSERT INTO links (category, url)
                  VALUES (?, ?)
                  ON CONFLICT(category) DO UPDATE SET url = excluded.url",
            )
            .bind(&link.category)
            .bind(&link.url)
            .execute(&mut *tx)
            .await?;
        }

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let stored = usize::try_from(stored).unwrap_or_default();
        info!(stored, "link registry replaced");
        Ok(stored)
    }

    /// Lists every link ordered by category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn list(&self) -> Result<Vec<Link>, StoreError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT category, url, discovered_at FROM links ORDER BY category",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(links)
    }

    /// Looks up one category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get(&self, category: &str) -> Result<Option<Link>, StoreError> {
        let link = sqlx::query_as::<_, Link>(
            "SELECT category, url, discovered_at FROM links WHERE category = ?",
        )
        .bind(category)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(link)
    }
}
