use super::news_items::MAX_ITEMS;
use super::schema::Database;
use super::types::{DatabaseError, NewsItemRow, StoredNewsItem, NEWS_ITEM_COLUMNS};

// ============================================================================
// FTS5 Query Validation
// ============================================================================

const MAX_QUERY_LENGTH: usize = 256;
const MAX_WILDCARDS: usize = 3;
const MAX_OR_OPERATORS: usize = 5;
const MAX_PARENTHESES: usize = 5;
const MAX_AND_OPERATORS: usize = 10;

/// Validate FTS5 query complexity to prevent DoS via expensive wildcard expansions.
fn validate_fts_query(query: &str) -> Result<(), DatabaseError> {
    let reject = |msg: String| Err(DatabaseError::InvalidQuery(msg));

    if query.len() > MAX_QUERY_LENGTH {
        return reject(format!("exceeds maximum length of {MAX_QUERY_LENGTH} characters"));
    }
    if query.matches('*').count() > MAX_WILDCARDS {
        return reject(format!("too many wildcards (max {MAX_WILDCARDS})"));
    }

    let upper = query.to_uppercase();
    if upper.matches(" OR ").count() > MAX_OR_OPERATORS {
        return reject(format!("too many OR operators (max {MAX_OR_OPERATORS})"));
    }
    if upper.matches(" AND ").count() > MAX_AND_OPERATORS {
        return reject(format!("too many AND operators (max {MAX_AND_OPERATORS})"));
    }

    let open = query.chars().filter(|&c| c == '(').count();
    let close = query.chars().filter(|&c| c == ')').count();
    if open > MAX_PARENTHESES {
        return reject(format!("too many parentheses (max {MAX_PARENTHESES})"));
    }
    if open != close {
        return reject("unbalanced parentheses".to_string());
    }

    Ok(())
}

impl Database {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Add items to the full-text index. Re-indexing an item replaces its row.
    pub async fn index_items(&self, items: &[StoredNewsItem]) -> Result<(), DatabaseError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query("DELETE FROM news_items_fts WHERE rowid = ?")
                .bind(item.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO news_items_fts(rowid, title, description, body) VALUES (?, ?, ?, ?)",
            )
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.body)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(count = items.len(), "Indexed news items");
        Ok(())
    }

    /// Search indexed items by title, description or body.
    /// Uses FTS5 with a LIKE fallback for queries FTS5 cannot parse.
    pub async fn search_items(&self, query: &str) -> Result<Vec<StoredNewsItem>, DatabaseError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        validate_fts_query(query)?;

        let columns = NEWS_ITEM_COLUMNS
            .split(", ")
            .map(|c| format!("n.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {columns}
            FROM news_items n
            INNER JOIN news_items_fts ON n.id = news_items_fts.rowid
            WHERE news_items_fts MATCH ?
            ORDER BY n.published_at DESC
            LIMIT ?
        "#
        );

        let fts_result = sqlx::query_as::<_, NewsItemRow>(&sql)
            .bind(query)
            .bind(MAX_ITEMS)
            .fetch_all(&self.pool)
            .await;

        let rows = match fts_result {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "FTS5 search failed, falling back to LIKE");
                let like_sql = format!(
                    r#"
                    SELECT {NEWS_ITEM_COLUMNS}
                    FROM news_items
                    WHERE title LIKE ?1 OR description LIKE ?1
                    ORDER BY published_at DESC
                    LIMIT ?2
                "#
                );
                sqlx::query_as::<_, NewsItemRow>(&like_sql)
                    .bind(format!("%{query}%"))
                    .bind(MAX_ITEMS)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(NewsItemRow::into_item).collect()
    }
}
