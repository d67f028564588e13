// Keyword-matched knowledge base lookup used to ground AI replies. Plain
// substring and keyword matching, deliberately not semantic search.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KbArticle {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub keywords: Vec<String>,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct KnowledgeBaseService;

impl KnowledgeBaseService {
    /// Top matching published articles for a customer query. Keyword-array
    /// hits rank above plain title/content substring hits.
    pub async fn search(
        pool: &PgPool,
        query: &str,
        limit: i64,
    ) -> Result<Vec<KbArticle>, sqlx::Error> {
        let terms = extract_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%({})%", terms.join("|"));

        sqlx::query_as::<_, KbArticle>(
            r#"
            SELECT * FROM kb_articles
            WHERE is_published = true
              AND (
                  keywords && $1
                  OR lower(title) SIMILAR TO $2
                  OR lower(content) SIMILAR TO $2
              )
            ORDER BY (keywords && $1) DESC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(&terms)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Seeds a small default corpus so fresh installs ground AI answers in
    /// something. No-op when articles already exist.
    pub async fn seed_defaults(pool: &PgPool) -> Result<(), sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kb_articles")
            .fetch_one(pool)
            .await?;
        if count.0 > 0 {
            return Ok(());
        }

        let defaults: [(&str, &str, &[&str]); 3] = [
            (
                "Getting started",
                "Install the widget snippet on your site and conversations will appear in the agent dashboard.",
                &["start", "install", "setup", "widget"],
            ),
            (
                "Billing and refunds",
                "Refunds are processed within 5 business days to the original payment method.",
                &["billing", "refund", "payment", "invoice"],
            ),
            (
                "Password reset",
                "Use the 'Forgot password' link on the login page to receive a reset email.",
                &["password", "reset", "login", "account"],
            ),
        ];

        for (title, content, keywords) in defaults {
            let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
            sqlx::query("INSERT INTO kb_articles (title, content, keywords) VALUES ($1, $2, $3)")
                .bind(title)
                .bind(content)
                .bind(&keywords)
                .execute(pool)
                .await?;
        }

        tracing::info!("Seeded default knowledge base articles");
        Ok(())
    }
}

/// Lowercased query words of three or more characters, deduplicated in order.
pub fn extract_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.len() >= 3 && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_duplicate_words_are_dropped() {
        assert_eq!(
            extract_terms("My my REFUND is a refund?!"),
            vec!["refund".to_string()]
        );
    }

    #[test]
    fn punctuation_splits_terms() {
        assert_eq!(
            extract_terms("password-reset, please"),
            vec!["password".to_string(), "reset".to_string(), "please".to_string()]
        );
    }

    #[test]
    fn empty_query_yields_no_terms() {
        assert!(extract_terms("a an I").is_empty());
    }
}
