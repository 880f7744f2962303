use crate::{
    dialect::{CurrentDialect, CurrentRow, Dialect},
    query::ImageQuery,
};
use chrono::{DateTime, Utc};
pub use sqlx::Pool;
use sqlx::{FromRow, Row};
use thiserror::Error;

pub use crate::dialect::Db;

pub async fn run_migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
    CurrentDialect::migration(pool).await
}

/// A single row of the `images` table.
///
/// Tag names live in their own table and are fetched separately; the
/// [`crate::app`] module combines both into the response projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    pub id: i64,
    pub image: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, CurrentRow> for ImageRow {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let image: String = row.try_get("image")?;
        let description: Option<String> = row.try_get("description")?;
        let rating: Option<f64> = row.try_get("rating")?;
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "created_at".to_string(),
                source: Box::new(e),
            })?
            .with_timezone(&Utc);

        Ok(ImageRow {
            id,
            image,
            description,
            rating,
            created_at,
        })
    }
}

/// A database abstraction for reading image records and their tag relations.
///
/// This struct wraps an SQLx connection pool and provides high-level,
/// read-only methods to query images and their tags. The implementation is
/// SQL dialect agnostic and delegates syntax to `Dialect`. The write side
/// of the schema is owned by the surrounding application.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Db>,
}

impl Database {
    pub async fn with_migration(pool: sqlx::Pool<Db>) -> Result<Self, sqlx::Error> {
        run_migration(&pool).await?;

        Ok(Self { pool })
    }

    async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, DatabaseError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DatabaseError>>,
    {
        let max_retries = 3;
        for attempt in 0..max_retries {
            let result = op().await;
            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if e.is_retryable() && attempt + 1 < max_retries => {
                    // backoff: simple fixed delay or exponential if needed
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("Retry loop should return before exceeding max_retries")
    }

    /// Performs a filter query on images using an [`ImageQuery`] expression tree.
    ///
    /// Returns a list of image ids that match the query, ordered by id.
    /// Query construction is handled by the `query` module.
    pub async fn query_image_ids(&self, query: ImageQuery) -> Result<Vec<i64>, DatabaseError> {
        let (sql, params) = query.to_sql();
        let stmt = CurrentDialect::query_image_statement(sql);

        let ids = self
            .retry(|| async {
                let mut q = sqlx::query_scalar::<_, i64>(&stmt);

                for param in &params {
                    q = q.bind(param);
                }

                q.fetch_all(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::QueryImages,
                        sql: stmt.to_string(),
                        source: e,
                    })
            })
            .await?;

        Ok(ids)
    }

    /// Retrieves a single image row by id.
    ///
    /// Returns `None` if no image with the given id exists.
    pub async fn get_image(&self, id: i64) -> Result<Option<ImageRow>, DatabaseError> {
        let stmt = CurrentDialect::query_image_row_statement();

        let row: Option<ImageRow> = self
            .retry(|| async {
                sqlx::query_as(&stmt)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::QueryImageRow { id },
                        sql: stmt.to_string(),
                        source: e,
                    })
            })
            .await?;

        Ok(row)
    }

    /// Returns a list of tag names associated with the given image id.
    ///
    /// If no tags exist, returns an empty vector. Names are ordered
    /// alphabetically.
    pub async fn get_tags(&self, id: i64) -> Result<Vec<String>, DatabaseError> {
        let stmt = CurrentDialect::query_tags_by_image_statement();

        let rows = self
            .retry(|| async {
                sqlx::query_scalar(&stmt)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::QueryImageTags { id },
                        sql: stmt.to_string(),
                        source: e,
                    })
            })
            .await?;

        Ok(rows)
    }
}

/// Represents errors that can occur during database operations.
///
/// Each variant includes contextual information to assist with debugging and error handling.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A general SQL query failure, with full context including operation and SQL.
    #[error("Query failed during {operation:?}: sql={sql}")]
    QueryFailed {
        operation: DbOperation,
        sql: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Enum representing the kind of database operation being performed,
/// used for attaching context to [`DatabaseError::QueryFailed`].
#[derive(Debug)]
pub enum DbOperation {
    /// General image query using dynamic conditions
    QueryImages,
    /// SELECT ... FROM images WHERE id = ...
    QueryImageRow { id: i64 },
    /// SELECT tags.name FROM image_tags ... WHERE image_id = ...
    QueryImageTags { id: i64 },
}

impl DatabaseError {
    fn is_retryable(&self) -> bool {
        let is_retryable_kind = |e: &sqlx::Error| {
            matches!(e, sqlx::Error::Io(_))
                || matches!(e, sqlx::Error::Protocol(_))
                || matches!(e, sqlx::Error::PoolTimedOut)
        };

        match self {
            DatabaseError::QueryFailed {
                sql: _,
                source,
                operation: _,
            } => is_retryable_kind(source),
        }
    }
}
