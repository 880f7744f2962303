//! # Query Service Module
//!
//! This module provides the high-level read operations of the image
//! catalogue: searching stored records by tag membership or description
//! text, and ordering already-fetched record lists by rating or creation
//! date. It defines the response projection and pagination types shared by
//! the HTTP and CLI surfaces.
//!
//! ## Core Asynchronous Functions
//!
//! - **search_by_tags**: Finds every image whose tag set contains *all*
//!   requested tags. The store narrows candidates to images carrying at
//!   least one of the tags; the subset condition is then enforced in
//!   memory, because a store-level containment filter only expresses
//!   "any of".
//! - **search_by_description**: Finds every image whose description
//!   contains a fragment case-insensitively, delegating the predicate
//!   entirely to the store.
//! - **find_image_by_id**: Retrieves a full [`ImageResponse`] by id,
//!   consolidating the image row and its tag names.
//!
//! ## Pure Functions
//!
//! - **sort_by_rating** and **sort_by_date**: Stable descending sorts over
//!   caller-supplied [`ImageResponse`] lists, paginated by [`Page`]. They
//!   perform no I/O; the input is whatever the caller already fetched.
//!
//! ## Error Handling
//!
//! Defines the `AppError` enum, encapsulating database faults and invalid
//! queries to promote clear and manageable error management throughout the
//! service operations.

use crate::{
    database::{Database, DatabaseError},
    query::{ImageQuery, ImageQueryExpr, ImageQueryKind},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::task::JoinSet;

/// The externally visible projection of an image and its tag names.
///
/// Derived from an image row plus its tag relations at response time;
/// never persisted. `rating` and `created_at` stay optional because sort
/// requests may carry partially populated records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// The stable identifier of the image.
    pub id: i64,
    /// The image reference (URI or storage key).
    pub image: String,
    /// Free-text description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Tag names attached to the image. Order carries no meaning.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Numeric rating, if any.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Creation timestamp, if known.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Default page size for the sort operations.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest page size the sort operations accept.
pub const MAX_LIMIT: usize = 100;

/// An offset/limit window over an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of leading records to drop.
    pub skip: usize,
    /// Number of records to return.
    pub limit: usize,
}

impl Page {
    /// Validates raw pagination parameters.
    ///
    /// `skip` must be non-negative and `limit` must lie in
    /// `1..=MAX_LIMIT`. Missing values fall back to `0` and
    /// [`DEFAULT_LIMIT`].
    pub fn try_new(skip: Option<i64>, limit: Option<i64>) -> Result<Self, PageError> {
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(PageError::NegativeSkip { skip });
        }

        let limit = limit.unwrap_or(DEFAULT_LIMIT as i64);
        if !(1..=MAX_LIMIT as i64).contains(&limit) {
            return Err(PageError::LimitOutOfRange { limit });
        }

        Ok(Page {
            skip: skip as usize,
            limit: limit as usize,
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Rejection produced by [`Page::try_new`] for out-of-range parameters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PageError {
    #[error("skip must be non-negative, got {skip}")]
    NegativeSkip { skip: i64 },

    #[error("limit must be between 1 and {MAX_LIMIT}, got {limit}")]
    LimitOutOfRange { limit: i64 },
}

/// Finds every image that carries all of the requested tags.
///
/// The store first returns candidates that carry *at least one* of the
/// tags — a broad pre-filter that bounds the result size — and each
/// candidate is then kept only if the requested set is a subset of its
/// tag-name set. Images with no tags never match.
///
/// # Arguments
///
/// * `db` - Reference to the database to query.
/// * `tags` - The tag names an image must all carry. Must be non-empty.
///
/// # Returns
///
/// Returns a `Result` containing the matching [`ImageResponse`] records in
/// id order, or an `AppError` if the list is empty or a query fails.
pub async fn search_by_tags(
    db: &Database,
    tags: &[String],
) -> Result<Vec<ImageResponse>, AppError> {
    let Some(expr) = tags
        .iter()
        .cloned()
        .map(ImageQueryExpr::Tag)
        .reduce(ImageQueryExpr::or)
    else {
        return Err(AppError::EmptyTagQuery);
    };

    let ids = db
        .query_image_ids(ImageQuery::new(ImageQueryKind::Where(expr)))
        .await?;
    let candidates = hydrate(db, ids).await?;

    let requested: HashSet<&str> = tags.iter().map(String::as_str).collect();

    Ok(candidates
        .into_iter()
        .filter(|image| {
            let names: HashSet<&str> = image.tags.iter().map(String::as_str).collect();
            requested.is_subset(&names)
        })
        .collect())
}

/// Finds every image whose description contains the given fragment,
/// case-insensitively.
///
/// The substring predicate is evaluated entirely by the store; no
/// post-filtering happens here. An empty fragment matches every image
/// with a non-null description, and a null description never matches.
///
/// # Arguments
///
/// * `db` - Reference to the database to query.
/// * `fragment` - The text fragment to look for.
///
/// # Returns
///
/// Returns a `Result` containing the matching [`ImageResponse`] records in
/// id order, or an `AppError` if the query fails.
pub async fn search_by_description(
    db: &Database,
    fragment: &str,
) -> Result<Vec<ImageResponse>, AppError> {
    let expr = ImageQueryExpr::description_contains(fragment);

    let ids = db
        .query_image_ids(ImageQuery::new(ImageQueryKind::Where(expr)))
        .await?;

    hydrate(db, ids).await
}

/// Retrieves a full image projection by its id.
///
/// This function loads the image row and its tag names from the database
/// and combines them into an [`ImageResponse`].
///
/// # Arguments
///
/// * `db` - Reference to the database to retrieve image-related information.
/// * `id` - The id of the image to retrieve.
///
/// # Returns
///
/// Returns a `Result` containing the [`ImageResponse`] or an `AppError` if
/// the image does not exist or retrieval fails.
pub async fn find_image_by_id(db: &Database, id: i64) -> Result<ImageResponse, AppError> {
    let row = db
        .get_image(id)
        .await?
        .ok_or(AppError::ImageNotFound { id })?;

    let tags = db.get_tags(id).await?;

    Ok(ImageResponse {
        id: row.id,
        image: row.image,
        description: row.description,
        tags,
        rating: row.rating,
        created_at: Some(row.created_at),
    })
}

/// Hydrates a list of image ids into full projections.
///
/// Rows and tag names are loaded in parallel to improve efficiency; the
/// input order is preserved in the output.
async fn hydrate(db: &Database, ids: Vec<i64>) -> Result<Vec<ImageResponse>, AppError> {
    let mut set = JoinSet::new();
    for id in ids.clone() {
        let db = db.clone();
        set.spawn(async move {
            let image = find_image_by_id(&db, id).await?;
            Ok::<(i64, ImageResponse), AppError>((id, image))
        });
    }

    let mut map = HashMap::new();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(Ok((id, image))) => {
                map.insert(id, image);
            }
            Ok(Err(e)) => return Err(e),
            Err(join_err) => panic!("task panicked in image retrieval: {join_err}"),
        }
    }

    let images = ids.into_iter().filter_map(|id| map.remove(&id)).collect();

    Ok(images)
}

/// Orders a record list by rating, highest first, and returns one page.
///
/// A missing rating counts as the lowest possible value and sorts last.
/// The sort is stable: records with equal ratings keep their input order.
pub fn sort_by_rating(mut images: Vec<ImageResponse>, page: Page) -> Vec<ImageResponse> {
    images.sort_by(|a, b| {
        let ra = a.rating.unwrap_or(f64::NEG_INFINITY);
        let rb = b.rating.unwrap_or(f64::NEG_INFINITY);
        rb.total_cmp(&ra)
    });

    paginate(images, page)
}

/// Orders a record list by creation timestamp, most recent first, and
/// returns one page.
///
/// A missing timestamp sorts last. The sort is stable.
pub fn sort_by_date(mut images: Vec<ImageResponse>, page: Page) -> Vec<ImageResponse> {
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    paginate(images, page)
}

fn paginate(images: Vec<ImageResponse>, page: Page) -> Vec<ImageResponse> {
    images.into_iter().skip(page.skip).take(page.limit).collect()
}

/// Error types within the service, encapsulating database faults and
/// invalid queries.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("image not found: {id}")]
    ImageNotFound { id: i64 },

    #[error("tag search requires at least one tag")]
    EmptyTagQuery,
}

#[cfg(test)]
mod tests {
    use crate::{
        app::{
            AppError, ImageResponse, Page, PageError, search_by_description, search_by_tags,
            sort_by_date, sort_by_rating,
        },
        database::{Database, Db, Pool},
    };
    use chrono::{DateTime, Utc};
    use std::str::FromStr;

    /// Returns an in-memory SQLite pool capped at one connection, so every
    /// query sees the same database.
    async fn get_pool() -> Pool<Db> {
        sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    async fn insert_image(pool: &Pool<Db>, id: i64, description: Option<&str>, tags: &[&str]) {
        sqlx::query("INSERT INTO images (id, image, description, rating, created_at) VALUES (?, ?, ?, NULL, ?)")
            .bind(id)
            .bind(format!("https://cdn.example.com/{id}.png"))
            .bind(description)
            .bind("2024-03-01T10:00:00+00:00")
            .execute(pool)
            .await
            .unwrap();

        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO image_tags (image_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
            )
            .bind(id)
            .bind(tag)
            .execute(pool)
            .await
            .unwrap();
        }
    }

    fn owned(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    fn ids(images: &[ImageResponse]) -> Vec<i64> {
        images.iter().map(|i| i.id).collect()
    }

    /// An image matches exactly when the requested set is a subset of its
    /// tag set: requesting `[a, b]` must not return an image tagged only
    /// `[a]`, even though the store pre-filter produces it as a candidate.
    #[tokio::test]
    async fn test_search_by_tags_requires_all_tags() {
        let pool = get_pool().await;
        let db = Database::with_migration(pool.clone()).await.unwrap();

        insert_image(&pool, 1, None, &["a", "b"]).await;
        insert_image(&pool, 2, None, &["a"]).await;

        let matches = search_by_tags(&db, &owned(&["a", "b"])).await.unwrap();

        assert_eq!(vec![1], ids(&matches));
        assert_eq!(vec!["a".to_string(), "b".to_string()], matches[0].tags);
    }

    /// Adding a required tag can only shrink the result set.
    #[tokio::test]
    async fn test_search_by_tags_narrows_as_tags_grow() {
        let pool = get_pool().await;
        let db = Database::with_migration(pool.clone()).await.unwrap();

        insert_image(&pool, 1, None, &["cat"]).await;
        insert_image(&pool, 2, None, &["cat", "cute"]).await;
        insert_image(&pool, 3, None, &["cat", "cute", "gray"]).await;
        insert_image(&pool, 4, None, &[]).await;

        let one = search_by_tags(&db, &owned(&["cat"])).await.unwrap();
        let two = search_by_tags(&db, &owned(&["cat", "cute"])).await.unwrap();
        let three = search_by_tags(&db, &owned(&["cat", "cute", "gray"]))
            .await
            .unwrap();

        assert_eq!(vec![1, 2, 3], ids(&one));
        assert_eq!(vec![2, 3], ids(&two));
        assert_eq!(vec![3], ids(&three));
    }

    #[tokio::test]
    async fn test_search_by_tags_rejects_empty_request() {
        let pool = get_pool().await;
        let db = Database::with_migration(pool.clone()).await.unwrap();

        let result = search_by_tags(&db, &[]).await;

        assert!(matches!(result, Err(AppError::EmptyTagQuery)));
    }

    #[tokio::test]
    async fn test_search_by_description_substring() {
        let pool = get_pool().await;
        let db = Database::with_migration(pool.clone()).await.unwrap();

        insert_image(&pool, 1, Some("Hello"), &[]).await;
        insert_image(&pool, 2, Some("world"), &[]).await;
        insert_image(&pool, 3, Some("ELEPHANT"), &[]).await;
        insert_image(&pool, 4, None, &[]).await;

        let matches = search_by_description(&db, "ell").await.unwrap();
        assert_eq!(vec![1], ids(&matches));

        // Same result set regardless of the fragment's case.
        assert_eq!(
            ids(&search_by_description(&db, "cat").await.unwrap()),
            ids(&search_by_description(&db, "CAT").await.unwrap()),
        );
        assert_eq!(
            vec![3],
            ids(&search_by_description(&db, "ePhAn").await.unwrap())
        );

        // The empty fragment matches every image with a description.
        assert_eq!(
            vec![1, 2, 3],
            ids(&search_by_description(&db, "").await.unwrap())
        );
    }

    fn card(id: i64, rating: Option<f64>, created_at: &str) -> ImageResponse {
        ImageResponse {
            id,
            image: format!("https://cdn.example.com/{id}.png"),
            description: None,
            tags: vec![],
            rating,
            created_at: Some(DateTime::<Utc>::from_str(created_at).unwrap()),
        }
    }

    #[test]
    fn test_sort_by_rating_descending_nulls_last() {
        let input = vec![
            card(1, Some(3.0), "2024-03-01T10:00:00Z"),
            card(2, None, "2024-03-01T10:00:00Z"),
            card(3, Some(5.0), "2024-03-01T10:00:00Z"),
        ];

        let page = sort_by_rating(input.clone(), Page { skip: 0, limit: 2 });
        assert_eq!(vec![3, 1], ids(&page));

        let all = sort_by_rating(input, Page { skip: 0, limit: 10 });
        assert_eq!(vec![3, 1, 2], ids(&all));
    }

    #[test]
    fn test_sort_by_rating_ties_keep_input_order() {
        let input = vec![
            card(1, Some(4.0), "2024-03-01T10:00:00Z"),
            card(2, Some(5.0), "2024-03-01T10:00:00Z"),
            card(3, Some(4.0), "2024-03-01T10:00:00Z"),
            card(4, Some(4.0), "2024-03-01T10:00:00Z"),
        ];

        let sorted = sort_by_rating(input, Page { skip: 0, limit: 10 });

        assert_eq!(vec![2, 1, 3, 4], ids(&sorted));
    }

    #[test]
    fn test_sort_by_date_most_recent_first() {
        let input = vec![
            card(1, None, "2024-03-01T10:00:00Z"),
            card(2, None, "2024-05-01T10:00:00Z"),
            card(3, None, "2024-04-01T10:00:00Z"),
        ];

        let sorted = sort_by_date(input, Page { skip: 0, limit: 10 });

        assert_eq!(vec![2, 3, 1], ids(&sorted));
    }

    /// `len(output) == max(0, min(limit, len(input) - skip))`, and the page
    /// is the corresponding slice of the fully sorted sequence.
    #[test]
    fn test_pagination_window() {
        let input: Vec<ImageResponse> = (1..=5)
            .map(|id| card(id, Some(id as f64), "2024-03-01T10:00:00Z"))
            .collect();

        // Fully sorted: [5, 4, 3, 2, 1]
        let middle = sort_by_rating(input.clone(), Page { skip: 1, limit: 2 });
        assert_eq!(vec![4, 3], ids(&middle));

        let tail = sort_by_rating(input.clone(), Page { skip: 4, limit: 10 });
        assert_eq!(vec![1], ids(&tail));

        let beyond = sort_by_rating(input.clone(), Page { skip: 9, limit: 10 });
        assert!(beyond.is_empty());

        let empty = sort_by_rating(vec![], Page { skip: 0, limit: 10 });
        assert!(empty.is_empty());

        let dates = sort_by_date(input, Page { skip: 3, limit: 100 });
        assert_eq!(2, dates.len());
    }

    #[test]
    fn test_page_validation() {
        assert_eq!(Ok(Page { skip: 0, limit: 10 }), Page::try_new(None, None));
        assert_eq!(
            Ok(Page { skip: 3, limit: 100 }),
            Page::try_new(Some(3), Some(100))
        );

        assert_eq!(
            Err(PageError::NegativeSkip { skip: -1 }),
            Page::try_new(Some(-1), None)
        );
        assert_eq!(
            Err(PageError::LimitOutOfRange { limit: 0 }),
            Page::try_new(None, Some(0))
        );
        assert_eq!(
            Err(PageError::LimitOutOfRange { limit: 101 }),
            Page::try_new(None, Some(101))
        );
    }
}
