//! # SQL Dialect Module
//!
//! This module defines the `Dialect` trait, which abstracts over the differences in
//! SQL syntax and behavior across various database systems. The `Dialect` trait
//! provides methods for generating database-specific SQL statements and queries
//! to ensure compatibility with the target database, such as SQLite or PostgreSQL.
//!
//! The module includes a compile-time determination of the current SQL dialect used,
//! driven by feature flags. When the `sqlite` feature is enabled, the `CurrentDialect`
//! type alias is set to `sqlite::SqliteDialect`.
//!
//! ## Key Components
//! - **`Dialect` Trait**: Outlines methods for generating SQL statements and queries
//!   that are dialect-specific. This includes handling placeholders and the filter
//!   subqueries used by the query module.
//! - **`CurrentDialect` Alias**: Represents the SQL dialect used based on current feature flags,
//!   allowing higher-level code to interact with the database through a common interface.
//!
//! The goal of this module is to allow higher-level application logic to remain agnostic
//! to the underlying SQL dialect, making it simpler to add support for additional
//! databases in the future.

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "postgres")]
mod postgres;

/// The current SQL dialect used at compile time, determined by feature flags.
#[cfg(feature = "sqlite")]
pub type CurrentDialect = sqlite::SqliteDialect;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type CurrentDialect = postgres::PostgresDialect;

#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

#[cfg(feature = "sqlite")]
pub type CurrentRow = sqlx::sqlite::SqliteRow;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type CurrentRow = sqlx::postgres::PgRow;

/// A trait for SQL dialects to support database-specific query generation.
///
/// This trait provides methods that return SQL strings compatible with the
/// target database (e.g., SQLite, PostgreSQL). The goal is to abstract
/// away differences in placeholder syntax and DDL so that higher-level
/// logic can remain dialect-agnostic.
pub trait Dialect {
    /// Returns the SQL placeholder syntax for the given parameter index.
    ///
    /// - SQLite: `?`
    /// - PostgreSQL: `$1`, `$2`, ...
    ///
    /// # Parameters
    /// - `idx`: The 1-based parameter index (used in dialects that number placeholders).
    fn placeholder(idx: usize) -> String;

    /// Returns a SQL `EXISTS` subquery to check if an image is tagged with a given tag.
    ///
    /// The returned SQL should be used within a WHERE clause and include a placeholder
    /// for the tag name.
    ///
    /// # Parameters
    /// - `idx`: The parameter index for the tag name in the query.
    fn exists_tag_query(idx: usize) -> String {
        format!(
            "EXISTS (SELECT 1 FROM image_tags JOIN tags ON tags.id = image_tags.tag_id WHERE image_tags.image_id = images.id AND tags.name = {})",
            Self::placeholder(idx)
        )
    }

    /// Returns a SQL predicate matching descriptions case-insensitively.
    ///
    /// The bound parameter is expected to already be a lowercased LIKE
    /// pattern (`%fragment%`). A null description never matches.
    ///
    /// # Parameters
    /// - `idx`: The parameter index for the pattern in the query.
    fn description_match_query(idx: usize) -> String {
        format!("LOWER(description) LIKE {}", Self::placeholder(idx))
    }

    /// Returns a full SELECT statement for retrieving image ids that match
    /// the given condition clause.
    ///
    /// # Parameters
    /// - `condition`: The SQL fragment (WHERE clause plus ordering and
    ///   pagination) generated by the query module.
    fn query_image_statement(condition: String) -> String {
        format!("SELECT id FROM images {}", condition)
    }

    /// Returns the SQL statement to retrieve a single image row by id.
    fn query_image_row_statement() -> String {
        format!(
            "SELECT id, image, description, rating, created_at FROM images WHERE id = {}",
            Self::placeholder(1)
        )
    }

    /// Returns the SQL statement to retrieve all tag names for a given image id.
    ///
    /// Should return a single-column result (`name`), ordered by name so a
    /// tag set always reads the same way.
    fn query_tags_by_image_statement() -> String {
        format!(
            "SELECT tags.name FROM image_tags JOIN tags ON tags.id = image_tags.tag_id WHERE image_tags.image_id = {} ORDER BY tags.name",
            Self::placeholder(1)
        )
    }

    /// Applies the SQL migration statements needed for setting up the database.
    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error>;
}
