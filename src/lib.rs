//! # Image Search and Filtering Service
//!
//! This crate provides the query side of an image catalogue: searching image
//! records by tag membership or description text, and ordering
//! already-fetched records by rating or creation date. It is a read-only
//! layer over a relational store; creating, mutating, and deleting images
//! and tags is the responsibility of the surrounding application.
//!
//! ## Features
//!
//! - **Tag Search**: Find every image carrying *all* of a requested set of
//!   tags. The store performs a broad any-overlap pre-filter and the
//!   service enforces the subset condition in memory.
//! - **Description Search**: Case-insensitive substring matching against
//!   the image description, evaluated entirely by the store.
//! - **Rating and Date Ordering**: Stable descending sorts over
//!   caller-supplied record lists with offset/limit pagination.
//! - **Backend Selection**: SQLite by default, Postgres behind a feature
//!   flag, with SQL differences isolated in a dialect layer.
//!
//! ## Usage
//!
//! The main entry points are the free functions in the [`app`] module,
//! which operate on a [`database::Database`] handle.
//!
//! ```no_run
//! use pixsift::app::{self, Page};
//! use pixsift::database::Database;
//!
//! async fn show_cute_cats(db: &Database) {
//!     let tags = vec!["cat".to_string(), "cute".to_string()];
//!
//!     match app::search_by_tags(db, &tags).await {
//!         Ok(images) => {
//!             for image in app::sort_by_rating(images, Page::default()) {
//!                 println!("{} ({:?})", image.image, image.rating);
//!             }
//!         }
//!         Err(error) => eprintln!("search failed: {error}"),
//!     }
//! }
//! ```

pub mod app;
pub mod database;
mod dialect;
pub mod query;
