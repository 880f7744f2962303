//! Query module for building image filter queries.
//!
//! Filters are expressed as a small expression tree and compiled into a
//! parameterized SQL WHERE clause through the active dialect. The tag
//! search pre-filter is the OR-reduction of [`ImageQueryExpr::tag`]
//! conditions; description search is a single
//! [`ImageQueryExpr::description_contains`] node.

use crate::dialect::{CurrentDialect, Dialect};

/// Represents a logical filter expression over image records.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageQueryExpr {
    /// The image carries the given tag.
    Tag(String),

    /// The image description contains the given fragment,
    /// case-insensitively. An empty fragment matches every image with a
    /// non-null description.
    DescriptionContains(String),

    /// Logical AND of two subexpressions.
    And(Box<ImageQueryExpr>, Box<ImageQueryExpr>),

    /// Logical OR of two subexpressions.
    Or(Box<ImageQueryExpr>, Box<ImageQueryExpr>),

    /// Logical NOT of a subexpression.
    Not(Box<ImageQueryExpr>),
}

impl ImageQueryExpr {
    /// Creates a query expression from a single tag.
    pub fn tag<T: Into<String>>(tag: T) -> Self {
        ImageQueryExpr::Tag(tag.into())
    }

    /// Creates a query expression matching descriptions that contain the
    /// given fragment.
    pub fn description_contains<T: Into<String>>(fragment: T) -> Self {
        ImageQueryExpr::DescriptionContains(fragment.into())
    }

    /// Combines two expressions with a logical AND.
    pub fn and(self, other: ImageQueryExpr) -> Self {
        ImageQueryExpr::And(Box::new(self), Box::new(other))
    }

    /// Combines two expressions with a logical OR.
    pub fn or(self, other: ImageQueryExpr) -> Self {
        ImageQueryExpr::Or(Box::new(self), Box::new(other))
    }

    /// Negates a query expression.
    pub fn not(expr: ImageQueryExpr) -> Self {
        ImageQueryExpr::Not(Box::new(expr))
    }

    /// Converts the query expression into an SQL WHERE clause and its bound parameters.
    ///
    /// # Returns
    /// - `(String, Vec<String>)`: A tuple containing the SQL fragment and the corresponding parameter values.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut params = Vec::new();
        let sql = self.build_sql(&mut params);
        (sql, params)
    }

    fn build_sql(&self, params: &mut Vec<String>) -> String {
        match self {
            ImageQueryExpr::Tag(tag) => {
                params.push(tag.clone());
                CurrentDialect::exists_tag_query(params.len())
            }
            ImageQueryExpr::DescriptionContains(fragment) => {
                // The LIKE pattern is built here so the fragment itself
                // stays a bound parameter.
                params.push(format!("%{}%", fragment.to_lowercase()));
                CurrentDialect::description_match_query(params.len())
            }
            ImageQueryExpr::And(lhs, rhs) => {
                format!("({} AND {})", lhs.build_sql(params), rhs.build_sql(params))
            }
            ImageQueryExpr::Or(lhs, rhs) => {
                format!("({} OR {})", lhs.build_sql(params), rhs.build_sql(params))
            }
            ImageQueryExpr::Not(expr) => {
                format!("NOT {}", expr.build_sql(params))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImageQueryKind {
    All,
    Where(ImageQueryExpr),
}

impl ImageQueryKind {
    pub fn to_sql(&self) -> (String, Vec<String>) {
        match self {
            ImageQueryKind::All => ("".to_string(), vec![]),
            ImageQueryKind::Where(query_expr) => {
                let (sql, params) = query_expr.to_sql();

                (format!("WHERE {}", sql), params)
            }
        }
    }
}

/// Represents a full query including logical expression and pagination.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    /// The logical expression used for filtering.
    pub expr: ImageQueryKind,

    /// The maximum number of results to return.
    pub limit: Option<u32>,

    /// The offset into the result set.
    pub offset: Option<u32>,
}

impl ImageQuery {
    /// Creates a new query from a query expression.
    pub fn new(expr: ImageQueryKind) -> Self {
        Self {
            expr,
            limit: None,
            offset: None,
        }
    }

    /// Sets the `LIMIT` for this query.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the `OFFSET` for this query.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Converts the full query into an SQL string and bound parameters.
    ///
    /// # Returns
    /// - `(String, Vec<String>)`: SQL clause and ordered parameters
    ///
    /// Results are ordered by image id so that identical queries return
    /// identical sequences regardless of engine scan order. The generated
    /// SQL includes any specified LIMIT or OFFSET.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let (mut sql, mut params) = self.expr.to_sql();

        sql.push_str(" ORDER BY id");

        if let Some(limit) = self.limit {
            params.push(limit.to_string());
            sql.push_str(
                format!(
                    " LIMIT CAST({} AS INTEGER)",
                    CurrentDialect::placeholder(params.len())
                )
                .as_str(),
            );
        }

        if let Some(offset) = self.offset {
            params.push(offset.to_string());
            sql.push_str(
                format!(
                    " OFFSET CAST({} AS INTEGER)",
                    CurrentDialect::placeholder(params.len())
                )
                .as_str(),
            );
        }

        (sql, params)
    }
}
