use crate::auth::{AccessGate, Capability};
use axum::{
    Json,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use pixsift::{
    app::{self, AppError, ImageResponse, Page},
    database::Database,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub gate: Arc<dyn AccessGate>,
}

fn authorize(gate: &dyn AccessGate, capability: Capability) -> Result<(), SearchError> {
    if gate.allows(capability) {
        Ok(())
    } else {
        Err(SearchError::Forbidden)
    }
}

/// GET `/search_filtering/?tags=a&tags=b`
///
/// The query string is read as repeated key/value pairs so each `tags`
/// occurrence contributes one requested tag.
pub async fn search_tags(
    State(app): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<ImageResponse>>, SearchError> {
    authorize(app.gate.as_ref(), Capability::SearchImages)?;

    let tags: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "tags")
        .map(|(_, value)| value)
        .collect();

    if tags.is_empty() {
        return Err(SearchError::Validation(
            "at least one tags parameter is required".to_string(),
        ));
    }

    let images = app::search_by_tags(&app.db, &tags).await?;

    Ok(Json(images))
}

#[derive(Deserialize)]
pub struct DescriptionParams {
    description: Option<String>,
}

/// GET `/search_filtering/by_description?description=...`
pub async fn search_description(
    State(app): State<AppState>,
    Query(params): Query<DescriptionParams>,
) -> Result<Json<Vec<ImageResponse>>, SearchError> {
    authorize(app.gate.as_ref(), Capability::SearchImages)?;

    let Some(description) = params.description else {
        return Err(SearchError::Validation(
            "description parameter is required".to_string(),
        ));
    };

    let images = app::search_by_description(&app.db, &description).await?;

    Ok(Json(images))
}

/// POST `/search_filtering/sorted-by-rating?skip=0&limit=10`
pub async fn sorted_by_rating(
    State(app): State<AppState>,
    Pagination(page): Pagination,
    Json(images): Json<Vec<ImageResponse>>,
) -> Result<Json<Vec<ImageResponse>>, SearchError> {
    authorize(app.gate.as_ref(), Capability::SortImages)?;

    Ok(Json(app::sort_by_rating(images, page)))
}

/// POST `/search_filtering/sorted-by-date?skip=0&limit=10`
pub async fn sorted_by_date(
    State(app): State<AppState>,
    Pagination(page): Pagination,
    Json(images): Json<Vec<ImageResponse>>,
) -> Result<Json<Vec<ImageResponse>>, SearchError> {
    authorize(app.gate.as_ref(), Capability::SortImages)?;

    Ok(Json(app::sort_by_date(images, page)))
}

#[derive(Deserialize)]
struct RawPageParams {
    skip: Option<i64>,
    limit: Option<i64>,
}

/// Validated `skip`/`limit` window, rejected with 422 before handler logic
/// runs.
pub struct Pagination(pub Page);

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = SearchError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawPageParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| SearchError::Validation(e.to_string()))?;

        let page =
            Page::try_new(raw.skip, raw.limit).map_err(|e| SearchError::Validation(e.to_string()))?;

        Ok(Pagination(page))
    }
}

pub enum SearchError {
    Upstream(AppError),
    Validation(String),
    Forbidden,
}

impl From<AppError> for SearchError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::EmptyTagQuery => SearchError::Validation(value.to_string()),
            other => SearchError::Upstream(other),
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            message: Option<String>,
        }

        let (status, body) = match self {
            SearchError::Upstream(error) => {
                // The caller gets an opaque code; the chain stays in the log.
                tracing::error!(error = %error, "search query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "upstream-query-failure",
                        message: None,
                    },
                )
            }
            SearchError::Validation(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "validation-failure",
                    message: Some(message),
                },
            ),
            SearchError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: "forbidden",
                    message: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
