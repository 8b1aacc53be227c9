use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::domain::{validate_book, validate_filters, Book, BookQuery, Filters, Validator};
use crate::error::AppError;
use crate::handlers::shared_types::{JsonBody, MessageResponse};

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Optional header carrying the version the client last read.
const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBookInput {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    isbn: String,
    pub_date: Option<NaiveDate>,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    avg_rating: f64,
}

/// Partial update: absent fields keep their stored value.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookInput {
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
    pub_date: Option<NaiveDate>,
    genre: Option<String>,
    description: Option<String>,
    avg_rating: Option<f64>,
}

/// Parse a path id; anything that is not a positive integer is a 404.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    // ---
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}

fn read_string(params: &HashMap<String, String>, key: &str) -> String {
    // ---
    params.get(key).cloned().unwrap_or_default()
}

fn read_int(params: &HashMap<String, String>, key: &str, default: u32, v: &mut Validator) -> u32 {
    // ---
    match params.get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

/// List books with filtering, sorting and paging (GET /api/v1/books).
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    // ---
    let mut v = Validator::new();

    let query = BookQuery {
        title: read_string(&params, "title"),
        author: read_string(&params, "author"),
        genre: read_string(&params, "genre"),
        filters: Filters {
            page: read_int(&params, "page", 1, &mut v),
            page_size: read_int(&params, "page_size", DEFAULT_PAGE_SIZE, &mut v),
            sort: params.get("sort").cloned().unwrap_or_else(|| "id".to_string()),
            sort_safelist: BookQuery::SORT_SAFELIST,
        },
    };

    validate_filters(&mut v, &query.filters);
    v.into_result()?;

    let (books, metadata) = state.books().list_books(&query).await?;

    Ok(Json(json!({ "books": books, "@metadata": metadata })))
}

/// Show one book (GET /api/v1/books/{id}).
pub async fn show_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    // ---
    let id = parse_id(&id)?;
    let book = state.books().get_book(id).await?.ok_or(AppError::NotFound)?;

    Ok(Json(json!({ "book": book })))
}

/// Add a book to the catalogue (POST /api/v1/books).
#[tracing::instrument(skip(state, input))]
pub async fn create_book(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateBookInput>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), AppError> {
    // ---
    let mut v = Validator::new();
    if input.pub_date.is_none() {
        v.add_error("pub_date", "must be provided");
    }

    let mut book = Book {
        id: 0,
        created_at: Utc::now(),
        title: input.title,
        author: input.author,
        isbn: input.isbn,
        pub_date: input.pub_date.unwrap_or_default(),
        genre: input.genre,
        description: input.description,
        avg_rating: input.avg_rating,
        version: 0,
    };

    validate_book(&mut v, &book);
    v.into_result()?;

    state.books().insert_book(&mut book).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/books/{}", book.id))
        .map_err(|e| AppError::ServerError(e.into()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(json!({ "book": book }))))
}

/// Partially update a book (PATCH /api/v1/books/{id}).
///
/// A stale `X-Expected-Version` header, or a concurrent write between read
/// and update, is a 409.
#[tracing::instrument(skip(state, headers, input))]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(input): JsonBody<UpdateBookInput>,
) -> Result<Json<Value>, AppError> {
    // ---
    let id = parse_id(&id)?;
    let mut book = state.books().get_book(id).await?.ok_or(AppError::NotFound)?;

    if let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) {
        let expected = expected.to_str().unwrap_or_default();
        if expected != book.version.to_string() {
            return Err(AppError::EditConflict);
        }
    }

    if let Some(title) = input.title {
        book.title = title;
    }
    if let Some(author) = input.author {
        book.author = author;
    }
    if let Some(isbn) = input.isbn {
        book.isbn = isbn;
    }
    if let Some(pub_date) = input.pub_date {
        book.pub_date = pub_date;
    }
    if let Some(genre) = input.genre {
        book.genre = genre;
    }
    if let Some(description) = input.description {
        book.description = description;
    }
    if let Some(avg_rating) = input.avg_rating {
        book.avg_rating = avg_rating;
    }

    let mut v = Validator::new();
    validate_book(&mut v, &book);
    v.into_result()?;

    state.books().update_book(&mut book).await?;

    Ok(Json(json!({ "book": book })))
}

/// Remove a book (DELETE /api/v1/books/{id}).
#[tracing::instrument(skip(state))]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    // ---
    let id = parse_id(&id)?;
    state.books().delete_book(id).await?;

    Ok(Json(MessageResponse {
        message: "book successfully deleted",
    }))
}
