use super::filters::Filters;
use super::validator::Validator;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A book in the club catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    // ---
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub pub_date: NaiveDate,
    pub genre: String,
    pub description: String,
    pub avg_rating: f64,
    pub version: i32,
}

/// Text filters plus paging for catalogue listings. Empty strings match everything.
#[derive(Debug, Clone)]
pub struct BookQuery {
    // ---
    pub title: String,
    pub author: String,
    pub genre: String,
    pub filters: Filters,
}

impl BookQuery {
    // ---
    pub const SORT_SAFELIST: &'static [&'static str] = &[
        "id", "title", "author", "genre", "avg_rating", "-id", "-title", "-author", "-genre",
        "-avg_rating",
    ];
}

pub fn validate_book(v: &mut Validator, book: &Book) {
    // ---
    v.check(!book.title.is_empty(), "title", "must be provided");
    v.check(book.title.len() <= 200, "title", "must not be more than 200 bytes long");

    v.check(!book.author.is_empty(), "author", "must be provided");
    v.check(book.author.len() <= 200, "author", "must not be more than 200 bytes long");

    v.check(!book.isbn.is_empty(), "isbn", "must be provided");
    v.check(
        book.isbn
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == 'X'),
        "isbn",
        "must contain only digits, hyphens, or X",
    );
    v.check(book.isbn.len() <= 17, "isbn", "must not be more than 17 bytes long");

    v.check(!book.genre.is_empty(), "genre", "must be provided");
    v.check(book.genre.len() <= 100, "genre", "must not be more than 100 bytes long");

    v.check(
        book.description.len() <= 1000,
        "description",
        "must not be more than 1000 bytes long",
    );

    v.check(
        book.pub_date <= Utc::now().date_naive(),
        "pub_date",
        "must not be in the future",
    );

    v.check(
        (0.0..=5.0).contains(&book.avg_rating),
        "avg_rating",
        "must be between 0 and 5",
    );
}
