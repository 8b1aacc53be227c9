use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::domain::{
    hash_plaintext, Book, BookQuery, BookRepository, DataError, DataResult, Metadata, NewUser,
    Password, Scope, Token, TokenRepository, User, UserRepository,
};

/// Name of the unique index on `lower(email)`.
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    created_at: DateTime<Utc>,
    username: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        // ---
        User {
            id: r.id,
            created_at: r.created_at,
            username: r.username,
            email: r.email,
            password: Password::from_hash(r.password_hash),
            activated: r.activated,
            version: r.version,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    author: String,
    isbn: String,
    pub_date: NaiveDate,
    genre: String,
    description: String,
    avg_rating: f64,
    version: i32,
}

impl From<BookRow> for Book {
    fn from(r: BookRow) -> Self {
        // ---
        Book {
            id: r.id,
            created_at: r.created_at,
            title: r.title,
            author: r.author,
            isbn: r.isbn,
            pub_date: r.pub_date,
            genre: r.genre,
            description: r.description,
            avg_rating: r.avg_rating,
            version: r.version,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookPageRow {
    total_records: i64,
    #[sqlx(flatten)]
    book: BookRow,
}

pub fn create_postgres_repository(pool: PgPool, query_timeout: Duration) -> PostgresRepository {
    // ---
    PostgresRepository::new(pool, query_timeout)
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        // ---
        Self {
            pool,
            query_timeout,
        }
    }

    /// Runs one query under the configured deadline. Timeouts are not retried.
    async fn bounded<T, F>(&self, query: F) -> DataResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        // ---
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => {
                tracing::warn!("Query exceeded {:?}", self.query_timeout);
                Err(DataError::Timeout(self.query_timeout))
            }
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> DataError {
    // ---
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) => {
            DataError::DuplicateEmail
        }
        _ => DataError::Backend(err.into()),
    }
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    // ---
    async fn insert_user(&self, user: NewUser) -> DataResult<User> {
        // ---
        let row = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    "INSERT INTO users (username, email, password_hash, activated)
                     VALUES ($1, $2, $3, $4)
                     RETURNING id, created_at, username, email, password_hash, activated, version",
                )
                .bind(&user.username)
                .bind(&user.email)
                .bind(user.password.hash())
                .bind(user.activated)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(row.into())
    }

    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>> {
        // ---
        let row = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    "SELECT id, created_at, username, email, password_hash, activated, version
                     FROM users WHERE lower(email) = lower($1)",
                )
                .bind(email)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(User::from))
    }

    async fn get_user_for_token(&self, scope: Scope, plaintext: &str) -> DataResult<Option<User>> {
        // ---
        let hash = hash_plaintext(plaintext);

        let row = self
            .bounded(
                sqlx::query_as::<_, UserRow>(
                    "SELECT users.id, users.created_at, users.username, users.email,
                            users.password_hash, users.activated, users.version
                     FROM users
                     INNER JOIN tokens ON users.id = tokens.user_id
                     WHERE tokens.hash = $1
                     AND tokens.scope = $2
                     AND tokens.expiry > $3",
                )
                .bind(hash)
                .bind(scope.as_str())
                .bind(Utc::now())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(User::from))
    }

    async fn update_user(&self, user: &mut User) -> DataResult<()> {
        // ---
        let version: Option<i32> = self
            .bounded(
                sqlx::query_scalar(
                    "UPDATE users
                     SET username = $1, email = $2, password_hash = $3, activated = $4,
                         version = version + 1
                     WHERE id = $5 AND version = $6
                     RETURNING version",
                )
                .bind(&user.username)
                .bind(&user.email)
                .bind(user.password.hash())
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_optional(&self.pool),
            )
            .await?;

        user.version = version.ok_or(DataError::EditConflict)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenRepository for PostgresRepository {
    // ---
    async fn insert_token(&self, token: &Token) -> DataResult<()> {
        // ---
        self.bounded(
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> DataResult<()> {
        // ---
        self.bounded(
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl BookRepository for PostgresRepository {
    // ---
    async fn insert_book(&self, book: &mut Book) -> DataResult<()> {
        // ---
        let (id, created_at, version): (i64, DateTime<Utc>, i32) = self
            .bounded(
                sqlx::query_as(
                    "INSERT INTO books (title, author, isbn, pub_date, genre, description, avg_rating)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     RETURNING id, created_at, version",
                )
                .bind(&book.title)
                .bind(&book.author)
                .bind(&book.isbn)
                .bind(book.pub_date)
                .bind(&book.genre)
                .bind(&book.description)
                .bind(book.avg_rating)
                .fetch_one(&self.pool),
            )
            .await?;

        book.id = id;
        book.created_at = created_at;
        book.version = version;
        Ok(())
    }

    async fn get_book(&self, id: i64) -> DataResult<Option<Book>> {
        // ---
        let row = self
            .bounded(
                sqlx::query_as::<_, BookRow>(
                    "SELECT id, created_at, title, author, isbn, pub_date, genre, description,
                            avg_rating, version
                     FROM books WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Book::from))
    }

    async fn update_book(&self, book: &mut Book) -> DataResult<()> {
        // ---
        let version: Option<i32> = self
            .bounded(
                sqlx::query_scalar(
                    "UPDATE books
                     SET title = $1, author = $2, isbn = $3, pub_date = $4, genre = $5,
                         description = $6, avg_rating = $7, version = version + 1
                     WHERE id = $8 AND version = $9
                     RETURNING version",
                )
                .bind(&book.title)
                .bind(&book.author)
                .bind(&book.isbn)
                .bind(book.pub_date)
                .bind(&book.genre)
                .bind(&book.description)
                .bind(book.avg_rating)
                .bind(book.id)
                .bind(book.version)
                .fetch_optional(&self.pool),
            )
            .await?;

        book.version = version.ok_or(DataError::EditConflict)?;
        Ok(())
    }

    async fn delete_book(&self, id: i64) -> DataResult<()> {
        // ---
        let result = self
            .bounded(
                sqlx::query("DELETE FROM books WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::RecordNotFound);
        }
        Ok(())
    }

    async fn list_books(&self, query: &BookQuery) -> DataResult<(Vec<Book>, Metadata)> {
        // ---
        let filters = &query.filters;
        let direction = if filters.sort_descending() { "DESC" } else { "ASC" };

        // The sort column comes from the safelist, never from raw input.
        let sql = format!(
            "SELECT count(*) OVER() AS total_records, id, created_at, title, author, isbn,
                    pub_date, genre, description, avg_rating, version
             FROM books
             WHERE (title ILIKE '%' || $1 || '%' OR $1 = '')
             AND (author ILIKE '%' || $2 || '%' OR $2 = '')
             AND (genre ILIKE '%' || $3 || '%' OR $3 = '')
             ORDER BY {} {}, id ASC
             LIMIT $4 OFFSET $5",
            filters.sort_column(),
            direction
        );

        let rows = self
            .bounded(
                sqlx::query_as::<_, BookPageRow>(&sql)
                    .bind(&query.title)
                    .bind(&query.author)
                    .bind(&query.genre)
                    .bind(filters.limit())
                    .bind(filters.offset())
                    .fetch_all(&self.pool),
            )
            .await?;

        let total = rows
            .first()
            .map(|row| u64::try_from(row.total_records).unwrap_or(0))
            .unwrap_or(0);
        let books = rows.into_iter().map(|row| Book::from(row.book)).collect();

        Ok((books, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}
