use super::book::{Book, BookQuery};
use super::filters::Metadata;
use super::token::{Scope, Token};
use super::user::{NewUser, User};
use std::sync::Arc;
use std::time::Duration;

/// Failures surfaced by the persistence layer.
///
/// Absent rows are reported as `Ok(None)` by lookups; `RecordNotFound` is
/// reserved for writes that target a missing row.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("record not found")]
    RecordNotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("query did not complete within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type DataResult<T> = Result<T, DataError>;

/// Abstraction for user persistence.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    // ---
    /// Insert a new user. Fails with `DuplicateEmail` if the address is taken.
    async fn insert_user(&self, user: NewUser) -> DataResult<User>;

    /// Get user by email address.
    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>>;

    /// Get the owner of an unexpired token with the given scope.
    ///
    /// Unknown, expired and wrong-scope tokens all yield `Ok(None)`.
    async fn get_user_for_token(&self, scope: Scope, plaintext: &str) -> DataResult<Option<User>>;

    /// Persist changes to `user` if its version is still current, then bump the version.
    async fn update_user(&self, user: &mut User) -> DataResult<()>;
}

/// Abstraction for token persistence.
#[async_trait::async_trait]
pub trait TokenRepository: Send + Sync {
    // ---
    /// Store the hash, owner, scope and expiry of `token`.
    async fn insert_token(&self, token: &Token) -> DataResult<()>;

    /// Remove every token of `scope` owned by `user_id`.
    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> DataResult<()>;

    /// Generate, store and return a new token. The returned value is the
    /// only place the plaintext is ever available.
    async fn issue_token(&self, user_id: i64, ttl: Duration, scope: Scope) -> DataResult<Token> {
        // ---
        let token = Token::generate(user_id, ttl, scope)?;
        self.insert_token(&token).await?;
        Ok(token)
    }
}

/// Abstraction for the book catalogue.
#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    // ---
    /// Insert `book`, filling in id, creation time and version.
    async fn insert_book(&self, book: &mut Book) -> DataResult<()>;

    async fn get_book(&self, id: i64) -> DataResult<Option<Book>>;

    /// Persist changes to `book` if its version is still current, then bump the version.
    async fn update_book(&self, book: &mut Book) -> DataResult<()>;

    async fn delete_book(&self, id: i64) -> DataResult<()>;

    async fn list_books(&self, query: &BookQuery) -> DataResult<(Vec<Book>, Metadata)>;
}

pub type UserRepositoryPtr = Arc<dyn UserRepository>;
pub type TokenRepositoryPtr = Arc<dyn TokenRepository>;
pub type BookRepositoryPtr = Arc<dyn BookRepository>;
