//! In-process implementation of the persistence traits.
//!
//! Backs the integration tests and `DATABASE_URL=memory` development runs.
//! Semantics follow the Postgres store: emails are unique case-insensitively,
//! token lookups match on hash, scope and expiry, and updates are guarded by
//! the version counter.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::{
    hash_plaintext, Book, BookQuery, BookRepository, DataError, DataResult, Metadata, NewUser,
    Scope, Token, TokenRepository, User, UserRepository,
};

struct TokenRecord {
    // ---
    user_id: i64,
    scope: Scope,
    expiry: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    // ---
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, TokenRecord>,
    books: BTreeMap<i64, Book>,
    next_user_id: i64,
    next_book_id: i64,
}

pub fn create_memory_repository() -> InMemoryRepository {
    // ---
    InMemoryRepository::new()
}

#[derive(Default)]
pub struct InMemoryRepository {
    // ---
    store: Mutex<Store>,
}

impl InMemoryRepository {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // ---
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored tokens, for assertions in tests.
    pub fn token_count(&self) -> usize {
        // ---
        self.lock().tokens.len()
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryRepository {
    // ---
    async fn insert_user(&self, user: NewUser) -> DataResult<User> {
        // ---
        let mut store = self.lock();

        let taken = store
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(DataError::DuplicateEmail);
        }

        store.next_user_id += 1;
        let user = User {
            id: store.next_user_id,
            created_at: Utc::now(),
            username: user.username,
            email: user.email,
            password: user.password,
            activated: user.activated,
            version: 1,
        };
        store.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>> {
        // ---
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user_for_token(&self, scope: Scope, plaintext: &str) -> DataResult<Option<User>> {
        // ---
        let hash = hash_plaintext(plaintext);
        let now = Utc::now();
        let store = self.lock();

        let owner = store
            .tokens
            .get(&hash)
            .filter(|record| record.scope == scope && record.expiry > now)
            .and_then(|record| store.users.get(&record.user_id))
            .cloned();

        Ok(owner)
    }

    async fn update_user(&self, user: &mut User) -> DataResult<()> {
        // ---
        let mut store = self.lock();

        let email_taken = store.users.values().any(|existing| {
            existing.id != user.id && existing.email.eq_ignore_ascii_case(&user.email)
        });
        if email_taken {
            return Err(DataError::DuplicateEmail);
        }

        let stored = store
            .users
            .get_mut(&user.id)
            .filter(|stored| stored.version == user.version)
            .ok_or(DataError::EditConflict)?;

        user.version += 1;
        *stored = user.clone();

        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenRepository for InMemoryRepository {
    // ---
    async fn insert_token(&self, token: &Token) -> DataResult<()> {
        // ---
        let mut store = self.lock();
        if !store.users.contains_key(&token.user_id) {
            return Err(DataError::Backend(anyhow::anyhow!(
                "token owner {} does not exist",
                token.user_id
            )));
        }

        store.tokens.insert(
            token.hash.clone(),
            TokenRecord {
                user_id: token.user_id,
                scope: token.scope,
                expiry: token.expiry,
            },
        );

        Ok(())
    }

    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> DataResult<()> {
        // ---
        self.lock()
            .tokens
            .retain(|_, record| !(record.scope == scope && record.user_id == user_id));

        Ok(())
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryRepository {
    // ---
    async fn insert_book(&self, book: &mut Book) -> DataResult<()> {
        // ---
        let mut store = self.lock();

        store.next_book_id += 1;
        book.id = store.next_book_id;
        book.created_at = Utc::now();
        book.version = 1;
        store.books.insert(book.id, book.clone());

        Ok(())
    }

    async fn get_book(&self, id: i64) -> DataResult<Option<Book>> {
        // ---
        Ok(self.lock().books.get(&id).cloned())
    }

    async fn update_book(&self, book: &mut Book) -> DataResult<()> {
        // ---
        let mut store = self.lock();

        let stored = store
            .books
            .get_mut(&book.id)
            .filter(|stored| stored.version == book.version)
            .ok_or(DataError::EditConflict)?;

        book.version += 1;
        *stored = book.clone();

        Ok(())
    }

    async fn delete_book(&self, id: i64) -> DataResult<()> {
        // ---
        match self.lock().books.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DataError::RecordNotFound),
        }
    }

    async fn list_books(&self, query: &BookQuery) -> DataResult<(Vec<Book>, Metadata)> {
        // ---
        let store = self.lock();
        let contains = |field: &str, needle: &str| {
            needle.is_empty() || field.to_lowercase().contains(&needle.to_lowercase())
        };

        let mut matched: Vec<Book> = store
            .books
            .values()
            .filter(|book| {
                contains(&book.title, &query.title)
                    && contains(&book.author, &query.author)
                    && contains(&book.genre, &query.genre)
            })
            .cloned()
            .collect();

        let filters = &query.filters;
        let column = filters.sort_column();
        matched.sort_by(|a, b| {
            let primary = match column {
                "title" => a.title.cmp(&b.title),
                "author" => a.author.cmp(&b.author),
                "genre" => a.genre.cmp(&b.genre),
                "avg_rating" => a
                    .avg_rating
                    .partial_cmp(&b.avg_rating)
                    .unwrap_or(Ordering::Equal),
                _ => a.id.cmp(&b.id),
            };
            let primary = if filters.sort_descending() {
                primary.reverse()
            } else {
                primary
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let page: Vec<Book> = matched
            .into_iter()
            .skip(usize::try_from(filters.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(filters.limit()).unwrap_or(0))
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}
