mod book;
mod filters;
mod mailer;
mod metrics;
mod repository;
mod token;
mod user;
mod validator;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Persistence abstractions consumed by handlers and middleware
pub use repository::{
    BookRepository, BookRepositoryPtr, DataError, DataResult, TokenRepository,
    TokenRepositoryPtr, UserRepository, UserRepositoryPtr,
};

pub use book::{validate_book, Book, BookQuery};
pub use filters::{validate_filters, Filters, Metadata};
pub use mailer::{MailTemplate, Mailer, MailerPtr};
pub use token::{hash_plaintext, validate_token_plaintext, Scope, Token, TOKEN_LENGTH};
pub use user::{
    validate_email, validate_password_plaintext, validate_username, Identity, NewUser, Password,
    User,
};
pub use validator::{matches, permitted_value, FieldErrors, Validator, EMAIL_RX};
