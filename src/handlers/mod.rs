// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod books;
mod health;
mod metrics;
mod root;
mod shared_types;
mod tokens;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::metrics_handler;
pub use root::root_handler;

// Account lifecycle handlers
pub use users::{activate_user, register_user, reset_password, show_current_user};

// Token handlers
pub use tokens::{create_authentication_token, create_password_reset_token};

// Book catalogue handlers
pub use books::{create_book, delete_book, list_books, show_book, update_book};
