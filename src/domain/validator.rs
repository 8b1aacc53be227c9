//! Field-level input validation.
//!
//! A [`Validator`] accumulates one message per field; the first failed
//! check for a field wins. Handlers turn a non-empty validator into a 422
//! response carrying the field map.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Field name to human-readable problem.
pub type FieldErrors = BTreeMap<String, String>;

/// Loose RFC 5322 address shape, as recommended by the WHATWG HTML spec.
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

#[derive(Debug, Default)]
pub struct Validator {
    // ---
    errors: FieldErrors,
}

impl Validator {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        // ---
        self.errors.is_empty()
    }

    /// Records `message` for `key` unless the field already has an error.
    pub fn add_error(&mut self, key: &str, message: &str) {
        // ---
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        // ---
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        // ---
        &self.errors
    }

    /// Consumes the validator, yielding the collected errors if any check failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        // ---
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    // ---
    rx.is_match(value)
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    // ---
    permitted.iter().any(|candidate| candidate == value)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn first_error_per_field_wins() {
        // ---
        let mut v = Validator::new();
        v.check(false, "email", "must be provided");
        v.check(false, "email", "must be a valid email address");
        v.check(true, "password", "must be provided");

        assert!(!v.is_valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["email"], "must be provided");
    }

    #[test]
    fn into_result_reports_collected_errors() {
        // ---
        assert!(Validator::new().into_result().is_ok());

        let mut v = Validator::new();
        v.add_error("token", "must be 43 bytes long");
        let errors = v.into_result().unwrap_err();
        assert_eq!(errors.get("token").map(String::as_str), Some("must be 43 bytes long"));
    }

    #[test]
    fn email_pattern() {
        // ---
        assert!(matches("reader@bookclub.example", &EMAIL_RX));
        assert!(matches("first.last+tag@sub.domain.org", &EMAIL_RX));
        assert!(!matches("not-an-email", &EMAIL_RX));
        assert!(!matches("missing@", &EMAIL_RX));
        assert!(!matches("@missing.local", &EMAIL_RX));
    }

    #[test]
    fn permitted_values() {
        // ---
        assert!(permitted_value(&"-title", &["id", "-title"]));
        assert!(!permitted_value(&"pages", &["id", "-title"]));
    }
}
