pub mod book;
pub mod task;
pub mod user;

pub use book::{Book, BookInput};
pub use task::{Task, TaskInput};
pub use user::{UserInput, UserRecord};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::middleware::auth::AccessPolicy;
use crate::types::EntityId;

/// Fields owned by the repository; API input may never set them
pub const SYSTEM_FIELDS: &[&str] = &["id", "createdAt", "created_at"];

/// A domain record managed by a `Repository`.
///
/// `Input` is the request shape for both create and update: every field is
/// optional so that a create can report *which* required fields are missing
/// and an update can carry only the fields being changed.
pub trait Resource: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Input: Clone + fmt::Debug + DeserializeOwned + Send + Sync + 'static;

    /// Singular display name, used in messages ("Book not found")
    const NAME: &'static str;
    /// Collection name, used for routes, files and tables
    const COLLECTION: &'static str;

    fn id(&self) -> EntityId;

    fn created_at(&self) -> DateTime<Utc>;

    /// All required fields present and every present field well-formed
    fn validate_create(input: &Self::Input) -> Result<(), ValidationErrors>;

    /// Every present field well-formed; absent fields are left untouched
    fn validate_update(input: &Self::Input) -> Result<(), ValidationErrors>;

    /// Build a new entity from validated create input
    fn build(id: EntityId, input: Self::Input, created_at: DateTime<Utc>) -> Self;

    /// Merge the present fields of `input` into `self`
    fn merge(&mut self, input: Self::Input);

    /// Key that must be unique across the collection, if any
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// Route access levels for this resource
    fn access_policy() -> AccessPolicy {
        AccessPolicy::default()
    }
}

/// A single failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation failures, kept in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Message of the first failure, used as the envelope's headline
    pub fn summary(&self) -> String {
        self.errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Validation failed".to_string())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// "title" -> "Title"
pub(crate) fn label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Required on create: present and not blank
pub(crate) fn require_text(errors: &mut ValidationErrors, field: &str, value: Option<&String>) {
    match value {
        Some(v) if !v.trim().is_empty() => {}
        _ => errors.add(field, format!("{} is required", label(field))),
    }
}

/// Optional, but when present it may not be blank
pub(crate) fn non_blank(errors: &mut ValidationErrors, field: &str, value: Option<&String>) {
    if let Some(v) = value {
        if v.trim().is_empty() {
            errors.add(field, format!("{} must not be empty", label(field)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_first_failure() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "Title is required");
        errors.add("year", "Year must be positive");
        assert_eq!(errors.summary(), "Title is required");
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn blank_text_is_missing() {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "title", Some(&"   ".to_string()));
        require_text(&mut errors, "name", None);
        assert_eq!(errors.errors()[0].message, "Title is required");
        assert_eq!(errors.errors()[1].message, "Name is required");
    }

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
