use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, Resource, ValidationErrors};
use crate::middleware::auth::{Access, AccessPolicy};
use crate::types::{EntityId, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

impl BookInput {
    fn check_values(&self, errors: &mut ValidationErrors) {
        non_blank(errors, "author", self.author.as_ref());
        if let Some(year) = self.year {
            if year <= 0 {
                errors.add("year", "Year must be a positive number");
            }
        }
        if let Some(price) = self.price {
            if price.is_sign_negative() {
                errors.add("price", "Price must not be negative");
            }
        }
    }
}

impl Resource for Book {
    type Input = BookInput;

    const NAME: &'static str = "Book";
    const COLLECTION: &'static str = "books";

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate_create(input: &BookInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "title", input.title.as_ref());
        input.check_values(&mut errors);
        errors.into_result()
    }

    fn validate_update(input: &BookInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        non_blank(&mut errors, "title", input.title.as_ref());
        input.check_values(&mut errors);
        errors.into_result()
    }

    fn build(id: EntityId, input: BookInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title.unwrap_or_default(),
            author: input.author,
            year: input.year,
            price: input.price,
            created_at,
        }
    }

    fn merge(&mut self, input: BookInput) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if input.author.is_some() {
            self.author = input.author;
        }
        if input.year.is_some() {
            self.year = input.year;
        }
        if input.price.is_some() {
            self.price = input.price;
        }
    }

    fn access_policy() -> AccessPolicy {
        AccessPolicy {
            list: Access::Public,
            show: Access::Public,
            create: Access::Authenticated,
            update: Access::roles([Role::Admin]),
            delete: Access::roles([Role::Admin]),
        }
    }
}
