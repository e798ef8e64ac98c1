use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, Resource, ValidationErrors};
use crate::middleware::auth::{Access, AccessPolicy};
use crate::types::{EntityId, Role};

/// A user record managed through the API. Unrelated to login accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn check_email(errors: &mut ValidationErrors, email: Option<&String>) {
    if let Some(email) = email {
        if !email.trim().is_empty() && !is_email(email) {
            errors.add("email", "Email must be a valid email address");
        }
    }
}

impl Resource for UserRecord {
    type Input = UserInput;

    const NAME: &'static str = "User";
    const COLLECTION: &'static str = "users";

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate_create(input: &UserInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "name", input.name.as_ref());
        require_text(&mut errors, "email", input.email.as_ref());
        check_email(&mut errors, input.email.as_ref());
        errors.into_result()
    }

    fn validate_update(input: &UserInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        non_blank(&mut errors, "name", input.name.as_ref());
        non_blank(&mut errors, "email", input.email.as_ref());
        check_email(&mut errors, input.email.as_ref());
        errors.into_result()
    }

    fn build(id: EntityId, input: UserInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.unwrap_or_default(),
            email: input.email.unwrap_or_default(),
            age: input.age,
            created_at,
        }
    }

    fn merge(&mut self, input: UserInput) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(email) = input.email {
            self.email = email;
        }
        if input.age.is_some() {
            self.age = input.age;
        }
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.email.to_ascii_lowercase())
    }

    fn access_policy() -> AccessPolicy {
        AccessPolicy {
            list: Access::Authenticated,
            show: Access::Authenticated,
            create: Access::roles([Role::Admin]),
            update: Access::roles([Role::Admin]),
            delete: Access::roles([Role::Admin]),
        }
    }
}
