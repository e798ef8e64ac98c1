use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, require_text, Resource, ValidationErrors};
use crate::middleware::auth::{Access, AccessPolicy};
use crate::types::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl Resource for Task {
    type Input = TaskInput;

    const NAME: &'static str = "Task";
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate_create(input: &TaskInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_text(&mut errors, "title", input.title.as_ref());
        errors.into_result()
    }

    fn validate_update(input: &TaskInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        non_blank(&mut errors, "title", input.title.as_ref());
        errors.into_result()
    }

    fn build(id: EntityId, input: TaskInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title.unwrap_or_default(),
            description: input.description,
            completed: input.completed.unwrap_or(false),
            created_at,
        }
    }

    fn merge(&mut self, input: TaskInput) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if input.description.is_some() {
            self.description = input.description;
        }
        if let Some(completed) = input.completed {
            self.completed = completed;
        }
    }

    fn access_policy() -> AccessPolicy {
        AccessPolicy {
            list: Access::Public,
            show: Access::Public,
            create: Access::Authenticated,
            update: Access::Authenticated,
            delete: Access::Authenticated,
        }
    }
}
