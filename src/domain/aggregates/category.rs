//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::slugify;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: impl Into<String>, description: Option<String>, parent_id: Option<Uuid>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self { id: Uuid::now_v7(), slug: slugify(&name), name, description, parent_id, image_url: None, created_at: now, updated_at: now }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.slug = slugify(&self.name);
        self.updated_at = Utc::now();
    }
}
