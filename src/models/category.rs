use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
    pub total_count: usize,
}

impl Category {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("C{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
