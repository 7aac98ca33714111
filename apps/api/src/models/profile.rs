use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub title: String,
    pub company_name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub desired_roles: Option<Vec<String>>,
    pub field_of_work: Option<String>,
}

/// The uploaded résumé. `file_path` is relative to the process working directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub user_id: Uuid,
    pub file_path: String,
    pub raw_text: Option<String>,
}
