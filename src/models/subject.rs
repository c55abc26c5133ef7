//! Subject model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subject owned by one or more teachers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub teacher_ids: Vec<String>,
    pub student_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a subject.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectRequest {
    pub name: String,
    pub teacher_ids: Vec<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
}
