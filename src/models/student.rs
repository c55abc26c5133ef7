//! Student model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An admitted student. Immutable after admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    /// Class label such as "10A"
    pub class_label: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for admitting a student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    pub name: String,
    pub roll_number: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub class_label: String,
}

/// Query parameters for listing students.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListQuery {
    #[serde(default)]
    pub class_label: Option<String>,
}
