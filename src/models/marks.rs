//! Mark record model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lowest and highest score a mark record may carry.
pub const MIN_MARKS: f64 = 0.0;
pub const MAX_MARKS: f64 = 100.0;

/// Exam type. The two common exams are named; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExamType {
    Midterm,
    Final,
    Other(String),
}

impl ExamType {
    pub fn as_str(&self) -> &str {
        match self {
            ExamType::Midterm => "Midterm",
            ExamType::Final => "Final",
            ExamType::Other(name) => name,
        }
    }
}

impl From<String> for ExamType {
    fn from(s: String) -> Self {
        match s.trim() {
            "Midterm" => ExamType::Midterm,
            "Final" => ExamType::Final,
            other => ExamType::Other(other.to_string()),
        }
    }
}

impl From<ExamType> for String {
    fn from(exam_type: ExamType) -> Self {
        exam_type.as_str().to_string()
    }
}

/// One score for one student in one subject and exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub id: String,
    pub student_id: String,
    /// Subject name, not a foreign key
    pub subject: String,
    pub exam_type: ExamType,
    pub marks: f64,
    /// Teacher who recorded the score
    pub teacher_id: String,
    pub exam_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Request body for recording marks. The teacher is taken from the caller's token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarksRequest {
    pub student_id: String,
    pub subject: String,
    pub exam_type: ExamType,
    pub marks: f64,
    /// Defaults to today
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
}

impl AddMarksRequest {
    /// Check field presence and the 0..=100 range before anything is persisted.
    pub fn validate(&self) -> Result<(), String> {
        if self.student_id.trim().is_empty() {
            return Err("Student ID is required".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("Subject is required".to_string());
        }
        if self.exam_type.as_str().is_empty() {
            return Err("Exam type is required".to_string());
        }
        if !self.marks.is_finite() || self.marks < MIN_MARKS || self.marks > MAX_MARKS {
            return Err(format!(
                "Marks must be between {} and {}",
                MIN_MARKS, MAX_MARKS
            ));
        }
        Ok(())
    }
}
