//! Lesson plan model and its status state machine.
//!
//! Status moves forward one step at a time: Draft, Pending, Approved, Completed. Cancelled can
//! be reached from any state that is not already terminal. Completed and Cancelled are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LessonPlanStatus {
    Draft,
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl LessonPlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonPlanStatus::Draft => "Draft",
            LessonPlanStatus::Pending => "Pending",
            LessonPlanStatus::Approved => "Approved",
            LessonPlanStatus::Completed => "Completed",
            LessonPlanStatus::Cancelled => "Cancelled",
        }
    }

    /// Only the five exact status names are accepted.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(LessonPlanStatus::Draft),
            "Pending" => Some(LessonPlanStatus::Pending),
            "Approved" => Some(LessonPlanStatus::Approved),
            "Completed" => Some(LessonPlanStatus::Completed),
            "Cancelled" => Some(LessonPlanStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LessonPlanStatus::Completed | LessonPlanStatus::Cancelled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            LessonPlanStatus::Draft => 0,
            LessonPlanStatus::Pending => 1,
            LessonPlanStatus::Approved => 2,
            LessonPlanStatus::Completed => 3,
            LessonPlanStatus::Cancelled => 4,
        }
    }

    /// One step along Draft, Pending, Approved, Completed, or Cancelled from any open state.
    pub fn can_transition_to(&self, next: LessonPlanStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == LessonPlanStatus::Cancelled || next.rank() == self.rank() + 1
    }
}

/// Why a status change was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeError {
    InvalidStatus(String),
    NotAllowed {
        from: LessonPlanStatus,
        to: LessonPlanStatus,
    },
}

impl std::fmt::Display for StatusChangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusChangeError::InvalidStatus(s) => write!(f, "Invalid status '{}'", s),
            StatusChangeError::NotAllowed { from, to } => write!(
                f,
                "Cannot change status from {} to {}",
                from.as_str(),
                to.as_str()
            ),
        }
    }
}

/// Structured lesson body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub main_content: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub assessment: String,
}

/// Recorded when a plan is approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDetails {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: String,
    pub teacher_id: String,
    pub title: String,
    pub subject: String,
    pub grade: String,
    pub section: String,
    pub date: NaiveDate,
    /// Minutes
    pub duration: u32,
    pub objectives: Vec<String>,
    pub materials: Vec<String>,
    pub content: LessonContent,
    pub status: LessonPlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_details: Option<ApprovalDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonPlan {
    /// Move the plan to `status`, recording approval metadata when it becomes Approved.
    pub fn set_status(
        &mut self,
        status: &str,
        actor_id: &str,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StatusChangeError> {
        let next = LessonPlanStatus::from_str(status)
            .ok_or_else(|| StatusChangeError::InvalidStatus(status.to_string()))?;

        if !self.status.can_transition_to(next) {
            return Err(StatusChangeError::NotAllowed {
                from: self.status,
                to: next,
            });
        }

        if next == LessonPlanStatus::Approved {
            self.approval_details = Some(ApprovalDetails {
                approved_by: actor_id.to_string(),
                approved_at: now,
                comments,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Request body for creating a lesson plan. New plans start as Draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonPlanRequest {
    pub title: String,
    pub subject: String,
    pub grade: String,
    #[serde(default)]
    pub section: String,
    pub date: NaiveDate,
    pub duration: u32,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub content: LessonContent,
}

/// Request body for editing a lesson plan. Status changes go through the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonPlanRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub objectives: Option<Vec<String>>,
    #[serde(default)]
    pub materials: Option<Vec<String>>,
    #[serde(default)]
    pub content: Option<LessonContent>,
}

/// Request body for the status endpoint. The status stays a string so unknown values
/// surface as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Filters for listing lesson plans.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlanQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
}
