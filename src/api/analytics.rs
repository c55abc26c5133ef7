//! Analytics endpoints over marks and attendance.

use axum::extract::{Path, State};
use serde::Deserialize;

use super::{students::require_student, success, ApiResult, Query};
use crate::db::AttendanceRegister;
use crate::models::AnalyticsQuery;
use crate::stats::{self, AttendanceReport, MarksReport};
use crate::AppState;

/// Query parameters for the class-wide marks report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMarksQuery {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub group_by: Option<String>,
}

/// GET /api/students/{id}/analytics/marks - Marks report for a student.
pub async fn student_marks_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<MarksReport> {
    let dimension = stats::parse_dimension(query.group_by.as_deref())?;
    require_student(&state, &id).await?;

    let records = state.repo.list_marks_for_student(&id).await?;
    success(stats::aggregate_marks(&records, dimension)?)
}

/// GET /api/students/{id}/analytics/attendance - Attendance report for a student.
pub async fn student_attendance_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AttendanceReport> {
    let dimension = stats::parse_dimension(query.group_by.as_deref())?;
    require_student(&state, &id).await?;

    let records = state
        .repo
        .list_attendance(AttendanceRegister::Students, &id, None, None)
        .await?;
    success(stats::aggregate_attendance(&records, dimension)?)
}

/// GET /api/analytics/class/{classLabel}/marks - Marks report across a class.
pub async fn class_marks_analytics(
    State(state): State<AppState>,
    Path(class_label): Path<String>,
    Query(query): Query<ClassMarksQuery>,
) -> ApiResult<MarksReport> {
    let dimension = stats::parse_dimension(query.group_by.as_deref())?;

    let records = state
        .repo
        .list_marks_for_class(&class_label, query.subject.as_deref())
        .await?;
    tracing::debug!(
        "Class {} marks report over {} records",
        class_label,
        records.len()
    );
    success(stats::aggregate_marks(&records, dimension)?)
}
