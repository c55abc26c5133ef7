//! Faculty attendance endpoints.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{created, success, ApiResult, Json, Query};
use crate::auth::AuthUser;
use crate::db::AttendanceRegister;
use crate::models::{AnalyticsQuery, AttendanceRecord, BulkAttendanceRequest, Role};
use crate::stats::{self, AttendanceReport};
use crate::AppState;

/// POST /api/faculty/attendance - Bulk teacher attendance for one day.
pub async fn add_faculty_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BulkAttendanceRequest>,
) -> ApiResult<Vec<AttendanceRecord>> {
    user.require_role(&[Role::Headmaster])?;

    let records = state
        .repo
        .upsert_attendance(
            AttendanceRegister::Faculty,
            request.date,
            &request.records,
            &user.id,
        )
        .await?;
    created(records, "Faculty attendance recorded successfully")
}

/// GET /api/faculty/{id}/analytics/attendance - Attendance report for a teacher.
pub async fn faculty_attendance_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AttendanceReport> {
    let dimension = stats::parse_dimension(query.group_by.as_deref())?;
    state.repo.require_teacher(&id).await?;

    let records = state
        .repo
        .list_attendance(AttendanceRegister::Faculty, &id, None, None)
        .await?;
    success(stats::aggregate_attendance(&records, dimension)?)
}
