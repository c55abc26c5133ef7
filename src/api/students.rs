//! Student endpoints: admission, marks and attendance.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{created, success, ApiResult, Json, Query};
use crate::auth::AuthUser;
use crate::db::AttendanceRegister;
use crate::errors::AppError;
use crate::models::{
    AddMarksRequest, AttendanceQuery, AttendanceRecord, BulkAttendanceRequest,
    CreateStudentRequest, MarkRecord, Role, Student, StudentListQuery,
};
use crate::AppState;

/// POST /api/students/addStudent - Admit a student.
pub async fn add_student(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateStudentRequest>,
) -> ApiResult<Student> {
    user.require_role(&[Role::Headmaster])?;

    // Validate required fields
    let required = [
        ("Name", &request.name),
        ("Roll number", &request.roll_number),
        ("Email", &request.email),
        ("Phone", &request.phone),
        ("Class label", &request.class_label),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(AppError::Validation(format!("{} is required", field)));
    }

    let student = state.repo.create_student(&request).await?;
    tracing::info!("Admitted {} to {}", student.roll_number, student.class_label);
    created(student, "Student added successfully")
}

/// GET /api/students - List students, optionally by class.
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> ApiResult<Vec<Student>> {
    success(state.repo.list_students(query.class_label.as_deref()).await?)
}

/// GET /api/students/{id} - Get a single student.
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    match state.repo.get_student(&id).await? {
        Some(student) => success(student),
        None => Err(AppError::NotFound(format!("Student {} not found", id))),
    }
}

/// POST /api/students/addMarks - Record an exam mark.
pub async fn add_marks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AddMarksRequest>,
) -> ApiResult<MarkRecord> {
    user.require_role(&[Role::Teacher, Role::Headmaster])?;
    request.validate().map_err(AppError::Validation)?;

    let record = state.repo.add_marks(&request, &user.id).await?;
    created(record, "Marks added successfully")
}

/// GET /api/students/{id}/marks - All marks for a student.
pub async fn list_student_marks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MarkRecord>> {
    require_student(&state, &id).await?;
    success(state.repo.list_marks_for_student(&id).await?)
}

/// POST /api/students/addattendance - Bulk attendance for one day.
pub async fn add_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BulkAttendanceRequest>,
) -> ApiResult<Vec<AttendanceRecord>> {
    user.require_role(&[Role::Teacher, Role::Headmaster])?;

    let records = state
        .repo
        .upsert_attendance(
            AttendanceRegister::Students,
            request.date,
            &request.records,
            &user.id,
        )
        .await?;
    created(records, "Attendance recorded successfully")
}

/// GET /api/students/{id}/attendance - Attendance history, optionally within dates.
pub async fn list_student_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Vec<AttendanceRecord>> {
    require_student(&state, &id).await?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }
    }

    success(
        state
            .repo
            .list_attendance(AttendanceRegister::Students, &id, query.from, query.to)
            .await?,
    )
}

pub(super) async fn require_student(state: &AppState, id: &str) -> Result<Student, AppError> {
    state
        .repo
        .get_student(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))
}
