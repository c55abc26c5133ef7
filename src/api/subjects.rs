//! Subject API endpoints.

use axum::{extract::State, Extension};

use super::{created, success, ApiResult, Json};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{CreateSubjectRequest, Role, Subject};
use crate::AppState;

/// GET /api/subjects - List all subjects.
pub async fn list_subjects(State(state): State<AppState>) -> ApiResult<Vec<Subject>> {
    success(state.repo.list_subjects().await?)
}

/// POST /api/subjects - Create a subject.
pub async fn create_subject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSubjectRequest>,
) -> ApiResult<Subject> {
    user.require_role(&[Role::Headmaster])?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if request.teacher_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one teacher is required".to_string(),
        ));
    }

    let subject = state.repo.create_subject(&request).await?;
    created(subject, "Subject created successfully")
}
