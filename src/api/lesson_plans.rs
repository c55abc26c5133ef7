//! Lesson plan endpoints and the status workflow.

use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use super::{created, success, ApiResponse, ApiResult, Json, Query};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    CreateLessonPlanRequest, LessonPlan, LessonPlanQuery, LessonPlanStatus, Role,
    StatusChangeError, StatusUpdateRequest, UpdateLessonPlanRequest,
};
use crate::AppState;

impl From<StatusChangeError> for AppError {
    fn from(err: StatusChangeError) -> Self {
        match err {
            StatusChangeError::InvalidStatus(_) => AppError::Validation(err.to_string()),
            StatusChangeError::NotAllowed { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

/// POST /api/lessonPlans/create - Draft a new lesson plan.
pub async fn create_lesson_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateLessonPlanRequest>,
) -> ApiResult<LessonPlan> {
    user.require_role(&[Role::Teacher, Role::Headmaster])?;
    let plan = state.repo.create_lesson_plan(&request, &user.id).await?;
    created(plan, "Lesson plan created successfully")
}

/// GET /api/lessonPlans/list - Teachers only ever see their own plans.
pub async fn list_lesson_plans(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LessonPlanQuery>,
) -> ApiResult<Vec<LessonPlan>> {
    let owner = (user.role == Role::Teacher).then_some(user.id.as_str());
    success(state.repo.list_lesson_plans(&query, owner).await?)
}

/// GET /api/lessonPlans/{id} - Get a single lesson plan.
pub async fn get_lesson_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<LessonPlan> {
    let plan = load_plan(&state, &id).await?;
    if user.role == Role::Teacher && plan.teacher_id != user.id {
        return Err(AppError::Forbidden(
            "Teachers can only view their own lesson plans".to_string(),
        ));
    }
    success(plan)
}

/// PATCH /api/lessonPlans/{id} - Edit a lesson plan that is still open.
pub async fn update_lesson_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateLessonPlanRequest>,
) -> ApiResult<LessonPlan> {
    let plan = load_plan(&state, &id).await?;
    require_owner_or_headmaster(&user, &plan)?;

    let plan = state.repo.update_lesson_plan(&id, &request).await?;
    Ok(ApiResponse::new(plan).with_message("Lesson plan updated"))
}

/// PATCH /api/lessonPlans/{id}/status - Move a plan through its workflow.
///
/// Only a Headmaster may approve; the owner may submit, complete or cancel.
pub async fn update_lesson_plan_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<LessonPlan> {
    let mut plan = load_plan(&state, &id).await?;
    require_owner_or_headmaster(&user, &plan)?;

    if LessonPlanStatus::from_str(&request.status) == Some(LessonPlanStatus::Approved) {
        user.require_role(&[Role::Headmaster])?;
    }

    let from = plan.status;
    plan.set_status(&request.status, &user.id, request.comments, Utc::now())?;
    state.repo.save_lesson_plan_status(&plan).await?;

    tracing::info!(
        "Lesson plan {} moved from {} to {} by {}",
        plan.id,
        from.as_str(),
        plan.status.as_str(),
        user.name
    );
    Ok(ApiResponse::new(plan).with_message("Lesson plan status updated"))
}

async fn load_plan(state: &AppState, id: &str) -> Result<LessonPlan, AppError> {
    state
        .repo
        .get_lesson_plan(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson plan {} not found", id)))
}

fn require_owner_or_headmaster(user: &AuthUser, plan: &LessonPlan) -> Result<(), AppError> {
    if user.role == Role::Headmaster || plan.teacher_id == user.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the plan's author or a headmaster can change it".to_string(),
        ))
    }
}
