//! Timetable endpoints, including the substitute resolver.

use std::collections::HashSet;

use axum::{extract::State, Extension};

use super::{created, success, ApiResponse, ApiResult, Json, Query};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    AddPeriodRequest, AvailableTeachersRequest, ClearSubstituteRequest, PeriodView, Role,
    SubstituteRequest, TimetableDay, TimetableQuery,
};
use crate::substitution::{self, AvailableTeacher};
use crate::AppState;

/// GET /api/timetable/getTimetable - Weekly timetable with names resolved.
pub async fn get_timetable(
    State(state): State<AppState>,
    Query(query): Query<TimetableQuery>,
) -> ApiResult<Vec<TimetableDay>> {
    success(state.repo.get_timetable(query.class_label.as_deref()).await?)
}

/// POST /api/timetable/addPeriod - Schedule a period.
pub async fn add_period(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AddPeriodRequest>,
) -> ApiResult<PeriodView> {
    user.require_role(&[Role::Headmaster])?;
    let period = state.repo.add_period(&request).await?;
    created(period, "Period added successfully")
}

/// POST /api/timetable/available-teachers - Teachers free in a slot.
pub async fn available_teachers(
    State(state): State<AppState>,
    Json(request): Json<AvailableTeachersRequest>,
) -> ApiResult<Vec<AvailableTeacher>> {
    if request.period_number == 0 {
        return Err(AppError::Validation(
            "Period number must be at least 1".to_string(),
        ));
    }

    let teachers = state.repo.list_teachers().await?;
    let periods = state
        .repo
        .periods_in_slot(request.day, request.period_number)
        .await?;
    let qualified = match request.subject.as_deref().map(str::trim) {
        Some(subject) if !subject.is_empty() => state.repo.teachers_for_subject(subject).await?,
        _ => HashSet::new(),
    };

    success(substitution::available_teachers(
        &teachers,
        &periods,
        request.day,
        request.period_number,
        &qualified,
    ))
}

/// PUT /api/timetable/substituteTeacher - Cover a period with a substitute.
pub async fn substitute_teacher(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SubstituteRequest>,
) -> ApiResult<PeriodView> {
    user.require_role(&[Role::Headmaster])?;
    let period = state.repo.assign_substitute(&request).await?;
    Ok(ApiResponse::new(period).with_message("Substitute teacher assigned"))
}

/// PUT /api/timetable/clearSubstitute - Hand a period back to its teacher.
pub async fn clear_substitute(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ClearSubstituteRequest>,
) -> ApiResult<PeriodView> {
    user.require_role(&[Role::Headmaster])?;
    let period = state.repo.clear_substitute(&request.period_id).await?;
    Ok(ApiResponse::new(period).with_message("Substitution cleared"))
}
