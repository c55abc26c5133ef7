//! Notice board endpoints.

use axum::{extract::State, Extension};

use super::{created, success, ApiResult, Json};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{Announcement, CreateAnnouncementRequest, Role};
use crate::AppState;

/// POST /api/announcements - Post a notice.
pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    user.require_role(&[Role::Headmaster])?;

    if request.title.trim().is_empty() || request.description.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and description are required".to_string(),
        ));
    }

    let announcement = state.repo.create_announcement(&request, &user.id).await?;
    created(announcement, "Announcement posted")
}

/// GET /api/announcements - All notices, newest first.
pub async fn list_announcements(State(state): State<AppState>) -> ApiResult<Vec<Announcement>> {
    success(state.repo.list_announcements().await?)
}
