use axum::{extract::State, Extension};

use super::{ApiResponse, ApiResult, Json};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::sms::{SendSmsRequest, SmsReceipt};
use crate::AppState;

/// POST /api/sms/send-sms - Forward a message to the SMS gateway.
pub async fn send_sms(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SendSmsRequest>,
) -> ApiResult<SmsReceipt> {
    request.validate().map_err(AppError::Validation)?;

    tracing::info!(
        "{} sending SMS to {} recipient(s)",
        user.name,
        request.to.len()
    );
    let receipt = state.sms.send(&request.to, &request.message).await?;
    Ok(ApiResponse::new(receipt).with_message("SMS sent successfully"))
}
