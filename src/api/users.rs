//! Account endpoints: registration, login, token refresh, logout and profile.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName},
    response::AppendHeaders,
    Extension,
};

use super::{created, success, ApiResponse, ApiResult, Json};
use crate::auth::{self, AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::errors::AppError;
use crate::models::{AuthResponse, LoginRequest, Person, RefreshTokenRequest, RegisterRequest};
use crate::sms::is_valid_phone;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

type CookieHeaders = AppendHeaders<[(HeaderName, String); 2]>;

/// POST /api/users/register - Create an account.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Person> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if !request.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if !is_valid_phone(request.phone.trim()) {
        return Err(AppError::Validation("A valid phone number is required".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = auth::hash_password(&request.password)?;
    let person = state.repo.create_person(&request, &hash).await?;
    tracing::info!("Registered {} as {}", person.email, person.role.as_str());

    created(person, "User registered successfully")
}

/// POST /api/users/login - Authenticate by email or phone.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieHeaders, ApiResponse<AuthResponse>), AppError> {
    if request.email.is_none() && request.phone.is_none() {
        return Err(AppError::Validation(
            "Email or phone is required".to_string(),
        ));
    }

    let credentials = state
        .repo
        .find_credentials(request.email.as_deref(), request.phone.as_deref())
        .await?;

    let person = match credentials {
        Some((person, hash)) if auth::verify_password(&request.password, &hash) => person,
        _ => {
            tracing::warn!("Failed login attempt");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let (headers, tokens) = issue_session(&state, person).await?;
    Ok((
        headers,
        ApiResponse::new(tokens).with_message("Logged in successfully"),
    ))
}

/// POST /api/users/refresh-token - Rotate both tokens.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(CookieHeaders, ApiResponse<AuthResponse>), AppError> {
    let from_body = if body.is_empty() {
        RefreshTokenRequest::default()
    } else {
        serde_json::from_slice::<RefreshTokenRequest>(&body)?
    };

    let token = auth::cookie_value(&headers, REFRESH_COOKIE)
        .or(from_body.refresh_token)
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let claims = auth::verify_token(&token, &state.config.refresh_token_secret)?;
    let stored = state.repo.get_refresh_token(&claims.sub).await?;
    let matches = stored
        .as_deref()
        .map(|stored| auth::constant_time_compare(stored, &token))
        .unwrap_or(false);
    if !matches {
        return Err(AppError::Unauthorized(
            "Refresh token is expired or already used".to_string(),
        ));
    }

    let person = state
        .repo
        .get_person(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    let (headers, tokens) = issue_session(&state, person).await?;
    Ok((
        headers,
        ApiResponse::new(tokens).with_message("Token refreshed"),
    ))
}

/// POST /api/users/logout - Forget the refresh token and expire both cookies.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<(CookieHeaders, ApiResponse<()>), AppError> {
    state.repo.set_refresh_token(&user.id, None).await?;
    tracing::info!("{} logged out", user.name);

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, auth::expired_cookie(ACCESS_COOKIE)),
            (header::SET_COOKIE, auth::expired_cookie(REFRESH_COOKIE)),
        ]),
        ApiResponse::new(()).with_message("Logged out"),
    ))
}

/// GET /api/users/getProfile - The caller's own account.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Person> {
    match state.repo.get_person(&user.id).await? {
        Some(person) => success(person),
        None => Err(AppError::NotFound(format!("Person {} not found", user.id))),
    }
}

/// GET /api/users/teachers - Everyone with the Teacher role.
pub async fn list_teachers(State(state): State<AppState>) -> ApiResult<Vec<Person>> {
    success(state.repo.list_teachers().await?)
}

/// Sign a fresh token pair, remember the refresh token and build the cookies.
async fn issue_session(
    state: &AppState,
    person: Person,
) -> Result<(CookieHeaders, AuthResponse), AppError> {
    let config = &state.config;
    let access_token = auth::issue_token(
        &person.id,
        person.role,
        &config.access_token_secret,
        config.access_token_ttl,
    )?;
    let refresh_token = auth::issue_token(
        &person.id,
        person.role,
        &config.refresh_token_secret,
        config.refresh_token_ttl,
    )?;

    state
        .repo
        .set_refresh_token(&person.id, Some(&refresh_token))
        .await?;

    let headers = AppendHeaders([
        (
            header::SET_COOKIE,
            auth::auth_cookie(
                ACCESS_COOKIE,
                &access_token,
                config.access_token_ttl,
                config.cookie_secure,
            ),
        ),
        (
            header::SET_COOKIE,
            auth::auth_cookie(
                REFRESH_COOKIE,
                &refresh_token,
                config.refresh_token_ttl,
                config.cookie_secure,
            ),
        ),
    ]);

    Ok((
        headers,
        AuthResponse {
            person,
            access_token,
            refresh_token,
        },
    ))
}
