//! School Management Backend
//!
//! REST backend for attendance, marks, timetables, substitutions and lesson plans, with
//! SQLite persistence and JWT authentication.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod sms;
mod stats;
mod substitution;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use sms::SmsClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub sms: Arc<SmsClient>,
}

impl AppState {
    pub fn new(repo: Repository, config: Config) -> Self {
        let sms = SmsClient::new(config.sms.clone());
        Self {
            repo: Arc::new(repo),
            config: Arc::new(config),
            sms: Arc::new(sms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting School Management Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.generated_secrets {
        tracing::warn!(
            "Token secrets not configured (SCHOOL_ACCESS_TOKEN_SECRET / SCHOOL_REFRESH_TOKEN_SECRET). \
             Using random secrets; sessions will not survive a restart!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, config);
    if !state.sms.is_configured() {
        tracing::warn!("No SMS gateway configured (SCHOOL_SMS_GATEWAY_URL). SMS sending is disabled");
    }

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes that establish a session
    let public_routes = Router::new()
        .route("/users/register", post(api::register))
        .route("/users/login", post(api::login))
        .route("/users/refresh-token", post(api::refresh_token));

    let protected_routes = Router::new()
        // Users
        .route("/users/logout", post(api::logout))
        .route("/users/getProfile", get(api::get_profile))
        .route("/users/teachers", get(api::list_teachers))
        // Students
        .route("/students", get(api::list_students))
        .route("/students/addStudent", post(api::add_student))
        .route("/students/addMarks", post(api::add_marks))
        .route("/students/addattendance", post(api::add_attendance))
        .route("/students/{id}", get(api::get_student))
        .route("/students/{id}/marks", get(api::list_student_marks))
        .route("/students/{id}/attendance", get(api::list_student_attendance))
        .route(
            "/students/{id}/analytics/marks",
            get(api::student_marks_analytics),
        )
        .route(
            "/students/{id}/analytics/attendance",
            get(api::student_attendance_analytics),
        )
        // Analytics
        .route(
            "/analytics/class/{class_label}/marks",
            get(api::class_marks_analytics),
        )
        // Faculty
        .route("/faculty/attendance", post(api::add_faculty_attendance))
        .route(
            "/faculty/{id}/analytics/attendance",
            get(api::faculty_attendance_analytics),
        )
        // Subjects
        .route(
            "/subjects",
            get(api::list_subjects).post(api::create_subject),
        )
        // Timetable
        .route("/timetable/getTimetable", get(api::get_timetable))
        .route("/timetable/addPeriod", post(api::add_period))
        .route(
            "/timetable/available-teachers",
            post(api::available_teachers),
        )
        .route("/timetable/substituteTeacher", put(api::substitute_teacher))
        .route("/timetable/clearSubstitute", put(api::clear_substitute))
        // Lesson plans
        .route("/lessonPlans/create", post(api::create_lesson_plan))
        .route("/lessonPlans/list", get(api::list_lesson_plans))
        .route(
            "/lessonPlans/{id}",
            get(api::get_lesson_plan).patch(api::update_lesson_plan),
        )
        .route(
            "/lessonPlans/{id}/status",
            patch(api::update_lesson_plan_status),
        )
        // SMS
        .route("/sms/send-sms", post(api::send_sms))
        // Announcements
        .route(
            "/announcements",
            get(api::list_announcements).post(api::create_announcement),
        )
        // Apply token auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
