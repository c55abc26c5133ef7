//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Each request reloads what it
//! needs; nothing is cached in process.

mod announcements;
mod lesson_plans;
mod records;
mod repository;
mod timetable;

pub use records::AttendanceRegister;
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            refresh_token TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            roll_number TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL UNIQUE,
            address TEXT NOT NULL DEFAULT '',
            date_of_birth TEXT NOT NULL,
            class_label TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subject_teachers (
            subject_id TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
            teacher_id TEXT NOT NULL REFERENCES persons(id),
            PRIMARY KEY (subject_id, teacher_id)
        );

        CREATE TABLE IF NOT EXISTS subject_students (
            subject_id TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
            student_id TEXT NOT NULL REFERENCES students(id),
            PRIMARY KEY (subject_id, student_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS marks (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES students(id),
            subject TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            marks REAL NOT NULL CHECK (marks >= 0 AND marks <= 100),
            teacher_id TEXT NOT NULL REFERENCES persons(id),
            exam_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_attendance (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES students(id),
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            recorded_by TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (student_id, date)
        );

        CREATE TABLE IF NOT EXISTS faculty_attendance (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL REFERENCES persons(id),
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            recorded_by TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (teacher_id, date)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS periods (
            id TEXT PRIMARY KEY,
            day TEXT NOT NULL,
            period_number INTEGER NOT NULL,
            subject TEXT NOT NULL,
            class_label TEXT NOT NULL,
            teacher_id TEXT NOT NULL REFERENCES persons(id),
            is_substituted INTEGER NOT NULL DEFAULT 0,
            substitute_id TEXT REFERENCES persons(id),
            updated_at TEXT NOT NULL,
            UNIQUE (day, class_label, period_number)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lesson_plans (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL REFERENCES persons(id),
            title TEXT NOT NULL,
            subject TEXT NOT NULL,
            grade TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            duration INTEGER NOT NULL,
            objectives TEXT NOT NULL DEFAULT '[]',
            materials TEXT NOT NULL DEFAULT '[]',
            introduction TEXT NOT NULL DEFAULT '',
            main_content TEXT NOT NULL DEFAULT '',
            conclusion TEXT NOT NULL DEFAULT '',
            assessment TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            approved_by TEXT,
            approved_at TEXT,
            approval_comments TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS announcements (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            created_by TEXT NOT NULL REFERENCES persons(id),
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_persons_role ON persons(role);
        CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_label);
        CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id);
        CREATE INDEX IF NOT EXISTS idx_periods_slot ON periods(day, period_number);
        CREATE INDEX IF NOT EXISTS idx_lesson_plans_teacher ON lesson_plans(teacher_id);
        CREATE INDEX IF NOT EXISTS idx_announcements_created ON announcements(created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
