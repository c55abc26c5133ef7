//! Database repository for people, students and subjects.
//!
//! Marks, attendance, timetable, lesson plan and announcement operations live in sibling
//! modules as further `impl Repository` blocks.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CreateStudentRequest, CreateSubjectRequest, Person, RegisterRequest, Role, Student, Subject,
};

const PERSON_COLUMNS: &str = "id, name, email, phone, role, created_at, updated_at";
const STUDENT_COLUMNS: &str =
    "id, name, roll_number, email, phone, address, date_of_birth, class_label, created_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== PERSON OPERATIONS ====================

    /// Register a new Person. Duplicate email or phone surfaces as `Conflict`.
    pub async fn create_person(
        &self,
        request: &RegisterRequest,
        password_hash: &str,
    ) -> Result<Person, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO persons (id, name, email, phone, role, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(request.email.trim())
        .bind(request.phone.trim())
        .bind(request.role.as_str())
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Person {
            id,
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.trim().to_string(),
            role: request.role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a Person by ID.
    pub async fn get_person(&self, id: &str) -> Result<Option<Person>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM persons WHERE id = ?", PERSON_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(person_from_row).transpose()
    }

    /// Look up login credentials by email or phone.
    pub async fn find_credentials(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<(Person, String)>, AppError> {
        let (column, value) = match (email, phone) {
            (Some(email), _) => ("email", email.trim()),
            (None, Some(phone)) => ("phone", phone.trim()),
            (None, None) => return Ok(None),
        };

        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM persons WHERE {} = ?",
            PERSON_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let person = person_from_row(&row)?;
                let hash: String = row.try_get("password_hash")?;
                Ok(Some((person, hash)))
            }
            None => Ok(None),
        }
    }

    /// Store (or clear) the Person's current refresh token.
    pub async fn set_refresh_token(
        &self,
        person_id: &str,
        token: Option<&str>,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE persons SET refresh_token = ?, updated_at = ? WHERE id = ?")
                .bind(token)
                .bind(Utc::now())
                .bind(person_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Person {} not found", person_id)));
        }
        Ok(())
    }

    /// The refresh token currently on record, if any.
    pub async fn get_refresh_token(&self, person_id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT refresh_token FROM persons WHERE id = ?")
            .bind(person_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("refresh_token")?),
            None => Ok(None),
        }
    }

    /// All Persons with the Teacher role, by name.
    pub async fn list_teachers(&self) -> Result<Vec<Person>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM persons WHERE role = ? ORDER BY name",
            PERSON_COLUMNS
        ))
        .bind(Role::Teacher.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(person_from_row).collect()
    }

    /// Fail unless `id` names an existing Person with the Teacher role.
    pub async fn require_teacher(&self, id: &str) -> Result<Person, AppError> {
        let person = self
            .get_person(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", id)))?;
        if person.role != Role::Teacher {
            return Err(AppError::Validation(format!(
                "{} is not a teacher",
                person.name
            )));
        }
        Ok(person)
    }

    // ==================== STUDENT OPERATIONS ====================

    /// Admit a student. Duplicate roll number, email or phone surfaces as `Conflict`.
    pub async fn create_student(&self, request: &CreateStudentRequest) -> Result<Student, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(&format!(
            "INSERT INTO students ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            STUDENT_COLUMNS
        ))
        .bind(&id)
        .bind(request.name.trim())
        .bind(request.roll_number.trim())
        .bind(request.email.trim())
        .bind(request.phone.trim())
        .bind(request.address.trim())
        .bind(request.date_of_birth)
        .bind(request.class_label.trim())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Student {
            id,
            name: request.name.trim().to_string(),
            roll_number: request.roll_number.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.trim().to_string(),
            address: request.address.trim().to_string(),
            date_of_birth: request.date_of_birth,
            class_label: request.class_label.trim().to_string(),
            created_at: now,
        })
    }

    /// Get a student by ID.
    pub async fn get_student(&self, id: &str) -> Result<Option<Student>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM students WHERE id = ?",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(student_from_row).transpose()?)
    }

    /// List students, optionally restricted to one class.
    pub async fn list_students(&self, class_label: Option<&str>) -> Result<Vec<Student>, AppError> {
        let rows = match class_label {
            Some(label) => {
                sqlx::query(&format!(
                    "SELECT {} FROM students WHERE class_label = ? ORDER BY roll_number",
                    STUDENT_COLUMNS
                ))
                .bind(label)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM students ORDER BY class_label, roll_number",
                    STUDENT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(student_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== SUBJECT OPERATIONS ====================

    /// Create a subject with its owning teachers and optional enrolment.
    pub async fn create_subject(&self, request: &CreateSubjectRequest) -> Result<Subject, AppError> {
        for teacher_id in &request.teacher_ids {
            self.require_teacher(teacher_id).await?;
        }
        for student_id in &request.student_ids {
            if self.get_student(student_id).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "Student {} not found",
                    student_id
                )));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let teacher_ids = dedup(&request.teacher_ids);
        let student_ids = dedup(&request.student_ids);

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO subjects (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(request.name.trim())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for teacher_id in &teacher_ids {
            sqlx::query("INSERT INTO subject_teachers (subject_id, teacher_id) VALUES (?, ?)")
                .bind(&id)
                .bind(teacher_id)
                .execute(&mut *tx)
                .await?;
        }
        for student_id in &student_ids {
            sqlx::query("INSERT INTO subject_students (subject_id, student_id) VALUES (?, ?)")
                .bind(&id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Subject {
            id,
            name: request.name.trim().to_string(),
            teacher_ids,
            student_ids,
            created_at: now,
        })
    }

    /// List all subjects with their teacher and student IDs.
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let teacher_ids = sqlx::query_scalar::<_, String>(
                "SELECT teacher_id FROM subject_teachers WHERE subject_id = ? ORDER BY teacher_id",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;
            let student_ids = sqlx::query_scalar::<_, String>(
                "SELECT student_id FROM subject_students WHERE subject_id = ? ORDER BY student_id",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;

            subjects.push(Subject {
                id,
                name: row.try_get("name")?,
                teacher_ids,
                student_ids,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(subjects)
    }

    /// IDs of teachers owning a subject with this name (case-insensitive).
    pub async fn teachers_for_subject(&self, subject: &str) -> Result<HashSet<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"SELECT st.teacher_id
               FROM subject_teachers st
               JOIN subjects s ON s.id = st.subject_id
               WHERE lower(s.name) = lower(?)"#,
        )
        .bind(subject.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }
}

// Helper functions for row conversion

pub(super) fn person_from_row(row: &SqliteRow) -> Result<Person, AppError> {
    let role: String = row.try_get("role")?;
    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: Role::from_str(&role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role '{}' in store", role)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn student_from_row(row: &SqliteRow) -> Result<Student, sqlx::Error> {
    Ok(Student {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        roll_number: row.try_get("roll_number")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        date_of_birth: row.try_get("date_of_birth")?,
        class_label: row.try_get("class_label")?,
        created_at: row.try_get("created_at")?,
    })
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

pub(super) fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
