//! Marks and attendance persistence.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use super::Repository;
use crate::errors::AppError;
use crate::models::{
    AddMarksRequest, AttendanceEntry, AttendanceRecord, AttendanceStatus, ExamType, MarkRecord,
    Role,
};

const MARK_COLUMNS: &str =
    "m.id, m.student_id, m.subject, m.exam_type, m.marks, m.teacher_id, m.exam_date, m.created_at";

/// Which attendance register a write or read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceRegister {
    Students,
    Faculty,
}

impl AttendanceRegister {
    fn table(&self) -> &'static str {
        match self {
            AttendanceRegister::Students => "student_attendance",
            AttendanceRegister::Faculty => "faculty_attendance",
        }
    }

    fn person_column(&self) -> &'static str {
        match self {
            AttendanceRegister::Students => "student_id",
            AttendanceRegister::Faculty => "teacher_id",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            AttendanceRegister::Students => "Student",
            AttendanceRegister::Faculty => "Teacher",
        }
    }
}

impl Repository {
    // ==================== MARK OPERATIONS ====================

    /// Record one mark. The request must already be validated.
    pub async fn add_marks(
        &self,
        request: &AddMarksRequest,
        teacher_id: &str,
    ) -> Result<MarkRecord, AppError> {
        if self.get_student(&request.student_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Student {} not found",
                request.student_id
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let exam_date = request.exam_date.unwrap_or_else(|| now.date_naive());

        sqlx::query(
            "INSERT INTO marks (id, student_id, subject, exam_type, marks, teacher_id, exam_date, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.student_id)
        .bind(request.subject.trim())
        .bind(request.exam_type.as_str())
        .bind(request.marks)
        .bind(teacher_id)
        .bind(exam_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Recorded {} for student {} in {}",
            request.marks,
            request.student_id,
            request.subject
        );

        Ok(MarkRecord {
            id,
            student_id: request.student_id.clone(),
            subject: request.subject.trim().to_string(),
            exam_type: request.exam_type.clone(),
            marks: request.marks,
            teacher_id: teacher_id.to_string(),
            exam_date,
            created_at: now,
        })
    }

    /// All marks for one student, oldest exam first.
    pub async fn list_marks_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<MarkRecord>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM marks m WHERE m.student_id = ? ORDER BY m.exam_date, m.created_at",
            MARK_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(mark_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// All marks of every student in a class, optionally for one subject.
    pub async fn list_marks_for_class(
        &self,
        class_label: &str,
        subject: Option<&str>,
    ) -> Result<Vec<MarkRecord>, AppError> {
        let mut sql = format!(
            "SELECT {} FROM marks m JOIN students s ON s.id = m.student_id WHERE s.class_label = ?",
            MARK_COLUMNS
        );
        if subject.is_some() {
            sql.push_str(" AND lower(m.subject) = lower(?)");
        }
        sql.push_str(" ORDER BY m.exam_date, m.created_at");

        let mut query = sqlx::query(&sql).bind(class_label);
        if let Some(subject) = subject {
            query = query.bind(subject.trim());
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(mark_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== ATTENDANCE OPERATIONS ====================

    /// Write one day's attendance for many people at once.
    ///
    /// Everything happens in one transaction: if any person is unknown nothing is written.
    /// An existing (person, date) record is overwritten, so concurrent writers for the same
    /// key leave exactly one record behind.
    pub async fn upsert_attendance(
        &self,
        register: AttendanceRegister,
        date: NaiveDate,
        entries: &[AttendanceEntry],
        recorded_by: &str,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        if entries.is_empty() {
            return Err(AppError::Validation(
                "At least one attendance record is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = entries.iter().find(|e| !seen.insert(e.person_id.as_str())) {
            return Err(AppError::Validation(format!(
                "{} {} appears more than once",
                register.noun(),
                dup.person_id
            )));
        }

        for entry in entries {
            let exists = match register {
                AttendanceRegister::Students => self.get_student(&entry.person_id).await?.is_some(),
                AttendanceRegister::Faculty => self
                    .get_person(&entry.person_id)
                    .await?
                    .is_some_and(|p| p.role == Role::Teacher),
            };
            if !exists {
                return Err(AppError::NotFound(format!(
                    "{} {} not found",
                    register.noun(),
                    entry.person_id
                )));
            }
        }

        // Only writes inside the transaction: the deferred BEGIN takes the write lock at the
        // first upsert, and no earlier read snapshot can go stale.
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(entries.len());

        for entry in entries {
            let sql = format!(
                r#"INSERT INTO {table} (id, {col}, date, status, recorded_by, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?)
                   ON CONFLICT ({col}, date) DO UPDATE SET
                       status = excluded.status,
                       recorded_by = excluded.recorded_by,
                       updated_at = excluded.updated_at
                   RETURNING id"#,
                table = register.table(),
                col = register.person_column(),
            );
            let id: String = sqlx::query_scalar(&sql)
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&entry.person_id)
                .bind(date)
                .bind(entry.status.as_str())
                .bind(recorded_by)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

            written.push(AttendanceRecord {
                id,
                person_id: entry.person_id.clone(),
                date,
                status: entry.status,
                recorded_by: recorded_by.to_string(),
                updated_at: now,
            });
        }

        tx.commit().await?;
        tracing::info!(
            "Recorded {} {} attendance entries for {}",
            written.len(),
            register.table(),
            date
        );
        Ok(written)
    }

    /// Attendance history for one person, oldest first, within an optional inclusive window.
    pub async fn list_attendance(
        &self,
        register: AttendanceRegister,
        person_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut sql = format!(
            "SELECT id, {col} AS person_id, date, status, recorded_by, updated_at FROM {table} WHERE {col} = ?",
            table = register.table(),
            col = register.person_column(),
        );
        if from.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if to.is_some() {
            sql.push_str(" AND date <= ?");
        }
        sql.push_str(" ORDER BY date");

        let mut query = sqlx::query(&sql).bind(person_id);
        if let Some(from) = from {
            query = query.bind(from);
        }
        if let Some(to) = to {
            query = query.bind(to);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(attendance_from_row).collect()
    }
}

fn mark_from_row(row: &SqliteRow) -> Result<MarkRecord, sqlx::Error> {
    let exam_type: String = row.try_get("exam_type")?;
    Ok(MarkRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        subject: row.try_get("subject")?,
        exam_type: ExamType::from(exam_type),
        marks: row.try_get("marks")?,
        teacher_id: row.try_get("teacher_id")?,
        exam_date: row.try_get("exam_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn attendance_from_row(row: &SqliteRow) -> Result<AttendanceRecord, AppError> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        person_id: row.try_get("person_id")?,
        date: row.try_get("date")?,
        status: AttendanceStatus::from_str(&status).ok_or_else(|| {
            AppError::Internal(format!("Unknown attendance status '{}' in store", status))
        })?,
        recorded_by: row.try_get("recorded_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}
