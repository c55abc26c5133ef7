//! Lesson plan persistence.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{repository::parse_json_array, Repository};
use crate::errors::AppError;
use crate::models::{
    ApprovalDetails, CreateLessonPlanRequest, LessonContent, LessonPlan, LessonPlanQuery,
    LessonPlanStatus, UpdateLessonPlanRequest,
};

const PLAN_COLUMNS: &str = r#"id, teacher_id, title, subject, grade, section, date, duration,
    objectives, materials, introduction, main_content, conclusion, assessment, status,
    approved_by, approved_at, approval_comments, created_at, updated_at"#;

impl Repository {
    /// Create a lesson plan in Draft for `teacher_id`.
    pub async fn create_lesson_plan(
        &self,
        request: &CreateLessonPlanRequest,
        teacher_id: &str,
    ) -> Result<LessonPlan, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if request.subject.trim().is_empty() || request.grade.trim().is_empty() {
            return Err(AppError::Validation(
                "Subject and grade are required".to_string(),
            ));
        }
        if request.duration == 0 {
            return Err(AppError::Validation(
                "Duration must be at least one minute".to_string(),
            ));
        }

        let now = Utc::now();
        let plan = LessonPlan {
            id: uuid::Uuid::new_v4().to_string(),
            teacher_id: teacher_id.to_string(),
            title: request.title.trim().to_string(),
            subject: request.subject.trim().to_string(),
            grade: request.grade.trim().to_string(),
            section: request.section.trim().to_string(),
            date: request.date,
            duration: request.duration,
            objectives: request.objectives.clone(),
            materials: request.materials.clone(),
            content: request.content.clone(),
            status: LessonPlanStatus::Draft,
            approval_details: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO lesson_plans ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?, ?)",
            PLAN_COLUMNS
        ))
        .bind(&plan.id)
        .bind(&plan.teacher_id)
        .bind(&plan.title)
        .bind(&plan.subject)
        .bind(&plan.grade)
        .bind(&plan.section)
        .bind(plan.date)
        .bind(plan.duration)
        .bind(serde_json::to_string(&plan.objectives)?)
        .bind(serde_json::to_string(&plan.materials)?)
        .bind(&plan.content.introduction)
        .bind(&plan.content.main_content)
        .bind(&plan.content.conclusion)
        .bind(&plan.content.assessment)
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(plan)
    }

    /// Get a lesson plan by ID.
    pub async fn get_lesson_plan(&self, id: &str) -> Result<Option<LessonPlan>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM lesson_plans WHERE id = ?",
            PLAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(plan_from_row).transpose()
    }

    /// List lesson plans, newest lesson date first.
    ///
    /// `owner` restricts the listing to one teacher regardless of the query's `teacherId`.
    pub async fn list_lesson_plans(
        &self,
        query: &LessonPlanQuery,
        owner: Option<&str>,
    ) -> Result<Vec<LessonPlan>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM lesson_plans WHERE 1 = 1",
            PLAN_COLUMNS
        ));

        if let Some(status) = query.status.as_deref() {
            let status = LessonPlanStatus::from_str(status)
                .ok_or_else(|| AppError::Validation(format!("Invalid status '{}'", status)))?;
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(subject) = query.subject.as_deref() {
            builder
                .push(" AND lower(subject) = lower(")
                .push_bind(subject.trim().to_string())
                .push(")");
        }
        if let Some(teacher_id) = owner.or(query.teacher_id.as_deref()) {
            builder
                .push(" AND teacher_id = ")
                .push_bind(teacher_id.to_string());
        }
        builder.push(" ORDER BY date DESC, created_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(plan_from_row).collect()
    }

    /// Apply a partial edit. Finished or cancelled plans cannot be edited.
    pub async fn update_lesson_plan(
        &self,
        id: &str,
        request: &UpdateLessonPlanRequest,
    ) -> Result<LessonPlan, AppError> {
        let mut plan = self
            .get_lesson_plan(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lesson plan {} not found", id)))?;

        if plan.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Lesson plan is {} and can no longer be edited",
                plan.status.as_str()
            )));
        }

        if let Some(title) = &request.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Title cannot be empty".to_string()));
            }
            plan.title = title.trim().to_string();
        }
        if let Some(subject) = &request.subject {
            if subject.trim().is_empty() {
                return Err(AppError::Validation("Subject cannot be empty".to_string()));
            }
            plan.subject = subject.trim().to_string();
        }
        if let Some(grade) = &request.grade {
            if grade.trim().is_empty() {
                return Err(AppError::Validation("Grade cannot be empty".to_string()));
            }
            plan.grade = grade.trim().to_string();
        }
        if let Some(section) = &request.section {
            plan.section = section.trim().to_string();
        }
        if let Some(date) = request.date {
            plan.date = date;
        }
        if let Some(duration) = request.duration {
            if duration == 0 {
                return Err(AppError::Validation(
                    "Duration must be at least one minute".to_string(),
                ));
            }
            plan.duration = duration;
        }
        if let Some(objectives) = &request.objectives {
            plan.objectives = objectives.clone();
        }
        if let Some(materials) = &request.materials {
            plan.materials = materials.clone();
        }
        if let Some(content) = &request.content {
            plan.content = content.clone();
        }
        plan.updated_at = Utc::now();

        sqlx::query(
            r#"UPDATE lesson_plans SET title = ?, subject = ?, grade = ?, section = ?, date = ?,
                   duration = ?, objectives = ?, materials = ?, introduction = ?, main_content = ?,
                   conclusion = ?, assessment = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&plan.title)
        .bind(&plan.subject)
        .bind(&plan.grade)
        .bind(&plan.section)
        .bind(plan.date)
        .bind(plan.duration)
        .bind(serde_json::to_string(&plan.objectives)?)
        .bind(serde_json::to_string(&plan.materials)?)
        .bind(&plan.content.introduction)
        .bind(&plan.content.main_content)
        .bind(&plan.content.conclusion)
        .bind(&plan.content.assessment)
        .bind(plan.updated_at)
        .bind(&plan.id)
        .execute(&self.pool)
        .await?;

        Ok(plan)
    }

    /// Persist a status change already applied with `LessonPlan::set_status`.
    pub async fn save_lesson_plan_status(&self, plan: &LessonPlan) -> Result<(), AppError> {
        let approval = plan.approval_details.as_ref();
        let result = sqlx::query(
            r#"UPDATE lesson_plans
               SET status = ?, approved_by = ?, approved_at = ?, approval_comments = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(plan.status.as_str())
        .bind(approval.map(|a| a.approved_by.as_str()))
        .bind(approval.map(|a| a.approved_at))
        .bind(approval.and_then(|a| a.comments.as_deref()))
        .bind(plan.updated_at)
        .bind(&plan.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Lesson plan {} not found",
                plan.id
            )));
        }
        Ok(())
    }
}

fn plan_from_row(row: &SqliteRow) -> Result<LessonPlan, AppError> {
    let status: String = row.try_get("status")?;
    let objectives: String = row.try_get("objectives")?;
    let materials: String = row.try_get("materials")?;
    let approved_by: Option<String> = row.try_get("approved_by")?;
    let approved_at: Option<DateTime<Utc>> = row.try_get("approved_at")?;

    let approval_details = match (approved_by, approved_at) {
        (Some(approved_by), Some(approved_at)) => Some(ApprovalDetails {
            approved_by,
            approved_at,
            comments: row.try_get("approval_comments")?,
        }),
        _ => None,
    };

    Ok(LessonPlan {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        title: row.try_get("title")?,
        subject: row.try_get("subject")?,
        grade: row.try_get("grade")?,
        section: row.try_get("section")?,
        date: row.try_get("date")?,
        duration: row.try_get("duration")?,
        objectives: parse_json_array(&objectives),
        materials: parse_json_array(&materials),
        content: LessonContent {
            introduction: row.try_get("introduction")?,
            main_content: row.try_get("main_content")?,
            conclusion: row.try_get("conclusion")?,
            assessment: row.try_get("assessment")?,
        },
        status: LessonPlanStatus::from_str(&status).ok_or_else(|| {
            AppError::Internal(format!("Unknown lesson plan status '{}' in store", status))
        })?,
        approval_details,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
