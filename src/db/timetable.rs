//! Timetable persistence and substitute assignment.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::Repository;
use crate::errors::AppError;
use crate::models::{
    AddPeriodRequest, Period, PeriodView, SubstituteRequest, TimetableDay, Weekday,
};
use crate::substitution;

const VIEW_SELECT: &str = r#"
    SELECT p.id, p.day, p.period_number, p.subject, p.class_label, p.teacher_id,
           p.is_substituted, p.substitute_id,
           t.name AS teacher_name, s.name AS substitute_name
    FROM periods p
    JOIN persons t ON t.id = p.teacher_id
    LEFT JOIN persons s ON s.id = p.substitute_id
"#;

impl Repository {
    /// Add a period. One period per (day, class, period number).
    pub async fn add_period(&self, request: &AddPeriodRequest) -> Result<PeriodView, AppError> {
        if request.period_number == 0 {
            return Err(AppError::Validation(
                "Period number must be at least 1".to_string(),
            ));
        }
        if request.subject.trim().is_empty() || request.class_label.trim().is_empty() {
            return Err(AppError::Validation(
                "Subject and class label are required".to_string(),
            ));
        }
        self.require_teacher(&request.teacher_id).await?;

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO periods (id, day, period_number, subject, class_label, teacher_id, is_substituted, updated_at) VALUES (?, ?, ?, ?, ?, ?, 0, ?)"
        )
        .bind(&id)
        .bind(request.day.as_str())
        .bind(request.period_number)
        .bind(request.subject.trim())
        .bind(request.class_label.trim())
        .bind(&request.teacher_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_period_view(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Period vanished after insert".to_string()))
    }

    /// The weekly timetable grouped by day, optionally for one class.
    pub async fn get_timetable(
        &self,
        class_label: Option<&str>,
    ) -> Result<Vec<TimetableDay>, AppError> {
        let rows = match class_label {
            Some(label) => {
                sqlx::query(&format!(
                    "{} WHERE p.class_label = ? ORDER BY p.class_label, p.period_number",
                    VIEW_SELECT
                ))
                .bind(label)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} ORDER BY p.class_label, p.period_number",
                    VIEW_SELECT
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut by_day: BTreeMap<Weekday, Vec<PeriodView>> = BTreeMap::new();
        for row in &rows {
            let view = view_from_row(row)?;
            by_day.entry(view.day).or_default().push(view);
        }

        Ok(by_day
            .into_iter()
            .map(|(day, periods)| TimetableDay { day, periods })
            .collect())
    }

    /// Every period (any class) in the given slot.
    pub async fn periods_in_slot(
        &self,
        day: Weekday,
        period_number: u32,
    ) -> Result<Vec<Period>, AppError> {
        let rows = sqlx::query(
            "SELECT id, day, period_number, subject, class_label, teacher_id, is_substituted, substitute_id FROM periods WHERE day = ? AND period_number = ?"
        )
        .bind(day.as_str())
        .bind(period_number)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(period_from_row).collect()
    }

    /// A single period with names resolved.
    pub async fn get_period_view(&self, id: &str) -> Result<Option<PeriodView>, AppError> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", VIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(view_from_row).transpose()
    }

    /// Cover the original teacher's period in the slot with a substitute.
    ///
    /// A later assignment to the same period replaces the earlier one.
    pub async fn assign_substitute(
        &self,
        request: &SubstituteRequest,
    ) -> Result<PeriodView, AppError> {
        if request.original_teacher_id == request.substitute_teacher_id {
            return Err(AppError::Validation(
                "A teacher cannot substitute for themselves".to_string(),
            ));
        }
        let substitute = self.require_teacher(&request.substitute_teacher_id).await?;

        let slot = self
            .periods_in_slot(request.day, request.period_number)
            .await?;
        let mut period = substitution::find_period(
            &slot,
            request.day,
            request.period_number,
            &request.original_teacher_id,
        )
        .cloned()
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No period found for teacher {} on {} period {}",
                request.original_teacher_id,
                request.day.as_str(),
                request.period_number
            ))
        })?;

        let others: Vec<Period> = slot.iter().filter(|p| p.id != period.id).cloned().collect();
        if substitution::busy_teachers(&others, request.day, request.period_number)
            .contains(substitute.id.as_str())
        {
            tracing::warn!(
                "Substitute {} is already busy on {} period {}",
                substitute.name,
                request.day.as_str(),
                request.period_number
            );
        }

        substitution::apply_substitution(&mut period, &substitute.id);

        sqlx::query(
            "UPDATE periods SET is_substituted = ?, substitute_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(period.is_substituted)
        .bind(&period.substitute_id)
        .bind(Utc::now())
        .bind(&period.id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            "{} substitutes in {} on {} period {}",
            substitute.name,
            period.class_label,
            request.day.as_str(),
            request.period_number
        );

        self.get_period_view(&period.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Period {} not found", period.id)))
    }

    /// Give a period back to its own teacher.
    pub async fn clear_substitute(&self, period_id: &str) -> Result<PeriodView, AppError> {
        let row = sqlx::query(
            "SELECT id, day, period_number, subject, class_label, teacher_id, is_substituted, substitute_id FROM periods WHERE id = ?"
        )
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Period {} not found", period_id)))?;

        let mut period = period_from_row(&row)?;
        substitution::clear_substitution(&mut period);

        sqlx::query(
            "UPDATE periods SET is_substituted = ?, substitute_id = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(period.is_substituted)
        .bind(Utc::now())
        .bind(&period.id)
        .execute(&self.pool)
        .await?;

        self.get_period_view(&period.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Period {} not found", period_id)))
    }
}

fn parse_day(raw: &str) -> Result<Weekday, AppError> {
    Weekday::from_str(raw)
        .ok_or_else(|| AppError::Internal(format!("Unknown weekday '{}' in store", raw)))
}

fn period_from_row(row: &SqliteRow) -> Result<Period, AppError> {
    let day: String = row.try_get("day")?;
    Ok(Period {
        id: row.try_get("id")?,
        day: parse_day(&day)?,
        period_number: row.try_get("period_number")?,
        subject: row.try_get("subject")?,
        class_label: row.try_get("class_label")?,
        teacher_id: row.try_get("teacher_id")?,
        is_substituted: row.try_get("is_substituted")?,
        substitute_id: row.try_get("substitute_id")?,
    })
}

fn view_from_row(row: &SqliteRow) -> Result<PeriodView, AppError> {
    let period = period_from_row(row)?;
    Ok(PeriodView {
        id: period.id,
        day: period.day,
        period_number: period.period_number,
        subject: period.subject,
        class_label: period.class_label,
        teacher_id: period.teacher_id,
        teacher_name: row.try_get("teacher_name")?,
        is_substituted: period.is_substituted,
        substitute_id: period.substitute_id,
        substitute_name: row.try_get("substitute_name")?,
    })
}
