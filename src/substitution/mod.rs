//! Substitute-teacher resolution over a weekly timetable.
//!
//! A teacher is busy in a slot (day, period number) when any period in that slot names them
//! as teacher or as substitute. Everyone else with the Teacher role is available. The subject
//! only ranks candidates; it never removes one.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Period, Person, Role, Weekday};

/// A teacher who is free in the requested slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTeacher {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Teaches the hinted subject
    pub qualified: bool,
}

/// IDs of everyone teaching or substituting in the slot.
pub fn busy_teachers(periods: &[Period], day: Weekday, period_number: u32) -> HashSet<&str> {
    periods
        .iter()
        .filter(|p| p.day == day && p.period_number == period_number)
        .flat_map(|p| std::iter::once(p.teacher_id.as_str()).chain(p.substitute_id.as_deref()))
        .collect()
}

/// All teachers not busy in the slot, qualified ones first, then by name.
pub fn available_teachers(
    people: &[Person],
    periods: &[Period],
    day: Weekday,
    period_number: u32,
    qualified: &HashSet<String>,
) -> Vec<AvailableTeacher> {
    let busy = busy_teachers(periods, day, period_number);

    let mut available: Vec<AvailableTeacher> = people
        .iter()
        .filter(|p| p.role == Role::Teacher && !busy.contains(p.id.as_str()))
        .map(|p| AvailableTeacher {
            id: p.id.clone(),
            name: p.name.clone(),
            email: p.email.clone(),
            phone: p.phone.clone(),
            qualified: qualified.contains(&p.id),
        })
        .collect();

    available.sort_by(|a, b| {
        b.qualified
            .cmp(&a.qualified)
            .then_with(|| a.name.cmp(&b.name))
    });
    available
}

/// The period in the slot taught by `teacher_id`.
pub fn find_period<'a>(
    periods: &'a [Period],
    day: Weekday,
    period_number: u32,
    teacher_id: &str,
) -> Option<&'a Period> {
    periods
        .iter()
        .find(|p| p.day == day && p.period_number == period_number && p.teacher_id == teacher_id)
}

/// Mark the period as covered by `substitute_id`. A previous substitute is replaced.
pub fn apply_substitution(period: &mut Period, substitute_id: &str) {
    period.is_substituted = true;
    period.substitute_id = Some(substitute_id.to_string());
}

/// Return the period to its own teacher.
pub fn clear_substitution(period: &mut Period) {
    period.is_substituted = false;
    period.substitute_id = None;
}
