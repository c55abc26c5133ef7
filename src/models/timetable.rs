//! Weekly timetable models.

use serde::{Deserialize, Serialize};

/// School days. The timetable has no weekend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Weekday::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// A stored period. References are ids; see [`PeriodView`] for the hydrated form.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: String,
    pub day: Weekday,
    pub period_number: u32,
    pub subject: String,
    pub class_label: String,
    pub teacher_id: String,
    pub is_substituted: bool,
    pub substitute_id: Option<String>,
}

/// A period with teacher and substitute names resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodView {
    pub id: String,
    pub day: Weekday,
    pub period_number: u32,
    pub subject: String,
    pub class_label: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub is_substituted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitute_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitute_name: Option<String>,
}

/// All periods of one day, ordered by class then period number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableDay {
    pub day: Weekday,
    pub periods: Vec<PeriodView>,
}

/// Query parameters for fetching the timetable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableQuery {
    #[serde(default)]
    pub class_label: Option<String>,
}

/// Request body for adding a period to the timetable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPeriodRequest {
    pub day: Weekday,
    pub period_number: u32,
    pub subject: String,
    pub class_label: String,
    pub teacher_id: String,
}

/// Request body for the free-teacher lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTeachersRequest {
    pub day: Weekday,
    pub period_number: u32,
    /// Ranking hint only
    #[serde(default)]
    pub subject: Option<String>,
}

/// Request body for assigning a substitute.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstituteRequest {
    pub day: Weekday,
    pub period_number: u32,
    pub original_teacher_id: String,
    pub substitute_teacher_id: String,
}

/// Request body for reverting a substitution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSubstituteRequest {
    pub period_id: String,
}
