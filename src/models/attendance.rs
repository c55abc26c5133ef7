//! Attendance models shared by the student and faculty registers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Attendance status. Clients may also send a plain boolean (true = present).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "StatusInput")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }

    /// Late arrivals still count as attended.
    pub fn is_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusInput {
    Flag(bool),
    Named(String),
}

impl TryFrom<StatusInput> for AttendanceStatus {
    type Error = String;

    fn try_from(input: StatusInput) -> Result<Self, Self::Error> {
        match input {
            StatusInput::Flag(true) => Ok(AttendanceStatus::Present),
            StatusInput::Flag(false) => Ok(AttendanceStatus::Absent),
            StatusInput::Named(name) => AttendanceStatus::from_str(&name)
                .ok_or_else(|| format!("unknown attendance status '{}'", name)),
        }
    }
}

/// One attendance mark for one person (student or teacher) on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub person_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub recorded_by: String,
    pub updated_at: DateTime<Utc>,
}

/// One row of a bulk attendance submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    #[serde(alias = "studentId", alias = "teacherId")]
    pub person_id: String,
    pub status: AttendanceStatus,
}

/// Bulk attendance submission for a single day.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAttendanceRequest {
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
}

/// Optional date window for attendance listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// Query parameters for analytics endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub group_by: Option<String>,
}
