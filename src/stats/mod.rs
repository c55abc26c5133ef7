//! Descriptive statistics over marks and attendance records.
//!
//! Every function here is pure: callers load records from the repository and pass the full
//! set in. Nothing is cached or updated incrementally.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, MarkRecord};

/// Scores at or above this value pass.
pub const PASS_MARK: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    UnknownDimension(String),
    UnsupportedDimension(Dimension),
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::UnknownDimension(raw) => write!(f, "Unknown groupBy value '{}'", raw),
            StatsError::UnsupportedDimension(d) => {
                write!(f, "Records cannot be grouped by {}", d.as_str())
            }
        }
    }
}

impl std::error::Error for StatsError {}

/// Grouping dimension for rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Subject,
    ExamType,
    Month,
    Year,
    Status,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Subject => "subject",
            Dimension::ExamType => "examType",
            Dimension::Month => "month",
            Dimension::Year => "year",
            Dimension::Status => "status",
        }
    }

    /// Month and year groups are chronological, so a trend between neighbours makes sense.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Dimension::Month | Dimension::Year)
    }
}

impl FromStr for Dimension {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" => Ok(Dimension::Subject),
            "examtype" | "exam_type" | "exam" => Ok(Dimension::ExamType),
            "month" => Ok(Dimension::Month),
            "year" => Ok(Dimension::Year),
            "status" => Ok(Dimension::Status),
            _ => Err(StatsError::UnknownDimension(s.to_string())),
        }
    }
}

/// Parse an optional `groupBy` query value.
pub fn parse_dimension(raw: Option<&str>) -> Result<Option<Dimension>, StatsError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

/// A record that can be bucketed by a [`Dimension`].
pub trait Observation {
    fn supports(dimension: Dimension) -> bool;
    fn group_key(&self, dimension: Dimension) -> Option<String>;
}

impl Observation for MarkRecord {
    fn supports(_dimension: Dimension) -> bool {
        true
    }

    fn group_key(&self, dimension: Dimension) -> Option<String> {
        Some(match dimension {
            Dimension::Subject => self.subject.clone(),
            Dimension::ExamType => self.exam_type.as_str().to_string(),
            Dimension::Month => self.exam_date.format("%Y-%m").to_string(),
            Dimension::Year => self.exam_date.format("%Y").to_string(),
            Dimension::Status => {
                if self.marks >= PASS_MARK {
                    "pass".to_string()
                } else {
                    "fail".to_string()
                }
            }
        })
    }
}

impl Observation for AttendanceRecord {
    fn supports(dimension: Dimension) -> bool {
        matches!(
            dimension,
            Dimension::Month | Dimension::Year | Dimension::Status
        )
    }

    fn group_key(&self, dimension: Dimension) -> Option<String> {
        match dimension {
            Dimension::Month => Some(self.date.format("%Y-%m").to_string()),
            Dimension::Year => Some(self.date.format("%Y").to_string()),
            Dimension::Status => Some(self.status.as_str().to_string()),
            Dimension::Subject | Dimension::ExamType => None,
        }
    }
}

/// Bucket records by key. Keys come back in ascending order, which is chronological for
/// month (`YYYY-MM`) and year keys.
pub fn group_records<R: Observation>(
    records: &[R],
    dimension: Dimension,
) -> Result<BTreeMap<String, Vec<&R>>, StatsError> {
    if !R::supports(dimension) {
        return Err(StatsError::UnsupportedDimension(dimension));
    }
    let mut groups: BTreeMap<String, Vec<&R>> = BTreeMap::new();
    for record in records {
        if let Some(key) = record.group_key(dimension) {
            groups.entry(key).or_default().push(record);
        }
    }
    Ok(groups)
}

// ==================== SHARED HELPERS ====================

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Median of an ascending slice: middle element, or mean of the two middle elements.
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Q1 is the median of `sorted[..floor(n/2)]`, Q3 the median of `sorted[ceil(n/2)..]`.
/// With a single value both halves are empty and both quartiles equal that value.
pub fn quartiles(sorted: &[f64]) -> Option<Quartiles> {
    let n = sorted.len();
    let whole = median(sorted)?;
    let q1 = median(&sorted[..n / 2]).unwrap_or(whole);
    let q3 = median(&sorted[(n + 1) / 2..]).unwrap_or(whole);
    Some(Quartiles {
        q1,
        q3,
        iqr: q3 - q1,
    })
}

/// Percentage change between two consecutive group counts, to one decimal.
pub fn trend(previous: usize, current: usize) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }
    let previous = previous as f64;
    round_to((current as f64 - previous) / previous * 100.0, 1)
}

fn percentage(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 / total as f64 * 100.0)
}

// ==================== GRADES ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    DPlus,
    D,
    F,
}

impl Grade {
    /// Bands in evaluation order; the first lower bound a score reaches wins.
    const BANDS: [(f64, Grade); 8] = [
        (90.0, Grade::APlus),
        (80.0, Grade::A),
        (75.0, Grade::BPlus),
        (70.0, Grade::B),
        (65.0, Grade::CPlus),
        (60.0, Grade::C),
        (55.0, Grade::DPlus),
        (50.0, Grade::D),
    ];

    pub const ALL: [Grade; 9] = [
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn for_score(score: f64) -> Grade {
        Grade::BANDS
            .iter()
            .find(|(lower, _)| score >= *lower)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

// ==================== MARKS ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub pass_count: usize,
    /// Percentage with two decimals, e.g. "80.00"
    pub pass_rate: String,
    /// Every grade label, including empty ones
    pub grade_distribution: BTreeMap<String, usize>,
}

/// Summarize raw scores. Returns `None` for an empty slice.
pub fn summarize_scores(scores: &[f64]) -> Option<MarkSummary> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    let middle = median(&sorted)?;
    let quartiles = quartiles(&sorted)?;
    let pass_count = sorted.iter().filter(|s| **s >= PASS_MARK).count();

    let mut grade_distribution: BTreeMap<String, usize> = Grade::ALL
        .iter()
        .map(|g| (g.label().to_string(), 0))
        .collect();
    for score in &sorted {
        *grade_distribution
            .entry(Grade::for_score(*score).label().to_string())
            .or_default() += 1;
    }

    Some(MarkSummary {
        count,
        mean: round_to(sum / count as f64, 2),
        median: round_to(middle, 2),
        min: sorted[0],
        max: sorted[count - 1],
        q1: round_to(quartiles.q1, 2),
        q3: round_to(quartiles.q3, 2),
        iqr: round_to(quartiles.iqr, 2),
        pass_count,
        pass_rate: percentage(pass_count, count),
        grade_distribution,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkGroup {
    pub key: String,
    pub summary: MarkSummary,
    /// Change in record count against the previous group; time dimensions only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksReport {
    pub no_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MarkSummary>,
    pub groups: Vec<MarkGroup>,
}

fn scores_of<'a, I>(records: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a MarkRecord>,
{
    records.into_iter().map(|r| r.marks).collect()
}

/// Build a marks report, optionally rolled up by `dimension`.
pub fn aggregate_marks(
    records: &[MarkRecord],
    dimension: Option<Dimension>,
) -> Result<MarksReport, StatsError> {
    let summary = summarize_scores(&scores_of(records));

    let mut groups = Vec::new();
    if let Some(dimension) = dimension {
        let mut previous: Option<usize> = None;
        for (key, members) in group_records(records, dimension)? {
            let count = members.len();
            let Some(summary) = summarize_scores(&scores_of(members)) else {
                continue;
            };
            let change = if dimension.is_temporal() {
                Some(trend(previous.unwrap_or(0), count))
            } else {
                None
            };
            previous = Some(count);
            groups.push(MarkGroup {
                key,
                summary,
                trend: change,
            });
        }
    }

    Ok(MarksReport {
        no_data: summary.is_none(),
        group_by: dimension,
        summary,
        groups,
    })
}

// ==================== ATTENDANCE ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    /// Present plus late
    pub attended: usize,
    /// Percentage with two decimals
    pub attendance_rate: String,
}

pub fn summarize_attendance<'a, I>(records: I) -> Option<AttendanceSummary>
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut summary = AttendanceSummary {
        total: 0,
        present: 0,
        absent: 0,
        late: 0,
        excused: 0,
        attended: 0,
        attendance_rate: String::new(),
    };
    for record in records {
        summary.total += 1;
        match record.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Excused => summary.excused += 1,
        }
        if record.status.is_attended() {
            summary.attended += 1;
        }
    }
    if summary.total == 0 {
        return None;
    }
    summary.attendance_rate = percentage(summary.attended, summary.total);
    Some(summary)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceGroup {
    pub key: String,
    pub summary: AttendanceSummary,
    /// Change in attended days against the previous group; time dimensions only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub no_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<AttendanceSummary>,
    pub groups: Vec<AttendanceGroup>,
}

/// Build an attendance report, optionally rolled up by month, year or status.
pub fn aggregate_attendance(
    records: &[AttendanceRecord],
    dimension: Option<Dimension>,
) -> Result<AttendanceReport, StatsError> {
    let summary = summarize_attendance(records);

    let mut groups = Vec::new();
    if let Some(dimension) = dimension {
        let mut previous: Option<usize> = None;
        for (key, members) in group_records(records, dimension)? {
            let Some(summary) = summarize_attendance(members) else {
                continue;
            };
            let change = if dimension.is_temporal() {
                Some(trend(previous.unwrap_or(0), summary.attended))
            } else {
                None
            };
            previous = Some(summary.attended);
            groups.push(AttendanceGroup {
                key,
                summary,
                trend: change,
            });
        }
    }

    Ok(AttendanceReport {
        no_data: summary.is_none(),
        group_by: dimension,
        summary,
        groups,
    })
}
