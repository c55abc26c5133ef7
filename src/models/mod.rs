//! Data models for the school management backend.
//!
//! Field names serialize in camelCase to match the web client.

mod announcement;
mod attendance;
mod lesson_plan;
mod marks;
mod person;
mod student;
mod subject;
mod timetable;

pub use announcement::*;
pub use attendance::*;
pub use lesson_plan::*;
pub use marks::*;
pub use person::*;
pub use student::*;
pub use subject::*;
pub use timetable::*;
