//! Read-only views over attendance records.
//!
//! A student without a record for a date counts as [`Status::Absent`] in every view.

use crate::models::{AttendanceRecord, Status, Student};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Attendance of a class, either for a single date or for every recorded date.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceView {
    /// The class has no students.
    EmptyRoster,
    /// No attendance has been recorded for the class yet.
    NoRecords,
    Day {
        class_name: String,
        date: NaiveDate,
        rows: Vec<(String, Status)>,
    },
    History {
        class_name: String,
        dates: Vec<NaiveDate>,
        rows: Vec<(String, Vec<Status>)>,
    },
}

/// Presence rates of every student in a class.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    EmptyRoster,
    NoRecords,
    Table(AttendanceReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceReport {
    pub class_name: String,
    /// Distinct dates with any record in the class. Shared by every student.
    pub total_days: usize,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub present_days: usize,
    pub present_percent: f64,
    pub absent_percent: f64,
}

pub(crate) fn day_view(
    class_name: &str,
    date: NaiveDate,
    students: &[Student],
    statuses: &HashMap<i32, Status>,
) -> AttendanceView {
    if students.is_empty() {
        return AttendanceView::EmptyRoster;
    }

    let rows = students
        .iter()
        .map(|student| {
            let status = statuses.get(&student.id).copied().unwrap_or_default();
            (student.name.clone(), status)
        })
        .collect();

    AttendanceView::Day {
        class_name: class_name.to_string(),
        date,
        rows,
    }
}

pub(crate) fn history_view(
    class_name: &str,
    students: &[Student],
    dates: Vec<NaiveDate>,
    records: &[AttendanceRecord],
) -> AttendanceView {
    if students.is_empty() {
        return AttendanceView::EmptyRoster;
    }
    if dates.is_empty() {
        return AttendanceView::NoRecords;
    }

    let by_cell: HashMap<(i32, NaiveDate), Status> = records
        .iter()
        .map(|record| ((record.student_id, record.date), record.status))
        .collect();

    let rows = students
        .iter()
        .map(|student| {
            let statuses = dates
                .iter()
                .map(|date| {
                    by_cell
                        .get(&(student.id, *date))
                        .copied()
                        .unwrap_or_default()
                })
                .collect();
            (student.name.clone(), statuses)
        })
        .collect();

    AttendanceView::History {
        class_name: class_name.to_string(),
        dates,
        rows,
    }
}

pub(crate) fn build_report(
    class_name: &str,
    students: &[Student],
    total_days: usize,
    records: &[AttendanceRecord],
) -> Report {
    if students.is_empty() {
        return Report::EmptyRoster;
    }
    if total_days == 0 {
        return Report::NoRecords;
    }

    let mut present_days: HashMap<i32, usize> = HashMap::new();
    for record in records.iter().filter(|r| r.status == Status::Present) {
        *present_days.entry(record.student_id).or_insert(0) += 1;
    }

    let rows = students
        .iter()
        .map(|student| {
            let days = present_days.get(&student.id).copied().unwrap_or(0);
            let present = days as f64 / total_days as f64 * 100.0;

            ReportRow {
                name: student.name.clone(),
                present_days: days,
                present_percent: round2(present),
                absent_percent: round2(100.0 - present),
            }
        })
        .collect();

    Report::Table(AttendanceReport {
        class_name: class_name.to_string(),
        total_days,
        rows,
    })
}

/// Rounds to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
