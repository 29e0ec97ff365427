//! Terminal rendering of rosters, attendance views and reports.

use crate::marking::{AutoMarkSummary, MarkingSheet};
use crate::models::{Class, Student};
use crate::report::{AttendanceView, Report};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub fn render_classes(classes: &[Class]) -> String {
    let mut table = Table::new(classes);
    table.with(Style::modern());
    format!("Classes:\n{table}")
}

/// Numbered roster. The numbers are the positions accepted by manual marking.
pub fn render_roster(class_name: &str, roster: &[Student]) -> String {
    #[derive(Tabled)]
    struct RosterLine<'a> {
        #[tabled(rename = "#")]
        number: usize,
        #[tabled(rename = "Student")]
        name: &'a str,
    }

    if roster.is_empty() {
        return format!("No students in '{class_name}'.");
    }

    let lines = roster.iter().enumerate().map(|(i, student)| RosterLine {
        number: i + 1,
        name: &student.name,
    });

    let mut table = Table::new(lines);
    table.with(Style::modern());
    format!("Roster of '{class_name}':\n{table}")
}

/// Numbered list used while marking attendance by hand.
pub fn render_sheet(sheet: &MarkingSheet) -> String {
    #[derive(Tabled)]
    struct SheetLine<'a> {
        #[tabled(rename = "#")]
        number: usize,
        #[tabled(rename = "Student")]
        name: &'a str,
        #[tabled(rename = "Status")]
        status: &'a str,
    }

    let lines = sheet.entries().iter().enumerate().map(|(i, entry)| SheetLine {
        number: i + 1,
        name: &entry.student.name,
        status: entry.status.as_str(),
    });

    let mut table = Table::new(lines);
    table.with(Style::modern());
    format!("Marking attendance for {}:\n{table}", sheet.date())
}

pub fn render_auto_summary(summary: &AutoMarkSummary) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Student".to_string(), "Status".to_string()]);
    for (name, status) in &summary.statuses {
        builder.push_record([name.clone(), status.to_string()]);
    }

    let mut table = builder.build();
    table.with(Style::modern());

    format!(
        "Attendance marked automatically for '{}' on {}. {} present, {} absent.\n{table}",
        summary.class_name, summary.date, summary.present, summary.absent
    )
}

pub fn render_view(view: &AttendanceView) -> String {
    match view {
        AttendanceView::EmptyRoster => "No students in this class.".to_string(),
        AttendanceView::NoRecords => "No attendance records found for this class.".to_string(),
        AttendanceView::Day {
            class_name,
            date,
            rows,
        } => {
            let mut builder = Builder::default();
            builder.push_record(["Student".to_string(), "Status".to_string()]);
            for (name, status) in rows {
                builder.push_record([name.clone(), status.to_string()]);
            }

            let mut table = builder.build();
            table.with(Style::modern());
            format!("Class attendance for '{class_name}' on {date}:\n{table}")
        }
        AttendanceView::History {
            class_name,
            dates,
            rows,
        } => {
            let mut builder = Builder::default();
            builder.push_record(
                std::iter::once("Student".to_string()).chain(dates.iter().map(|d| d.to_string())),
            );
            for (name, statuses) in rows {
                builder.push_record(
                    std::iter::once(name.clone()).chain(statuses.iter().map(|s| s.to_string())),
                );
            }

            let mut table = builder.build();
            table.with(Style::modern());
            format!("Attendance records for '{class_name}':\n{table}")
        }
    }
}

pub fn render_report(report: &Report) -> String {
    #[derive(Tabled)]
    struct ReportLine<'a> {
        #[tabled(rename = "Student")]
        name: &'a str,
        #[tabled(rename = "Present %")]
        present: String,
        #[tabled(rename = "Absent %")]
        absent: String,
        #[tabled(rename = "Total Days")]
        total_days: usize,
    }

    let report = match report {
        Report::EmptyRoster => return "No students in this class.".to_string(),
        Report::NoRecords => return "No attendance records found for this class.".to_string(),
        Report::Table(report) => report,
    };

    let lines = report.rows.iter().map(|row| ReportLine {
        name: &row.name,
        present: format!("{:.2}", row.present_percent),
        absent: format!("{:.2}", row.absent_percent),
        total_days: report.total_days,
    });

    let mut table = Table::new(lines);
    table.with(Style::modern());
    format!("Attendance report for '{}':\n{table}", report.class_name)
}
