//! The terminal front end: the numbered menu and the one-shot subcommands.
//!
//! Every action reports its outcome as text. Storage faults are logged and printed, after which
//! the menu keeps running; only the exit choice (or the end of input) stops it.

use crate::cli::Command;
use crate::display;
use crate::error::Result;
use crate::manager::AttendanceManager;
use crate::marking::{AbsentRate, Selection, SelectionError};
use crate::models::Class;
use chrono::{Local, NaiveDate};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::Path;

const MENU: &str = "\
==================================================
CLASS ATTENDANCE
==================================================
1. Add a Student
2. Mark Attendance Manually
3. Mark Attendance Automatically
4. View Attendance
5. Generate Report
6. Exit
==================================================";

pub struct Shell<'a, R, W> {
    manager: &'a mut AttendanceManager,
    class: Class,
    default_rate: AbsentRate,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(
        manager: &'a mut AttendanceManager,
        class: Class,
        default_rate: AbsentRate,
        input: R,
        output: W,
    ) -> Self {
        Self {
            manager,
            class,
            default_rate,
            input,
            output,
        }
    }

    /// Runs one subcommand.
    pub fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Menu => self.run_menu(),
            Command::Classes => {
                let classes = self.manager.list_classes()?;
                self.say(&display::render_classes(&classes))
            }
            Command::Students => {
                let roster = self.manager.list_students(self.class.id)?;
                self.say(&display::render_roster(&self.class.name, &roster))
            }
            Command::AddStudent { name } => self.add_student(&name),
            Command::Mark { date, indices } if indices.is_empty() => {
                self.mark_interactively(date.unwrap_or_else(today))
            }
            Command::Mark { date, indices } => {
                let date = date.unwrap_or_else(today);
                if self.manager.manual_sheet(self.class.id, date)?.is_empty() {
                    return self.say("No students in this class. Please add students first.");
                }

                let selections = indices.into_iter().map(Selection::Student);
                let outcome = self.manager.mark_manual(self.class.id, date, selections)?;

                for rejected in &outcome.rejected {
                    self.say(&rejected.to_string())?;
                }
                for name in &outcome.marked {
                    self.say(&format!("{name} is now marked as Present on {date}."))?;
                }
                Ok(())
            }
            Command::AutoMark { date, rate } => {
                let rate = match rate {
                    Some(rate) => self.checked_rate(rate)?,
                    None => self.default_rate,
                };
                self.mark_automatically(date.unwrap_or_else(today), rate)
            }
            Command::View { date } => {
                let view = self.manager.view_attendance(self.class.id, date)?;
                self.say(&display::render_view(&view))
            }
            Command::Report => {
                let report = self.manager.generate_report(self.class.id)?;
                self.say(&display::render_report(&report))
            }
            Command::ImportRoster { file_path } => self.import_roster(&file_path),
        }
    }

    /// Shows the menu until the user exits or input ends.
    pub fn run_menu(&mut self) -> Result<()> {
        self.say("Welcome to the class attendance system.")?;

        loop {
            self.say(MENU)?;
            let Some(choice) = self.prompt("Enter your choice (1/2/3/4/5/6): ")? else {
                return Ok(());
            };

            let result = match choice.as_str() {
                "1" => self.menu_add_student(),
                "2" => self.menu_mark_manually(),
                "3" => self.menu_mark_automatically(),
                "4" => self.menu_view(),
                "5" => self.run(Command::Report),
                "6" => {
                    self.say("Goodbye!")?;
                    return Ok(());
                }
                _ => self.say("Invalid choice. Please try again."),
            };

            if let Err(e) = result {
                tracing::error!(error = %e, choice = %choice, "menu action failed");
                self.say(&format!("Error: {e}"))?;
            }
        }
    }

    fn menu_add_student(&mut self) -> Result<()> {
        match self.prompt("Enter the student's name: ")? {
            Some(name) if !name.is_empty() => self.add_student(&name),
            _ => self.say("Invalid name. Please try again."),
        }
    }

    fn menu_mark_manually(&mut self) -> Result<()> {
        match self.prompt_date("Enter date (YYYY-MM-DD) or press Enter for today: ")? {
            Some(date) => self.mark_interactively(date.unwrap_or_else(today)),
            None => Ok(()),
        }
    }

    fn menu_mark_automatically(&mut self) -> Result<()> {
        let Some(date) = self.prompt_date("Enter date (YYYY-MM-DD) or press Enter for today: ")?
        else {
            return Ok(());
        };

        let message = format!(
            "Enter absent rate (0-1, default {}): ",
            self.default_rate.value()
        );
        let rate = match self.prompt(&message)? {
            Some(input) if !input.is_empty() => match input.parse::<f64>() {
                Ok(rate) => self.checked_rate(rate)?,
                Err(_) => {
                    tracing::warn!(input = %input, "absent rate is not a number");
                    self.say(&format!(
                        "Invalid input. Using default absent rate of {}.",
                        self.default_rate.value()
                    ))?;
                    self.default_rate
                }
            },
            _ => self.default_rate,
        };

        self.mark_automatically(date.unwrap_or_else(today), rate)
    }

    fn menu_view(&mut self) -> Result<()> {
        let Some(date) =
            self.prompt_date("Enter date (YYYY-MM-DD) or press Enter for all dates: ")?
        else {
            return Ok(());
        };

        let view = self.manager.view_attendance(self.class.id, date)?;
        self.say(&display::render_view(&view))
    }

    fn add_student(&mut self, name: &str) -> Result<()> {
        if self.manager.add_student(name, self.class.id)? {
            self.say(&format!("{name} has been added to the attendance list."))
        } else {
            self.say(&format!("{name} already exists in this class."))
        }
    }

    /// Shows the sheet for `date`, reads selections until `done` (or end of input), then commits.
    fn mark_interactively(&mut self, date: NaiveDate) -> Result<()> {
        let mut sheet = self.manager.manual_sheet(self.class.id, date)?;
        if sheet.is_empty() {
            return self.say("No students in this class. Please add students first.");
        }

        self.say(&display::render_sheet(&sheet))?;
        self.say("Select a student to mark as Present (enter a number, or 'done' to finish)")?;

        while let Some(input) = self.prompt("> ")? {
            match input.parse::<Selection>() {
                Ok(Selection::Done) => break,
                Ok(Selection::Student(index)) => match sheet.select(index) {
                    Ok(entry) => {
                        let message = format!("{} will be marked as Present.", entry.student.name);
                        self.say(&message)?;
                    }
                    Err(e) => self.say(&e.to_string())?,
                },
                Err(SelectionError::NotANumber(_)) => {
                    self.say("Please enter a number or 'done'.")?;
                }
                Err(e) => self.say(&e.to_string())?,
            }
        }

        let marked = self.manager.commit_sheet(&sheet)?;
        self.say(&format!("Marked {marked} student(s) as Present on {date}."))
    }

    fn mark_automatically(&mut self, date: NaiveDate, rate: AbsentRate) -> Result<()> {
        match self.manager.mark_automatic(self.class.id, date, rate)? {
            Some(summary) => self.say(&display::render_auto_summary(&summary)),
            None => self.say("No students in this class. Please add students first."),
        }
    }

    fn import_roster(&mut self, file_path: &Path) -> Result<()> {
        let file = File::open(file_path)?;
        let summary = self.manager.import_roster(self.class.id, file)?;
        self.say(&format!(
            "Imported roster into '{}': {} added, {} already present.",
            self.class.name, summary.added, summary.skipped
        ))
    }

    /// Validates a user-supplied rate, falling back to the default when it is out of range.
    fn checked_rate(&mut self, rate: f64) -> Result<AbsentRate> {
        match AbsentRate::new(rate) {
            Ok(rate) => Ok(rate),
            Err(e) => {
                tracing::warn!(rate, "absent rate out of range");
                self.say(&format!(
                    "{e}. Using default {}.",
                    self.default_rate.value()
                ))?;
                Ok(self.default_rate)
            }
        }
    }

    /// Reads an optional date. `Ok(Some(None))` means the user pressed Enter; `Ok(None)` means the
    /// input was not a date (already reported) or input ended.
    fn prompt_date(&mut self, message: &str) -> Result<Option<Option<NaiveDate>>> {
        let Some(input) = self.prompt(message)? else {
            return Ok(None);
        };
        if input.is_empty() {
            return Ok(Some(None));
        }

        match NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
            Ok(date) => Ok(Some(Some(date))),
            Err(_) => {
                tracing::warn!(input = %input, "rejected malformed date");
                self.say("Invalid date. Please use the YYYY-MM-DD format.")?;
                Ok(None)
            }
        }
    }

    /// Prints `message` and reads one trimmed line. Returns `None` at the end of input.
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.output, "{message}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
