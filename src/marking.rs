//! Manual and automatic attendance marking.
//!
//! Manual marking is a request/response exchange: the store hands out a [`MarkingSheet`] holding
//! the class roster with its current statuses, the caller feeds [`Selection`]s into it, and the
//! store commits the staged students as present in one transaction. Reading the selections (from
//! a terminal, a file or a test) is up to the caller.
//!
//! Automatic marking samples a fixed number of absentees with [`choose_absentees`].

use crate::error::{AttendanceError, Result};
use crate::models::{Status, Student};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// The fraction of a class to mark absent during automatic marking. Always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsentRate(f64);

impl AbsentRate {
    pub const DEFAULT: AbsentRate = AbsentRate(0.2);

    pub fn new(rate: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(AttendanceError::InvalidRate(rate))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// The number of students to mark absent out of a class of `class_size`.
    ///
    /// At least one student is absent whenever the class is non-empty, even at a rate of 0.
    pub fn absent_count(&self, class_size: usize) -> usize {
        if class_size == 0 {
            return 0;
        }

        let scaled = (class_size as f64 * self.0).floor() as usize;
        scaled.clamp(1, class_size)
    }
}

impl Default for AbsentRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Picks `rate.absent_count(class_size)` distinct indices in `0..class_size`, uniformly at random
/// without replacement.
pub fn choose_absentees(
    rng: &mut fastrand::Rng,
    class_size: usize,
    rate: AbsentRate,
) -> HashSet<usize> {
    let mut indices: Vec<usize> = (0..class_size).collect();
    rng.shuffle(&mut indices);
    indices.truncate(rate.absent_count(class_size));
    indices.into_iter().collect()
}

/// The result of automatically marking a class for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMarkSummary {
    pub class_name: String,
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    /// Every student in the class with the status written for them, sorted by name.
    pub statuses: Vec<(String, Status)>,
}

/// One step of a manual marking exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Mark the student at this 1-based position on the sheet as present.
    Student(usize),
    Done,
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let input = s.trim();

        if input.eq_ignore_ascii_case("done") {
            return Ok(Selection::Done);
        }

        input
            .parse::<usize>()
            .map(Selection::Student)
            .map_err(|_| SelectionError::NotANumber(input.to_string()))
    }
}

/// A rejected selection. The sheet is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    NotANumber(String),
    OutOfRange { index: usize, len: usize },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::NotANumber(input) => {
                write!(f, "'{input}' is not a number. Enter a number or 'done'.")
            }
            SelectionError::OutOfRange { index, len } => {
                write!(f, "Invalid selection {index}, choose between 1 and {len}.")
            }
        }
    }
}

impl std::error::Error for SelectionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub student: Student,
    pub status: Status,
}

/// The roster of a class with each student's status for one date, plus the students staged to be
/// marked present.
#[derive(Debug, Clone)]
pub struct MarkingSheet {
    class_id: i32,
    date: NaiveDate,
    entries: Vec<SheetEntry>,
    staged: BTreeSet<usize>,
}

impl MarkingSheet {
    pub(crate) fn new(class_id: i32, date: NaiveDate, entries: Vec<SheetEntry>) -> Self {
        Self {
            class_id,
            date,
            entries,
            staged: BTreeSet::new(),
        }
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[SheetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stages the student at the 1-based `index` to be marked present.
    pub fn select(&mut self, index: usize) -> std::result::Result<&SheetEntry, SelectionError> {
        let len = self.entries.len();
        if index == 0 || index > len {
            return Err(SelectionError::OutOfRange { index, len });
        }

        let position = index - 1;
        self.staged.insert(position);

        self.entries[position].status = Status::Present;
        Ok(&self.entries[position])
    }

    /// The students that will be marked present on commit, in sheet order.
    pub fn staged(&self) -> impl Iterator<Item = &Student> + '_ {
        self.staged.iter().map(|&i| &self.entries[i].student)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

/// What a batch of manual selections did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOutcome {
    /// Names of the students marked present, in sheet order.
    pub marked: Vec<String>,
    /// Selections that were rejected, in the order they were given.
    pub rejected: Vec<SelectionError>,
}
