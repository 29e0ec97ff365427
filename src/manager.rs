use crate::error::{AttendanceError, Result};
use crate::marking::{
    AbsentRate, AutoMarkSummary, ManualOutcome, MarkingSheet, Selection, SheetEntry,
    choose_absentees,
};
use crate::models::{
    AttendanceRecord, Class, NewAttendanceRecord, NewStudent, Status, Student,
};
use crate::report::{self, AttendanceView, Report};
use crate::schema;
use chrono::NaiveDate;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;

/// The class created on first use.
pub const SEED_CLASS: &str = "Kenya";

/// The students enrolled in [`SEED_CLASS`] on first use.
pub const SEED_STUDENTS: [&str; 20] = [
    "Alice",
    "Michael",
    "Sarah",
    "David",
    "Jessica",
    "James",
    "Emily",
    "Robert",
    "Olivia",
    "Daniel",
    "Sophia",
    "Ethan",
    "Isabella",
    "Benjamin",
    "Chloe",
    "Matthew",
    "Ava",
    "Christopher",
    "Mia",
    "William",
];

/// Creates the tables if they do not exist yet. Never drops or alters anything.
const SCHEMA_SQL: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        class_id INTEGER NOT NULL,
        FOREIGN KEY (class_id) REFERENCES classes (id),
        UNIQUE (name, class_id)
    );

    CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        FOREIGN KEY (student_id) REFERENCES students (id),
        UNIQUE (student_id, date)
    );
";

/// Counts from a roster import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    name: String,
}

/// The manager for recording, modifying, and retrieving attendance data.
///
/// Owns the only connection to the store; it is closed when the manager is dropped. Every write
/// runs in its own transaction, so a failing operation leaves the store as it was.
pub struct AttendanceManager {
    db: SqliteConnection,
    rng: fastrand::Rng,
}

impl AttendanceManager {
    /// Opens (creating if needed) the `sqlite3` store at `database_path`, creates any missing
    /// tables and seeds the [`SEED_CLASS`] roster.
    ///
    /// `":memory:"` opens a private in-memory store.
    pub fn open(database_path: &str) -> Result<Self> {
        let mut db = SqliteConnection::establish(database_path)?;
        db.batch_execute(SCHEMA_SQL)?;

        let mut manager = Self {
            db,
            rng: fastrand::Rng::new(),
        };
        manager.bootstrap()?;

        tracing::debug!(database_path, "opened attendance store");
        Ok(manager)
    }

    /// Creates [`SEED_CLASS`] and its students unless the class already exists.
    ///
    /// Returns whether anything was created.
    pub fn bootstrap(&mut self) -> Result<bool> {
        self.db.transaction::<_, AttendanceError, _>(|conn| {
            if find_class_by_name(conn, SEED_CLASS)?.is_some() {
                return Ok(false);
            }

            let class_id: i32 = diesel::insert_into(schema::classes::table)
                .values(schema::classes::name.eq(SEED_CLASS))
                .returning(schema::classes::id)
                .get_result(conn)?;

            let new_students: Vec<NewStudent> = SEED_STUDENTS
                .iter()
                .map(|&name| NewStudent { name, class_id })
                .collect();

            for student in &new_students {
                diesel::insert_or_ignore_into(schema::students::table)
                    .values(student)
                    .execute(conn)?;
            }

            tracing::info!(
                class = SEED_CLASS,
                students = SEED_STUDENTS.len(),
                "seeded class roster"
            );
            Ok(true)
        })
    }

    /// Retrieves every class, sorted by name.
    pub fn list_classes(&mut self) -> Result<Vec<Class>> {
        use schema::classes::dsl::*;

        Ok(classes
            .select(Class::as_select())
            .order(name.asc())
            .load(&mut self.db)?)
    }

    /// Retrieves a class by its ID, if it exists.
    pub fn find_class(&mut self, class_id: i32) -> Result<Option<Class>> {
        use schema::classes::dsl::*;

        Ok(classes
            .find(class_id)
            .select(Class::as_select())
            .first(&mut self.db)
            .optional()?)
    }

    /// Retrieves a class by its unique name, if it exists.
    pub fn find_class_by_name(&mut self, class_name: &str) -> Result<Option<Class>> {
        find_class_by_name(&mut self.db, class_name)
    }

    /// Retrieves the students of a class, sorted by name.
    pub fn list_students(&mut self, class_id: i32) -> Result<Vec<Student>> {
        list_students(&mut self.db, class_id)
    }

    /// Adds a student to a class.
    ///
    /// Returns `false` without changing anything if a student with the same name is already in
    /// the class.
    pub fn add_student(&mut self, name: &str, class_id: i32) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AttendanceError::EmptyName);
        }
        self.require_class(class_id)?;

        let inserted = self.db.transaction::<_, AttendanceError, _>(|conn| {
            let result = diesel::insert_into(schema::students::table)
                .values(NewStudent { name, class_id })
                .execute(conn);

            match result {
                Ok(_) => Ok(true),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })?;

        if inserted {
            tracing::info!(name, class_id, "added student");
        } else {
            tracing::warn!(name, class_id, "student already in class");
        }
        Ok(inserted)
    }

    /// Adds every name from a CSV roster with a `name` column to a class, skipping blank names
    /// and students already in the class. Either the whole roster is imported or nothing is.
    pub fn import_roster<R: io::Read>(&mut self, class_id: i32, roster: R) -> Result<ImportSummary> {
        self.require_class(class_id)?;

        let mut reader = csv::Reader::from_reader(roster);
        let names = reader
            .deserialize::<RosterRow>()
            .map(|row| row.map(|r| r.name.trim().to_string()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let summary = self.db.transaction::<_, AttendanceError, _>(|conn| {
            let mut summary = ImportSummary::default();

            for name in names.iter().filter(|name| !name.is_empty()) {
                let inserted = diesel::insert_or_ignore_into(schema::students::table)
                    .values(NewStudent {
                        name: name.as_str(),
                        class_id,
                    })
                    .execute(conn)?;

                if inserted == 0 {
                    summary.skipped += 1;
                } else {
                    summary.added += 1;
                }
            }

            Ok(summary)
        })?;

        tracing::info!(
            class_id,
            added = summary.added,
            skipped = summary.skipped,
            "imported roster"
        );
        Ok(summary)
    }

    /// Returns the roster of a class with each student's status on `date`, ready for manual
    /// marking.
    pub fn manual_sheet(&mut self, class_id: i32, date: NaiveDate) -> Result<MarkingSheet> {
        self.require_class(class_id)?;

        let students = list_students(&mut self.db, class_id)?;
        let statuses = statuses_on(&mut self.db, class_id, date)?;

        let entries = students
            .into_iter()
            .map(|student| {
                let status = statuses.get(&student.id).copied().unwrap_or_default();
                SheetEntry { student, status }
            })
            .collect();

        Ok(MarkingSheet::new(class_id, date, entries))
    }

    /// Marks every student staged on the sheet as [`Status::Present`] for the sheet's date. If a
    /// record already exists, this updates its status.
    ///
    /// Returns the number of records written.
    pub fn commit_sheet(&mut self, sheet: &MarkingSheet) -> Result<usize> {
        let date = sheet.date();
        let student_ids: Vec<i32> = sheet.staged().map(|student| student.id).collect();

        self.db.transaction::<_, AttendanceError, _>(|conn| {
            for &student_id in &student_ids {
                upsert_status(conn, student_id, date, Status::Present)?;
            }
            Ok(())
        })?;

        tracing::info!(
            class_id = sheet.class_id(),
            %date,
            marked = student_ids.len(),
            "committed manual attendance"
        );
        Ok(student_ids.len())
    }

    /// Applies `selections` to the class sheet for `date` until [`Selection::Done`] or the end of
    /// the sequence, then commits the students selected.
    ///
    /// Out-of-range indices are collected in [`ManualOutcome::rejected`] and otherwise ignored.
    pub fn mark_manual<I>(
        &mut self,
        class_id: i32,
        date: NaiveDate,
        selections: I,
    ) -> Result<ManualOutcome>
    where
        I: IntoIterator<Item = Selection>,
    {
        let mut sheet = self.manual_sheet(class_id, date)?;
        let mut outcome = ManualOutcome::default();

        for selection in selections {
            match selection {
                Selection::Done => break,
                Selection::Student(index) => {
                    if let Err(e) = sheet.select(index) {
                        tracing::warn!(index, "rejected manual selection");
                        outcome.rejected.push(e);
                    }
                }
            }
        }

        self.commit_sheet(&sheet)?;
        outcome.marked = sheet.staged().map(|s| s.name.clone()).collect();
        Ok(outcome)
    }

    /// Marks a random `rate` of the class absent (at least one student) and everyone else
    /// present for `date`, overwriting any earlier records for that date.
    ///
    /// Returns `None` if the class has no students.
    pub fn mark_automatic(
        &mut self,
        class_id: i32,
        date: NaiveDate,
        rate: AbsentRate,
    ) -> Result<Option<AutoMarkSummary>> {
        let class = self.require_class(class_id)?;
        let students = list_students(&mut self.db, class_id)?;

        if students.is_empty() {
            return Ok(None);
        }

        let absentees = choose_absentees(&mut self.rng, students.len(), rate);
        let statuses: Vec<(String, Status)> = students
            .iter()
            .enumerate()
            .map(|(i, student)| {
                let status = if absentees.contains(&i) {
                    Status::Absent
                } else {
                    Status::Present
                };
                (student.name.clone(), status)
            })
            .collect();

        self.db.transaction::<_, AttendanceError, _>(|conn| {
            for (student, (_, status)) in students.iter().zip(&statuses) {
                upsert_status(conn, student.id, date, *status)?;
            }
            Ok(())
        })?;

        let summary = AutoMarkSummary {
            class_name: class.name,
            date,
            present: students.len() - absentees.len(),
            absent: absentees.len(),
            statuses,
        };

        tracing::info!(
            class_id,
            %date,
            present = summary.present,
            absent = summary.absent,
            "marked attendance automatically"
        );
        Ok(Some(summary))
    }

    /// Returns the attendance of a class on `date`, or on every recorded date when `date` is
    /// `None`.
    pub fn view_attendance(
        &mut self,
        class_id: i32,
        date: Option<NaiveDate>,
    ) -> Result<AttendanceView> {
        let class = self.require_class(class_id)?;
        let students = list_students(&mut self.db, class_id)?;

        match date {
            Some(date) => {
                let statuses = statuses_on(&mut self.db, class_id, date)?;
                Ok(report::day_view(&class.name, date, &students, &statuses))
            }
            None => {
                let dates = recorded_dates(&mut self.db, class_id)?;
                let records = class_records(&mut self.db, class_id)?;
                Ok(report::history_view(&class.name, &students, dates, &records))
            }
        }
    }

    /// Computes each student's presence rate over the dates recorded for the class.
    pub fn generate_report(&mut self, class_id: i32) -> Result<Report> {
        let class = self.require_class(class_id)?;
        let students = list_students(&mut self.db, class_id)?;
        let total_days = recorded_dates(&mut self.db, class_id)?.len();
        let records = class_records(&mut self.db, class_id)?;

        Ok(report::build_report(
            &class.name,
            &students,
            total_days,
            &records,
        ))
    }

    /// Retrieves every record of the class, optionally restricted to one date.
    pub fn records(
        &mut self,
        class_id: i32,
        on: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>> {
        match on {
            Some(day) => {
                use schema::attendance::dsl::*;

                Ok(attendance
                    .inner_join(schema::students::table)
                    .filter(schema::students::class_id.eq(class_id))
                    .filter(date.eq(day))
                    .select(AttendanceRecord::as_select())
                    .load(&mut self.db)?)
            }
            None => class_records(&mut self.db, class_id),
        }
    }

    /// Creates an empty class.
    #[cfg(test)]
    pub(crate) fn insert_class(&mut self, class_name: &str) -> Result<Class> {
        use schema::classes::dsl::*;

        Ok(diesel::insert_into(classes)
            .values(name.eq(class_name))
            .returning(Class::as_returning())
            .get_result(&mut self.db)?)
    }

    fn require_class(&mut self, class_id: i32) -> Result<Class> {
        self.find_class(class_id)?
            .ok_or(AttendanceError::ClassNotFound(class_id))
    }
}

fn find_class_by_name(conn: &mut SqliteConnection, class_name: &str) -> Result<Option<Class>> {
    use schema::classes::dsl::*;

    Ok(classes
        .filter(name.eq(class_name))
        .select(Class::as_select())
        .first(conn)
        .optional()?)
}

fn list_students(conn: &mut SqliteConnection, class: i32) -> Result<Vec<Student>> {
    use schema::students::dsl::*;

    Ok(students
        .filter(class_id.eq(class))
        .select(Student::as_select())
        .order(name.asc())
        .load(conn)?)
}

/// The status recorded on `day` for each student of the class that has a record.
fn statuses_on(
    conn: &mut SqliteConnection,
    class_id: i32,
    day: NaiveDate,
) -> Result<HashMap<i32, Status>> {
    use schema::attendance::dsl::*;

    let rows = attendance
        .inner_join(schema::students::table)
        .filter(schema::students::class_id.eq(class_id))
        .filter(date.eq(day))
        .select((student_id, status))
        .load::<(i32, Status)>(conn)?;

    Ok(rows.into_iter().collect())
}

/// Distinct dates with at least one record in the class, oldest first.
fn recorded_dates(conn: &mut SqliteConnection, class_id: i32) -> Result<Vec<NaiveDate>> {
    use schema::attendance::dsl::*;

    Ok(attendance
        .inner_join(schema::students::table)
        .filter(schema::students::class_id.eq(class_id))
        .select(date)
        .distinct()
        .order(date.asc())
        .load(conn)?)
}

fn class_records(conn: &mut SqliteConnection, class_id: i32) -> Result<Vec<AttendanceRecord>> {
    use schema::attendance::dsl::*;

    Ok(attendance
        .inner_join(schema::students::table)
        .filter(schema::students::class_id.eq(class_id))
        .select(AttendanceRecord::as_select())
        .order((date.asc(), student_id.asc()))
        .load(conn)?)
}

/// Writes `new_status` for the student on `day`. If the record already exists, only its status
/// changes.
fn upsert_status(
    conn: &mut SqliteConnection,
    student: i32,
    day: NaiveDate,
    new_status: Status,
) -> Result<()> {
    use schema::attendance::dsl::*;

    let record = NewAttendanceRecord {
        student_id: student,
        date: day,
        status: new_status,
    };

    diesel::insert_into(attendance)
        .values(&record)
        .on_conflict((student_id, date))
        .do_update()
        .set(status.eq(excluded(status)))
        .execute(conn)?;

    tracing::debug!(student, %day, status = %new_status, "upserted attendance record");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AttendanceManager {
        AttendanceManager::open(":memory:").unwrap()
    }

    fn kenya(manager: &mut AttendanceManager) -> i32 {
        manager.find_class_by_name(SEED_CLASS).unwrap().unwrap().id
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let mut manager = manager();

        assert!(!manager.bootstrap().unwrap());
        assert!(!manager.bootstrap().unwrap());

        let classes = manager.list_classes().unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, SEED_CLASS);
        assert_eq!(manager.list_students(classes[0].id).unwrap().len(), 20);
    }

    #[test]
    fn upsert_keeps_one_record_and_its_id() {
        let mut manager = manager();
        let class_id = kenya(&mut manager);
        let alice = manager.list_students(class_id).unwrap()[0].id;
        let day = NaiveDate::from_ymd_opt(2025, 3, 29).unwrap();

        upsert_status(&mut manager.db, alice, day, Status::Absent).unwrap();
        let first = manager.records(class_id, Some(day)).unwrap();
        upsert_status(&mut manager.db, alice, day, Status::Present).unwrap();
        let second = manager.records(class_id, Some(day)).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].status, Status::Present);
    }

    #[test]
    fn unknown_class_is_an_error() {
        let mut manager = manager();

        assert!(matches!(
            manager.add_student("Zara", 999),
            Err(AttendanceError::ClassNotFound(999))
        ));
        assert!(matches!(
            manager.generate_report(999),
            Err(AttendanceError::ClassNotFound(999))
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut manager = manager();
        let class_id = kenya(&mut manager);

        assert!(matches!(
            manager.add_student("   ", class_id),
            Err(AttendanceError::EmptyName)
        ));
        assert_eq!(manager.list_students(class_id).unwrap().len(), 20);
    }

    #[test]
    fn same_name_may_join_another_class() {
        let mut manager = manager();
        let kenya = kenya(&mut manager);
        let uganda = manager.insert_class("Uganda").unwrap().id;

        assert!(manager.add_student("Alice", uganda).unwrap());
        assert!(!manager.add_student("Alice", uganda).unwrap());

        assert_eq!(manager.list_students(kenya).unwrap().len(), 20);
        let names: Vec<String> = manager
            .list_students(uganda)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["Alice"]);
    }

    /// Makes every insert of an attendance record for `student` fail.
    fn fail_inserts_for(manager: &mut AttendanceManager, student: i32) {
        manager
            .db
            .batch_execute(&format!(
                "CREATE TRIGGER fail_attendance BEFORE INSERT ON attendance
                 WHEN NEW.student_id = {student}
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;"
            ))
            .unwrap();
    }

    #[test]
    fn failed_automatic_marking_writes_nothing() {
        let mut manager = manager();
        let class_id = kenya(&mut manager);
        let last = manager.list_students(class_id).unwrap().last().unwrap().id;
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        fail_inserts_for(&mut manager, last);

        let result = manager.mark_automatic(class_id, day, AbsentRate::DEFAULT);

        assert!(matches!(result, Err(AttendanceError::Database(_))));
        assert!(manager.records(class_id, Some(day)).unwrap().is_empty());
    }

    #[test]
    fn failed_manual_commit_writes_nothing() {
        let mut manager = manager();
        let class_id = kenya(&mut manager);
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();

        let mut sheet = manager.manual_sheet(class_id, day).unwrap();
        sheet.select(1).unwrap();
        sheet.select(20).unwrap();
        let last = sheet.entries()[19].student.id;
        fail_inserts_for(&mut manager, last);

        let result = manager.commit_sheet(&sheet);

        assert!(matches!(result, Err(AttendanceError::Database(_))));
        assert!(manager.records(class_id, Some(day)).unwrap().is_empty());
    }
}
