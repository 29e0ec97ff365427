use chrono::NaiveDate;
use class_attendance::manager::{SEED_CLASS, SEED_STUDENTS};
use class_attendance::marking::{AbsentRate, Selection, SelectionError};
use class_attendance::models::Status;
use class_attendance::report::{AttendanceView, Report};
use class_attendance::{AttendanceError, AttendanceManager};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_db(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}-{}.db",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ))
}

fn open() -> (AttendanceManager, i32) {
    let mut manager = AttendanceManager::open(":memory:").expect("open store");
    let class_id = manager
        .find_class_by_name(SEED_CLASS)
        .expect("query class")
        .expect("seeded class")
        .id;
    (manager, class_id)
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
}

fn position_of(manager: &mut AttendanceManager, class_id: i32, name: &str) -> usize {
    manager
        .list_students(class_id)
        .expect("list students")
        .iter()
        .position(|s| s.name == name)
        .expect("student on roster")
        + 1
}

#[test]
fn bootstrap_survives_reopening_the_store() {
    let path = temp_db("attendance-bootstrap");
    let path_str = path.to_str().expect("utf-8 path");

    {
        let mut manager = AttendanceManager::open(path_str).expect("first open");
        let class_id = manager.find_class_by_name(SEED_CLASS).unwrap().unwrap().id;
        assert!(manager.add_student("Zara", class_id).unwrap());
        manager
            .mark_manual(class_id, date(1, 1), [Selection::Student(1), Selection::Done])
            .unwrap();
    }

    let mut manager = AttendanceManager::open(path_str).expect("second open");
    assert!(!manager.bootstrap().unwrap());

    let classes = manager.list_classes().unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, SEED_CLASS);

    let names: Vec<String> = manager
        .list_students(classes[0].id)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names.len(), SEED_STUDENTS.len() + 1);
    assert!(names.contains(&"Zara".to_string()));
    assert_eq!(manager.records(classes[0].id, None).unwrap().len(), 1);

    drop(manager);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn adding_a_student_twice_adds_one_row() {
    let (mut manager, class_id) = open();

    assert!(manager.add_student("Zara", class_id).unwrap());
    assert!(!manager.add_student("Zara", class_id).unwrap());
    assert!(!manager.add_student("  Zara ", class_id).unwrap());

    assert_eq!(manager.list_students(class_id).unwrap().len(), 21);
}

#[test]
fn roster_stays_sorted_after_adding() {
    let (mut manager, class_id) = open();

    manager.add_student("Zara", class_id).unwrap();

    let names: Vec<String> = manager
        .list_students(class_id)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    let mut sorted = names.clone();
    sorted.sort();

    assert_eq!(names.len(), 21);
    assert_eq!(names, sorted);
    assert_eq!(names.last().map(String::as_str), Some("Zara"));
}

#[test]
fn automatic_marking_writes_one_record_per_student() {
    let (mut manager, class_id) = open();
    let day = date(1, 1);

    let summary = manager
        .mark_automatic(class_id, day, AbsentRate::new(0.2).unwrap())
        .unwrap()
        .expect("class has students");

    assert_eq!(summary.absent, 4);
    assert_eq!(summary.present, 16);
    assert_eq!(summary.statuses.len(), 20);

    let records = manager.records(class_id, Some(day)).unwrap();
    assert_eq!(records.len(), 20);
    assert_eq!(
        records.iter().filter(|r| r.status == Status::Absent).count(),
        4
    );

    let rerun = manager
        .mark_automatic(class_id, day, AbsentRate::new(0.5).unwrap())
        .unwrap()
        .expect("class has students");
    assert_eq!(rerun.absent, 10);

    let records = manager.records(class_id, Some(day)).unwrap();
    assert_eq!(records.len(), 20);
    assert_eq!(
        records.iter().filter(|r| r.status == Status::Absent).count(),
        10
    );
}

#[test]
fn automatic_marking_always_marks_someone_absent() {
    let (mut manager, class_id) = open();

    for (rate, expected_absent) in [(0.0, 1), (0.05, 1), (0.5, 10), (1.0, 20)] {
        let summary = manager
            .mark_automatic(class_id, date(2, 1), AbsentRate::new(rate).unwrap())
            .unwrap()
            .unwrap();

        assert_eq!(summary.absent, expected_absent, "rate {rate}");
        assert_eq!(summary.present + summary.absent, 20);
    }
}

#[test]
fn manual_marking_rejects_bad_indices_and_stops_at_done() {
    let (mut manager, class_id) = open();
    let day = date(3, 29);

    let outcome = manager
        .mark_manual(
            class_id,
            day,
            [
                Selection::Student(0),
                Selection::Student(21),
                Selection::Student(1),
                Selection::Done,
                Selection::Student(2),
            ],
        )
        .unwrap();

    assert_eq!(outcome.marked, vec!["Alice".to_string()]);
    assert_eq!(
        outcome.rejected,
        vec![
            SelectionError::OutOfRange { index: 0, len: 20 },
            SelectionError::OutOfRange { index: 21, len: 20 },
        ]
    );

    let records = manager.records(class_id, Some(day)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, Status::Present);
}

#[test]
fn last_write_wins_for_a_student_and_date() {
    let (mut manager, class_id) = open();
    let day = date(3, 30);

    // Every student is absent at a rate of 1.
    manager
        .mark_automatic(class_id, day, AbsentRate::new(1.0).unwrap())
        .unwrap();
    manager
        .mark_manual(class_id, day, [Selection::Student(1)])
        .unwrap();
    manager
        .mark_manual(class_id, day, [Selection::Student(1)])
        .unwrap();

    let records = manager.records(class_id, Some(day)).unwrap();
    assert_eq!(records.len(), 20);

    let alice = manager.list_students(class_id).unwrap()[0].id;
    let alice_records: Vec<_> = records.iter().filter(|r| r.student_id == alice).collect();
    assert_eq!(alice_records.len(), 1);
    assert_eq!(alice_records[0].status, Status::Present);
}

#[test]
fn manual_sheet_shows_current_statuses() {
    let (mut manager, class_id) = open();
    let day = date(4, 1);

    manager
        .mark_manual(class_id, day, [Selection::Student(2)])
        .unwrap();

    let sheet = manager.manual_sheet(class_id, day).unwrap();
    assert_eq!(sheet.len(), 20);
    assert_eq!(sheet.entries()[1].status, Status::Present);
    assert!(
        sheet
            .entries()
            .iter()
            .enumerate()
            .all(|(i, e)| i == 1 || e.status == Status::Absent)
    );
}

#[test]
fn single_date_view_lists_every_student() {
    let (mut manager, class_id) = open();
    let day = date(1, 1);

    manager
        .mark_automatic(class_id, day, AbsentRate::DEFAULT)
        .unwrap();

    let AttendanceView::Day { rows, .. } = manager.view_attendance(class_id, Some(day)).unwrap()
    else {
        panic!("expected a single-date view");
    };

    assert_eq!(rows.len(), 20);
    for name in SEED_STUDENTS {
        assert!(rows.iter().any(|(n, _)| n == name), "{name} missing");
    }
    assert_eq!(rows.iter().filter(|(_, s)| *s == Status::Absent).count(), 4);
}

#[test]
fn unrecorded_dates_read_as_absent() {
    let (mut manager, class_id) = open();

    let AttendanceView::Day { rows, .. } = manager
        .view_attendance(class_id, Some(date(5, 5)))
        .unwrap()
    else {
        panic!("expected a single-date view");
    };
    assert!(rows.iter().all(|(_, status)| *status == Status::Absent));

    assert_eq!(
        manager.view_attendance(class_id, None).unwrap(),
        AttendanceView::NoRecords
    );
    assert_eq!(manager.generate_report(class_id).unwrap(), Report::NoRecords);
}

#[test]
fn history_view_orders_dates_and_fills_gaps() {
    let (mut manager, class_id) = open();
    let alice = position_of(&mut manager, class_id, "Alice");
    let ava = position_of(&mut manager, class_id, "Ava");

    manager
        .mark_manual(class_id, date(1, 3), [Selection::Student(ava)])
        .unwrap();
    manager
        .mark_manual(class_id, date(1, 1), [Selection::Student(alice)])
        .unwrap();

    let AttendanceView::History { dates, rows, .. } =
        manager.view_attendance(class_id, None).unwrap()
    else {
        panic!("expected a history view");
    };

    assert_eq!(dates, vec![date(1, 1), date(1, 3)]);
    assert_eq!(rows.len(), 20);

    let row = |name: &str| rows.iter().find(|(n, _)| n == name).unwrap().1.clone();
    assert_eq!(row("Alice"), vec![Status::Present, Status::Absent]);
    assert_eq!(row("Ava"), vec![Status::Absent, Status::Present]);
    assert_eq!(row("William"), vec![Status::Absent, Status::Absent]);
}

#[test]
fn report_divides_by_class_wide_days() {
    let (mut manager, class_id) = open();
    let alice = position_of(&mut manager, class_id, "Alice");
    let ava = position_of(&mut manager, class_id, "Ava");

    manager
        .mark_manual(class_id, date(1, 1), [Selection::Student(alice)])
        .unwrap();
    manager
        .mark_manual(
            class_id,
            date(1, 2),
            [Selection::Student(alice), Selection::Student(ava)],
        )
        .unwrap();
    manager
        .mark_manual(class_id, date(1, 3), [Selection::Student(ava)])
        .unwrap();
    manager
        .mark_manual(class_id, date(1, 4), [Selection::Student(ava)])
        .unwrap();

    let Report::Table(report) = manager.generate_report(class_id).unwrap() else {
        panic!("expected a report table");
    };
    assert_eq!(report.total_days, 4);
    assert_eq!(report.rows.len(), 20);

    let row = |name: &str| report.rows.iter().find(|r| r.name == name).unwrap();
    assert_eq!(row("Alice").present_days, 2);
    assert_eq!(row("Alice").present_percent, 50.0);
    assert_eq!(row("Alice").absent_percent, 50.0);
    assert_eq!(row("Ava").present_days, 3);
    assert_eq!(row("Ava").present_percent, 75.0);
    assert_eq!(row("Ava").absent_percent, 25.0);
    assert_eq!(row("Mia").present_percent, 0.0);
    assert_eq!(row("Mia").absent_percent, 100.0);
}

#[test]
fn reading_does_not_write() {
    let (mut manager, class_id) = open();
    manager
        .mark_automatic(class_id, date(1, 1), AbsentRate::DEFAULT)
        .unwrap();
    let before = manager.records(class_id, None).unwrap();

    manager.view_attendance(class_id, None).unwrap();
    manager.view_attendance(class_id, Some(date(1, 2))).unwrap();
    manager.generate_report(class_id).unwrap();
    manager.manual_sheet(class_id, date(1, 3)).unwrap();

    assert_eq!(manager.records(class_id, None).unwrap(), before);
}

#[test]
fn roster_import_skips_blank_and_existing_names() {
    let (mut manager, class_id) = open();

    let csv = "name\nZara\n  \nAlice\nZara\n Yusuf \n";
    let summary = manager.import_roster(class_id, csv.as_bytes()).unwrap();

    assert_eq!(summary.added, 2);
    assert_eq!(summary.skipped, 2);

    let names: Vec<String> = manager
        .list_students(class_id)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names.len(), 22);
    assert!(names.contains(&"Yusuf".to_string()));
}

#[test]
fn malformed_roster_imports_nothing() {
    let (mut manager, class_id) = open();

    let result = manager.import_roster(class_id, "student\nZara\n".as_bytes());

    assert!(matches!(result, Err(AttendanceError::Csv(_))));
    assert_eq!(manager.list_students(class_id).unwrap().len(), 20);
}
