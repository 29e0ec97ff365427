// Mirrors the tables created by `manager::SCHEMA_SQL`.

diesel::table! {
    attendance (id) {
        id -> Integer,
        student_id -> Integer,
        date -> Date,
        status -> Text,
    }
}

diesel::table! {
    classes (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    students (id) {
        id -> Integer,
        name -> Text,
        class_id -> Integer,
    }
}

diesel::joinable!(attendance -> students (student_id));
diesel::joinable!(students -> classes (class_id));

diesel::allow_tables_to_appear_in_same_query!(
    attendance,
    classes,
    students,
);
