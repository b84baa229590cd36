// Database schema definitions
diesel::table! {
    users (id) {
        id -> Int4,
        student_number -> Nullable<Varchar>,
        password_hash -> Varchar,
        name -> Varchar,
        role -> Varchar,
        grade -> Nullable<Varchar>,
        gender -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        region -> Nullable<Varchar>,
        date_of_birth -> Nullable<Date>,
        religion -> Nullable<Varchar>,
        birth_place -> Nullable<Varchar>,
        status -> Varchar,
        profile_picture -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    classes (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamp,
    }
}

diesel::table! {
    subjects (id) {
        id -> Int4,
        name -> Varchar,
        class_id -> Int4,
    }
}

diesel::table! {
    teacher_subjects (id) {
        id -> Int4,
        teacher_id -> Int4,
        subject_id -> Int4,
    }
}

diesel::table! {
    student_classes (id) {
        id -> Int4,
        student_id -> Int4,
        class_id -> Int4,
    }
}

diesel::table! {
    sessions (id) {
        id -> Int4,
        subject_id -> Int4,
        session_no -> Int4,
        date -> Date,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    session_attachments (id) {
        id -> Int4,
        session_id -> Int4,
        filename -> Varchar,
        stored_name -> Varchar,
        file_size -> Int8,
        content_type -> Varchar,
        uploaded_by -> Nullable<Int4>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int4,
        title -> Varchar,
        description -> Nullable<Text>,
        notification_type -> Varchar,
        nominal -> Nullable<Numeric>,
        event_date -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    user_notifications (id) {
        id -> Int4,
        user_id -> Int4,
        notification_id -> Int4,
        is_read -> Bool,
        read_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    admin_login_logs (id) {
        id -> Int4,
        admin_user_id -> Int4,
        admin_name -> Varchar,
        admin_email -> Varchar,
        login_time -> Timestamp,
        logout_time -> Nullable<Timestamp>,
        session_token -> Varchar,
        ip_address -> Nullable<Varchar>,
        user_agent -> Nullable<Varchar>,
    }
}

diesel::joinable!(subjects -> classes (class_id));
diesel::joinable!(teacher_subjects -> users (teacher_id));
diesel::joinable!(teacher_subjects -> subjects (subject_id));
diesel::joinable!(student_classes -> users (student_id));
diesel::joinable!(student_classes -> classes (class_id));
diesel::joinable!(sessions -> subjects (subject_id));
diesel::joinable!(session_attachments -> sessions (session_id));
diesel::joinable!(session_attachments -> users (uploaded_by));
diesel::joinable!(user_notifications -> users (user_id));
diesel::joinable!(user_notifications -> notifications (notification_id));
diesel::joinable!(admin_login_logs -> users (admin_user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users, classes, subjects, teacher_subjects, student_classes,
    sessions, session_attachments, notifications, user_notifications,
    admin_login_logs,
);
