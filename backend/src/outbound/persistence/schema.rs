//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered students; `email` is unique.
    students (id) {
        id -> Uuid,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        phone -> Nullable<Varchar>,
        preferences -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Course catalogue with pricing in minor units and seat counters.
    courses (id) {
        id -> Int8,
        title -> Varchar,
        description -> Nullable<Text>,
        price_cents -> Int8,
        discount_price_cents -> Nullable<Int8>,
        currency -> Varchar,
        available_slots -> Int4,
        max_students -> Int4,
        enrolled_count -> Int4,
        status -> Varchar,
        instructor_email -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    course_modules (id) {
        id -> Int8,
        course_id -> Int8,
        title -> Varchar,
        position -> Int4,
    }
}

diesel::table! {
    lessons (id) {
        id -> Int8,
        module_id -> Int8,
        title -> Varchar,
        position -> Int4,
    }
}

diesel::table! {
    /// One row per student and course.
    enrollments (id) {
        id -> Uuid,
        student_id -> Uuid,
        course_id -> Int8,
        status -> Varchar,
        enrolled_at -> Timestamptz,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        cancelled_at -> Nullable<Timestamptz>,
        expires_at -> Nullable<Timestamptz>,
        send_welcome_email -> Bool,
        notify_instructor -> Bool,
        metadata -> Jsonb,
    }
}

diesel::table! {
    /// Payment owned by an enrollment. The enrollment foreign key is
    /// deferred to commit so the payment row can be written first.
    payments (id) {
        id -> Uuid,
        enrollment_id -> Uuid,
        amount_cents -> Int8,
        currency -> Varchar,
        method -> Varchar,
        status -> Varchar,
        transaction_id -> Nullable<Varchar>,
        coupon_code -> Nullable<Varchar>,
        paid_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    lesson_progress (id) {
        id -> Uuid,
        enrollment_id -> Uuid,
        lesson_id -> Int8,
        is_completed -> Bool,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(course_modules -> courses (course_id));
diesel::joinable!(lessons -> course_modules (module_id));
diesel::joinable!(enrollments -> students (student_id));
diesel::joinable!(enrollments -> courses (course_id));
diesel::joinable!(payments -> enrollments (enrollment_id));
diesel::joinable!(lesson_progress -> enrollments (enrollment_id));
diesel::joinable!(lesson_progress -> lessons (lesson_id));

diesel::allow_tables_to_appear_in_same_query!(
    students,
    courses,
    course_modules,
    lessons,
    enrollments,
    payments,
    lesson_progress,
);
