use chrono::{Duration as ChronoDuration, Utc};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use registrar::app::AppState;
use registrar::auth::context::{ATTR_DEGREE_PROGRAM, ATTR_EMPLOYEE_ID, ATTR_STUDENT_ID};
use registrar::auth::token::issue_access_token;
use registrar::auth::NullSessionKv;
use registrar::enrollment::EnrollmentEngine;
use registrar::model::{
    Course, EnrollmentPeriod, Role, StudentGroup, StudentProfile, User, UserStatus,
};
use registrar::store::memory::InMemoryStore;
use registrar::store::RegistrarStore;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Deterministic Ed25519 key pair as PEM strings.
pub fn pem_pair() -> (String, String) {
    let signing_key = SigningKey::from_bytes(&[11u8; 32]);
    let private = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("private pem")
        .to_string();
    let public = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("public pem");
    (private, public)
}

/// A registrar instance on the in-memory backend with an open enrollment
/// window and one admin account seeded.
pub struct TestCampus {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    private_pem: String,
}

pub const ADMIN_USER: &str = "u-admin";

impl TestCampus {
    pub async fn new() -> Self {
        let (private_pem, public_pem) = pem_pair();
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        store
            .create_period(EnrollmentPeriod {
                period_id: Uuid::new_v4(),
                name: "term registration".to_string(),
                group: StudentGroup::default(),
                start: now - ChronoDuration::hours(1),
                end: now + ChronoDuration::hours(8),
                priority_end: None,
                active: true,
            })
            .await
            .expect("period");
        store
            .create_user(User {
                user_id: ADMIN_USER.to_string(),
                display_name: "Registrar Admin".to_string(),
                email: "admin@campus.test".to_string(),
                role: Role::Admin,
                status: UserStatus::Active,
                attributes: HashMap::from([(
                    ATTR_EMPLOYEE_ID.to_string(),
                    "EMP-1".to_string(),
                )]),
            })
            .await
            .expect("admin");

        let engine = Arc::new(EnrollmentEngine::new(store.clone(), Duration::from_secs(2)));
        let state = AppState {
            api_version: "v1".to_string(),
            store: store.clone(),
            sessions: Arc::new(NullSessionKv),
            engine,
            public_key_pem: Arc::from(public_pem.as_str()),
            session_kv_backend: "null",
        };
        Self {
            state,
            store,
            private_pem,
        }
    }

    pub fn router(&self) -> axum::Router {
        registrar::app::build_router(self.state.clone())
    }

    pub fn token_for(&self, user_id: &str, role: Role) -> String {
        issue_access_token(user_id, role.as_str(), &self.private_pem, Duration::from_secs(600))
            .expect("token")
    }

    pub fn admin_token(&self) -> String {
        self.token_for(ADMIN_USER, Role::Admin)
    }

    /// Seed a student account + profile; the account's user id is
    /// `u-<student_id>`.
    pub async fn seed_student(&self, student_id: &str) -> String {
        let user_id = format!("u-{student_id}");
        self.store
            .create_user(User {
                user_id: user_id.clone(),
                display_name: student_id.to_string(),
                email: format!("{student_id}@campus.test"),
                role: Role::Student,
                status: UserStatus::Active,
                attributes: HashMap::from([
                    (ATTR_STUDENT_ID.to_string(), student_id.to_string()),
                    (
                        ATTR_DEGREE_PROGRAM.to_string(),
                        "Computer Science".to_string(),
                    ),
                ]),
            })
            .await
            .expect("student user");
        self.store
            .upsert_student(StudentProfile {
                student_id: student_id.to_string(),
                user_id: user_id.clone(),
                degree_program: "Computer Science".to_string(),
                academic_standing: "good".to_string(),
                gpa: 3.5,
                completed_courses: vec![],
            })
            .await
            .expect("student profile");
        user_id
    }

    pub async fn seed_course(&self, course_id: &str, limit: u32) {
        self.seed_course_with(course_id, limit, vec![]).await;
    }

    pub async fn seed_course_with(&self, course_id: &str, limit: u32, prerequisites: Vec<String>) {
        self.store
            .create_course(Course {
                course_id: course_id.to_string(),
                code: course_id.to_uppercase(),
                name: format!("Course {course_id}"),
                department: "Computer Science".to_string(),
                credits: 3,
                default_enrollment_limit: limit,
                start_date: None,
                end_date: None,
                prerequisites,
                archived: false,
                description: String::new(),
            })
            .await
            .expect("course");
    }
}
