mod common;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use common::{read_json, TestCampus};
use http_helpers::{get_request, json_request};
use registrar::auth::permissions::ROSTER_VIEW;
use registrar::model::{Role, ScopeValue, User, UserPermission, UserStatus};
use registrar::store::RegistrarStore;
use std::collections::HashMap;
use tower::ServiceExt;

async fn enroll(campus: &TestCampus, student_id: &str, course_id: &str) -> serde_json::Value {
    let token = campus.token_for(&format!("u-{student_id}"), Role::Student);
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": course_id }),
        ))
        .await
        .expect("enroll");
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

async fn roster(campus: &TestCampus, course_id: &str) -> serde_json::Value {
    let response = campus
        .router()
        .oneshot(get_request(
            &format!("/v1/courses/{course_id}/roster"),
            &campus.admin_token(),
        ))
        .await
        .expect("roster");
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn seats_fill_in_order_then_waitlist_promotes_fifo() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 2).await;
    for student in ["STU-A", "STU-B", "STU-C", "STU-D"] {
        campus.seed_student(student).await;
    }

    // Two seats fill in request order.
    let first = enroll(&campus, "STU-A", "c1").await;
    assert_eq!(first["status"], "enrolled");
    let second = enroll(&campus, "STU-B", "c1").await;
    assert_eq!(second["status"], "enrolled");

    // A full course waitlists, with 1-based positions in FIFO order.
    let third = enroll(&campus, "STU-C", "c1").await;
    assert_eq!(third["status"], "waitlisted");
    assert_eq!(third["waitlist_position"], 1);
    let fourth = enroll(&campus, "STU-D", "c1").await;
    assert_eq!(fourth["waitlist_position"], 2);

    let view = roster(&campus, "c1").await;
    assert_eq!(view["sections"][0]["roster"], serde_json::json!(["STU-A", "STU-B"]));
    assert_eq!(view["waitlist"], serde_json::json!(["STU-C", "STU-D"]));

    // Dropping a seat promotes the waitlist head within the same transaction.
    let token = campus.token_for("u-STU-A", Role::Student);
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/drop",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("drop");
    assert_eq!(response.status(), StatusCode::OK);

    let view = roster(&campus, "c1").await;
    assert_eq!(view["sections"][0]["roster"], serde_json::json!(["STU-B", "STU-C"]));
    assert_eq!(view["waitlist"], serde_json::json!(["STU-D"]));
}

#[tokio::test]
async fn capacity_override_allocates_an_overflow_section() {
    let campus = TestCampus::new().await;
    campus.seed_course("c2", 1).await;
    campus.seed_student("STU-X").await;
    campus.seed_student("STU-Y").await;
    enroll(&campus, "STU-X", "c2").await;

    // Queue a capacity override for the student shut out of the full section.
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/admin/overrides",
            &campus.admin_token(),
            serde_json::json!({
                "student_id": "STU-Y",
                "course_id": "c2",
                "kind": "capacity",
                "reason": "graduating senior"
            }),
        ))
        .await
        .expect("create override");
    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = read_json(response).await["request_id"]
        .as_str()
        .expect("request id")
        .to_string();

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/v1/admin/overrides/{request_id}/process"),
            &campus.admin_token(),
            serde_json::json!({ "action": "approve" }),
        ))
        .await
        .expect("approve");
    assert_eq!(response.status(), StatusCode::OK);
    let processed = read_json(response).await;
    assert_eq!(processed["state"], "approved");
    assert_eq!(processed["notes"], "enrolled into c2-s2");

    // A second section with the same limit now carries the student.
    let view = roster(&campus, "c2").await;
    assert_eq!(view["sections"][0]["roster"], serde_json::json!(["STU-X"]));
    assert_eq!(view["sections"][1]["section_number"], 2);
    assert_eq!(view["sections"][1]["enrollment_limit"], 1);
    assert_eq!(view["sections"][1]["roster"], serde_json::json!(["STU-Y"]));

    // Each request is one-shot; re-processing conflicts.
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/v1/admin/overrides/{request_id}/process"),
            &campus.admin_token(),
            serde_json::json!({ "action": "approve" }),
        ))
        .await
        .expect("re-approve");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn prerequisite_gate_blocks_until_override_approved() {
    let campus = TestCampus::new().await;
    campus.seed_course("c2", 5).await;
    campus.seed_course_with("c3", 5, vec!["c2".to_string()]).await;
    campus.seed_student("STU-Z").await;

    let token = campus.token_for("u-STU-Z", Role::Student);
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c3" }),
        ))
        .await
        .expect("gated");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json(response).await;
    assert_eq!(payload["code"], "prerequisite_missing");
    assert!(payload["message"].as_str().expect("message").contains("c2"));
    // The failed attempt left no sections behind.
    let view = roster(&campus, "c3").await;
    assert_eq!(view["sections"], serde_json::json!([]));

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/admin/overrides",
            &campus.admin_token(),
            serde_json::json!({
                "student_id": "STU-Z",
                "course_id": "c3",
                "kind": "prerequisite",
                "reason": "transfer credit under review"
            }),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = read_json(response).await["request_id"]
        .as_str()
        .expect("request id")
        .to_string();

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/v1/admin/overrides/{request_id}/process"),
            &campus.admin_token(),
            serde_json::json!({ "action": "approve", "notes": "transcript verified" }),
        ))
        .await
        .expect("approve");
    assert_eq!(response.status(), StatusCode::OK);
    let processed = read_json(response).await;
    assert_eq!(
        processed["notes"],
        "transcript verified; enrolled into c3-s1"
    );

    let view = roster(&campus, "c3").await;
    assert_eq!(view["sections"][0]["roster"], serde_json::json!(["STU-Z"]));
}

#[tokio::test]
async fn rejected_overrides_change_nothing() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 1).await;
    campus.seed_student("STU-A").await;

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/admin/overrides",
            &campus.admin_token(),
            serde_json::json!({
                "student_id": "STU-A",
                "course_id": "c1",
                "kind": "window",
                "reason": "late add"
            }),
        ))
        .await
        .expect("create");
    let request_id = read_json(response).await["request_id"]
        .as_str()
        .expect("request id")
        .to_string();

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/v1/admin/overrides/{request_id}/process"),
            &campus.admin_token(),
            serde_json::json!({ "action": "reject", "notes": "window reopens next week" }),
        ))
        .await
        .expect("reject");
    assert_eq!(response.status(), StatusCode::OK);
    let processed = read_json(response).await;
    assert_eq!(processed["state"], "rejected");

    let view = roster(&campus, "c1").await;
    assert_eq!(view["sections"], serde_json::json!([]));

    // The pending queue is now empty.
    let response = campus
        .router()
        .oneshot(get_request(
            "/v1/admin/overrides?state=pending",
            &campus.admin_token(),
        ))
        .await
        .expect("list");
    let payload = read_json(response).await;
    assert_eq!(payload["items"], serde_json::json!([]));
}

#[tokio::test]
async fn enrollment_period_crud_and_window_enforcement() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 5).await;
    campus.seed_student("STU-A").await;
    let admin = campus.admin_token();

    // Replace the seeded open window with one that already closed.
    let response = campus
        .router()
        .oneshot(get_request("/v1/admin/enrollment-periods", &admin))
        .await
        .expect("list");
    let periods = read_json(response).await;
    let seeded_id = periods["items"][0]["period_id"]
        .as_str()
        .expect("period id")
        .to_string();
    let response = campus
        .router()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/v1/admin/enrollment-periods/{seeded_id}"))
                .header("authorization", format!("Bearer {admin}"))
                .body(axum::body::Body::empty())
                .expect("request"),
        )
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let now = Utc::now();
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/admin/enrollment-periods",
            &admin,
            serde_json::json!({
                "name": "closed window",
                "start": now - ChronoDuration::days(10),
                "end": now - ChronoDuration::days(5),
                "priority_end": null,
                "active": true
            }),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    let period_id = created["period_id"].as_str().expect("period id").to_string();

    // Self-enrollment is now gated.
    let token = campus.token_for("u-STU-A", Role::Student);
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("gated");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "window_closed");

    // Reopening the window through the update endpoint lifts the gate.
    let response = campus
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/v1/admin/enrollment-periods/{period_id}"),
            &admin,
            serde_json::json!({
                "name": "reopened window",
                "start": now - ChronoDuration::hours(1),
                "end": now + ChronoDuration::hours(1),
                "priority_end": null,
                "active": true
            }),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("reopened");
    assert_eq!(response.status(), StatusCode::OK);

    // Invalid windows are rejected up front.
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/admin/enrollment-periods",
            &admin,
            serde_json::json!({
                "name": "inverted",
                "start": now,
                "end": now - ChronoDuration::days(1),
                "priority_end": null,
                "active": true
            }),
        ))
        .await
        .expect("invalid");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_enroll_partitions_outcomes() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 1).await;
    campus.seed_student("STU-A").await;
    campus.seed_student("STU-B").await;

    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll/bulk",
            &campus.admin_token(),
            serde_json::json!({
                "course_id": "c1",
                "student_ids": ["STU-A", "STU-B", "STU-GHOST"]
            }),
        ))
        .await
        .expect("bulk");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["enrolled"][0]["student_id"], "STU-A");
    assert_eq!(payload["waitlisted"][0]["student_id"], "STU-B");
    assert_eq!(payload["waitlisted"][0]["waitlist_position"], 1);
    assert_eq!(payload["errored"][0]["student_id"], "STU-GHOST");
    assert_eq!(payload["errored"][0]["code"], "unknown_student");

    // Students cannot reach the bulk surface.
    let response = campus
        .router()
        .oneshot(json_request(
            "POST",
            "/v1/enroll/bulk",
            &campus.token_for("u-STU-A", Role::Student),
            serde_json::json!({ "course_id": "c1", "student_ids": ["STU-A"] }),
        ))
        .await
        .expect("student bulk");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn department_scoped_roster_grants() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 5).await;

    // A staff account has no roster grant by role; give it one scoped to a
    // department that does not match the course.
    campus
        .store
        .create_user(User {
            user_id: "u-staff".to_string(),
            display_name: "Records Staff".to_string(),
            email: "staff@campus.test".to_string(),
            role: Role::Staff,
            status: UserStatus::Active,
            attributes: HashMap::new(),
        })
        .await
        .expect("staff");
    campus
        .store
        .grant_user_permission(UserPermission {
            user_id: "u-staff".to_string(),
            codename: ROSTER_VIEW.to_string(),
            expires_at: None,
            scope: Some(HashMap::from([(
                "department".to_string(),
                ScopeValue::Set(vec!["Mathematics".to_string()]),
            )])),
        })
        .await
        .expect("grant");

    let staff_token = campus.token_for("u-staff", Role::Staff);
    let response = campus
        .router()
        .oneshot(get_request("/v1/courses/c1/roster", &staff_token))
        .await
        .expect("out of scope");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Widen the grant to the course's department and access follows.
    campus
        .store
        .grant_user_permission(UserPermission {
            user_id: "u-staff".to_string(),
            codename: ROSTER_VIEW.to_string(),
            expires_at: None,
            scope: Some(HashMap::from([(
                "department".to_string(),
                ScopeValue::One("Computer Science".to_string()),
            )])),
        })
        .await
        .expect("grant");
    let response = campus
        .router()
        .oneshot(get_request("/v1/courses/c1/roster", &staff_token))
        .await
        .expect("in scope");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn audit_trail_is_queryable_by_course_and_student() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 1).await;
    campus.seed_student("STU-A").await;
    campus.seed_student("STU-B").await;
    enroll(&campus, "STU-A", "c1").await;
    enroll(&campus, "STU-B", "c1").await;

    let response = campus
        .router()
        .oneshot(get_request(
            "/v1/admin/audit?course_id=c1",
            &campus.admin_token(),
        ))
        .await
        .expect("audit");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let actions: Vec<&str> = payload["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item["action"].as_str().expect("action"))
        .collect();
    assert_eq!(
        actions,
        vec!["section_created", "enrolled", "waitlisted"]
    );

    let response = campus
        .router()
        .oneshot(get_request(
            "/v1/admin/audit?student_id=STU-B",
            &campus.admin_token(),
        ))
        .await
        .expect("student audit");
    let payload = read_json(response).await;
    assert_eq!(payload["items"].as_array().expect("items").len(), 1);
    assert_eq!(payload["items"][0]["action"], "waitlisted");
    assert_eq!(payload["items"][0]["after"]["waitlist_position"], 1);

    // Students cannot read the audit trail.
    let response = campus
        .router()
        .oneshot(get_request(
            "/v1/admin/audit",
            &campus.token_for("u-STU-A", Role::Student),
        ))
        .await
        .expect("student audit denied");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
