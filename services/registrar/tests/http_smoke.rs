mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{read_json, TestCampus};
use http_helpers::{get_request, json_request};
use registrar::model::Role;
use tower::ServiceExt;

#[tokio::test]
async fn system_endpoints_report_backend() {
    let campus = TestCampus::new().await;
    let app = campus.router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/system/info")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("info");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["storage_backend"], "memory");
    assert_eq!(payload["durable_storage"], false);
    assert_eq!(payload["api_version"], "v1");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/system/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "ok");
}

#[tokio::test]
async fn missing_bearer_token_is_rejected_with_envelope() {
    let campus = TestCampus::new().await;
    let app = campus.router();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/enroll")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "course_id": "c1" }).to_string(),
        ))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json(response).await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["code"], "unauthenticated");
    assert!(payload["message"].is_string());
}

#[tokio::test]
async fn enroll_and_drop_round_trip_over_http() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 2).await;
    campus.seed_student("STU-A").await;
    let app = campus.router();
    let token = campus.token_for("u-STU-A", Role::Student);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("enroll");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "enrolled");
    assert_eq!(payload["section_id"], "c1-s1");

    // Duplicate enrollment surfaces the stable conflict code.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json(response).await;
    assert_eq!(payload["code"], "already_enrolled");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/drop",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("drop");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "dropped");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/drop",
            &token,
            serde_json::json!({ "course_id": "c1" }),
        ))
        .await
        .expect("second drop");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json(response).await;
    assert_eq!(payload["code"], "not_enrolled");
}

#[tokio::test]
async fn students_cannot_act_on_other_students() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 2).await;
    campus.seed_student("STU-A").await;
    campus.seed_student("STU-B").await;
    let app = campus.router();
    let token = campus.token_for("u-STU-A", Role::Student);

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c1", "student_id": "STU-B" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json(response).await;
    assert_eq!(payload["code"], "forbidden");
}

#[tokio::test]
async fn unknown_course_maps_to_not_found() {
    let campus = TestCampus::new().await;
    campus.seed_student("STU-A").await;
    let app = campus.router();
    let token = campus.token_for("u-STU-A", Role::Student);

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &token,
            serde_json::json!({ "course_id": "c-missing" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json(response).await;
    assert_eq!(payload["code"], "unknown_course");
}

#[tokio::test]
async fn admin_can_enroll_on_behalf_of_students() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 2).await;
    campus.seed_student("STU-A").await;
    let app = campus.router();

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/enroll",
            &campus.admin_token(),
            serde_json::json!({ "course_id": "c1", "student_id": "STU-A" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "enrolled");
}

#[tokio::test]
async fn roster_requires_view_permission() {
    let campus = TestCampus::new().await;
    campus.seed_course("c1", 2).await;
    campus.seed_student("STU-A").await;
    let app = campus.router();
    let student_token = campus.token_for("u-STU-A", Role::Student);

    // Students have no roster:view grant.
    let response = app
        .clone()
        .oneshot(get_request("/v1/courses/c1/roster", &student_token))
        .await
        .expect("student roster");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json(response).await;
    assert!(payload["message"]
        .as_str()
        .expect("message")
        .contains("roster:view"));

    let response = app
        .clone()
        .oneshot(get_request("/v1/courses/c1/roster", &campus.admin_token()))
        .await
        .expect("admin roster");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["course_id"], "c1");
    assert!(payload["sections"].is_array());
    assert!(payload["waitlist"].is_array());
}
