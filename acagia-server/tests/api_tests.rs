//! Integration tests for acagia-server API endpoints
//!
//! Each test builds the router over a fresh in-memory database and drives it
//! with `oneshot` requests.

use acagia_common::db::init_memory_database;
use acagia_server::{build_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

async fn setup_app() -> Router {
    let db = init_memory_database().await.expect("Should create database");
    build_router(AppState::new(db))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, value)
}

async fn create_academy(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/academies",
        Some(json!({"name": "Gracie Barra", "academy_type": "MMA", "owner": "kim"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["guid"].as_str().unwrap().to_string()
}

async fn create_member(app: &Router, academy: &str, first: &str, last: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/academies/{}/members", academy),
        Some(json!({
            "first_name": first,
            "last_name": last,
            "date_of_birth": "1990-04-01",
            "gender": "F",
            "email": format!("{}@example.com", first.to_lowercase()),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["guid"].as_str().unwrap().to_string()
}

async fn create_ranks(app: &Router, academy: &str) -> Vec<String> {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/academies/{}/ranks", academy),
        Some(json!({"ranks": [
            {"name": "White", "rank_order": 1, "days_required": 2},
            {"name": "Blue", "rank_order": 2, "days_required": 40},
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body.as_array()
        .unwrap()
        .iter()
        .map(|r| r["guid"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Health and academies
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "acagia-server");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_academy_crud_and_owner_filter() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;

    let (status, body) = send(&app, "GET", "/api/academies?owner=kim", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/api/academies?owner=lee", None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/academies/{}", academy),
        Some(json!({"name": "Renamed", "utc_offset_minutes": 540})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["academy_type"], "General");

    let (status, _) = send(&app, "DELETE", &format!("/api/academies/{}", academy), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/academies/{}/members", academy), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_validation_error_body() {
    let app = setup_app().await;
    let (status, body) = send(&app, "POST", "/api/academies", Some(json!({"name": "   "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("required"));
}

// =============================================================================
// Members, ranks and promotion
// =============================================================================

#[tokio::test]
async fn test_promotion_requires_ranks() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    create_member(&app, &academy, "Ana", "Lee").await;

    let (status, body) = send(&app, "GET", &format!("/api/academies/{}/promotion", academy), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Make your ranking system first to use PROMOTION tab now!"
    );
}

#[tokio::test]
async fn test_duplicate_rank_order_conflict() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    create_ranks(&app, &academy).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/ranks", academy),
        Some(json!({"ranks": [{"name": "Purple", "rank_order": 2, "days_required": 60}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, body) = send(&app, "GET", &format!("/api/academies/{}/ranks", academy), None).await;
    let names: Vec<&str> = body.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["White", "Blue"]);
}

#[tokio::test]
async fn test_checkin_promotion_flow() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let ranks = create_ranks(&app, &academy).await;
    let ana = create_member(&app, &academy, "Ana", "Lee").await;
    let bo = create_member(&app, &academy, "Bo", "Kim").await;

    // New members show up unranked with the first rank next
    let (_, list) = send(&app, "GET", &format!("/api/academies/{}/promotion", academy), None).await;
    assert_eq!(list[0]["member_name"], "Ana Lee");
    assert_eq!(list[0]["new_member"], true);
    assert_eq!(list[0]["next"]["name"], "White");

    let (status, outcome) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/promotion", academy),
        Some(json!({"direction": "promote", "member_ids": [ana, bo]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["operation"], "promote");
    assert_eq!(outcome["succeeded"].as_array().unwrap().len(), 2);

    let (status, course) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/courses", academy),
        Some(json!({
            "name": "All Levels",
            "course_days": "MTWRFSU",
            "start_time": "06:00:00",
            "end_time": "23:00:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", course);
    let course_id = course["guid"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, record) = send(
            &app,
            "POST",
            &format!("/api/academies/{}/checkin", academy),
            Some(json!({"first_name": "ana", "last_name": " lee ", "course_id": course_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", record);
        assert_eq!(record["member_name"], "Ana Lee");
    }

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/checkin", academy),
        Some(json!({"first_name": "Nobody", "last_name": "Here", "course_id": course_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Please check your name and enter again!");

    let (_, detail) = send(&app, "GET", &format!("/api/academies/{}/members/{}", academy, ana), None).await;
    assert_eq!(detail["rank"]["rank_name"], "White");
    assert_eq!(detail["rank"]["days_attended"], 2);
    assert_eq!(detail["rank"]["days_left"], 0);
    assert_eq!(detail["rank"]["total_days"], 2);
    assert_eq!(detail["recent_attendance"].as_array().unwrap().len(), 2);

    let (_, list) = send(&app, "GET", &format!("/api/academies/{}/promotion", academy), None).await;
    assert_eq!(list[0]["eligible"], true);
    assert_eq!(list[1]["eligible"], false);

    // Promotion restarts the per-rank counters
    send(
        &app,
        "POST",
        &format!("/api/academies/{}/promotion", academy),
        Some(json!({"direction": "promote", "member_ids": [ana]})),
    )
    .await;
    let (_, rank) = send(&app, "GET", &format!("/api/academies/{}/members/{}/rank", academy, ana), None).await;
    assert_eq!(rank["rank_id"], ranks[1].as_str());
    assert_eq!(rank["days_attended"], 0);
    assert_eq!(rank["days_left"], 40);
    assert_eq!(rank["total_days"], 2);

    let (_, outcome) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/promotion", academy),
        Some(json!({"direction": "demote", "member_ids": [bo]})),
    )
    .await;
    assert_eq!(outcome["failed"], json!(["Bo Kim"]));
}

#[tokio::test]
async fn test_promotion_empty_selection() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    create_ranks(&app, &academy).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/promotion", academy),
        Some(json!({"direction": "promote", "member_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "You didn't select any members! Please select members first."
    );
}

#[tokio::test]
async fn test_manual_rank_update_and_rank_delete() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let ranks = create_ranks(&app, &academy).await;
    let ana = create_member(&app, &academy, "Ana", "Lee").await;
    let uri = format!("/api/academies/{}/members/{}/rank", academy, ana);

    let (status, rank) = send(&app, "PUT", &uri, Some(json!({"rank_id": ranks[1]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rank["days_left"], 40);

    let (_, rank) = send(&app, "PUT", &uri, Some(json!({"days_attended": 5}))).await;
    assert_eq!(rank["days_left"], 35);
    assert_eq!(rank["total_days"], 5);

    let (status, _) = send(&app, "PUT", &uri, Some(json!({"days_attended": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/academies/{}/ranks/{}", academy, ranks[1]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, rank) = send(&app, "GET", &uri, None).await;
    assert_eq!(rank["rank_id"], Value::Null);
    assert_eq!(rank["days_attended"], 0);
    assert_eq!(rank["total_days"], 5);
}

// =============================================================================
// Attendance, events and calendar
// =============================================================================

#[tokio::test]
async fn test_attendance_management() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let ana = create_member(&app, &academy, "Ana", "Lee").await;
    let bo = create_member(&app, &academy, "Bo", "Kim").await;
    let records = format!("/api/academies/{}/attendance/records", academy);

    let (status, record) = send(
        &app,
        "POST",
        &records,
        Some(json!({"member_id": ana, "date_attended": "2019-11-01", "time_attended": "18:05:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", record);
    let record_id = record["guid"].as_str().unwrap().to_string();

    let (_, day) = send(
        &app,
        "GET",
        &format!("/api/academies/{}/attendance?date=2019-11-01", academy),
        None,
    )
    .await;
    assert_eq!(day["count"], 1);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{}/{}", records, record_id),
        Some(json!({"member_id": bo, "date_attended": "2019-11-01", "time_attended": "18:05:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rank_of = |member: &str| format!("/api/academies/{}/members/{}/rank", academy, member);
    let (_, rank) = send(&app, "GET", &rank_of(ana.as_str()), None).await;
    assert_eq!(rank["total_days"], 0);
    let (_, rank) = send(&app, "GET", &rank_of(bo.as_str()), None).await;
    assert_eq!(rank["total_days"], 1);

    let (_, page) = send(&app, "GET", &format!("{}?page=5", records), None).await;
    assert_eq!(page["page"], 1);
    assert_eq!(page["total"], 1);

    let (status, _) = send(&app, "DELETE", &format!("{}/{}", records, record_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, rank) = send(&app, "GET", &rank_of(bo.as_str()), None).await;
    assert_eq!(rank["total_days"], 0);
}

#[tokio::test]
async fn test_dashboard_uses_academy_local_today() {
    let app = setup_app().await;
    let (status, academy) = send(
        &app,
        "POST",
        "/api/academies",
        Some(json!({"name": "Line Islands BJJ", "utc_offset_minutes": 840})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let academy = academy["guid"].as_str().unwrap().to_string();
    let dashboard = format!("/api/academies/{}/dashboard", academy);

    let (status, empty) = send(&app, "GET", &dashboard, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["academy_name"], "Line Islands BJJ");
    assert_eq!(empty["attendance_today"], 0);
    let today: NaiveDate = empty["local_date"].as_str().unwrap().parse().unwrap();
    let yesterday = today.pred_opt().unwrap();

    let ana = create_member(&app, &academy, "Ana", "Lee").await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/members", academy),
        Some(json!({
            "first_name": "Bo",
            "last_name": "Kim",
            "status": "Hold",
            "date_of_birth": format!("2000-{}", today.format("%m-%d")),
            "gender": "M",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let records = format!("/api/academies/{}/attendance/records", academy);
    for date in [today, yesterday] {
        let (status, _) = send(
            &app,
            "POST",
            &records,
            Some(json!({"member_id": ana, "date_attended": date, "time_attended": "07:00:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    send(
        &app,
        "POST",
        &format!("/api/academies/{}/events", academy),
        Some(json!({"title": "Open Mat", "start_date": today})),
    )
    .await;

    let (_, summary) = send(&app, "GET", &dashboard, None).await;
    assert_eq!(summary["members"], json!({"total": 2, "active": 1, "inactive": 0, "hold": 1}));
    assert_eq!(summary["attendance_today"], 1);
    let birthdays = summary["birthdays_today"].as_array().unwrap();
    assert!(birthdays.iter().any(|m| m["first_name"] == "Bo"));
    assert_eq!(summary["events_today"][0]["title"], "Open Mat");
}

#[tokio::test]
async fn test_event_credit_flow() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let ana = create_member(&app, &academy, "Ana", "Lee").await;
    let events = format!("/api/academies/{}/events", academy);

    let (status, event) = send(
        &app,
        "POST",
        &events,
        Some(json!({"title": "Summer Camp", "start_date": "2019-11-01", "end_date": "2019-11-03", "credit_days": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", event);
    let event_id = event["guid"].as_str().unwrap().to_string();
    let credits = format!("{}/{}/credits", events, event_id);

    let (_, outcome) = send(&app, "POST", &credits, Some(json!({"member_ids": [ana]}))).await;
    assert_eq!(outcome["credited"], json!(["Ana Lee"]));
    let (_, outcome) = send(&app, "POST", &credits, Some(json!({"member_ids": [ana]}))).await;
    assert_eq!(outcome["skipped"], json!(["Ana Lee"]));

    let (_, on_day) = send(&app, "GET", &format!("{}?date=2019-11-02", events), None).await;
    assert_eq!(on_day.as_array().unwrap().len(), 1);

    let (_, calendar) = send(
        &app,
        "GET",
        &format!("/api/academies/{}/calendar?month=2019-11", academy),
        None,
    )
    .await;
    assert_eq!(calendar["prev_month"], "2019-10");
    assert_eq!(calendar["days"][2]["events"], json!(["Summer Camp"]));
    assert_eq!(calendar["days"][3]["events"], json!([]));

    let rank_uri = format!("/api/academies/{}/members/{}/rank", academy, ana);
    let (_, rank) = send(&app, "GET", &rank_uri, None).await;
    assert_eq!(rank["total_days"], 3);

    let (status, _) = send(&app, "DELETE", &format!("{}/{}", credits, ana), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, rank) = send(&app, "GET", &rank_uri, None).await;
    assert_eq!(rank["total_days"], 0);

    let (status, _) = send(&app, "DELETE", &format!("{}/{}", credits, ana), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_calendar_rejects_bad_month() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/academies/{}/calendar?month=2019-13", academy),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Payments
// =============================================================================

#[tokio::test]
async fn test_payments() {
    let app = setup_app().await;
    let academy = create_academy(&app).await;
    let ana = create_member(&app, &academy, "Ana", "Lee").await;

    let (status, term) = send(
        &app,
        "POST",
        &format!("/api/academies/{}/payment-terms", academy),
        Some(json!({"name": "Monthly", "amount_cents": 12000})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(term["period_days"], 30);

    let payments = format!("/api/academies/{}/members/{}/payments", academy, ana);
    let (status, payment) = send(
        &app,
        "POST",
        &payments,
        Some(json!({"term_id": term["guid"], "paid_on": "2019-11-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", payment);
    assert_eq!(payment["amount_cents"], 12000);

    let (_, history) = send(&app, "GET", &payments, None).await;
    assert_eq!(history["next_due"], "2019-12-01");
    assert_eq!(history["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_data_survives_reopening_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("acagia.db");

    let db = acagia_common::db::init_database(&db_path).await.unwrap();
    let app = build_router(AppState::new(db.clone()));
    let academy = create_academy(&app).await;
    create_member(&app, &academy, "Ana", "Lee").await;
    db.close().await;

    let reopened = acagia_common::db::init_database(&db_path).await.unwrap();
    let app = build_router(AppState::new(reopened));
    let (status, members) = send(&app, "GET", &format!("/api/academies/{}/members", academy), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members[0]["first_name"], "Ana");
}
