//! HTTP contract tests, driven in-process with `oneshot`.

use axum::http::StatusCode;
use serde_json::json;

use calcflow::api::{self, CALCULATE_PATH, EXPRESSIONS_PATH, TASK_PATH};
use calcflow::core::TaskId;

use crate::fixtures::{get, post_json, post_raw, send, test_store};

async fn submit(app: &axum::Router, expression: &str) -> (StatusCode, serde_json::Value) {
    send(app, post_json(CALCULATE_PATH, json!({ "expression": expression }))).await
}

#[tokio::test]
async fn test_calculate_returns_created_id() {
    let app = api::router(test_store());
    let (status, body) = submit(&app, "3+4*2").await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("{}/{}", EXPRESSIONS_PATH, id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expression"]["id"], id);
    assert_eq!(body["expression"]["expression"], "3+4*2");
    assert_eq!(body["expression"]["status"], "pending");
    assert!(body["expression"]["result"].is_null());
}

#[tokio::test]
async fn test_calculate_parse_errors_are_unprocessable() {
    let app = api::router(test_store());
    for source in ["", "(1+2", "2++", "5/0", "abc"] {
        let (status, body) = submit(&app, source).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "source {:?}", source);
        assert!(body["error"].is_string());
    }

    let (_, body) = send(&app, get(EXPRESSIONS_PATH)).await;
    assert_eq!(body["expressions"], json!([]));
}

#[tokio::test]
async fn test_out_of_range_number_is_unprocessable() {
    let app = api::router(test_store());
    let huge = format!("1{}", "0".repeat(400));

    for source in [huge.clone(), format!("{}+1", huge)] {
        let (status, body) = submit(&app, &source).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("out of range"));
    }

    let (_, body) = send(&app, get(EXPRESSIONS_PATH)).await;
    assert_eq!(body["expressions"], json!([]));
    let (status, _) = send(&app, get(TASK_PATH)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let app = api::router(test_store());

    let (status, body) = send(&app, post_raw(CALCULATE_PATH, "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, post_json(CALCULATE_PATH, json!({ "expr": "1+1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post_raw(TASK_PATH, "[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_expression_is_not_found() {
    let app = api::router(test_store());
    let missing = format!("{}/{}", EXPRESSIONS_PATH, uuid::Uuid::new_v4());
    let (status, body) = send(&app, get(&missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let (status, _) = send(&app, get(&format!("{}/not-a-uuid", EXPRESSIONS_PATH))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_queue_is_not_found() {
    let app = api::router(test_store());
    let (status, body) = send(&app, get(TASK_PATH)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no task available");
}

#[tokio::test]
async fn test_task_round_trip_over_http() {
    let app = api::router(test_store());
    let (_, created) = submit(&app, "(1+2)*4").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(TASK_PATH)).await;
    assert_eq!(status, StatusCode::OK);
    let task = &body["task"];
    assert_eq!(task["expression_id"], id);
    assert_eq!(task["operation"], "+");
    assert_eq!(task["arg1"], 1.0);
    assert_eq!(task["arg2"], 2.0);
    assert_eq!(task["operation_time"], 0);

    let report = json!({ "id": task["id"], "result": 3.0 });
    let (status, body) = send(&app, post_json(TASK_PATH, report.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    // The same report twice is stale.
    let (status, _) = send(&app, post_json(TASK_PATH, report)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, get(TASK_PATH)).await;
    let task = &body["task"];
    assert_eq!(task["operation"], "*");
    assert_eq!(task["arg1"], 3.0);
    assert_eq!(task["arg2"], 4.0);
    let (status, _) = send(
        &app,
        post_json(TASK_PATH, json!({ "id": task["id"], "result": 12.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get(&format!("{}/{}", EXPRESSIONS_PATH, id))).await;
    assert_eq!(body["expression"]["status"], "done");
    assert_eq!(body["expression"]["result"], 12.0);
}

#[tokio::test]
async fn test_failure_report_over_http() {
    let app = api::router(test_store());
    let (_, created) = submit(&app, "7/(3-3)").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, get(TASK_PATH)).await;
    send(
        &app,
        post_json(TASK_PATH, json!({ "id": body["task"]["id"], "result": 0.0 })),
    )
    .await;

    let (_, body) = send(&app, get(TASK_PATH)).await;
    assert_eq!(body["task"]["operation"], "/");
    let (status, _) = send(
        &app,
        post_json(
            TASK_PATH,
            json!({ "id": body["task"]["id"], "error": "division by zero" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get(&format!("{}/{}", EXPRESSIONS_PATH, id))).await;
    assert_eq!(body["expression"]["status"], "failed");
    assert_eq!(body["expression"]["error"], "division by zero");
}

#[tokio::test]
async fn test_invalid_reports_are_bad_requests() {
    let app = api::router(test_store());
    submit(&app, "1+1").await;
    let (_, body) = send(&app, get(TASK_PATH)).await;
    let task_id = body["task"]["id"].clone();

    let both = json!({ "id": task_id, "result": 2.0, "error": "nope" });
    let (status, _) = send(&app, post_json(TASK_PATH, both)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let neither = json!({ "id": task_id });
    let (status, _) = send(&app, post_json(TASK_PATH, neither)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let blank = json!({ "id": task_id, "error": "  " });
    let (status, _) = send(&app, post_json(TASK_PATH, blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected reports leave the lease usable.
    let good = json!({ "id": task_id, "result": 2.0 });
    let (status, _) = send(&app, post_json(TASK_PATH, good)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_report_for_unknown_task_is_not_found() {
    let app = api::router(test_store());
    let report = json!({ "id": TaskId::new(), "result": 1.0 });
    let (status, _) = send(&app, post_json(TASK_PATH, report)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_preserves_submission_order() {
    let app = api::router(test_store());
    let mut ids = Vec::new();
    for source in ["1+1", "42", "2*(3+4)"] {
        let (_, body) = submit(&app, source).await;
        ids.push(body["id"].clone());
    }

    let (status, body) = send(&app, get(EXPRESSIONS_PATH)).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<_> = body["expressions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].clone())
        .collect();
    assert_eq!(listed, ids);
    assert_eq!(body["expressions"][1]["status"], "done");
    assert_eq!(body["expressions"][1]["result"], 42.0);
}
