//! Todoist client against a local fixture server

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tasksync::provider::{DestinationProvider, ProviderError, TodoistClient};
use tasksync::task::{Due, NewTask, TaskId};

type Recorded = Arc<Mutex<Vec<Value>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn client(base_url: &str) -> TodoistClient {
    TodoistClient::new("secret-token")
        .unwrap()
        .with_base_url(base_url)
}

#[tokio::test]
async fn test_list_follows_cursor_pages() {
    let seen: Recorded = Arc::default();
    let record = seen.clone();
    let router = Router::new().route(
        "/tasks",
        get(
            move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
                let record = record.clone();
                async move {
                    record
                        .lock()
                        .unwrap()
                        .push(json!({ "auth": bearer(&headers), "query": query.clone() }));
                    let page = match query.get("cursor").map(String::as_str) {
                        None => json!({
                            "results": [
                                {"id": "101", "content": "Buy milk", "priority": 4,
                                 "due": {"date": "2026-03-01"}},
                                {"id": "102", "content": "Done", "checked": true}
                            ],
                            "next_cursor": "page-2"
                        }),
                        Some(_) => json!({
                            "results": [{"id": 103, "content": "Call Alice"}],
                            "next_cursor": null
                        }),
                    };
                    Json(page)
                }
            },
        ),
    );
    let base = serve(router).await;

    let tasks = client(&base).list_open_tasks().await.unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Buy milk", "Call Alice"]);
    assert_eq!(tasks[0].priority, Some(4));
    assert_eq!(
        tasks[0].due,
        Some(Due::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
    );
    assert_eq!(tasks[1].id, TaskId::from("103"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0]["auth"], "Bearer secret-token");
    assert_eq!(seen[1]["query"]["cursor"], "page-2");
}

#[tokio::test]
async fn test_list_accepts_bare_array_and_project_filter() {
    let seen: Recorded = Arc::default();
    let record = seen.clone();
    let router = Router::new().route(
        "/tasks",
        get(move |Query(query): Query<HashMap<String, String>>| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(json!(query));
                Json(json!([{"id": "1", "content": "Inbox zero"}]))
            }
        }),
    );
    let base = serve(router).await;

    let tasks = client(&base)
        .with_project(Some("2203306141".into()))
        .list_open_tasks()
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(seen.lock().unwrap()[0]["project_id"], "2203306141");
}

#[tokio::test]
async fn test_create_sends_mapped_fields() {
    let seen: Recorded = Arc::default();
    let record = seen.clone();
    let router = Router::new().route(
        "/tasks",
        get(|| async { Json(json!([])) }).post(move |Json(body): Json<Value>| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(body.clone());
                Json(json!({"id": "6X7rM8997g3RQmvh", "content": body["content"]}))
            }
        }),
    );
    let base = serve(router).await;

    let task = NewTask {
        title: "Pay rent".into(),
        description: Some("landlord".into()),
        due: Some(Due::Date(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())),
        priority: Some(3),
    };
    let id = client(&base).create_task(&task).await.unwrap();
    assert_eq!(id, TaskId::from("6X7rM8997g3RQmvh"));

    let body = &seen.lock().unwrap()[0];
    assert_eq!(body["content"], "Pay rent");
    assert_eq!(body["description"], "landlord");
    assert_eq!(body["due_date"], "2026-04-01");
    assert_eq!(body["priority"], 3);
    assert!(body.get("due_datetime").is_none());
    assert!(body.get("project_id").is_none());
}

async fn failing_client(status: StatusCode) -> TodoistClient {
    let router = Router::new().route(
        "/tasks",
        get(move || async move { (status, Json(json!({"error": "nope"}))) })
            .post(move || async move { (status, Json(json!({"error": "nope"}))) }),
    );
    client(&serve(router).await)
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let task = NewTask {
        title: "A".into(),
        description: None,
        due: None,
        priority: None,
    };

    let unauthorized = failing_client(StatusCode::UNAUTHORIZED).await;
    assert!(matches!(
        unauthorized.list_open_tasks().await,
        Err(ProviderError::Authentication(_))
    ));

    let unavailable = failing_client(StatusCode::SERVICE_UNAVAILABLE).await;
    assert!(matches!(
        unavailable.create_task(&task).await,
        Err(ProviderError::Transient(_))
    ));

    let rate_limited = failing_client(StatusCode::TOO_MANY_REQUESTS).await;
    assert!(matches!(
        rate_limited.create_task(&task).await,
        Err(ProviderError::Transient(_))
    ));

    let bad_request = failing_client(StatusCode::BAD_REQUEST).await;
    assert!(matches!(
        bad_request.create_task(&task).await,
        Err(ProviderError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(&format!("http://{}", addr)).list_open_tasks().await;
    assert!(matches!(result, Err(ProviderError::Transient(_))));
}
