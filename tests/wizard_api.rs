//! End-to-end tests driving the HTTP router with in-process gateways.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use blueprint_wizard::demo::DemoGateway;
use blueprint_wizard::gateway::{GenerationError, GenerationGateway};
use blueprint_wizard::models::{ApiEndpoint, PagePlan, ProjectInput, SchemaModification, StylingPlan, Table};
use blueprint_wizard::routes::{build_router, AppState};

/// Demo gateway whose styling call can be switched off.
#[derive(Default)]
struct FlakyStyling {
    failing: AtomicBool,
}

#[async_trait]
impl GenerationGateway for FlakyStyling {
    async fn generate_single_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        DemoGateway.generate_single_page_plan(input).await
    }

    async fn generate_multiple_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        DemoGateway.generate_multiple_page_plan(input).await
    }

    async fn generate_styling_plan(&self, input: &ProjectInput) -> Result<StylingPlan, GenerationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Http("HTTP 503: overloaded".into()));
        }
        DemoGateway.generate_styling_plan(input).await
    }

    async fn generate_api_plan(&self, description: &str) -> Result<Vec<ApiEndpoint>, GenerationError> {
        DemoGateway.generate_api_plan(description).await
    }

    async fn generate_schema(&self, description: &str) -> Result<Vec<Table>, GenerationError> {
        DemoGateway.generate_schema(description).await
    }

    async fn modify_schema(&self, schema: &[Table], instruction: &str) -> Result<SchemaModification, GenerationError> {
        DemoGateway.modify_schema(schema, instruction).await
    }
}

/// Demo gateway whose styling call takes a while to answer.
struct SlowStyling {
    delay: Duration,
}

#[async_trait]
impl GenerationGateway for SlowStyling {
    async fn generate_single_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        DemoGateway.generate_single_page_plan(input).await
    }

    async fn generate_multiple_page_plan(&self, input: &ProjectInput) -> Result<PagePlan, GenerationError> {
        DemoGateway.generate_multiple_page_plan(input).await
    }

    async fn generate_styling_plan(&self, input: &ProjectInput) -> Result<StylingPlan, GenerationError> {
        tokio::time::sleep(self.delay).await;
        DemoGateway.generate_styling_plan(input).await
    }

    async fn generate_api_plan(&self, description: &str) -> Result<Vec<ApiEndpoint>, GenerationError> {
        DemoGateway.generate_api_plan(description).await
    }

    async fn generate_schema(&self, description: &str) -> Result<Vec<Table>, GenerationError> {
        DemoGateway.generate_schema(description).await
    }

    async fn modify_schema(&self, schema: &[Table], instruction: &str) -> Result<SchemaModification, GenerationError> {
        DemoGateway.modify_schema(schema, instruction).await
    }
}

fn app_with(gateway: Arc<dyn GenerationGateway>) -> Router {
    build_router(AppState::new(gateway))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn create(app: &Router, input: Value) -> String {
    let (status, body) = send(app, Method::POST, "/api/wizard", Some(input)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn walks_all_four_steps_and_hands_off() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "multi-page", "purpose": "shop", "colors": "green"})).await;

    let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(body["state"]["currentStep"], 1);
    assert_eq!(body["draft"]["pages"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/wizard/{id}/edits"),
        Some(json!({"op": "delete_component", "pageIndex": 0, "componentIndex": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["draft"]["pages"][0]["components"], json!(["Header", "Footer"]));

    for expected_step in 2..=4 {
        let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["currentStep"], expected_step);
        assert_eq!(body["state"]["error"]["status"], "ok");
    }

    let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(body["draft"]["pages"][0]["components"], json!(["Header", "Footer"]));
    assert_eq!(body["connectors"], json!([{"from": 1, "to": 0}]));

    let (status, payload) = send(&app, Method::POST, &format!("/api/wizard/{id}/save"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["purpose"], "shop");
    assert_eq!(payload["apis"].as_array().unwrap().len(), 4);
    assert_eq!(payload["databaseSchema"][1]["tableName"], "items");

    let (status, _) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_step_blocks_advance_until_retry() {
    let gateway = Arc::new(FlakyStyling::default());
    let app = app_with(gateway.clone());
    let id = create(&app, json!({"appType": "single", "purpose": "todo app"})).await;

    gateway.failing.store(true, Ordering::SeqCst);
    let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["currentStep"], 2);
    assert_eq!(body["state"]["error"]["status"], "failed");
    assert_eq!(body["state"]["error"]["message"], "Failed to progress to the next step. Please try again.");
    assert!(body["draft"]["styling"].is_null());

    let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    gateway.failing.store(false, Ordering::SeqCst);
    let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["error"]["status"], "ok");
    assert!(body["draft"]["styling"]["colors"]["primary"].is_string());

    let (status, _) = send(&app, Method::POST, &format!("/api/wizard/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn editing_input_on_first_step_replans() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "multi-page", "purpose": "blog"})).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/wizard/{id}/input"),
        Some(json!({"field": "appType", "value": "single"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"]["appType"], "single");
    assert_eq!(body["draft"]["pages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn schema_prompt_modifies_and_closes_dialog() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "single", "purpose": "notes"})).await;
    for _ in 0..3 {
        send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None).await;
    }
    send(&app, Method::POST, &format!("/api/wizard/{id}/edits"), Some(json!({"op": "open_schema_prompt"}))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/wizard/{id}/schema/prompt"),
        Some(json!({"prompt": "add timestamps"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schemaPrompt"]["open"], false);
    let columns = body["draft"]["databaseSchema"][0]["columns"].as_array().unwrap();
    assert!(columns.iter().any(|c| c["name"] == "created_at"));
}

#[tokio::test]
async fn early_save_and_unknown_sessions_are_rejected() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "single", "purpose": "notes"})).await;

    let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/save"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, Method::POST, &format!("/api/wizard/{missing}/advance"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hung_up_advance_still_completes_and_frees_the_session() {
    let app = app_with(Arc::new(SlowStyling { delay: Duration::from_millis(300) }));
    let id = create(&app, json!({"appType": "single", "purpose": "todo app"})).await;

    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None),
    )
    .await;
    assert!(dropped.is_err());

    let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert_eq!(body["state"]["currentStep"], 2);
    assert_eq!(body["state"]["loading"], true);

    let mut settled = Value::Null;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
        if body["state"]["loading"] == false {
            settled = body;
            break;
        }
    }
    assert_eq!(settled["state"]["error"]["status"], "ok");
    assert!(settled["draft"]["styling"]["colors"]["primary"].is_string());

    let (status, body) = send(&app, Method::POST, &format!("/api/wizard/{id}/advance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["currentStep"], 3);
}

#[tokio::test]
async fn schema_prompt_is_refused_before_schema_step() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "single", "purpose": "notes"})).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/wizard/{id}/schema/prompt"),
        Some(json!({"prompt": "add timestamps"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert!(body["draft"]["databaseSchema"].is_null());
    assert_eq!(body["state"]["loading"], false);
}

#[tokio::test]
async fn session_view_keys_are_camel_case() {
    let app = app_with(Arc::new(DemoGateway));
    let id = create(&app, json!({"appType": "single", "purpose": "notes"})).await;

    let (_, body) = send(&app, Method::GET, &format!("/api/wizard/{id}"), None).await;
    assert!(body["createdAt"].is_string());
    assert!(body["updatedAt"].is_string());
    assert!(body.get("created_at").is_none());
    assert!(body.get("schema_prompt").is_none());
    assert!(body["state"].get("current_step").is_none());
    assert_eq!(body["schemaPrompt"]["open"], false);
}
