use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use xbot_ai::{
    AiError, GeminiImageClient, ImageGenerator, ImageRequest, OpenAiCompatibleClient,
    TextGenerator, generate_with_fallback,
};

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
    headers: Arc<Mutex<Vec<String>>>,
    keys: Arc<Mutex<Vec<String>>>,
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

async fn completions(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    captured.headers.lock().expect("lock").push(auth);
    let model = body["model"].as_str().unwrap_or_default().to_string();
    captured.bodies.lock().expect("lock").push(body);
    if model == "broken" {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "overloaded" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": format!("summary by {model}") } }]
        })),
    )
}

async fn generate_content(
    State(captured): State<Captured>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured
        .keys
        .lock()
        .expect("lock")
        .push(query.get("key").cloned().unwrap_or_default());
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    captured.bodies.lock().expect("lock").push(body);
    if prompt == "nothing" {
        return Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "refused" }] }, "finishReason": "SAFETY" }]
        }));
    }
    Json(json!({
        "candidates": [{
            "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ] },
            "finishReason": "STOP"
        }]
    }))
}

#[tokio::test]
async fn chat_completion_sends_system_and_user_messages() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(captured.clone());
    let addr = serve(router).await;
    let client = OpenAiCompatibleClient::new(
        &format!("http://{addr}/v1/"),
        "sk-test",
        Duration::from_secs(5),
    )
    .expect("client");

    let text = client
        .generate_text("gpt-test", "be brief", "what happened?")
        .await
        .expect("text");

    assert_eq!(text, "summary by gpt-test");
    let bodies = captured.bodies.lock().expect("lock").clone();
    assert_eq!(bodies[0]["messages"][0], json!({ "role": "system", "content": "be brief" }));
    assert_eq!(bodies[0]["messages"][1]["content"], json!("what happened?"));
    assert_eq!(
        captured.headers.lock().expect("lock").clone(),
        vec!["Bearer sk-test".to_string()]
    );
}

#[tokio::test]
async fn fallback_skips_failing_model_over_http() {
    let router = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(Captured::default());
    let addr = serve(router).await;
    let client =
        OpenAiCompatibleClient::new(&format!("http://{addr}"), "", Duration::from_secs(5))
            .expect("client");

    let models = vec!["broken".to_string(), "backup".to_string()];
    let outcome = generate_with_fallback(&client, &models, "sys", "hi")
        .await
        .expect("outcome");
    assert_eq!(outcome.model, "backup");

    let err = client
        .generate_text("broken", "sys", "hi")
        .await
        .expect_err("status error");
    assert!(matches!(err, AiError::Status { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn gemini_image_is_decoded_with_default_sampling() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/v1beta/models/{model}",
            post(generate_content),
        )
        .with_state(captured.clone());
    let addr = serve(router).await;
    let client = GeminiImageClient::new(
        &format!("http://{addr}"),
        "g-key",
        "",
        Duration::from_secs(5),
    )
    .expect("client");

    let image = client
        .generate_image(&ImageRequest::new("a lighthouse"))
        .await
        .expect("image");

    assert_eq!(image.data, vec![1, 2, 3]);
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.finish_reason, "STOP");
    let bodies = captured.bodies.lock().expect("lock").clone();
    assert_eq!(
        bodies[0]["generationConfig"],
        json!({ "temperature": 0.7, "topK": 40, "topP": 0.95, "candidateCount": 1 })
    );
    assert_eq!(captured.keys.lock().expect("lock").clone(), vec!["g-key".to_string()]);
}

#[tokio::test]
async fn gemini_without_inline_data_is_empty() {
    let router = Router::new()
        .route("/v1beta/models/{model}", post(generate_content))
        .with_state(Captured::default());
    let addr = serve(router).await;
    let client = GeminiImageClient::new(&format!("http://{addr}"), "k", "m", Duration::from_secs(5))
        .expect("client");

    let err = client
        .generate_image(&ImageRequest::new("nothing"))
        .await
        .expect_err("no image");
    assert!(matches!(err, AiError::EmptyResponse(message) if message.contains("SAFETY")));
}
