//! HTTP routes.
//!
//! - `POST /api/conversations`: send a message, starting a conversation
//!   when `conversation_id` is absent
//! - `GET /api/conversations/{conversation_id}`: full history
//! - `GET /health`: liveness probe
//!
//! Every route shares one request deadline. A request that reaches it gets
//! a `504` with the usual error body.

use crate::error::{ApiError, request_timeout_response};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use contrarian_ai::CompletionProvider;
use contrarian_conversation::ConversationStore;
use contrarian_debate::{DebateOrchestrator, DebateReply, DebateRequest};
use serde_json::{Value as JsonValue, json};
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Store behind the router.
pub type SharedStore = Arc<dyn ConversationStore>;
/// Provider behind the router.
pub type SharedProvider = Arc<dyn CompletionProvider>;
/// The orchestrator as wired into the server.
pub type Orchestrator = DebateOrchestrator<SharedStore, SharedProvider>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

/// Builds the API router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/conversations", post(send_message))
        .route("/api/conversations/{conversation_id}", get(get_conversation))
        .route("/health", get(health))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::map_response(timeout_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves static frontend files for any path the API does not claim.
pub fn with_static_dir(router: Router, dir: impl AsRef<FsPath>) -> Router {
    router.fallback_service(ServeDir::new(dir))
}

/// Handlers never answer `504`, so one here came from the deadline layer.
async fn timeout_body(response: Response) -> Response {
    if response.status() == StatusCode::GATEWAY_TIMEOUT {
        request_timeout_response()
    } else {
        response
    }
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<DebateRequest>,
) -> Result<Json<DebateReply>, ApiError> {
    let conversation = state.orchestrator.handle(&request).await?;
    Ok(Json(DebateReply::from(conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<DebateReply>, ApiError> {
    let conversation = state.orchestrator.conversation(&conversation_id).await?;
    Ok(Json(DebateReply::from(conversation)))
}

async fn health() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use contrarian_ai::{FailureKind, Outcome, ProviderError, RetryPolicy, ScriptedProvider};
    use contrarian_conversation::InMemoryConversationStore;
    use tower::ServiceExt;

    fn app(provider: ScriptedProvider) -> Router {
        app_with(
            provider,
            RetryPolicy::default()
                .with_max_attempts(2)
                .with_backoff(Duration::from_millis(1), Duration::from_millis(2)),
            Duration::from_secs(30),
        )
    }

    fn app_with(provider: ScriptedProvider, retry: RetryPolicy, timeout: Duration) -> Router {
        let orchestrator: Orchestrator = DebateOrchestrator::new(
            Arc::new(InMemoryConversationStore::new()) as SharedStore,
            Arc::new(provider) as SharedProvider,
        )
        .with_retry_policy(retry);
        router(AppState::new(orchestrator), timeout)
    }

    fn post_json(body: JsonValue) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/conversations")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_path(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = send(&app(ScriptedProvider::new()), get_path("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn new_message_starts_a_conversation() {
        let app = app(ScriptedProvider::always(Outcome::reply(
            "The sky is only blue by accident of scattering.",
        )));

        let (status, body) = send(
            &app,
            post_json(json!({"conversation_id": null, "message": "The sky is blue"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            body["conversation_id"]
                .as_str()
                .is_some_and(|id| id.starts_with("conv_"))
        );
        assert_eq!(body["topic"], "The sky is blue");
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["text"], "The sky is blue");
        assert_eq!(messages[1]["role"], "bot");
        assert!(messages[1]["created_at"].is_string());
    }

    #[tokio::test]
    async fn follow_up_and_lookup() {
        let app = app(ScriptedProvider::new());
        let (_, created) = send(&app, post_json(json!({"message": "Cats are best"}))).await;
        let id = created["conversation_id"].as_str().expect("id").to_string();

        let (status, continued) = send(
            &app,
            post_json(json!({"conversation_id": id, "message": "Cats purr"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(continued["messages"].as_array().map(Vec::len), Some(4));
        assert_eq!(continued["messages"][3]["text"], "I disagree: Cats purr");

        let (status, fetched) = send(&app, get_path(&format!("/api/conversations/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["messages"], continued["messages"]);
        assert!(fetched["updated_at"].is_string());
    }

    #[tokio::test]
    async fn blank_message_is_bad_request() {
        let (status, body) = send(
            &app(ScriptedProvider::new()),
            post_json(json!({"message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let app = app(ScriptedProvider::new());

        let (status, body) = send(
            &app,
            post_json(json!({"conversation_id": "unknown-id", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "conversation_not_found");

        let (status, _) = send(&app, get_path("/api/conversations/unknown-id")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generation_failure_is_bad_gateway_without_details() {
        let app = app(ScriptedProvider::always(Outcome::Fail(ProviderError::failed(
            FailureKind::ServerError,
            "upstream exploded at 10.0.0.7",
        ))));

        let (status, body) = send(&app, post_json(json!({"message": "The sky is blue"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["kind"], "generation_failed");
        let message = body["error"]["message"].as_str().expect("message");
        assert!(!message.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn stalled_provider_within_budget_is_generation_failed() {
        let retry = RetryPolicy::default()
            .with_max_attempts(2)
            .with_attempt_timeout(Duration::from_millis(20))
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2));
        let app = app_with(
            ScriptedProvider::always(Outcome::Stall),
            retry,
            Duration::from_secs(5),
        );

        let (status, body) = send(&app, post_json(json!({"message": "The sky is blue"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["kind"], "generation_failed");
    }

    #[tokio::test]
    async fn request_deadline_returns_structured_timeout() {
        let retry = RetryPolicy::default()
            .with_max_attempts(3)
            .with_attempt_timeout(Duration::from_millis(60))
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2));
        let app = app_with(
            ScriptedProvider::always(Outcome::Stall),
            retry,
            Duration::from_millis(100),
        );

        let (status, body) = send(&app, post_json(json!({"message": "The sky is blue"}))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["kind"], "request_timeout");
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/conversations")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, _) = send(&app(ScriptedProvider::new()), request).await;
        assert!(status.is_client_error());
    }
}
