//! HTTP surface for the query pipeline.
//!
//! Endpoints:
//! - `POST /agent/query` - answer a question for a registered store
//! - `GET  /health`      - runtime and executor status

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use storesight_agent::QueryRequest;
use storesight_core::{Answer, InterfaceError, StoreContext};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;
use crate::health;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    pub question: String,
    pub store_domain: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub error: String,
    pub message: String,
    pub detail: String,
    pub correlation_id: String,
}

pub type GatewayResult<T> = Result<Json<T>, (StatusCode, Json<GatewayError>)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agent/query", post(answer_query))
        .route("/health", get(health::health))
        .with_state(state)
}

pub async fn answer_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AgentQuery>,
) -> GatewayResult<Answer> {
    let correlation_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let question = body.question.trim();
    let store_domain = body.store_domain.trim();
    if question.is_empty() || store_domain.is_empty() {
        return Err(reject(InterfaceError::BadRequest {
            message: "question and store_domain are required".to_string(),
            correlation_id,
        }));
    }

    let Some(store) = state.config.find_store(store_domain) else {
        return Err(reject(InterfaceError::unknown_store(store_domain, correlation_id)));
    };

    let request = QueryRequest {
        question: question.to_string(),
        store: StoreContext::new(store.domain.clone(), store.access_token.expose_secret()),
        request_id: Some(correlation_id.clone()),
    };

    match state.pipeline.answer(request).await {
        Ok(answer) => {
            info!(
                event_name = "gateway.query.answered",
                correlation_id = %correlation_id,
                store_domain = %store.domain,
                confidence = %answer.confidence,
                "question answered"
            );
            Ok(Json(answer))
        }
        Err(pipeline_error) => {
            let error_class = pipeline_error.error_class();
            let interface = pipeline_error.into_interface(correlation_id);
            warn!(
                event_name = "gateway.query.failed",
                correlation_id = %interface.correlation_id(),
                store_domain = %store.domain,
                error_class,
                status = interface.status_code(),
                "question could not be answered"
            );
            Err(reject(interface))
        }
    }
}

fn reject(error: InterfaceError) -> (StatusCode, Json<GatewayError>) {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error_label = match &error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::NotFound { .. } => "not_found",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };

    (
        status,
        Json(GatewayError {
            error: error_label.to_string(),
            message: error.user_message().to_string(),
            detail: error.message().to_string(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{HeaderMap, HeaderValue, Request, StatusCode},
        Json,
    };
    use chrono::NaiveDate;
    use storesight_agent::{QueryPipeline, ReferenceDate};
    use storesight_core::config::AppConfig;
    use storesight_core::{Category, ExecutorError, Intent, Row, StoreContext};
    use tower::ServiceExt;

    use super::*;
    use crate::bootstrap::{build_application, Application};

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default()
    }

    fn state() -> AppState {
        let app = build_application(AppConfig::default(), anchor()).expect("bootstrap");
        Arc::new(Application {
            pipeline: app.pipeline.with_reference_date(ReferenceDate::Fixed(anchor())),
            config: app.config,
        })
    }

    struct DownExecutor;

    #[async_trait::async_trait]
    impl storesight_core::DataExecutor for DownExecutor {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn execute(
            &self,
            _store: &StoreContext,
            _query: &str,
            _intent: &Intent,
        ) -> Result<Vec<Row>, ExecutorError> {
            Err(ExecutorError::Unavailable("store backend offline".to_string()))
        }
    }

    fn query(question: &str, store_domain: &str) -> Json<AgentQuery> {
        Json(AgentQuery { question: question.to_string(), store_domain: store_domain.to_string() })
    }

    #[tokio::test]
    async fn answers_questions_for_registered_stores() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-gw-1"));

        let Json(answer) = answer_query(
            State(state()),
            headers,
            query("What were my top 5 selling products last week?", "demo-store.myshopify.com"),
        )
        .await
        .expect("answer");

        assert_eq!(answer.intent, Category::Sales);
        assert_eq!(answer.metadata.request_id, "req-gw-1");
        assert!(answer.generated_query.contains("LIMIT 5"));
    }

    #[tokio::test]
    async fn blank_fields_are_bad_requests() {
        let error =
            answer_query(State(state()), HeaderMap::new(), query("  ", "demo-store.myshopify.com"))
                .await
                .expect_err("bad request");

        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert_eq!(error.1.error, "bad_request");
    }

    #[tokio::test]
    async fn unknown_store_is_not_found() {
        let error =
            answer_query(State(state()), HeaderMap::new(), query("top products", "ghost.example"))
                .await
                .expect_err("not found");

        assert_eq!(error.0, StatusCode::NOT_FOUND);
        assert!(error.1.detail.contains("ghost.example"));
    }

    #[tokio::test]
    async fn rejected_query_is_bad_request_with_reason() {
        let error = answer_query(
            State(state()),
            HeaderMap::new(),
            query("DROP TABLE orders", "demo-store.myshopify.com"),
        )
        .await
        .expect_err("rejected");

        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert!(error.1.detail.contains("unsafe operation"));
        assert!(!error.1.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn executor_outage_is_service_unavailable() {
        let config = AppConfig::default();
        let pipeline = QueryPipeline::new(
            Arc::new(DownExecutor),
            config.pipeline.clone(),
            Duration::from_secs(1),
        );
        let state = Arc::new(Application { config, pipeline });

        let request = query("top products", "demo-store.myshopify.com");
        let error =
            answer_query(State(state), HeaderMap::new(), request).await.expect_err("unavailable");

        assert_eq!(error.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.1.error, "service_unavailable");
    }

    #[tokio::test]
    async fn router_serves_query_and_health() {
        let app = router(state());

        let response = app
            .clone()
            .oneshot(
                Request::post("/agent/query")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"question":"Show me inventory levels","store_domain":"DEMO-STORE.myshopify.com"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["intent"], "inventory");

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
