use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use storesight_core::config::PipelineConfig;
use storesight_core::{
    Answer, AnswerMetadata, DataExecutor, DataQuality, ExecutorError, PipelineError, Rejection,
    StoreContext,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::formatter::AnswerFormatter;
use crate::generator::QueryGenerator;
use crate::planner::SourcePlanner;
use crate::validator::QueryValidator;

#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub question: String,
    pub store: StoreContext,
    /// Correlation id supplied by the caller; generated when absent.
    pub request_id: Option<String>,
}

impl QueryRequest {
    pub fn new(
        question: impl Into<String>,
        store_domain: impl Into<String>,
        access_credential: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            store: StoreContext::new(store_domain, access_credential),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Source of the reference date windows are computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceDate {
    Today,
    Fixed(NaiveDate),
}

impl ReferenceDate {
    pub fn resolve(&self) -> NaiveDate {
        match self {
            Self::Today => Utc::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

pub struct QueryPipeline {
    classifier: IntentClassifier,
    planner: SourcePlanner,
    validator: QueryValidator,
    executor: Arc<dyn DataExecutor>,
    settings: PipelineConfig,
    executor_timeout: Duration,
    reference_date: ReferenceDate,
}

impl QueryPipeline {
    pub fn new(
        executor: Arc<dyn DataExecutor>,
        settings: PipelineConfig,
        executor_timeout: Duration,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(&settings),
            planner: SourcePlanner::new(),
            validator: QueryValidator::new(settings.row_cap),
            executor,
            settings,
            executor_timeout,
            reference_date: ReferenceDate::Today,
        }
    }

    pub fn with_reference_date(mut self, reference_date: ReferenceDate) -> Self {
        self.reference_date = reference_date;
        self
    }

    pub fn reference_date(&self) -> ReferenceDate {
        self.reference_date
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    pub async fn answer(&self, request: QueryRequest) -> Result<Answer, PipelineError> {
        let started = Instant::now();
        let request_id = request.request_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let question = request.question.trim();

        if question.is_empty() {
            return Err(PipelineError::InvalidInput("question must not be empty".to_string()));
        }
        if request.store.domain.trim().is_empty() {
            return Err(PipelineError::InvalidInput("store_domain must not be empty".to_string()));
        }

        let today = self.reference_date.resolve();

        let intent = self.classifier.classify(question);
        info!(
            event_name = "agent.intent.classified",
            correlation_id = %request_id,
            category = %intent.category,
            period_days = intent.time_period.in_days(),
            entities = intent.entities.len(),
            "question classified"
        );

        let plan = self.planner.plan(&intent).map_err(|plan_error| {
            error!(
                event_name = "agent.plan.invariant_violation",
                correlation_id = %request_id,
                category = %intent.category,
                error = %plan_error,
                "classified intent has no plan"
            );
            PipelineError::InvariantViolation(plan_error.to_string())
        })?;
        info!(
            event_name = "agent.plan.built",
            correlation_id = %request_id,
            aggregation = %plan.aggregation_type,
            tables = plan.data_sources.len(),
            "data sources planned"
        );

        let query = QueryGenerator::new(today, &self.settings).generate(&intent, &plan);
        info!(
            event_name = "agent.query.generated",
            correlation_id = %request_id,
            query_len = query.len(),
            "query generated"
        );

        let validation = self.validator.validate(&query);
        if !validation.passed {
            let reason =
                validation.reason.clone().unwrap_or_else(|| "unsafe operation".to_string());
            warn!(
                event_name = "agent.query.rejected",
                correlation_id = %request_id,
                reason = %reason,
                "generated query failed validation"
            );
            return Err(PipelineError::Rejected(Rejection {
                reason,
                checks: validation.checks,
                intent: intent.category,
            }));
        }
        info!(
            event_name = "agent.query.validated",
            correlation_id = %request_id,
            checks = validation.checks.len(),
            "query passed validation"
        );

        let execution = self.executor.execute(&request.store, &query, &intent);
        let rows = match tokio::time::timeout(self.executor_timeout, execution).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(executor_error)) => {
                return Err(self.executor_failure(&request_id, executor_error));
            }
            Err(_) => {
                let timeout_secs = self.executor_timeout.as_secs().max(1);
                let timed_out = ExecutorError::Timeout { timeout_secs };
                return Err(self.executor_failure(&request_id, timed_out));
            }
        };
        info!(
            event_name = "agent.executor.completed",
            correlation_id = %request_id,
            executor = self.executor.name(),
            rows = rows.len(),
            "query executed"
        );

        let formatted =
            AnswerFormatter::new(&self.settings, today).format(&rows, &intent, question);
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            event_name = "agent.answer.formatted",
            correlation_id = %request_id,
            confidence = %formatted.confidence,
            processing_time_ms,
            "answer ready"
        );

        Ok(Answer {
            answer: formatted.text,
            confidence: formatted.confidence,
            generated_query: query,
            intent: intent.category,
            data_sources_used: plan.data_sources.clone(),
            metadata: AnswerMetadata {
                time_period: intent.time_period,
                entities: intent.entities.clone(),
                intent_details: intent,
                planning: plan,
                validation,
                data_quality: DataQuality::from_rows(&rows),
                processing_time_ms,
                request_id,
            },
        })
    }

    fn executor_failure(&self, request_id: &str, executor_error: ExecutorError) -> PipelineError {
        warn!(
            event_name = "agent.executor.failed",
            correlation_id = %request_id,
            executor = self.executor.name(),
            error = %executor_error,
            "data executor failed"
        );
        PipelineError::Executor(executor_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use storesight_core::config::PipelineConfig;
    use storesight_core::{
        Category, DataExecutor, ExecutorError, Intent, PipelineError, Row, StoreContext,
    };

    use super::{QueryPipeline, QueryRequest, ReferenceDate};

    struct FailingExecutor;

    #[async_trait]
    impl DataExecutor for FailingExecutor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(
            &self,
            _store: &StoreContext,
            _query: &str,
            _intent: &Intent,
        ) -> Result<Vec<Row>, ExecutorError> {
            Err(ExecutorError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl DataExecutor for SlowExecutor {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn execute(
            &self,
            _store: &StoreContext,
            _query: &str,
            _intent: &Intent,
        ) -> Result<Vec<Row>, ExecutorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn pipeline(executor: Arc<dyn DataExecutor>, timeout: Duration) -> QueryPipeline {
        QueryPipeline::new(executor, PipelineConfig::default(), timeout).with_reference_date(
            ReferenceDate::Fixed(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default()),
        )
    }

    fn request(question: &str) -> QueryRequest {
        QueryRequest::new(question, "demo-store.myshopify.com", "mock-token")
    }

    #[tokio::test]
    async fn blank_question_is_invalid_input() {
        let pipeline = pipeline(Arc::new(FailingExecutor), Duration::from_secs(1));
        let error = pipeline.answer(request("   ")).await.expect_err("invalid input");
        assert!(matches!(error, PipelineError::InvalidInput(_)));

        let blank_store = QueryRequest::new("top products", " ", "token");
        let error = pipeline.answer(blank_store).await.expect_err("invalid store");
        assert!(matches!(error, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn executor_errors_surface_as_executor_failures() {
        let pipeline = pipeline(Arc::new(FailingExecutor), Duration::from_secs(1));
        let error = pipeline.answer(request("top selling products")).await.expect_err("executor");

        assert_eq!(
            error,
            PipelineError::Executor(ExecutorError::Unavailable("connection refused".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_executor_times_out() {
        let pipeline = pipeline(Arc::new(SlowExecutor), Duration::from_secs(1));
        let error = pipeline.answer(request("top selling products")).await.expect_err("timeout");

        assert_eq!(error, PipelineError::Executor(ExecutorError::Timeout { timeout_secs: 1 }));
    }

    #[tokio::test]
    async fn rejection_never_calls_the_executor() {
        let pipeline = pipeline(Arc::new(FailingExecutor), Duration::from_secs(1));
        let error = pipeline.answer(request("DROP TABLE orders")).await.expect_err("rejected");

        let PipelineError::Rejected(rejection) = error else {
            panic!("expected rejection, got {error:?}");
        };
        assert!(rejection.reason.starts_with("unsafe operation"));
        assert_eq!(rejection.intent, Category::Sales);
        assert_eq!(rejection.checks.len(), 10);
    }
}
