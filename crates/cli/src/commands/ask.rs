use std::time::Duration;

use chrono::{NaiveDate, Utc};
use secrecy::ExposeSecret;
use storesight_agent::{QueryPipeline, QueryRequest, ReferenceDate};
use storesight_core::config::{AppConfig, LoadOptions};
use storesight_core::PipelineError;
use storesight_data::build_executor;

use crate::commands::{
    CommandResult, EXIT_BAD_INPUT, EXIT_CONFIG, EXIT_EXECUTOR, EXIT_INTERNAL, EXIT_UNKNOWN_STORE,
};

pub fn run(question: &str, store: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    answer_with(&config, question, store, Utc::now().date_naive())
}

/// Answers `question` for `store`, or for the first registered store when
/// none is named.
pub fn answer_with(
    config: &AppConfig,
    question: &str,
    store: Option<&str>,
    today: NaiveDate,
) -> CommandResult {
    let registered = match store {
        Some(domain) => config.find_store(domain),
        None => config.stores.first(),
    };
    let Some(registered) = registered else {
        let domain = store.unwrap_or("<none>");
        return CommandResult::failure(
            "ask",
            "unknown_store",
            format!("store `{domain}` is not registered"),
            EXIT_UNKNOWN_STORE,
        );
    };

    let executor = match build_executor(&config.executor, &config.pipeline, today) {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "executor_construction",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };
    let pipeline = QueryPipeline::new(
        executor,
        config.pipeline.clone(),
        Duration::from_secs(config.executor.timeout_secs),
    )
    .with_reference_date(ReferenceDate::Fixed(today));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_INTERNAL,
            )
        }
    };

    let request = QueryRequest::new(
        question,
        registered.domain.clone(),
        registered.access_token.expose_secret(),
    );
    match runtime.block_on(pipeline.answer(request)) {
        Ok(answer) => CommandResult::document("ask", &answer),
        Err(error) => {
            let exit_code = match &error {
                PipelineError::InvalidInput(_) | PipelineError::Rejected(_) => EXIT_BAD_INPUT,
                PipelineError::Executor(_) => EXIT_EXECUTOR,
                PipelineError::InvariantViolation(_) => EXIT_INTERNAL,
            };
            CommandResult::failure("ask", error.error_class(), error.to_string(), exit_code)
        }
    }
}
