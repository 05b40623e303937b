use std::time::{Duration, Instant};

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use storesight_agent::{QueryPipeline, QueryRequest, ReferenceDate};
use storesight_core::config::{AppConfig, LoadOptions};
use storesight_data::build_executor;

use crate::commands::{CommandResult, EXIT_SMOKE_FAILED};

pub const SAMPLE_QUESTION: &str = "What were my top 5 selling products last week?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(pass("config_validation", elapsed_ms, "configuration loaded and validated"));
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(fail("config_validation", elapsed_ms, error.to_string()));
            checks.extend(["store_registry", "executor_construction", "sample_query"].map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let Some(store) = config.stores.first() else {
        checks.push(fail("store_registry", 0, "no stores are registered"));
        checks.extend(["executor_construction", "sample_query"].map(skipped));
        return finalize_report(checks, elapsed_since(started));
    };
    checks.push(pass(
        "store_registry",
        0,
        format!("{} store(s) registered; sampling `{}`", config.stores.len(), store.domain),
    ));

    let today = Utc::now().date_naive();
    let executor = match timed_check(|| build_executor(&config.executor, &config.pipeline, today)) {
        Ok((elapsed_ms, executor)) => {
            checks.push(pass(
                "executor_construction",
                elapsed_ms,
                format!("{} executor ready", executor.name()),
            ));
            executor
        }
        Err((elapsed_ms, error)) => {
            checks.push(fail("executor_construction", elapsed_ms, error.to_string()));
            checks.push(skipped("sample_query"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(fail(
                "sample_query",
                0,
                format!("failed to initialize async runtime: {error}"),
            ));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let pipeline = QueryPipeline::new(
        executor,
        config.pipeline.clone(),
        Duration::from_secs(config.executor.timeout_secs),
    )
    .with_reference_date(ReferenceDate::Fixed(today));
    let request = QueryRequest::new(
        SAMPLE_QUESTION,
        store.domain.clone(),
        store.access_token.expose_secret(),
    )
    .with_request_id("smoke");

    let query_started = Instant::now();
    match runtime.block_on(pipeline.answer(request)) {
        Ok(answer) if answer.metadata.validation.passed => checks.push(pass(
            "sample_query",
            elapsed_since(query_started),
            format!(
                "{} row(s), {} confidence",
                answer.metadata.data_quality.rows_returned, answer.confidence
            ),
        )),
        Ok(_) => checks.push(fail(
            "sample_query",
            elapsed_since(query_started),
            "sample query answered without passing validation",
        )),
        Err(error) => checks
            .push(fail("sample_query", elapsed_since(query_started), error.to_string())),
    }

    finalize_report(checks, elapsed_since(started))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn pass(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
}

fn fail(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult {
        exit_code: if failed { EXIT_SMOKE_FAILED } else { 0 },
        output: format!("{human}\n{machine}"),
    }
}
