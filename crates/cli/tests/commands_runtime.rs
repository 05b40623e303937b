use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use serde_json::Value;
use storesight_cli::commands::{ask, config, smoke};
use storesight_core::config::{AppConfig, LoadOptions};

#[test]
fn ask_answers_with_default_mock_store() {
    with_env(&[], || {
        let result = ask::run("What were my top 5 selling products last week?", None);
        assert_eq!(result.exit_code, 0, "expected answer, got {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "sales");
        assert_eq!(payload["metadata"]["time_period"]["value"], 7);
        assert!(payload["generated_query"].as_str().unwrap_or_default().contains("LIMIT 5"));
    });
}

#[test]
fn ask_is_reproducible_for_a_fixed_reference_date() {
    with_env(&[], || {
        let config = AppConfig::load(LoadOptions::default()).expect("config");
        let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default();
        let question = "Who are my top 3 customers this month?";

        let first = parse_payload(&ask::answer_with(&config, question, None, today).output);
        let second = parse_payload(&ask::answer_with(&config, question, None, today).output);
        assert_eq!(first["answer"], second["answer"]);
        assert!(first["answer"].as_str().unwrap_or_default().contains("2026-09-14 to 2026-10-14"));
    });
}

#[test]
fn ask_rejects_destructive_questions() {
    with_env(&[], || {
        let result = ask::run("DROP TABLE orders", Some("demo-store.myshopify.com"));
        assert_eq!(result.exit_code, 3, "expected bad input exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "validation_failure");
        assert!(payload["message"].as_str().unwrap_or_default().contains("unsafe operation"));
    });
}

#[test]
fn ask_reports_unknown_store() {
    with_env(&[], || {
        let result = ask::run("top selling products", Some("ghost.example"));
        assert_eq!(result.exit_code, 4, "expected unknown store exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_store");
    });
}

#[test]
fn ask_uses_store_registered_through_env() {
    with_env(
        &[
            ("STORESIGHT_STORE_DOMAIN", "env-store.myshopify.com"),
            ("STORESIGHT_STORE_ACCESS_TOKEN", "shpat_env"),
        ],
        || {
            let result = ask::run("Show me inventory levels", Some("ENV-STORE.myshopify.com"));
            assert_eq!(result.exit_code, 0, "expected answer, got {}", result.output);
            assert_eq!(parse_payload(&result.output)["intent"], "inventory");
        },
    );
}

#[test]
fn ask_returns_config_failure_for_invalid_env() {
    with_env(&[("STORESIGHT_EXECUTOR_MODE", "http")], || {
        let result = ask::run("top selling products", None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_sources_and_redacts_tokens() {
    with_env(
        &[
            ("STORESIGHT_EXECUTOR_TIMEOUT_SECS", "20"),
            ("STORESIGHT_STORE_DOMAIN", "secret.myshopify.com"),
            ("STORESIGHT_STORE_ACCESS_TOKEN", "shpat_secret_value"),
        ],
        || {
            let output = config::run();
            assert!(output.contains("- executor.mode = mock (source: default)"));
            assert!(output.contains(
                "- executor.timeout_secs = 20 (source: env (STORESIGHT_EXECUTOR_TIMEOUT_SECS))"
            ));
            assert!(output.contains("stores[secret.myshopify.com].access_token = shpat-***"));
            assert!(!output.contains("shpat_secret_value"));
        },
    );
}

#[test]
fn smoke_returns_success_report_with_default_config() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("STORESIGHT_EXECUTOR_MODE", "http")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "STORESIGHT_EXECUTOR_MODE",
        "STORESIGHT_EXECUTOR_BASE_URL",
        "STORESIGHT_EXECUTOR_API_VERSION",
        "STORESIGHT_EXECUTOR_TIMEOUT_SECS",
        "STORESIGHT_EXECUTOR_MOCK_SEED",
        "STORESIGHT_PIPELINE_DEFAULT_WINDOW_DAYS",
        "STORESIGHT_PIPELINE_MAX_WINDOW_DAYS",
        "STORESIGHT_PIPELINE_HIGH_CONFIDENCE_DAYS",
        "STORESIGHT_PIPELINE_MEDIUM_CONFIDENCE_DAYS",
        "STORESIGHT_PIPELINE_DENSITY_FLOOR",
        "STORESIGHT_PIPELINE_DEFAULT_TOP_N",
        "STORESIGHT_PIPELINE_ROW_CAP",
        "STORESIGHT_SERVER_BIND_ADDRESS",
        "STORESIGHT_SERVER_PORT",
        "STORESIGHT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "STORESIGHT_STORE_DOMAIN",
        "STORESIGHT_STORE_ACCESS_TOKEN",
        "STORESIGHT_LOGGING_LEVEL",
        "STORESIGHT_LOGGING_FORMAT",
        "STORESIGHT_LOG_LEVEL",
        "STORESIGHT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
