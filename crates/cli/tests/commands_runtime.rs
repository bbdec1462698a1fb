use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use vaxline_cli::commands::{ask, doctor, migrate, seed, start};

const SERVICE_ACCOUNT: &str = include_str!("../../nlu/tests/fixtures/service_account.json");

fn valid_env(database_url: &str) -> Vec<(&'static str, String)> {
    vec![
        ("VAXLINE_DATABASE_URL", database_url.to_string()),
        ("VAXLINE_DIALOGFLOW_PROJECT_ID", "vaxline-test".to_string()),
        ("VAXLINE_DIALOGFLOW_CREDENTIALS_JSON", SERVICE_ACCOUNT.to_string()),
    ]
}

#[test]
fn start_returns_success_with_valid_env() {
    with_env(&valid_env("sqlite::memory:"), || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("/sms"));
    });
}

#[test]
fn start_returns_config_failure_without_credentials() {
    with_env(&[("VAXLINE_DIALOGFLOW_PROJECT_ID", "vaxline-test".to_string())], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&valid_env("sqlite::memory:"), || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_lists_the_loaded_entries() {
    with_env(&valid_env("sqlite::memory:"), || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("  - kb-measles"));
        assert!(message.contains("  - kb-polio"));
        assert!(message.contains("  - kb-side-effects"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display());

    with_env(&valid_env(&database_url), || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn doctor_reports_empty_knowledge_base_as_warning() {
    with_env(&valid_env("sqlite::memory:"), || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "warnings do not fail doctor: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "warn");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("dialogflow_credentials"), "pass");
        assert_eq!(status_of("database_connectivity"), "pass");
        assert_eq!(status_of("store_schema"), "warn");
    });
}

#[test]
fn doctor_fails_and_skips_dependent_checks_when_config_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let statuses: Vec<&str> = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().filter_map(|check| check["status"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(statuses, ["fail", "skipped", "skipped", "skipped"]);
    });
}

#[test]
fn ask_reports_bootstrap_failure_as_structured_error() {
    with_env(&[], || {
        let result = ask::run("+15551234567", "tell me about measles");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, String)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VAXLINE_DATABASE_URL",
        "VAXLINE_DATABASE_MAX_CONNECTIONS",
        "VAXLINE_DATABASE_TIMEOUT_SECS",
        "VAXLINE_DIALOGFLOW_PROJECT_ID",
        "VAXLINE_DIALOGFLOW_CREDENTIALS_JSON",
        "VAXLINE_DIALOGFLOW_LANGUAGE_CODE",
        "VAXLINE_DIALOGFLOW_BASE_URL",
        "VAXLINE_DIALOGFLOW_TOKEN_URL",
        "VAXLINE_DIALOGFLOW_TIMEOUT_SECS",
        "DIALOGFLOW_PROJECT_ID",
        "GOOGLE_APPLICATION_CREDENTIALS_JSON",
        "VAXLINE_STORE_TIMEOUT_SECS",
        "VAXLINE_SERVER_BIND_ADDRESS",
        "VAXLINE_SERVER_PORT",
        "VAXLINE_SERVER_WEBHOOK_PATH",
        "VAXLINE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "VAXLINE_LOGGING_LEVEL",
        "VAXLINE_LOGGING_FORMAT",
        "VAXLINE_LOG_LEVEL",
        "VAXLINE_LOG_FORMAT",
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
