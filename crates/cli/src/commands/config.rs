use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use vaxline_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

fn render(config: &AppConfig, doc: Option<&Value>, path: Option<&Path>) -> String {
    let credentials = redact_credentials(config);
    let fields = vec![
        field("database.url", config.database.url.clone(), &["VAXLINE_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["VAXLINE_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["VAXLINE_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "dialogflow.project_id",
            config.dialogflow.project_id.clone(),
            &["VAXLINE_DIALOGFLOW_PROJECT_ID", "DIALOGFLOW_PROJECT_ID"],
        ),
        field(
            "dialogflow.credentials_json",
            credentials,
            &["VAXLINE_DIALOGFLOW_CREDENTIALS_JSON", "GOOGLE_APPLICATION_CREDENTIALS_JSON"],
        ),
        field(
            "dialogflow.language_code",
            config.dialogflow.language_code.clone(),
            &["VAXLINE_DIALOGFLOW_LANGUAGE_CODE"],
        ),
        field(
            "dialogflow.base_url",
            config.dialogflow.base_url.clone(),
            &["VAXLINE_DIALOGFLOW_BASE_URL"],
        ),
        field(
            "dialogflow.token_url",
            config.dialogflow.token_url.clone(),
            &["VAXLINE_DIALOGFLOW_TOKEN_URL"],
        ),
        field(
            "dialogflow.timeout_secs",
            config.dialogflow.timeout_secs.to_string(),
            &["VAXLINE_DIALOGFLOW_TIMEOUT_SECS"],
        ),
        field(
            "store.timeout_secs",
            config.store.timeout_secs.to_string(),
            &["VAXLINE_STORE_TIMEOUT_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["VAXLINE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["VAXLINE_SERVER_PORT"]),
        field(
            "server.webhook_path",
            config.server.webhook_path.clone(),
            &["VAXLINE_SERVER_WEBHOOK_PATH"],
        ),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["VAXLINE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["VAXLINE_LOGGING_LEVEL", "VAXLINE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["VAXLINE_LOGGING_FORMAT", "VAXLINE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields {
        let source = field_source(field.key, field.env_keys, doc, path);
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    Field { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("vaxline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/vaxline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Shows which service account is configured, never the key material.
fn redact_credentials(config: &AppConfig) -> String {
    match &config.dialogflow.credentials_json {
        None => "<unset>".to_string(),
        Some(raw) if raw.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => match config.dialogflow.service_account() {
            Ok(key) => format!("<redacted service account {}>", key.client_email),
            Err(_) => "<redacted>".to_string(),
        },
    }
}
