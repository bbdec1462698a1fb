use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dialogflow: DialogflowConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DialogflowConfig {
    pub project_id: String,
    pub credentials_json: Option<SecretString>,
    pub language_code: String,
    pub base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub webhook_path: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// The two fields of a Google service-account bundle the NLU client signs with.
#[derive(Clone, Debug)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
}

#[derive(Deserialize)]
struct ServiceAccountBundle {
    client_email: Option<String>,
    private_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub dialogflow_project_id: Option<String>,
    pub dialogflow_credentials_json: Option<String>,
    pub dialogflow_base_url: Option<String>,
    pub dialogflow_token_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vaxline.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            dialogflow: DialogflowConfig {
                project_id: String::new(),
                credentials_json: None,
                language_code: "en-US".to_string(),
                base_url: "https://dialogflow.googleapis.com".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                timeout_secs: 10,
            },
            store: StoreConfig { timeout_secs: 5 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                webhook_path: "/sms".to_string(),
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl DialogflowConfig {
    /// Extracts `client_email` and `private_key` from the credentials bundle.
    pub fn service_account(&self) -> Result<ServiceAccountKey, ConfigError> {
        let raw = self.credentials_json.as_ref().ok_or_else(|| {
            ConfigError::Validation(
                "dialogflow.credentials_json is required (service-account JSON with client_email and private_key)"
                    .to_string(),
            )
        })?;

        let bundle: ServiceAccountBundle =
            serde_json::from_str(raw.expose_secret()).map_err(|error| {
                ConfigError::Validation(format!(
                    "dialogflow.credentials_json is not valid service-account JSON: {error}"
                ))
            })?;

        let client_email = bundle
            .client_email
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "dialogflow.credentials_json is missing `client_email`".to_string(),
                )
            })?;
        let private_key = bundle
            .private_key
            .filter(|value| value.contains("PRIVATE KEY"))
            .ok_or_else(|| {
                ConfigError::Validation(
                    "dialogflow.credentials_json is missing a PEM `private_key`".to_string(),
                )
            })?;

        Ok(ServiceAccountKey { client_email, private_key: secret_value(private_key) })
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vaxline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(dialogflow) = patch.dialogflow {
            if let Some(project_id) = dialogflow.project_id {
                self.dialogflow.project_id = project_id;
            }
            if let Some(credentials_json) = dialogflow.credentials_json {
                self.dialogflow.credentials_json = Some(secret_value(credentials_json));
            }
            if let Some(language_code) = dialogflow.language_code {
                self.dialogflow.language_code = language_code;
            }
            if let Some(base_url) = dialogflow.base_url {
                self.dialogflow.base_url = base_url;
            }
            if let Some(token_url) = dialogflow.token_url {
                self.dialogflow.token_url = token_url;
            }
            if let Some(timeout_secs) = dialogflow.timeout_secs {
                self.dialogflow.timeout_secs = timeout_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(webhook_path) = server.webhook_path {
                self.server.webhook_path = webhook_path;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VAXLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VAXLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("VAXLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VAXLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VAXLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        // The hosted deployment exported these names; keep accepting them.
        let project_id =
            read_env("VAXLINE_DIALOGFLOW_PROJECT_ID").or_else(|| read_env("DIALOGFLOW_PROJECT_ID"));
        if let Some(value) = project_id {
            self.dialogflow.project_id = value;
        }
        let credentials_json = read_env("VAXLINE_DIALOGFLOW_CREDENTIALS_JSON")
            .or_else(|| read_env("GOOGLE_APPLICATION_CREDENTIALS_JSON"));
        if let Some(value) = credentials_json {
            self.dialogflow.credentials_json = Some(secret_value(value));
        }
        if let Some(value) = read_env("VAXLINE_DIALOGFLOW_LANGUAGE_CODE") {
            self.dialogflow.language_code = value;
        }
        if let Some(value) = read_env("VAXLINE_DIALOGFLOW_BASE_URL") {
            self.dialogflow.base_url = value;
        }
        if let Some(value) = read_env("VAXLINE_DIALOGFLOW_TOKEN_URL") {
            self.dialogflow.token_url = value;
        }
        if let Some(value) = read_env("VAXLINE_DIALOGFLOW_TIMEOUT_SECS") {
            self.dialogflow.timeout_secs = parse_u64("VAXLINE_DIALOGFLOW_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VAXLINE_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("VAXLINE_STORE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VAXLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VAXLINE_SERVER_PORT") {
            self.server.port = parse_u16("VAXLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("VAXLINE_SERVER_WEBHOOK_PATH") {
            self.server.webhook_path = value;
        }
        if let Some(value) = read_env("VAXLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("VAXLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("VAXLINE_LOGGING_LEVEL").or_else(|| read_env("VAXLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VAXLINE_LOGGING_FORMAT").or_else(|| read_env("VAXLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(project_id) = overrides.dialogflow_project_id {
            self.dialogflow.project_id = project_id;
        }
        if let Some(credentials_json) = overrides.dialogflow_credentials_json {
            self.dialogflow.credentials_json = Some(secret_value(credentials_json));
        }
        if let Some(base_url) = overrides.dialogflow_base_url {
            self.dialogflow.base_url = base_url;
        }
        if let Some(token_url) = overrides.dialogflow_token_url {
            self.dialogflow.token_url = token_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_dialogflow(&self.dialogflow)?;
        validate_store(&self.store)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("vaxline.toml"), PathBuf::from("config/vaxline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_dialogflow(dialogflow: &DialogflowConfig) -> Result<(), ConfigError> {
    if dialogflow.project_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dialogflow.project_id is required. Find it in the Dialogflow console > Agent settings > Project ID"
                .to_string(),
        ));
    }

    dialogflow.service_account()?;

    if dialogflow.language_code.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dialogflow.language_code must not be empty".to_string(),
        ));
    }

    for (key, url) in
        [("dialogflow.base_url", &dialogflow.base_url), ("dialogflow.token_url", &dialogflow.token_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if dialogflow.timeout_secs == 0 || dialogflow.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "dialogflow.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.timeout_secs == 0 || store.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if !server.webhook_path.starts_with('/') || server.webhook_path == "/health" {
        return Err(ConfigError::Validation(
            "server.webhook_path must start with `/` and must not be `/health`".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    dialogflow: Option<DialogflowPatch>,
    store: Option<StorePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DialogflowPatch {
    project_id: Option<String>,
    credentials_json: Option<String>,
    language_code: Option<String>,
    base_url: Option<String>,
    token_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    webhook_path: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
