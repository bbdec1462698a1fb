use serde::Serialize;
use vaxline_core::config::{AppConfig, LoadOptions};
use vaxline_db::repositories::{KnowledgeRepository, ReminderRepository};
use vaxline_db::{
    connect_with_settings, migrations, ping, SqlKnowledgeRepository, SqlReminderRepository,
};
use vaxline_nlu::DialogflowResolver;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self::new(name, CheckStatus::Skipped, format!("skipped because {reason}"))
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_dialogflow_credentials(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["dialogflow_credentials", "database_connectivity", "store_schema"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let any_warn = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if any_fail {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if any_warn {
        (CheckStatus::Warn, "doctor: ready, with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

/// Builds the resolver offline: parses the bundle and loads the RSA signing key.
fn check_dialogflow_credentials(config: &AppConfig) -> DoctorCheck {
    match DialogflowResolver::from_config(&config.dialogflow) {
        Ok(_) => {
            let client_email = config
                .dialogflow
                .service_account()
                .map(|key| key.client_email)
                .unwrap_or_default();
            DoctorCheck::new(
                "dialogflow_credentials",
                CheckStatus::Pass,
                format!(
                    "service account `{client_email}` ready for project `{}`",
                    config.dialogflow.project_id
                ),
            )
        }
        Err(error) => {
            DoctorCheck::new("dialogflow_credentials", CheckStatus::Fail, error.to_string())
        }
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::new(
                    "database_connectivity",
                    CheckStatus::Fail,
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("store_schema", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        "database_connectivity",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("store_schema", "the database is unreachable"),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Pass,
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("database query failed: {error}"),
            ),
        };

        let schema = if connectivity.status == CheckStatus::Pass {
            check_store_schema(&pool).await
        } else {
            DoctorCheck::skipped("store_schema", "the database is unreachable")
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

async fn check_store_schema(pool: &vaxline_db::DbPool) -> DoctorCheck {
    if let Err(error) = migrations::run_pending(pool).await {
        return DoctorCheck::new(
            "store_schema",
            CheckStatus::Fail,
            format!("migrations could not be applied: {error}"),
        );
    }

    let knowledge = SqlKnowledgeRepository::new(pool.clone()).count().await;
    let reminders = SqlReminderRepository::new(pool.clone()).count().await;
    match (knowledge, reminders) {
        (Ok(0), Ok(reminders)) => DoctorCheck::new(
            "store_schema",
            CheckStatus::Warn,
            format!(
                "knowledge base is empty (run `vaxline seed`); {reminders} reminder subscriptions"
            ),
        ),
        (Ok(entries), Ok(reminders)) => DoctorCheck::new(
            "store_schema",
            CheckStatus::Pass,
            format!("{entries} knowledge entries; {reminders} reminder subscriptions"),
        ),
        (Err(error), _) | (_, Err(error)) => {
            DoctorCheck::new("store_schema", CheckStatus::Fail, format!("store query failed: {error}"))
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
