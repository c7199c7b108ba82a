use rackbot_core::config::{AppConfig, LoadOptions, SheetsCredentials};
use rackbot_sheets::{GoogleSheetsBackend, TableBackend};
use serde::Serialize;

use crate::commands::{block_on, CommandResult, EXIT_CHECK_FAILED};

const CONFIG_VALIDATION: &str = "config_validation";
const SHEETS_CREDENTIALS: &str = "sheets_credentials";
const SPREADSHEET_REACHABILITY: &str = "spreadsheet_reachability";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = match AppConfig::load(options.clone()) {
        Ok(config) => match GoogleSheetsBackend::from_config(&config.sheets) {
            Ok(backend) => match block_on(check_config(&config, &backend)) {
                Ok(report) => report,
                Err(error) => finalize(vec![
                    config_passed(),
                    credentials_check(&config),
                    check(SPREADSHEET_REACHABILITY, CheckStatus::Fail, format!("{error:#}")),
                ]),
            },
            Err(error) => finalize(vec![
                config_passed(),
                credentials_check(&config),
                check(SPREADSHEET_REACHABILITY, CheckStatus::Fail, error.to_string()),
            ]),
        },
        Err(error) => finalize(vec![
            check(CONFIG_VALIDATION, CheckStatus::Fail, error.to_string()),
            skipped(SHEETS_CREDENTIALS),
            skipped(SPREADSHEET_REACHABILITY),
        ]),
    };
    render(&report, json_output)
}

/// Runs the checks that need a loaded config against `backend`.
pub async fn check_config<B>(config: &AppConfig, backend: &B) -> DoctorReport
where
    B: TableBackend + ?Sized,
{
    let reachability = match backend.list_tables().await {
        Ok(tables) => check(
            SPREADSHEET_REACHABILITY,
            CheckStatus::Pass,
            format!(
                "spreadsheet `{}` reachable, {} table(s) visible",
                config.sheets.spreadsheet_id,
                tables.len()
            ),
        ),
        Err(error) => check(SPREADSHEET_REACHABILITY, CheckStatus::Fail, error.to_string()),
    };
    finalize(vec![config_passed(), credentials_check(config), reachability])
}

pub fn render(report: &DoctorReport, json_output: bool) -> CommandResult {
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_CHECK_FAILED };
    let output = if json_output {
        serde_json::to_string_pretty(report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(report)
    };
    CommandResult { exit_code, output }
}

fn credentials_check(config: &AppConfig) -> DoctorCheck {
    match config.sheets.credentials() {
        Ok(SheetsCredentials::AccessToken(_)) => check(
            SHEETS_CREDENTIALS,
            CheckStatus::Pass,
            "static access token configured (expires, no refresh)".to_string(),
        ),
        Ok(SheetsCredentials::RefreshToken { client_id, .. }) => check(
            SHEETS_CREDENTIALS,
            CheckStatus::Pass,
            format!("refresh token grant for client `{client_id}`"),
        ),
        Err(error) => check(SHEETS_CREDENTIALS, CheckStatus::Fail, error.to_string()),
    }
}

fn config_passed() -> DoctorCheck {
    check(CONFIG_VALIDATION, CheckStatus::Pass, "configuration loaded and validated".to_string())
}

fn skipped(name: &'static str) -> DoctorCheck {
    check(name, CheckStatus::Skipped, "skipped because configuration did not load".to_string())
}

fn check(name: &'static str, status: CheckStatus, details: String) -> DoctorCheck {
    DoctorCheck { name, status, details }
}

fn finalize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
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
