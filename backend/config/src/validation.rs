//! Config validation: schema checks with user-friendly error messages.

use crate::schema::PanelConfig;
use std::collections::HashSet;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &PanelConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_logging(config, &mut report);
    validate_tokens(config, &mut report);
    report
}

fn validate_server(config: &PanelConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if server.port == Some(0) {
        report.error("server.port", "Port must be > 0");
    }
    if let Some(bind) = &server.bind {
        if bind.parse::<std::net::IpAddr>().is_err() {
            report.error("server.bind", format!("'{bind}' is not an IP address"));
        }
    }
}

fn validate_logging(config: &PanelConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if level.trim().is_empty() {
        report.error("logging.level", "Log level cannot be empty");
    }
}

fn validate_tokens(config: &PanelConfig, report: &mut ValidationReport) {
    let tokens = config.tokens();
    if tokens.is_empty() {
        report.warn("auth.tokens", "No tokens configured; every API call will be rejected");
        return;
    }

    let mut seen = HashSet::new();
    for (i, entry) in tokens.iter().enumerate() {
        let path = format!("auth.tokens[{i}]");
        if entry.token.trim().is_empty() {
            report.error(format!("{path}.token"), "Token cannot be empty");
        } else if !seen.insert(entry.token.as_str()) {
            report.error(format!("{path}.token"), "Token is listed more than once");
        } else if entry.token.len() < 16 {
            report.warn(format!("{path}.token"), "Token is shorter than 16 characters");
        }
        if entry.username.trim().is_empty() {
            report.error(format!("{path}.username"), "Username cannot be empty");
        }
        if entry.role.is_none() && !entry.admin {
            report.error(&path, "Token grants neither a role nor admin");
        }
    }
}
