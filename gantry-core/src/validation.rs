//! Explicit validation at construction and mutation boundaries

use std::collections::HashSet;
use thiserror::Error;

use crate::domain::log::LogEntry;
use crate::domain::pipeline::Variable;

pub const MAX_LOG_MESSAGE_LENGTH: usize = 10_000;
pub const MAX_LOG_BATCH_SIZE: usize = 1000;
pub const MAX_VARIABLE_KEY_LENGTH: usize = 255;
/// 30 days
pub const MAX_JOB_TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;
/// One year
pub const MAX_ARTIFACT_EXPIRE_IN_SECONDS: u64 = 365 * 24 * 60 * 60;

/// A rejected input, with a message suitable for API responses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Types that can check their own invariants
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Keys must look like environment variable names
pub fn validate_variable_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::new("Variable key cannot be empty"));
    }

    if key.len() > MAX_VARIABLE_KEY_LENGTH {
        return Err(ValidationError::new(format!(
            "Variable key is too long (max {} characters)",
            MAX_VARIABLE_KEY_LENGTH
        )));
    }

    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new(format!(
            "Variable key '{}' may only contain letters, digits and underscores",
            key
        )));
    }

    Ok(())
}

/// Validates each variable and rejects duplicate keys
pub fn validate_variables(variables: &[Variable]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for variable in variables {
        variable.validate()?;
        if !seen.insert(variable.key.as_str()) {
            return Err(ValidationError::new(format!(
                "Variable '{}' is set more than once",
                variable.key
            )));
        }
    }
    Ok(())
}

/// Tags are non-empty and contain no commas
pub fn validate_tags<'a, I>(tags: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a String>,
{
    for tag in tags {
        if tag.trim().is_empty() || tag.contains(',') {
            return Err(ValidationError::new(format!("Invalid tag '{}'", tag)));
        }
    }
    Ok(())
}

/// A timeout must be positive and at most [`MAX_JOB_TIMEOUT_SECONDS`]
pub fn validate_timeout(label: &str, seconds: u64) -> Result<(), ValidationError> {
    if seconds == 0 {
        return Err(ValidationError::new(format!(
            "{} must be greater than 0",
            label
        )));
    }
    if seconds > MAX_JOB_TIMEOUT_SECONDS {
        return Err(ValidationError::new(format!(
            "{} is too long (max: {} seconds)",
            label, MAX_JOB_TIMEOUT_SECONDS
        )));
    }
    Ok(())
}

pub fn validate_expire_in(seconds: u64) -> Result<(), ValidationError> {
    if seconds > MAX_ARTIFACT_EXPIRE_IN_SECONDS {
        return Err(ValidationError::new(format!(
            "Artifact expiry is too long (max: {} seconds)",
            MAX_ARTIFACT_EXPIRE_IN_SECONDS
        )));
    }
    Ok(())
}

pub fn validate_log_entries(entries: &[LogEntry]) -> Result<(), ValidationError> {
    if entries.len() > MAX_LOG_BATCH_SIZE {
        return Err(ValidationError::new(format!(
            "Too many log entries in batch (max: {})",
            MAX_LOG_BATCH_SIZE
        )));
    }

    for (i, entry) in entries.iter().enumerate() {
        if entry.message.len() > MAX_LOG_MESSAGE_LENGTH {
            return Err(ValidationError::new(format!(
                "Log entry {} message too long (max: {} chars)",
                i, MAX_LOG_MESSAGE_LENGTH
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::log::LogLevel;

    #[test]
    fn test_validate_log_entries_valid() {
        let entries = vec![
            LogEntry::now(LogLevel::Info, "Test message"),
            LogEntry::now(LogLevel::Error, "Error message"),
        ];

        assert!(validate_log_entries(&entries).is_ok());
    }

    #[test]
    fn test_validate_log_entries_too_many() {
        let entries: Vec<LogEntry> = (0..1001)
            .map(|i| LogEntry::now(LogLevel::Info, format!("Message {}", i)))
            .collect();

        assert!(validate_log_entries(&entries).is_err());
    }

    #[test]
    fn test_validate_log_entries_message_too_long() {
        let entries = vec![LogEntry::now(LogLevel::Info, "x".repeat(10_001))];
        assert!(validate_log_entries(&entries).is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(validate_timeout("Timeout", 3600).is_ok());
        assert!(validate_timeout("Timeout", MAX_JOB_TIMEOUT_SECONDS).is_ok());
        assert!(validate_timeout("Timeout", 0).is_err());
        assert!(validate_timeout("Timeout", MAX_JOB_TIMEOUT_SECONDS + 1).is_err());
        assert!(validate_timeout("Timeout", u64::MAX).is_err());
    }

    #[test]
    fn test_expire_in_bounds() {
        assert!(validate_expire_in(0).is_ok());
        assert!(validate_expire_in(MAX_ARTIFACT_EXPIRE_IN_SECONDS).is_ok());
        assert!(validate_expire_in(u64::MAX).is_err());
    }

    #[test]
    fn test_variable_keys() {
        assert!(validate_variable_key("DEPLOY_ENV").is_ok());
        assert!(validate_variable_key("").is_err());
        assert!(validate_variable_key("MY-VAR").is_err());
        assert!(validate_variable_key("A B").is_err());
    }

    #[test]
    fn test_duplicate_variables_rejected() {
        let variables = vec![Variable::new("A", "1"), Variable::new("A", "2")];
        assert!(validate_variables(&variables).is_err());
    }

    #[test]
    fn test_tags() {
        let good = vec!["docker".to_string()];
        let bad = vec!["docker,linux".to_string()];
        assert!(validate_tags(&good).is_ok());
        assert!(validate_tags(&bad).is_err());
    }
}
