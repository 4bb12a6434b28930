//! Error types for the onboarding form controller
//!
//! Each concern gets its own thiserror enum; `FormError` wraps them for
//! callers that drive a whole session.

use thiserror::Error;

/// Top-level error for form session operations
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Rule table error: {0}")]
    RuleTable(#[from] RuleTableError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Unknown dependent field: {0}")]
    UnknownCascade(String),
}

/// Violations detected while building a rule table.
///
/// These are raised once, at construction, so a bad table never reaches a
/// live form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("Field '{field}' is governed by both '{first}' and '{second}'")]
    OverlappingField {
        field: String,
        first: String,
        second: String,
    },

    #[error("Field '{field}' is listed twice under trigger '{trigger}'")]
    DuplicateField { field: String, trigger: String },

    #[error("Rule for trigger '{trigger}' contains an empty field name")]
    EmptyFieldName { trigger: String },

    #[error("Rule has an empty trigger name")]
    EmptyTrigger,

    #[error("Trigger '{0}' cannot also be a controlled field")]
    TriggerControlled(String),

    #[error("Dependent field '{0}' has more than one cascade")]
    DuplicateCascade(String),

    #[error("Cascade '{0}' has no option catalog")]
    MissingCatalog(String),
}

/// Errors from a remote option lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Lookup transport failed: {0}")]
    Transport(String),

    #[error("Server rejected lookup: {0}")]
    Server(String),
}

/// Transport or server failure from a host RPC other than lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// A single cross-field validation problem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field '{0}' is empty")]
    Required(String),

    #[error("'{field}' is not a valid date: {value}")]
    InvalidDate { field: String, value: String },

    #[error("Start date {from} is after end date {to}")]
    PeriodInverted { from: String, to: String },

    #[error("'{value}' is not a valid option for '{field}' under '{parent}'")]
    InvalidOption {
        field: String,
        value: String,
        parent: String,
    },

    #[error("Document must be saved first")]
    Unsaved,
}

/// All validation problems found in one pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationError] {
        &self.0
    }

    /// Ok when there are no issues, otherwise the collected errors
    pub fn into_result(issues: Vec<ValidationError>) -> Result<(), ValidationErrors> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(issues))
        }
    }
}

fn summarize(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid rule table: {0}")]
    Rules(#[from] RuleTableError),
}

/// Errors from admin review actions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("User '{0}' is not allowed to review applications")]
    NotPermitted(String),

    #[error("Application is {0}, only submitted applications can be reviewed")]
    NotReviewable(String),

    #[error("A rejection reason is required")]
    MissingReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_summary() {
        let errors = ValidationErrors(vec![
            ValidationError::Required("company".to_string()),
            ValidationError::PeriodInverted {
                from: "2024-12-31".to_string(),
                to: "2024-01-01".to_string(),
            },
        ]);

        let text = errors.to_string();
        assert!(text.contains("Required field 'company' is empty"));
        assert!(text.contains("; Start date 2024-12-31"));
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::into_result(vec![]).is_ok());
        let err = ValidationErrors::into_result(vec![ValidationError::Unsaved]).unwrap_err();
        assert_eq!(err.issues(), &[ValidationError::Unsaved]);
    }
}
