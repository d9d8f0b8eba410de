use crate::domain::user::normalize_name;
use crate::error::{AppError, FieldIssue, Result};
use serde_json::Value;

/// Collects field issues while reading an untyped request body.
#[derive(Debug, Default)]
pub(crate) struct FieldCheck {
    issues: Vec<FieldIssue>,
}

impl FieldCheck {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reads a required non-empty string; records `issue` against `field` otherwise.
    pub(crate) fn required(&mut self, field: &str, value: Option<&Value>, issue: &str) -> Option<String> {
        let found = non_empty_string(value);
        if found.is_none() {
            self.issues.push(FieldIssue::new(field, issue));
        }
        found
    }

    /// Reads an optional name: absent yields `None`, anything but a usable name is recorded as an issue.
    pub(crate) fn name(&mut self, field: &str, value: Option<&Value>) -> Option<String> {
        let value = value?;
        let Value::String(raw) = value else {
            self.invalid(field, "Must be a string");
            return None;
        };
        match normalize_name(raw) {
            Ok(name) => Some(name),
            Err(reason) => {
                self.invalid(field, reason);
                None
            }
        }
    }

    /// Reads a clearable text field: absent yields `None`, `null` yields `Some(None)`.
    pub(crate) fn clearable(&mut self, field: &str, value: Option<&Value>) -> Option<Option<String>> {
        match value? {
            Value::Null => Some(None),
            Value::String(s) if !s.trim().is_empty() => Some(Some(s.trim().to_string())),
            _ => {
                self.invalid(field, "Must be a non-empty string or null");
                None
            }
        }
    }

    pub(crate) fn invalid(&mut self, field: &str, issue: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, issue));
    }

    /// Fails with a 400 carrying every recorded issue.
    pub(crate) fn finish(self, message: &str) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(AppError::bad_request(message, self.issues))
        }
    }
}

/// Returns the string if `value` is a string with non-whitespace content.
pub(crate) fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_non_blank_strings_are_accepted() {
        assert_eq!(non_empty_string(Some(&json!("token"))), Some("token".to_string()));
        for value in [json!(null), json!(""), json!("   "), json!(12345), json!(["a"]), json!({"a": 1})] {
            assert_eq!(non_empty_string(Some(&value)), None, "{value} should be rejected");
        }
        assert_eq!(non_empty_string(None), None);
    }

    #[test]
    fn test_issues_are_reported_together() {
        let mut check = FieldCheck::new();
        check.required("email", None, "This field is required");
        check.required("password", Some(&json!("")), "This field is required");

        let err = check.finish("Missing required fields").unwrap_err();
        assert!(matches!(err, AppError::BadRequest { ref details, .. } if details.len() == 2));
    }

    #[test]
    fn test_names_are_trimmed_or_reported() {
        let mut check = FieldCheck::new();
        assert_eq!(check.name("firstname", Some(&json!("  Test  "))), Some("Test".to_string()));
        assert_eq!(check.name("lastname", None), None);
        assert!(check.finish("Invalid").is_ok());

        let mut check = FieldCheck::new();
        assert_eq!(check.name("firstname", Some(&json!("   "))), None);
        assert_eq!(check.name("lastname", Some(&json!(42))), None);
        let err = check.finish("Invalid").unwrap_err();
        assert!(matches!(err, AppError::BadRequest { ref details, .. } if details.len() == 2));
    }

    #[test]
    fn test_clearable_fields() {
        let mut check = FieldCheck::new();
        assert_eq!(check.clearable("currency", None), None);
        assert_eq!(check.clearable("currency", Some(&json!(null))), Some(None));
        assert_eq!(check.clearable("currency", Some(&json!(" EUR "))), Some(Some("EUR".to_string())));
        assert!(check.finish("Invalid").is_ok());

        let mut check = FieldCheck::new();
        assert_eq!(check.clearable("currency", Some(&json!(""))), None);
        assert!(check.finish("Invalid").is_err());
    }
}
