//! Field rules shared by poll creation and update.
//!
//! Every check pushes onto a shared list instead of returning early, so a
//! caller sees all violations of a form at once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult, FieldError};

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum option text length in characters.
pub const MAX_OPTION_LEN: usize = 100;

/// Minimum number of options per poll.
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options per poll.
pub const MAX_OPTIONS: usize = 10;

/// Accumulates field errors for one form.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error
    /// carrying every entry.
    pub fn into_result(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

pub fn check_title(title: &str, errors: &mut FieldErrors) {
    let title = title.trim();
    if title.is_empty() {
        errors.push("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(
            "title",
            format!("Title must be {MAX_TITLE_LEN} characters or less"),
        );
    }
}

pub fn check_description(description: Option<&str>, errors: &mut FieldErrors) {
    if let Some(description) = description
        && description.trim().chars().count() > MAX_DESCRIPTION_LEN
    {
        errors.push(
            "description",
            format!("Description must be {MAX_DESCRIPTION_LEN} characters or less"),
        );
    }
}

/// Count, emptiness, length and case-insensitive uniqueness of option texts.
///
/// Per-option problems are reported on `options[i]`, the count on `options`.
pub fn check_options(options: &[String], errors: &mut FieldErrors) {
    if options.len() < MIN_OPTIONS {
        errors.push("options", "At least two options are required");
    } else if options.len() > MAX_OPTIONS {
        errors.push("options", format!("Maximum {MAX_OPTIONS} options allowed"));
    }

    let mut seen = HashSet::new();
    for (i, text) in options.iter().enumerate() {
        let field = format!("options[{i}]");
        let n = i + 1;
        let text = text.trim();

        if text.is_empty() {
            errors.push(field, format!("Option {n} cannot be empty"));
        } else if text.chars().count() > MAX_OPTION_LEN {
            errors.push(
                field,
                format!("Option {n} must be {MAX_OPTION_LEN} characters or less"),
            );
        } else if !seen.insert(text.to_lowercase()) {
            errors.push(field, format!("Option {n} duplicates an earlier option"));
        }
    }
}

pub fn check_expires_at(expires_at: DateTime<Utc>, now: DateTime<Utc>, errors: &mut FieldErrors) {
    if expires_at <= now {
        errors.push("expiresAt", "Expiration date must be in the future");
    }
}

/// Trimmed description, with blank treated as absent.
#[must_use]
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn fields(errors: FieldErrors) -> Vec<String> {
        match errors.into_result() {
            Err(AppError::Validation(list)) => list.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_title_rules() {
        let mut errors = FieldErrors::new();
        check_title("   ", &mut errors);
        check_title(&"x".repeat(MAX_TITLE_LEN + 1), &mut errors);
        check_title(&"x".repeat(MAX_TITLE_LEN), &mut errors);
        assert_eq!(fields(errors), vec!["title", "title"]);
    }

    #[test]
    fn test_option_count_bounds() {
        let mut errors = FieldErrors::new();
        check_options(&texts(&["only"]), &mut errors);
        assert_eq!(fields(errors), vec!["options"]);

        let eleven: Vec<String> = (0..11).map(|i| format!("choice {i}")).collect();
        let mut errors = FieldErrors::new();
        check_options(&eleven, &mut errors);
        assert_eq!(fields(errors), vec!["options"]);
    }

    #[test]
    fn test_option_text_rules_are_all_reported() {
        let long = "y".repeat(MAX_OPTION_LEN + 1);
        let mut errors = FieldErrors::new();
        check_options(&texts(&["Rust", "", &long, " rust "]), &mut errors);
        assert_eq!(
            fields(errors),
            vec!["options[1]", "options[2]", "options[3]"]
        );
    }

    #[test]
    fn test_option_messages_are_one_based() {
        let mut errors = FieldErrors::new();
        check_options(&texts(&["a", ""]), &mut errors);
        let Err(AppError::Validation(list)) = errors.into_result() else {
            panic!("expected validation error");
        };
        assert_eq!(list[0].message, "Option 2 cannot be empty");
    }

    #[test]
    fn test_expiry_must_be_strictly_future() {
        let now = Utc::now();
        let mut errors = FieldErrors::new();
        check_expires_at(now, now, &mut errors);
        check_expires_at(now - Duration::minutes(1), now, &mut errors);
        check_expires_at(now + Duration::minutes(1), now, &mut errors);
        assert_eq!(fields(errors), vec!["expiresAt", "expiresAt"]);
    }

    #[test]
    fn test_description_limit_and_normalization() {
        let mut errors = FieldErrors::new();
        check_description(Some(&"d".repeat(MAX_DESCRIPTION_LEN)), &mut errors);
        assert!(errors.is_empty());
        check_description(Some(&"d".repeat(MAX_DESCRIPTION_LEN + 1)), &mut errors);
        assert_eq!(fields(errors), vec!["description"]);

        assert_eq!(normalize_description(Some("  ".to_string())), None);
        assert_eq!(
            normalize_description(Some(" hi ".to_string())),
            Some("hi".to_string())
        );
    }
}
