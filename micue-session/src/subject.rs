use std::fmt;

use thiserror::Error;

/// Stand-in identifier when the form arrives empty.
pub const UNKNOWN_SUBJECT: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please enter a Subject ID")]
    MissingSubjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectId(String);

impl SubjectId {
    /// Trimmed form value. Never fails: blank input becomes [`UNKNOWN_SUBJECT`].
    pub fn from_form(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            SubjectId(UNKNOWN_SUBJECT.to_string())
        } else {
            SubjectId(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == UNKNOWN_SUBJECT
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check run by the welcome screen before it lets a session start.
pub fn validate_form(raw: &str) -> Result<SubjectId, FormError> {
    if raw.trim().is_empty() {
        Err(FormError::MissingSubjectId)
    } else {
        Ok(SubjectId::from_form(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_input() {
        assert_eq!(SubjectId::from_form("  S042 \n").as_str(), "S042");
    }

    #[test]
    fn blank_becomes_placeholder() {
        for raw in ["", "   ", "\t"] {
            let id = SubjectId::from_form(raw);
            assert_eq!(id.as_str(), "UNKNOWN");
            assert!(id.is_placeholder());
        }
    }

    #[test]
    fn form_blocks_blank_ids() {
        assert_eq!(validate_form(" "), Err(FormError::MissingSubjectId));
        assert_eq!(validate_form(" P1 ").unwrap().to_string(), "P1");
    }
}
