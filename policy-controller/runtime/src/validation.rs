use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

const DOMAIN_PATTERN_REGEX: &str =
    r"^(\*\.)?[a-z0-9_]([-a-z0-9_]*[a-z0-9_])?(\.[a-z0-9_]([-a-z0-9_]*[a-z0-9_])?)*\.?$";

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){DOMAIN_PATTERN_REGEX}")).expect("domain pattern regex must compile")
});

#[derive(Debug, Error, PartialEq, Clone)]
pub enum PatternError {
    #[error("domain pattern cannot be empty")]
    Empty,

    #[error("domain pattern exceeds {MAX_NAME_LEN} characters")]
    TooLong,

    #[error("domain label {0:?} exceeds {MAX_LABEL_LEN} characters")]
    LabelTooLong(String),

    #[error(
        "domain pattern must be a DNS name with an optional leading wildcard, matching the regex: {}",
        DOMAIN_PATTERN_REGEX
    )]
    Invalid,
}

/// Validates a block-list entry.
///
/// Patterns are compared case-insensitively, so uppercase letters are accepted.
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern == "*" {
        return Ok(());
    }

    let name = pattern.strip_suffix('.').unwrap_or(pattern);
    if name.len() > MAX_NAME_LEN {
        return Err(PatternError::TooLong);
    }
    if let Some(label) = name.split('.').find(|l| l.len() > MAX_LABEL_LEN) {
        return Err(PatternError::LabelTooLong(label.to_string()));
    }

    if !DOMAIN_PATTERN.is_match(pattern) {
        return Err(PatternError::Invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name() {
        assert!(validate_domain_pattern("ads.example.com").is_ok())
    }

    #[test]
    fn valid_wildcard_prefix() {
        assert!(validate_domain_pattern("*.tracker.net").is_ok())
    }

    #[test]
    fn valid_all() {
        assert!(validate_domain_pattern("*").is_ok())
    }

    #[test]
    fn valid_fully_qualified() {
        assert!(validate_domain_pattern("example.com.").is_ok())
    }

    #[test]
    fn valid_mixed_case_and_underscore() {
        assert!(validate_domain_pattern("_dmarc.Example.COM").is_ok())
    }

    #[test]
    fn invalid_empty() {
        let err = validate_domain_pattern("").unwrap_err();
        assert_eq!(err, PatternError::Empty);
    }

    #[test]
    fn invalid_wildcard_suffix() {
        let err = validate_domain_pattern("example.*").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_inner_wildcard() {
        let err = validate_domain_pattern("ads.*.example.com").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_leading_dot() {
        let err = validate_domain_pattern(".example.com").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_double_dots() {
        let err = validate_domain_pattern("example..com").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_hyphen_edges() {
        for pattern in ["-example.com", "example-.com"] {
            let err = validate_domain_pattern(pattern).unwrap_err();
            assert_eq!(err, PatternError::Invalid, "{pattern}");
        }
    }

    #[test]
    fn invalid_url() {
        let err = validate_domain_pattern("https://example.com/ads").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_whitespace() {
        let err = validate_domain_pattern("example .com").unwrap_err();
        assert_eq!(err, PatternError::Invalid);
    }

    #[test]
    fn invalid_long_label() {
        let label = "a".repeat(64);
        let err = validate_domain_pattern(&format!("{label}.com")).unwrap_err();
        assert_eq!(err, PatternError::LabelTooLong(label));
    }

    #[test]
    fn invalid_long_name() {
        let name = vec!["a".repeat(50); 6].join(".");
        assert!(name.len() > MAX_NAME_LEN);
        let err = validate_domain_pattern(&name).unwrap_err();
        assert_eq!(err, PatternError::TooLong);
    }

    #[test]
    fn fully_qualified_max_length() {
        let name = vec!["a".repeat(63); 4].join(".");
        let name = &name[..MAX_NAME_LEN];
        assert!(validate_domain_pattern(name).is_ok());
        assert!(validate_domain_pattern(&format!("{name}.")).is_ok());
    }
}
