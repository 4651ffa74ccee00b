//! Path Validation Module
//!
//! Checks untrusted path-like strings before they are placed on a command
//! line. Only a conservative character set is accepted and directory
//! traversal is refused outright.

/// Maximum accepted path length in bytes
pub const MAX_PATH_LENGTH: usize = 4096;

/// Error returned when an input fails validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error in field '{field}': {message}")]
pub struct ValidationError {
    /// Name of the rejected field
    pub field: String,

    /// Why it was rejected
    pub message: String,
}

impl ValidationError {
    fn path(message: &str) -> Self {
        Self {
            field: "path".to_string(),
            message: message.to_string(),
        }
    }
}

/// Validate a file path for use as a command argument
///
/// Rejects, in order:
/// - paths longer than [`MAX_PATH_LENGTH`] bytes
/// - paths containing `..`
/// - paths with any character outside `[A-Za-z0-9._/-]` (including empty paths)
///
/// # Example
///
/// ```
/// use kyverno_tool_server::security::validate_file_path;
///
/// assert!(validate_file_path("/home/user/.kube/config").is_ok());
/// assert!(validate_file_path("../etc/passwd").is_err());
/// ```
pub fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::path("path too long"));
    }

    if path.contains("..") {
        return Err(ValidationError::path("path traversal not allowed"));
    }

    if path.is_empty() || !path.chars().all(is_allowed_path_char) {
        return Err(ValidationError::path("contains invalid characters"));
    }

    Ok(())
}

fn is_allowed_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_common_kubeconfig_paths() {
        let paths = [
            "/home/user/.kube/config",
            "kubeconfig.yaml",
            "/etc/rancher/k3s/k3s.yaml",
            "relative/dir/config_prod-1",
        ];

        for path in paths {
            assert!(validate_file_path(path).is_ok(), "Should accept: {}", path);
        }
    }

    #[test]
    fn test_rejects_traversal() {
        let err = validate_file_path("/home/user/../../etc/shadow").unwrap_err();
        assert_eq!(err.field, "path");
        assert_eq!(err.message, "path traversal not allowed");

        // Any occurrence of the substring is refused, not only path segments
        assert!(validate_file_path("/tmp/a..b").is_err());
    }

    #[test]
    fn test_rejects_too_long() {
        let path = "a".repeat(MAX_PATH_LENGTH + 1);
        let err = validate_file_path(&path).unwrap_err();
        assert_eq!(err.message, "path too long");

        let path = "a".repeat(MAX_PATH_LENGTH);
        assert!(validate_file_path(&path).is_ok());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        let dangerous = [
            "/tmp/config;rm -rf /",
            "/tmp/$HOME",
            "/tmp/`whoami`",
            "/tmp/with space",
            "/tmp/a|b",
            "/tmp/ünïcode",
            "",
        ];

        for path in dangerous {
            let err = validate_file_path(path).unwrap_err();
            assert_eq!(err.message, "contains invalid characters", "path: {:?}", path);
        }
    }

    #[test]
    fn test_error_display() {
        let err = validate_file_path("..").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error in field 'path': path traversal not allowed"
        );
    }

    proptest! {
        #[test]
        fn prop_allowed_charset_without_traversal_is_valid(
            path in "[a-zA-Z0-9_/-][a-zA-Z0-9._/-]{0,64}"
        ) {
            prop_assume!(!path.contains(".."));
            prop_assert!(validate_file_path(&path).is_ok());
        }

        #[test]
        fn prop_traversal_always_rejected(
            prefix in "[a-zA-Z0-9/]{0,16}",
            suffix in "[a-zA-Z0-9/]{0,16}"
        ) {
            let path = format!("{}..{}", prefix, suffix);
            prop_assert!(validate_file_path(&path).is_err());
        }

        #[test]
        fn prop_disallowed_char_rejected(
            prefix in "[a-z]{0,8}",
            bad in "[ ;|&$`()<>*?!~'\"\\\\]",
            suffix in "[a-z]{0,8}"
        ) {
            let path = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(validate_file_path(&path).is_err());
        }
    }
}
