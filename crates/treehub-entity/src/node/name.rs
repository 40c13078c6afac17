//! Node name validation.
//!
//! Length checks are performed in characters, not bytes, so multi-byte
//! names are budgeted correctly.

use treehub_core::{AppError, AppResult};

/// Maximum node name length in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Characters that may not appear in a node name.
pub const FORBIDDEN_CHARS: [char; 3] = [':', '/', '\\'];

/// Validate a node name: 1-255 characters, none of `:`, `/`, `\`.
pub fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(AppError::validation(format!(
            "Name is {chars} characters, exceeding the {MAX_NAME_CHARS} character limit"
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(AppError::validation(format!(
            "Name contains forbidden character '{c}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_names() {
        validate_name("Report.pdf").expect("plain name");
        validate_name("notes 2026-08").expect("spaces and dashes");
        validate_name("résumé.tar.gz").expect("multi-byte");
    }

    #[test]
    fn test_rejects_empty() {
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_rejects_forbidden_characters() {
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a:b").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn test_length_counted_in_chars() {
        // 255 two-byte characters is 510 bytes but still a legal name.
        let name: String = std::iter::repeat('é').take(MAX_NAME_CHARS).collect();
        validate_name(&name).expect("255 chars is legal");

        let long: String = std::iter::repeat('é').take(MAX_NAME_CHARS + 1).collect();
        assert!(validate_name(&long).is_err());
    }
}
