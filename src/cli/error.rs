// Error handling utilities for consistent error messages and exit codes

use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, rejected transitions, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for unexpected system failures, database corruption, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Validate that a statement ID is valid (positive integer)
pub fn validate_statement_id(id_str: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid statement ID: '{}'. Statement ID must be a number.", id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid statement ID: {}. Statement ID must be positive.", id))
            }
        })
}

/// Validate group name format (alphanumeric, dots, underscores, hyphens)
pub fn validate_group_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Group name cannot be empty".to_string());
    }

    if name.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(format!("Invalid group name: '{}'. Group names can only contain letters, numbers, dots, underscores, and hyphens.", name))
    }
}

/// Validate role name format
pub fn validate_role(role: &str) -> Result<(), String> {
    if role.trim().is_empty() {
        return Err("Role cannot be empty".to_string());
    }

    if role.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(format!("Invalid role: '{}'. Roles can only contain letters, numbers, underscores, and hyphens.", role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_statement_id() {
        assert_eq!(validate_statement_id("1"), Ok(1));
        assert_eq!(validate_statement_id("42"), Ok(42));
        assert!(validate_statement_id("0").is_err());
        assert!(validate_statement_id("-1").is_err());
        assert!(validate_statement_id("abc").is_err());
        assert!(validate_statement_id("").is_err());
    }

    #[test]
    fn test_validate_group_name() {
        assert!(validate_group_name("alfa").is_ok());
        assert!(validate_group_name("alfa.retail").is_ok());
        assert!(validate_group_name("sber_msb").is_ok());
        assert!(validate_group_name("vtb-24").is_ok());
        assert!(validate_group_name("").is_err());
        assert!(validate_group_name("alfa bank").is_err());
        assert!(validate_group_name("alfa@bank").is_err());
    }

    #[test]
    fn test_validate_role() {
        assert!(validate_role("client").is_ok());
        assert!(validate_role("moder").is_ok());
        assert!(validate_role(" ").is_err());
        assert!(validate_role("client,moder").is_err());
    }
}
