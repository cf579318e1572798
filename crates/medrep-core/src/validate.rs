//! Boundary validation.
//!
//! Every endpoint deserializes into a named request struct and runs these
//! checks once, before any store or registry component is reached. The same
//! checks back the startup bootstrap account.

use thiserror::Error;

/// Minimum length for free-text report fields after trimming.
pub const MIN_TEXT_LEN: usize = 2;
/// Maximum accepted patient name length.
pub const MAX_PATIENT_NAME_LEN: usize = 256;
/// Maximum accepted diagnosis length.
pub const MAX_DIAGNOSIS_LEN: usize = 4096;
/// Maximum accepted email length (RFC 5321 mailbox bound).
pub const MAX_EMAIL_LEN: usize = 254;
/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Maximum accepted password length, bounding hashing work.
pub const MAX_PASSWORD_LEN: usize = 512;

/// Rejected input, reported to the client verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty after trimming.
    #[error("{field} is required")]
    Required {
        /// Offending field name as it appears on the wire.
        field: &'static str,
    },

    /// Field is shorter than the allowed minimum.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Offending field name as it appears on the wire.
        field: &'static str,
        /// Minimum accepted length.
        min: usize,
    },

    /// Field is longer than the allowed maximum.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Offending field name as it appears on the wire.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// Email does not look like an address.
    #[error("email is not a valid address")]
    EmailFormat,
}

/// Trims `value` and enforces `min..=max` character bounds.
///
/// Returns the trimmed text.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming `field` when the bounds are violated.
pub fn validate_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    let chars = trimmed.chars().count();
    if chars < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if chars > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Validates a login/bootstrap email and returns it trimmed.
///
/// The check is deliberately shallow (non-empty, has an `@`, bounded
/// length); the email is an exact-match lookup key, not a deliverable
/// address.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the shape or bounds are violated.
pub fn validate_email(value: &str) -> Result<String, ValidationError> {
    let trimmed = validate_text("email", value, 1, MAX_EMAIL_LEN)?;
    if !trimmed.contains('@') {
        return Err(ValidationError::EmailFormat);
    }
    Ok(trimmed)
}

/// Validates a password's length bounds. Passwords are never trimmed.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the bounds are violated.
pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required { field: "password" });
    }
    let chars = value.chars().count();
    if chars < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password",
            min: MIN_PASSWORD_LEN,
        });
    }
    if chars > MAX_PASSWORD_LEN {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_trimmed_and_bounded() {
        assert_eq!(
            validate_text("patientName", "  Jane Doe  ", MIN_TEXT_LEN, MAX_PATIENT_NAME_LEN)
                .unwrap(),
            "Jane Doe"
        );
        assert_eq!(
            validate_text("patientName", "   ", MIN_TEXT_LEN, MAX_PATIENT_NAME_LEN).unwrap_err(),
            ValidationError::Required {
                field: "patientName"
            }
        );
        assert_eq!(
            validate_text("patientName", "J", MIN_TEXT_LEN, MAX_PATIENT_NAME_LEN).unwrap_err(),
            ValidationError::TooShort {
                field: "patientName",
                min: MIN_TEXT_LEN
            }
        );
        let long = "x".repeat(MAX_PATIENT_NAME_LEN + 1);
        assert_eq!(
            validate_text("patientName", &long, MIN_TEXT_LEN, MAX_PATIENT_NAME_LEN).unwrap_err(),
            ValidationError::TooLong {
                field: "patientName",
                max: MAX_PATIENT_NAME_LEN
            }
        );
    }

    #[test]
    fn email_requires_an_at_sign() {
        assert_eq!(validate_email(" user@example.com ").unwrap(), "user@example.com");
        assert_eq!(
            validate_email("userexample.com").unwrap_err(),
            ValidationError::EmailFormat
        );
        assert_eq!(
            validate_email("").unwrap_err(),
            ValidationError::Required { field: "email" }
        );
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password("password123").is_ok());
        assert_eq!(
            validate_password("short").unwrap_err(),
            ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN
            }
        );
        assert_eq!(
            validate_password("").unwrap_err(),
            ValidationError::Required { field: "password" }
        );
        let long = "x".repeat(MAX_PASSWORD_LEN + 1);
        assert_eq!(
            validate_password(&long).unwrap_err(),
            ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN
            }
        );
    }

    #[test]
    fn passwords_keep_surrounding_whitespace() {
        // " secret " and "secret" must hash differently, so no trimming.
        assert!(validate_password("  scrt1234  ").is_ok());
    }
}
