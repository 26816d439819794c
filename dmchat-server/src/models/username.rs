//! Username validation

use super::ValidationError;

/// Maximum length for usernames, in characters
const MAX_USERNAME_LEN: usize = 64;

/// Validated username
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Create a new username.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 64 characters
    /// - No control characters
    ///
    /// # Example
    /// ```
    /// use dmchat_server::models::Username;
    ///
    /// assert_eq!(Username::new("  alice ").unwrap().as_str(), "alice");
    /// assert!(Username::new("").is_err());
    /// assert!(Username::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }

        if trimmed.chars().count() > MAX_USERNAME_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: MAX_USERNAME_LEN,
            });
        }

        if trimmed.chars().any(char::is_control) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "must not contain control characters",
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Get the username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
