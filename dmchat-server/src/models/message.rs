//! Message body validation

use super::ValidationError;

/// Maximum length for a chat message, in characters
const MAX_BODY_LEN: usize = 4000;

/// Validated chat message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    /// Create a new message body.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 4000 characters
    ///
    /// # Example
    /// ```
    /// use dmchat_server::models::MessageBody;
    ///
    /// assert!(MessageBody::new("hi there").is_ok());
    /// assert!(MessageBody::new("  \n ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "message" });
        }

        if trimmed.chars().count() > MAX_BODY_LEN {
            return Err(ValidationError::TooLong {
                field: "message",
                max: MAX_BODY_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Get the body as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
