use thiserror::Error;

use crate::token::TokenError;

/// Fixed user-facing text for any failure surfaced at the HTTP boundary.
/// Internals are logged; the user only ever sees this.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something unexpectedly went wrong :(";

/// Why an interaction step was rejected.
///
/// Every variant is terminal for the current interaction: the bot logs it and
/// moves on, and the user restarts the flow by posting a new link. `Mismatch`
/// is additionally silent, so a stranger clicking someone else's button gets
/// no feedback at all.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("interacting user `{actual}` does not match token user `{expected}`")]
    Mismatch { expected: String, actual: String },
}

impl InteractionError {
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Mismatch { expected: expected.into(), actual: actual.into() }
    }

    /// Mismatches are ignored without any user-visible output.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::InteractionError;
    use crate::token::TokenError;

    #[test]
    fn mismatch_is_silent_and_token_failures_are_not() {
        assert!(InteractionError::mismatch("U1", "U2").is_silent());
        assert!(!InteractionError::from(TokenError::InvalidSignature).is_silent());
    }

    #[test]
    fn mismatch_message_names_both_users() {
        let message = InteractionError::mismatch("U1", "U2").to_string();
        assert!(message.contains("U1"));
        assert!(message.contains("U2"));
    }
}
