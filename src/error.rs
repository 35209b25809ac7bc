use thiserror::Error;

/// Failures that a voice session can surface or swallow.
///
/// `Configuration`, `Permission`, `Device` and `Transport` end the session and
/// are kept as its last error. `Decode` only ever drops a single fragment.
/// An orderly close from the far end is not an error at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("missing credential: {0}")]
    Configuration(String),

    #[error("input device access denied: {0}")]
    Permission(String),

    #[error("output device unavailable: {0}")]
    Device(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode audio fragment: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            SessionError::Decode("odd length".into()).to_string(),
            "failed to decode audio fragment: odd length"
        );
        assert_eq!(
            SessionError::Configuration("GEMINI_API_KEY".into()).to_string(),
            "missing credential: GEMINI_API_KEY"
        );
    }
}
