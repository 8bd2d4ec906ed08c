use thiserror::Error;

/// Failures of the real detection pipeline.
///
/// None of these reach a `detect` caller; the service converts every one of
/// them into a mock-backed fallback result.
#[derive(Error, Debug)]
pub enum DetectError {
    /// The source image could not be read or is not usable.
    #[error("image encoding failed: {0}")]
    Encoding(String),

    /// No response was obtained from the upstream endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered, but with a non-success status or no content.
    /// `status` is `None` for the empty-content variant.
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Content was received but is not coercible to valid detections.
    #[error("Failed to parse AI response: {0}")]
    Parse(String),
}

/// Machine-readable classification of a [`DetectError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Encoding,
    Network,
    Transport,
    Parse,
}

pub const EMPTY_CONTENT_MESSAGE: &str = "No content received from API";

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("API Error: {} - {}", code, message),
        None => message.to_string(),
    }
}

impl DetectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Network(_) => ErrorKind::Network,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }

    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    pub fn status<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::Transport {
            status: Some(status),
            message: msg.into(),
        }
    }

    pub fn empty_content() -> Self {
        Self::Transport {
            status: None,
            message: EMPTY_CONTENT_MESSAGE.to_string(),
        }
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_render_code_and_message() {
        let err = DetectError::status(429, "Rate limit reached");
        assert_eq!(err.to_string(), "API Error: 429 - Rate limit reached");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn empty_content_is_a_transport_error_without_status() {
        let err = DetectError::empty_content();
        assert_eq!(err.to_string(), EMPTY_CONTENT_MESSAGE);
        assert!(matches!(err, DetectError::Transport { status: None, .. }));
    }

    #[test]
    fn io_errors_classify_as_encoding() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        assert_eq!(DetectError::from(io).kind(), ErrorKind::Encoding);
    }
}
